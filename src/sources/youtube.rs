use async_trait::async_trait;
use tracing::{debug, warn};

use super::StreamResolver;
use crate::error::{AudioError, Result};

/// Resolver de YouTube respaldado por yt-dlp.
///
/// yt-dlp extrae la URL de audio firmada (`-g`) y el título (`--print`).
/// Las URLs extraídas caducan, por eso nunca se cachean.
pub struct YoutubeResolver {
    ytdlp_path: String,
}

impl YoutubeResolver {
    pub fn new(ytdlp_path: &str) -> Self {
        Self {
            ytdlp_path: ytdlp_path.to_string(),
        }
    }

    pub fn is_youtube_url(url: &str) -> bool {
        url.contains("youtube.com/watch")
            || url.contains("youtu.be/")
            || url.contains("music.youtube.com/watch")
    }
}

#[async_trait]
impl StreamResolver for YoutubeResolver {
    fn can_resolve(&self, location: &str) -> bool {
        Self::is_youtube_url(location)
    }

    async fn resolve_stream_url(&self, location: &str) -> Result<String> {
        resolve_with_ytdlp(&self.ytdlp_path, location).await
    }

    async fn track_name(&self, location: &str) -> Result<String> {
        name_with_ytdlp(&self.ytdlp_path, location).await
    }

    fn source_name(&self) -> &'static str {
        "YouTube"
    }
}

/// Pide a yt-dlp la URL de mejor audio para la ubicación.
pub(crate) async fn resolve_with_ytdlp(ytdlp_path: &str, location: &str) -> Result<String> {
    let output = tokio::process::Command::new(ytdlp_path)
        .args([
            "-g",
            "-f",
            "bestaudio/best",
            "--no-playlist",
            "--quiet",
            "--no-warnings",
            "--socket-timeout",
            "30",
            "--retries",
            "2",
        ])
        .arg(location)
        .output()
        .await
        .map_err(|e| AudioError::Resolution {
            location: location.to_string(),
            reason: format!("no se pudo ejecutar yt-dlp: {}", e),
        })?;

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        warn!("❌ yt-dlp falló para `{}`: {}", location, stderr.trim());
        return Err(AudioError::Resolution {
            location: location.to_string(),
            reason: stderr.trim().to_string(),
        });
    }

    let stdout = String::from_utf8_lossy(&output.stdout);
    let url = stdout
        .lines()
        .map(str::trim)
        .find(|l| !l.is_empty())
        .ok_or_else(|| AudioError::Resolution {
            location: location.to_string(),
            reason: "yt-dlp no devolvió ninguna URL".to_string(),
        })?;

    debug!("🔗 Stream resuelto para `{}`", location);
    Ok(url.to_string())
}

/// Pide a yt-dlp el título de la pista.
pub(crate) async fn name_with_ytdlp(ytdlp_path: &str, location: &str) -> Result<String> {
    let output = tokio::process::Command::new(ytdlp_path)
        .args([
            "--print",
            "%(title)s",
            "--skip-download",
            "--no-playlist",
            "--quiet",
            "--no-warnings",
            "--socket-timeout",
            "30",
        ])
        .arg(location)
        .output()
        .await
        .map_err(|e| AudioError::Resolution {
            location: location.to_string(),
            reason: format!("no se pudo ejecutar yt-dlp: {}", e),
        })?;

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        return Err(AudioError::Resolution {
            location: location.to_string(),
            reason: stderr.trim().to_string(),
        });
    }

    let stdout = String::from_utf8_lossy(&output.stdout);
    let title = stdout.trim();

    if title.is_empty() {
        return Err(AudioError::Resolution {
            location: location.to_string(),
            reason: "yt-dlp no devolvió título".to_string(),
        });
    }

    Ok(title.to_string())
}
