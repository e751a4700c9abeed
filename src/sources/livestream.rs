use async_trait::async_trait;
use tracing::warn;
use url::Url;

use super::StreamResolver;
use crate::error::{AudioError, Result};

/// Resolver de transmisiones en vivo vía streamlink (Twitch y compañía).
///
/// `streamlink --stream-url` imprime la URL del stream HLS; la duración de
/// estas pistas siempre queda en cero porque no hay final conocido.
pub struct LivestreamResolver {
    streamlink_path: String,
}

const LIVE_HOSTS: &[&str] = &["twitch.tv", "www.twitch.tv", "m.twitch.tv"];

impl LivestreamResolver {
    pub fn new(streamlink_path: &str) -> Self {
        Self {
            streamlink_path: streamlink_path.to_string(),
        }
    }

    pub fn is_live_url(url: &str) -> bool {
        Url::parse(url)
            .ok()
            .and_then(|u| u.host_str().map(|h| LIVE_HOSTS.contains(&h)))
            .unwrap_or(false)
    }

    /// Nombre del canal a partir del path de la URL.
    fn channel_name(url: &str) -> Option<String> {
        let parsed = Url::parse(url).ok()?;
        parsed
            .path_segments()?
            .find(|s| !s.is_empty())
            .map(|s| s.to_string())
    }
}

#[async_trait]
impl StreamResolver for LivestreamResolver {
    fn can_resolve(&self, location: &str) -> bool {
        Self::is_live_url(location)
    }

    async fn resolve_stream_url(&self, location: &str) -> Result<String> {
        let output = tokio::process::Command::new(&self.streamlink_path)
            .args(["--stream-url", location, "best"])
            .output()
            .await
            .map_err(|e| AudioError::Resolution {
                location: location.to_string(),
                reason: format!("no se pudo ejecutar streamlink: {}", e),
            })?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            warn!("❌ streamlink falló para `{}`: {}", location, stderr.trim());
            return Err(AudioError::Resolution {
                location: location.to_string(),
                reason: stderr.trim().to_string(),
            });
        }

        let stdout = String::from_utf8_lossy(&output.stdout);
        let url = stdout.trim();

        if url.is_empty() {
            return Err(AudioError::Resolution {
                location: location.to_string(),
                reason: "streamlink no devolvió ninguna URL".to_string(),
            });
        }

        Ok(url.to_string())
    }

    async fn track_name(&self, location: &str) -> Result<String> {
        let channel = Self::channel_name(location).ok_or_else(|| AudioError::Resolution {
            location: location.to_string(),
            reason: "URL de transmisión sin canal".to_string(),
        })?;

        Ok(format!("{} (en vivo)", channel))
    }

    fn source_name(&self) -> &'static str {
        "Livestream"
    }
}
