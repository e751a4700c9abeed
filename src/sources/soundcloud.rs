use async_trait::async_trait;
use regex::Regex;
use std::sync::OnceLock;

use super::youtube::{name_with_ytdlp, resolve_with_ytdlp};
use super::StreamResolver;
use crate::error::Result;

/// Resolver de SoundCloud.
///
/// La extracción también la hace yt-dlp; este resolver solo aporta la
/// detección de URLs de pista (usuario/pista, no perfiles ni listados).
pub struct SoundcloudResolver {
    ytdlp_path: String,
}

fn track_url_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"^https?://(www\.)?soundcloud\.com/[\w\-]+/[\w\-]+/?(\?.*)?$")
            .expect("regex de SoundCloud inválida")
    })
}

impl SoundcloudResolver {
    pub fn new(ytdlp_path: &str) -> Self {
        Self {
            ytdlp_path: ytdlp_path.to_string(),
        }
    }

    pub fn is_soundcloud_url(url: &str) -> bool {
        track_url_pattern().is_match(url)
    }
}

#[async_trait]
impl StreamResolver for SoundcloudResolver {
    fn can_resolve(&self, location: &str) -> bool {
        Self::is_soundcloud_url(location)
    }

    async fn resolve_stream_url(&self, location: &str) -> Result<String> {
        resolve_with_ytdlp(&self.ytdlp_path, location).await
    }

    async fn track_name(&self, location: &str) -> Result<String> {
        name_with_ytdlp(&self.ytdlp_path, location).await
    }

    fn source_name(&self) -> &'static str {
        "SoundCloud"
    }
}
