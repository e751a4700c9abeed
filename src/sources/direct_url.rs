use async_trait::async_trait;
use std::time::Duration;
use tracing::debug;
use url::Url;

use super::StreamResolver;
use crate::error::{AudioError, Result};

/// Resolver de URLs directas a archivos de audio.
///
/// Último en el orden de prioridad: acepta cualquier http(s) con extensión
/// de audio conocida y verifica con un HEAD que el servidor realmente sirve
/// audio antes de entregársela al decodificador.
pub struct DirectUrlResolver {
    client: reqwest::Client,
}

const AUDIO_EXTENSIONS: &[&str] = &["mp3", "ogg", "oga", "opus", "flac", "wav", "m4a", "aac", "webm"];

impl DirectUrlResolver {
    pub fn new() -> Self {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(15))
            .build()
            .unwrap_or_default();

        Self { client }
    }

    pub fn looks_like_audio_url(location: &str) -> bool {
        let Ok(parsed) = Url::parse(location) else {
            return false;
        };

        if parsed.scheme() != "http" && parsed.scheme() != "https" {
            return false;
        }

        let path = parsed.path().to_ascii_lowercase();
        AUDIO_EXTENSIONS
            .iter()
            .any(|ext| path.ends_with(&format!(".{}", ext)))
    }

    fn file_name(location: &str) -> Option<String> {
        let parsed = Url::parse(location).ok()?;
        parsed
            .path_segments()?
            .filter(|s| !s.is_empty())
            .last()
            .map(|s| s.to_string())
    }
}

impl Default for DirectUrlResolver {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl StreamResolver for DirectUrlResolver {
    fn can_resolve(&self, location: &str) -> bool {
        Self::looks_like_audio_url(location)
    }

    async fn resolve_stream_url(&self, location: &str) -> Result<String> {
        let response = self
            .client
            .head(location)
            .send()
            .await
            .map_err(|e| AudioError::Resolution {
                location: location.to_string(),
                reason: format!("HEAD falló: {}", e),
            })?;

        if !response.status().is_success() {
            return Err(AudioError::Resolution {
                location: location.to_string(),
                reason: format!("el servidor respondió {}", response.status()),
            });
        }

        // Algunos servidores sirven audio como octet-stream; con la extensión
        // ya filtrada eso es suficiente garantía.
        if let Some(content_type) = response
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
        {
            let ok = content_type.starts_with("audio/")
                || content_type.starts_with("video/")
                || content_type.starts_with("application/octet-stream");

            if !ok {
                return Err(AudioError::Resolution {
                    location: location.to_string(),
                    reason: format!("content-type no reproducible: {}", content_type),
                });
            }
        }

        debug!("🔗 URL directa verificada: {}", location);
        Ok(location.to_string())
    }

    async fn track_name(&self, location: &str) -> Result<String> {
        Self::file_name(location).ok_or_else(|| AudioError::Resolution {
            location: location.to_string(),
            reason: "URL sin nombre de archivo".to_string(),
        })
    }

    fn source_name(&self) -> &'static str {
        "DirectUrl"
    }
}
