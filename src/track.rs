use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;
use tracing::warn;

use crate::error::{AudioError, Result};
use crate::sources::ResolverRegistry;
use crate::util::format_length;

/// Una pista de la playlist.
///
/// La identidad es `location` (path local, URL o query), inmutable una vez
/// creada. `name` y `length` son metadatos resueltos de forma perezosa:
/// la duración se sondea recién en la primera reproducción y puede quedarse
/// en cero si el sondeo falla.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Track {
    location: String,
    name: String,
    #[serde(with = "length_secs")]
    length: Duration,
    /// Índice del resolver que aceptó esta ubicación, cacheado para no
    /// recorrer el registro en cada arranque. No se persiste: tras una
    /// deserialización se redescubre en el siguiente `stream_url`.
    #[serde(skip)]
    resolver: Option<usize>,
}

impl Track {
    /// Crea una pista a partir de una ubicación.
    ///
    /// Primero se comprueba el filesystem local (el nombre es el nombre de
    /// archivo); si no, se consulta el registro de resolvers (el nombre lo
    /// aporta la fuente). La duración no se sondea acá.
    pub async fn parse(location: &str, registry: &ResolverRegistry) -> Result<Track> {
        if location.is_empty() {
            return Err(AudioError::UnresolvableSource {
                location: location.to_string(),
            });
        }

        if Path::new(location).is_file() {
            let name = Path::new(location)
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_else(|| location.to_string());

            return Ok(Track {
                location: location.to_string(),
                name,
                length: Duration::ZERO,
                resolver: None,
            });
        }

        let Some(index) = registry.find(location) else {
            return Err(AudioError::UnresolvableSource {
                location: location.to_string(),
            });
        };

        let resolver = registry.get(index).expect("índice recién devuelto por find");
        let name = match resolver.track_name(location).await {
            Ok(name) => name,
            Err(e) => {
                // El título es cosmético; la ubicación sirve de nombre
                // mientras tanto.
                warn!("⚠️ Sin título para `{}`: {}", location, e);
                location.to_string()
            }
        };

        Ok(Track {
            location: location.to_string(),
            name,
            length: Duration::ZERO,
            resolver: Some(index),
        })
    }

    /// Reconstruye una pista persistida (nombre y duración cacheados).
    pub fn restored(location: impl Into<String>, name: impl Into<String>, length: Duration) -> Track {
        Track {
            location: location.into(),
            name: name.into(),
            length,
            resolver: None,
        }
    }

    /// Recalcula la URL de stream para esta pista.
    ///
    /// Se llama en cada (re)arranque de reproducción: las referencias son
    /// efímeras y no se reutilizan entre intentos. Los archivos locales se
    /// devuelven tal cual.
    pub async fn stream_url(&mut self, registry: &ResolverRegistry) -> Result<String> {
        if tokio::fs::metadata(&self.location).await.is_ok() {
            return Ok(self.location.clone());
        }

        // Cache del resolver, redescubierto si quedó obsoleto
        if let Some(index) = self.resolver {
            if let Some(resolver) = registry.get(index) {
                if resolver.can_resolve(&self.location) {
                    return resolver.resolve_stream_url(&self.location).await;
                }
            }
            self.resolver = None;
        }

        let Some(index) = registry.find(&self.location) else {
            return Err(AudioError::UnresolvableSource {
                location: self.location.clone(),
            });
        };

        self.resolver = Some(index);
        registry
            .get(index)
            .expect("índice recién devuelto por find")
            .resolve_stream_url(&self.location)
            .await
    }

    pub fn location(&self) -> &str {
        &self.location
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn length(&self) -> Duration {
        self.length
    }

    pub(crate) fn set_length(&mut self, length: Duration) {
        self.length = length;
    }

    pub(crate) fn resolver_index(&self) -> Option<usize> {
        self.resolver
    }

    pub(crate) fn set_resolver_index(&mut self, index: Option<usize>) {
        self.resolver = index;
    }

    /// Etiqueta para mensajes al usuario: `` `nombre` [3m] ``.
    pub fn display_label(&self) -> String {
        format!("`{}` [{}]", self.name, format_length(self.length))
    }
}

/// La duración se persiste como segundos enteros.
mod length_secs {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(length: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u64(length.as_secs())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        let secs = u64::deserialize(deserializer)?;
        Ok(Duration::from_secs(secs))
    }
}
