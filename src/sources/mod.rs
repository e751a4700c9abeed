pub mod direct_url;
pub mod livestream;
pub mod soundcloud;
pub mod youtube;

use async_trait::async_trait;
use tracing::debug;

use crate::config::AudioConfig;
use crate::error::Result;

pub use direct_url::DirectUrlResolver;
pub use livestream::LivestreamResolver;
pub use soundcloud::SoundcloudResolver;
pub use youtube::YoutubeResolver;

/// Capacidad de mapear una ubicación opaca (URL, query) a un stream reproducible.
///
/// Las URLs de stream que devuelven los resolvers son efímeras (firmadas,
/// con expiración), así que se recalculan en cada arranque de reproducción
/// y nunca se persisten.
#[async_trait]
pub trait StreamResolver: Send + Sync {
    /// Indica si este resolver sabe manejar la ubicación dada.
    ///
    /// Debe ser barato (inspección de la URL, sin red ni procesos).
    fn can_resolve(&self, location: &str) -> bool;

    /// Resuelve la URL de stream reproducible para la ubicación.
    async fn resolve_stream_url(&self, location: &str) -> Result<String>;

    /// Obtiene el título legible de la pista.
    async fn track_name(&self, location: &str) -> Result<String>;

    /// Nombre de la fuente (para logs).
    fn source_name(&self) -> &'static str;
}

/// Conjunto ordenado de resolvers.
///
/// Se prueban en orden de declaración y gana el primero que reporta
/// `can_resolve`. El índice del ganador se cachea en la pista para no volver
/// a recorrer la lista (y se redescubre tras una deserialización).
pub struct ResolverRegistry {
    resolvers: Vec<Box<dyn StreamResolver>>,
}

impl ResolverRegistry {
    /// Registro con las fuentes de serie: YouTube, SoundCloud, livestreams
    /// y URLs directas de audio, en ese orden de prioridad.
    pub fn with_defaults(config: &AudioConfig) -> Self {
        Self::new(vec![
            Box::new(YoutubeResolver::new(&config.ytdlp_path)),
            Box::new(SoundcloudResolver::new(&config.ytdlp_path)),
            Box::new(LivestreamResolver::new(&config.streamlink_path)),
            Box::new(DirectUrlResolver::new()),
        ])
    }

    pub fn new(resolvers: Vec<Box<dyn StreamResolver>>) -> Self {
        Self { resolvers }
    }

    /// Busca el primer resolver capaz de manejar la ubicación.
    pub fn find(&self, location: &str) -> Option<usize> {
        let index = self.resolvers.iter().position(|r| r.can_resolve(location));

        if let Some(i) = index {
            debug!(
                "🔎 `{}` resuelto por la fuente {}",
                location,
                self.resolvers[i].source_name()
            );
        }

        index
    }

    pub fn get(&self, index: usize) -> Option<&dyn StreamResolver> {
        self.resolvers.get(index).map(|r| r.as_ref())
    }

    pub fn len(&self) -> usize {
        self.resolvers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.resolvers.is_empty()
    }
}
