use dashmap::DashMap;
use serenity::model::id::GuildId;
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::config::AudioConfig;
use crate::decoder::DecoderFactory;
use crate::session::AudioSession;
use crate::sources::ResolverRegistry;
use crate::transport::{Announcer, GuildHost, VoiceTransport};

/// Registro de sesiones, una por guild.
///
/// Las sesiones se crean de forma perezosa en el primer comando que las toca
/// y comparten el registro de resolvers y la fábrica de decodificadores. El
/// mapa es concurrente: los comandos de guilds distintos no se bloquean
/// entre sí.
pub struct SessionManager {
    sessions: DashMap<GuildId, Arc<AudioSession>>,
    config: AudioConfig,
    resolvers: Arc<ResolverRegistry>,
    decoders: Arc<dyn DecoderFactory>,
}

impl SessionManager {
    pub fn new(config: AudioConfig, decoders: Arc<dyn DecoderFactory>) -> Self {
        let resolvers = Arc::new(ResolverRegistry::with_defaults(&config));
        Self::with_resolvers(config, resolvers, decoders)
    }

    pub fn with_resolvers(
        config: AudioConfig,
        resolvers: Arc<ResolverRegistry>,
        decoders: Arc<dyn DecoderFactory>,
    ) -> Self {
        Self {
            sessions: DashMap::new(),
            config,
            resolvers,
            decoders,
        }
    }

    /// La sesión del guild, creándola si es la primera vez que se lo ve.
    pub fn get_or_create(&self, guild: GuildId) -> Arc<AudioSession> {
        self.sessions
            .entry(guild)
            .or_insert_with(|| {
                debug!("🆕 Sesión creada para el guild {}", guild);
                Arc::new(AudioSession::new(
                    guild,
                    self.config.clone(),
                    Arc::clone(&self.resolvers),
                    Arc::clone(&self.decoders),
                ))
            })
            .clone()
    }

    /// La sesión del guild si ya existe; los comandos de consulta no crean
    /// sesiones.
    pub fn get(&self, guild: GuildId) -> Option<Arc<AudioSession>> {
        self.sessions.get(&guild).map(|s| s.clone())
    }

    /// Da de baja la sesión del guild, deteniendo cualquier reproducción en
    /// curso.
    pub fn remove(&self, guild: GuildId) -> Option<Arc<AudioSession>> {
        let removed = self.sessions.remove(&guild).map(|(_, s)| s);

        if let Some(session) = &removed {
            session.force_stop();
            info!("🗑️ Sesión del guild {} eliminada", guild);
        }

        removed
    }

    /// Revalida una sesión contra el host tras una recarga: si el guild ya
    /// no existe, la sesión se descarta.
    pub async fn reattach(&self, guild: GuildId, host: &dyn GuildHost) -> bool {
        if host.guild_exists(guild).await {
            return true;
        }

        warn!("⚠️ El guild {} ya no existe; sesión descartada", guild);
        self.remove(guild);
        false
    }

    /// Arranca la reproducción de la playlist del guild en una tarea propia.
    ///
    /// El handler del comando no espera al bucle: la tarea vive hasta que la
    /// sesión vuelve a quedar inactiva.
    pub fn spawn_playback(
        &self,
        guild: GuildId,
        host: Arc<dyn GuildHost>,
        transport: Arc<dyn VoiceTransport>,
        feedback: Arc<dyn Announcer>,
    ) -> tokio::task::JoinHandle<()> {
        let session = self.get_or_create(guild);

        tokio::spawn(async move {
            if let Err(e) = session
                .start_playlist(host.as_ref(), transport.as_ref(), feedback.as_ref())
                .await
            {
                warn!("⚠️ La sesión {} no pudo arrancar: {}", guild, e);
            }
        })
    }

    /// Todas las sesiones vivas, para persistencia y diagnóstico.
    pub fn sessions(&self) -> Vec<Arc<AudioSession>> {
        self.sessions.iter().map(|e| e.value().clone()).collect()
    }

    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }
}
