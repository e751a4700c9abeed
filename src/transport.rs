use async_trait::async_trait;
use serenity::model::id::{ChannelId, GuildId};

/// Lo que la sesión necesita saber de un canal antes de reproducir en él.
#[derive(Debug, Clone)]
pub struct ChannelProfile {
    pub name: String,
    pub is_voice: bool,
    /// El bot puede conectarse al canal.
    pub can_join: bool,
    /// El bot puede hablar en el canal.
    pub can_speak: bool,
}

/// Directorio de guilds y canales del host.
///
/// El motor no habla con el gateway de Discord: el host (el bot que incrusta
/// este crate) responde estas consultas desde su caché.
#[async_trait]
pub trait GuildHost: Send + Sync {
    /// Si el guild sigue existiendo. Usado por `reattach` tras una recarga.
    async fn guild_exists(&self, guild: GuildId) -> bool;

    /// Metadatos del canal, o `None` si desapareció.
    async fn channel_profile(&self, guild: GuildId, channel: ChannelId) -> Option<ChannelProfile>;
}

/// Transporte de voz en tiempo real.
///
/// El formato de frame es PCM s16le crudo del tamaño fijado por la
/// configuración; el formato de alambre y el ritmo de entrega son asunto
/// del transporte, no del motor.
#[async_trait]
pub trait VoiceTransport: Send + Sync {
    /// Se une al canal de voz y devuelve el sink de frames de la conexión.
    async fn join(
        &self,
        guild: GuildId,
        channel: ChannelId,
    ) -> anyhow::Result<Box<dyn VoiceSink>>;
}

/// Una conexión de voz viva que acepta frames.
#[async_trait]
pub trait VoiceSink: Send {
    /// Entrega un frame. Este await es el punto de backpressure: el
    /// transporte decide cuándo aceptar el siguiente.
    async fn send_frame(&mut self, frame: &[u8]) -> anyhow::Result<()>;

    /// Espera a que se drene lo encolado antes de desconectar.
    async fn flush(&mut self) -> anyhow::Result<()>;

    /// Abandona el canal de voz.
    async fn disconnect(&mut self) -> anyhow::Result<()>;
}

/// Destino de feedback textual de una sesión (el canal de chat desde el que
/// se comanda la reproducción).
#[async_trait]
pub trait Announcer: Send + Sync {
    async fn say(&self, text: &str);
}

/// Announcer que descarta todo; útil cuando no hay canal de chat asociado
/// (por ejemplo durante una restauración al arrancar).
pub struct SilentAnnouncer;

#[async_trait]
impl Announcer for SilentAnnouncer {
    async fn say(&self, _text: &str) {}
}
