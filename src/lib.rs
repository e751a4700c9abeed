//! 🎵 Motor de reproducción de audio en tiempo real para bots de Discord.
//!
//! Mantiene una playlist por guild, decodifica las pistas con un proceso
//! ffmpeg externo a PCM crudo y empuja los frames a un transporte de voz
//! provisto por el host. El control (pausa, saltos, stop) es cooperativo:
//! los comandos encienden señales que el bucle de streaming consume entre
//! frame y frame.
//!
//! El crate no habla con el gateway de Discord: el bot que lo incrusta
//! implementa [`transport::GuildHost`], [`transport::VoiceTransport`] y
//! [`transport::Announcer`], y comanda las sesiones a través del
//! [`manager::SessionManager`].

pub mod config;
pub mod decoder;
pub mod error;
pub mod logging;
pub mod manager;
pub mod playlist;
pub mod session;
pub mod sources;
pub mod storage;
pub mod track;
pub mod transport;
pub mod util;

pub use config::AudioConfig;
pub use decoder::{Decoder, DecoderFactory, FfmpegDecoderFactory};
pub use error::{AudioError, ChannelIssue, Result};
pub use manager::SessionManager;
pub use session::{AudioSession, PlaylistSnapshot, SkipTarget};
pub use sources::{ResolverRegistry, StreamResolver};
pub use storage::SessionStore;
pub use track::Track;
pub use transport::{
    Announcer, ChannelProfile, GuildHost, SilentAnnouncer, VoiceSink, VoiceTransport,
};
