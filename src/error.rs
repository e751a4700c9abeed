use thiserror::Error;

/// Errores del motor de audio.
///
/// Ninguno de estos errores es fatal para el proceso: se reportan al canal
/// de texto que originó el comando o se registran y absorben, de forma que
/// una sesión con problemas nunca afecta al resto de guilds.
#[derive(Debug, Error)]
pub enum AudioError {
    #[error("ninguna fuente pudo resolver `{location}`")]
    UnresolvableSource { location: String },

    #[error("no se pudo resolver el stream de `{location}`: {reason}")]
    Resolution { location: String, reason: String },

    #[error("canal de reproducción no disponible: {0}")]
    ChannelUnavailable(ChannelIssue),

    #[error("el decodificador externo no pudo iniciarse: {0}")]
    DecoderStart(String),

    #[error("no se pudo sondear la duración: {0}")]
    DurationProbe(String),

    #[error("cursor de playlist fuera de rango (índice {index}, {len} pistas)")]
    StaleIndex { index: usize, len: usize },

    #[error("la playlist está llena (máximo {max} pistas)")]
    PlaylistFull { max: usize },

    #[error("índice {index} fuera de rango ({len} pistas)")]
    IndexOutOfRange { index: usize, len: usize },

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

/// Motivo concreto por el que el canal de reproducción no sirve.
///
/// Se reporta el sub-motivo exacto en lugar de un genérico "no se pudo",
/// porque cada uno tiene una solución distinta para el usuario.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChannelIssue {
    /// Nadie configuró un canal de reproducción para la sesión.
    NotConfigured,
    /// El canal configurado ya no existe en el guild.
    Gone,
    /// El canal configurado no es un canal de voz.
    NotVoice,
    /// El bot no tiene permiso para conectarse al canal.
    MissingJoin,
    /// El bot no tiene permiso para hablar en el canal.
    MissingSpeak,
    /// El transporte de voz rechazó la conexión.
    JoinFailed(String),
}

impl std::fmt::Display for ChannelIssue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ChannelIssue::NotConfigured => write!(f, "no hay canal de reproducción configurado"),
            ChannelIssue::Gone => write!(f, "el canal configurado ya no existe"),
            ChannelIssue::NotVoice => write!(f, "el canal configurado no es de voz"),
            ChannelIssue::MissingJoin => write!(f, "falta permiso para unirse al canal"),
            ChannelIssue::MissingSpeak => write!(f, "falta permiso para hablar en el canal"),
            ChannelIssue::JoinFailed(reason) => write!(f, "fallo al unirse al canal: {}", reason),
        }
    }
}

pub type Result<T> = std::result::Result<T, AudioError>;
