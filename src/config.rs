use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Cadencia del transporte de voz de Discord: 48kHz, frames de 20ms.
pub const DEFAULT_SAMPLE_RATE: u32 = 48_000;
pub const DEFAULT_FRAME_SAMPLES: usize = 960;

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct AudioConfig {
    // Herramientas externas
    pub ffmpeg_path: String,
    pub ffprobe_path: String,
    pub ytdlp_path: String,
    pub streamlink_path: String,

    // Formato de salida del decodificador (s16le crudo)
    pub sample_rate: u32,
    pub channels: u8,
    pub frame_samples: usize,

    // Comportamiento de la sesión
    pub pause_poll_ms: u64,
    pub max_playlist_size: usize,

    // Paths
    pub data_dir: PathBuf,
}

impl AudioConfig {
    pub fn load() -> Result<Self> {
        dotenvy::dotenv().ok();

        let config = Self {
            // Herramientas externas
            ffmpeg_path: std::env::var("FFMPEG_PATH").unwrap_or_else(|_| "ffmpeg".to_string()),
            ffprobe_path: std::env::var("FFPROBE_PATH").unwrap_or_else(|_| "ffprobe".to_string()),
            ytdlp_path: std::env::var("YTDLP_PATH").unwrap_or_else(|_| "yt-dlp".to_string()),
            streamlink_path: std::env::var("STREAMLINK_PATH")
                .unwrap_or_else(|_| "streamlink".to_string()),

            // Audio (valores que espera el transporte de voz)
            sample_rate: std::env::var("SAMPLE_RATE")
                .unwrap_or_else(|_| DEFAULT_SAMPLE_RATE.to_string())
                .parse()?,
            channels: std::env::var("AUDIO_CHANNELS")
                .unwrap_or_else(|_| "2".to_string())
                .parse()?,
            frame_samples: std::env::var("FRAME_SAMPLES")
                .unwrap_or_else(|_| DEFAULT_FRAME_SAMPLES.to_string()) // 20ms @ 48kHz
                .parse()?,

            // Sesión
            pause_poll_ms: std::env::var("PAUSE_POLL_MS")
                .unwrap_or_else(|_| "100".to_string())
                .parse()?,
            max_playlist_size: std::env::var("MAX_PLAYLIST_SIZE")
                .unwrap_or_else(|_| "100".to_string())
                .parse()?,

            // Paths
            data_dir: std::env::var("DATA_DIR")
                .unwrap_or_else(|_| "./data".to_string())
                .into(),
        };

        std::fs::create_dir_all(&config.data_dir)?;
        config.validate()?;

        Ok(config)
    }

    /// Tamaño en bytes de un frame crudo: muestras × canales × 2 (s16le).
    pub fn frame_bytes(&self) -> usize {
        self.frame_samples * self.channels as usize * 2
    }

    /// Valida los valores de configuración antes de usarlos.
    pub fn validate(&self) -> Result<()> {
        if self.sample_rate == 0 {
            anyhow::bail!("La frecuencia de muestreo no puede ser 0");
        }

        if self.channels == 0 || self.channels > 2 {
            anyhow::bail!("Canales de audio debe ser 1 o 2, recibido: {}", self.channels);
        }

        if self.frame_samples == 0 {
            anyhow::bail!("El tamaño de frame no puede ser 0");
        }

        // Un sondeo de pausa demasiado agresivo quema CPU sin mejorar la latencia.
        if self.pause_poll_ms < 10 {
            anyhow::bail!("PAUSE_POLL_MS mínimo es 10ms, recibido: {}", self.pause_poll_ms);
        }

        if self.max_playlist_size == 0 {
            anyhow::bail!("El tamaño máximo de playlist no puede ser 0");
        }

        Ok(())
    }

    /// Resumen de la configuración para logging (sin datos sensibles).
    pub fn summary(&self) -> String {
        format!(
            "Config: {}Hz x{} canales, frames de {} muestras ({} bytes), \
             pausa cada {}ms, playlist máx {}, datos en {}",
            self.sample_rate,
            self.channels,
            self.frame_samples,
            self.frame_bytes(),
            self.pause_poll_ms,
            self.max_playlist_size,
            self.data_dir.display()
        )
    }
}

impl Default for AudioConfig {
    fn default() -> Self {
        Self {
            ffmpeg_path: "ffmpeg".to_string(),
            ffprobe_path: "ffprobe".to_string(),
            ytdlp_path: "yt-dlp".to_string(),
            streamlink_path: "streamlink".to_string(),
            sample_rate: DEFAULT_SAMPLE_RATE,
            channels: 2,
            frame_samples: DEFAULT_FRAME_SAMPLES,
            pause_poll_ms: 100,
            max_playlist_size: 100,
            data_dir: "./data".into(),
        }
    }
}
