use async_trait::async_trait;
use std::process::Stdio;
use std::time::Duration;
use tokio::io::AsyncReadExt;
use tokio::process::{Child, ChildStdout, Command};
use tracing::{debug, error, info, warn};

use crate::config::AudioConfig;
use crate::error::{AudioError, Result};

/// Secuencia de frames crudos de una invocación de decodificación.
///
/// El dueño del decoder es exclusivamente la iteración del bucle por-pista
/// que lo abrió; nadie más lee su salida. Al soltarlo se libera el proceso
/// externo, pase lo que pase con la pista.
#[async_trait]
pub trait Decoder: Send {
    /// Lee exactamente un frame en `buf`.
    ///
    /// Devuelve `false` cuando el stream se agotó (fin natural de la pista);
    /// una lectura corta cuenta como agotamiento, no como error.
    async fn next_frame(&mut self, buf: &mut [u8]) -> Result<bool>;
}

/// Fábrica de decodificadores: la costura entre la sesión y el proceso
/// externo, y el punto donde los tests enchufan un decoder determinista.
#[async_trait]
pub trait DecoderFactory: Send + Sync {
    /// Arranca una decodificación desde cero o desde un offset de seek.
    async fn open(&self, stream_url: &str, seek: Option<Duration>) -> Result<Box<dyn Decoder>>;

    /// Sondea la duración de la pista. Best-effort: `None` si no se pudo,
    /// nunca es un error duro.
    async fn probe_duration(&self, stream_url: &str) -> Option<Duration>;
}

/// Fábrica de producción: ffmpeg para decodificar, ffprobe para duraciones.
pub struct FfmpegDecoderFactory {
    config: AudioConfig,
}

impl FfmpegDecoderFactory {
    pub fn new(config: AudioConfig) -> Self {
        Self { config }
    }

    /// Ejecuta ffprobe y devuelve su stdout crudo.
    async fn run_probe(&self, stream_url: &str) -> Result<String> {
        let output = Command::new(&self.config.ffprobe_path)
            .args([
                "-v",
                "error",
                "-show_entries",
                "format=duration",
                "-of",
                "default=noprint_wrappers=1:nokey=1",
            ])
            .arg(stream_url)
            .output()
            .await
            .map_err(|e| {
                AudioError::DurationProbe(format!("no se pudo ejecutar ffprobe: {}", e))
            })?;

        if !output.status.success() {
            return Err(AudioError::DurationProbe(format!(
                "ffprobe falló para `{}`: {}",
                stream_url,
                String::from_utf8_lossy(&output.stderr).trim()
            )));
        }

        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }

    /// Comprueba que las herramientas externas existen y responden.
    pub async fn verify_dependencies(&self) -> anyhow::Result<()> {
        for (tool, arg) in [
            (self.config.ffmpeg_path.as_str(), "-version"),
            (self.config.ffprobe_path.as_str(), "-version"),
        ] {
            let output = Command::new(tool).arg(arg).output().await;
            match output {
                Ok(out) if out.status.success() => {
                    info!("✅ {} disponible", tool);
                }
                _ => {
                    error!("❌ {} no encontrado o no ejecutable", tool);
                    anyhow::bail!("{} no disponible", tool);
                }
            }
        }

        Ok(())
    }
}

#[async_trait]
impl DecoderFactory for FfmpegDecoderFactory {
    async fn open(&self, stream_url: &str, seek: Option<Duration>) -> Result<Box<dyn Decoder>> {
        let mut cmd = Command::new(&self.config.ffmpeg_path);
        cmd.args(["-hide_banner", "-loglevel", "error"]);

        // -ss antes de -i: seek por demuxer, mucho más rápido que decodificar
        // hasta el offset
        if let Some(offset) = seek {
            cmd.args(["-ss", &offset.as_secs().to_string()]);
        }

        cmd.args(["-i", stream_url, "-vn", "-f", "s16le"])
            .args(["-ar", &self.config.sample_rate.to_string()])
            .args(["-ac", &self.config.channels.to_string()])
            .arg("pipe:1")
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::null())
            .kill_on_drop(true);

        let mut child = cmd
            .spawn()
            .map_err(|e| AudioError::DecoderStart(format!("no se pudo lanzar ffmpeg: {}", e)))?;

        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| AudioError::DecoderStart("ffmpeg sin stdout".to_string()))?;

        debug!(
            "🎛️ ffmpeg arrancado (seek: {:?}) para `{}`",
            seek, stream_url
        );

        Ok(Box::new(FfmpegDecoder { child, stdout }))
    }

    async fn probe_duration(&self, stream_url: &str) -> Option<Duration> {
        match self.run_probe(stream_url).await {
            Ok(raw) => parse_probe_seconds(&raw),
            Err(e) => {
                warn!("⚠️ {}", e);
                None
            }
        }
    }
}

/// Un proceso ffmpeg decodificando una pista a PCM s16le por stdout.
struct FfmpegDecoder {
    child: Child,
    stdout: ChildStdout,
}

#[async_trait]
impl Decoder for FfmpegDecoder {
    async fn next_frame(&mut self, buf: &mut [u8]) -> Result<bool> {
        match self.stdout.read_exact(buf).await {
            Ok(_) => Ok(true),
            // Lectura corta o vacía: el stream se agotó
            Err(e) if e.kind() == std::io::ErrorKind::UnexpectedEof => Ok(false),
            Err(e) => Err(e.into()),
        }
    }
}

impl Drop for FfmpegDecoder {
    fn drop(&mut self) {
        // kill_on_drop ya cubre al proceso, pero pedimos la señal sin esperar
        // para no dejar ffmpeg escribiendo en un pipe muerto
        let _ = self.child.start_kill();
    }
}

/// Parsea la salida del sondeo de duración.
///
/// ffprobe imprime un único valor en segundos con decimales, o `N/A`. Se
/// trunca en el punto decimal; cualquier cosa no numérica es "desconocido",
/// no un error.
pub(crate) fn parse_probe_seconds(raw: &str) -> Option<Duration> {
    let line = raw.lines().map(str::trim).find(|l| !l.is_empty())?;

    if line == "N/A" {
        return None;
    }

    let whole = match line.split_once('.') {
        Some((whole, _frac)) => whole,
        None => line,
    };

    match whole.parse::<u64>() {
        Ok(secs) => Some(Duration::from_secs(secs)),
        Err(_) => {
            warn!("⚠️ Salida de ffprobe no numérica: `{}`", line);
            None
        }
    }
}
