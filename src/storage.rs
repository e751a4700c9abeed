use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serenity::model::id::{ChannelId, GuildId};
use std::path::{Path, PathBuf};
use tokio::fs;
use tracing::info;

use crate::manager::SessionManager;
use crate::track::Track;
use crate::transport::GuildHost;

/// Estado persistido de una sesión.
///
/// Se guardan ubicaciones y metadatos, nunca URLs de stream: esas son
/// efímeras y se recalculan al reproducir.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SavedSession {
    pub guild_id: u64,
    pub channel_id: Option<u64>,
    pub index: usize,
    pub tracks: Vec<Track>,
}

/// Archivo completo de estado, con marca de tiempo del guardado.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SavedState {
    pub saved_at: DateTime<Utc>,
    pub sessions: Vec<SavedSession>,
}

/// Persistencia de sesiones en JSON.
///
/// Un único archivo `sessions.json` bajo el directorio de datos; el guardado
/// escribe primero a un archivo temporal y renombra, así un corte a mitad de
/// escritura no corrompe el estado anterior.
pub struct SessionStore {
    path: PathBuf,
}

impl SessionStore {
    pub fn new(data_dir: impl AsRef<Path>) -> Self {
        Self {
            path: data_dir.as_ref().join("sessions.json"),
        }
    }

    /// Guarda las playlists y canales de todas las sesiones vivas.
    pub async fn save(&self, manager: &SessionManager) -> Result<()> {
        let sessions: Vec<SavedSession> = manager
            .sessions()
            .into_iter()
            .map(|session| {
                let snapshot = session.snapshot();
                SavedSession {
                    guild_id: session.guild_id().get(),
                    channel_id: session.playback_channel().map(|c| c.get()),
                    index: snapshot.index,
                    tracks: snapshot.tracks,
                }
            })
            .collect();

        let state = SavedState {
            saved_at: Utc::now(),
            sessions,
        };

        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent).await?;
        }

        let json = serde_json::to_string_pretty(&state)?;
        let tmp = self.path.with_extension("json.tmp");
        fs::write(&tmp, &json).await?;
        fs::rename(&tmp, &self.path)
            .await
            .context("no se pudo renombrar el archivo de sesiones")?;

        info!(
            "💾 {} sesiones guardadas en {}",
            state.sessions.len(),
            self.path.display()
        );
        Ok(())
    }

    /// Lee el estado persistido; `None` si todavía no se guardó nada.
    pub async fn load(&self) -> Result<Option<SavedState>> {
        let raw = match fs::read_to_string(&self.path).await {
            Ok(raw) => raw,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };

        let state: SavedState =
            serde_json::from_str(&raw).context("archivo de sesiones corrupto")?;
        Ok(Some(state))
    }

    /// Reconstruye las sesiones persistidas en el manager.
    ///
    /// Los guilds que desaparecieron mientras el proceso estaba caído se
    /// descartan con un aviso; devuelve cuántas sesiones se restauraron.
    pub async fn restore(
        &self,
        manager: &SessionManager,
        host: &dyn GuildHost,
    ) -> Result<usize> {
        let Some(state) = self.load().await? else {
            info!("📂 Sin estado de sesiones que restaurar");
            return Ok(0);
        };

        let mut restored = 0;

        for saved in state.sessions {
            let guild = GuildId::new(saved.guild_id);

            if !manager.reattach(guild, host).await {
                continue;
            }

            let session = manager.get_or_create(guild);
            session.restore_state(
                saved.tracks,
                saved.index,
                saved.channel_id.map(ChannelId::new),
            );
            restored += 1;
        }

        info!(
            "📂 {} sesiones restauradas (guardadas el {})",
            restored,
            state.saved_at.format("%Y-%m-%d %H:%M:%S UTC")
        );
        Ok(restored)
    }
}
