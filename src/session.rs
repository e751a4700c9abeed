use parking_lot::{Mutex, RwLock};
use serenity::model::id::{ChannelId, GuildId};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::config::AudioConfig;
use crate::decoder::DecoderFactory;
use crate::error::{AudioError, ChannelIssue, Result};
use crate::playlist::Playlist;
use crate::sources::ResolverRegistry;
use crate::track::Track;
use crate::transport::{Announcer, GuildHost, VoiceSink, VoiceTransport};

/// Destino de un salto pedido por comando.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipTarget {
    /// Reinicia la decodificación de la pista actual desde este offset.
    Time(Duration),
    /// Salta a esta posición de la playlist.
    Index(usize),
}

/// Señales cooperativas entre los handlers de comandos y el bucle de
/// streaming.
///
/// Los handlers solo las encienden; el bucle las consume (y apaga) una vez
/// por iteración, así que la latencia máxima de un comando es la lectura de
/// un frame. Atómicos en lugar de booleanos sueltos: mismo comportamiento
/// observable, pero con un happens-before definido entre tareas.
#[derive(Default)]
struct ControlFlags {
    stop_track: AtomicBool,
    stop_playlist: AtomicBool,
    pause: AtomicBool,
    prev: AtomicBool,
    skip: Mutex<Option<SkipTarget>>,
}

impl ControlFlags {
    fn reset(&self) {
        self.stop_track.store(false, Ordering::SeqCst);
        self.stop_playlist.store(false, Ordering::SeqCst);
        self.pause.store(false, Ordering::SeqCst);
        self.prev.store(false, Ordering::SeqCst);
        *self.skip.lock() = None;
    }

    fn take_stop_track(&self) -> bool {
        self.stop_track.swap(false, Ordering::SeqCst)
    }

    fn take_stop_playlist(&self) -> bool {
        self.stop_playlist.swap(false, Ordering::SeqCst)
    }

    fn take_prev(&self) -> bool {
        self.prev.swap(false, Ordering::SeqCst)
    }

    /// Consume un seek pendiente; un salto de índice no se toca acá.
    fn take_seek(&self) -> Option<Duration> {
        let mut skip = self.skip.lock();
        match *skip {
            Some(SkipTarget::Time(offset)) => {
                *skip = None;
                Some(offset)
            }
            _ => None,
        }
    }

    fn pending_skip(&self) -> Option<SkipTarget> {
        *self.skip.lock()
    }

    fn clear_skip(&self) {
        *self.skip.lock() = None;
    }

    fn request_skip(&self, target: SkipTarget) {
        *self.skip.lock() = Some(target);
    }
}

/// Cómo terminó la reproducción de una pista.
enum TrackEnd {
    /// Fin natural, flag de stop, o fallo tratado como fin.
    Completed,
    /// `force_stop`: abandonar todo sin drenar.
    Cancelled,
}

/// Instantánea de la playlist para el comando `list` y la persistencia.
#[derive(Debug, Clone)]
pub struct PlaylistSnapshot {
    pub tracks: Vec<Track>,
    pub index: usize,
    pub is_playing: bool,
}

/// Sesión de reproducción de un guild.
///
/// Es dueña de la playlist, del conjunto de flags de control y del canal de
/// voz configurado. Como mucho un bucle de frames corre por sesión a la vez
/// (lo garantiza el compare-exchange de `is_playing`, sin lock); las
/// sesiones de guilds distintos no comparten estado mutable.
pub struct AudioSession {
    guild_id: GuildId,
    playlist: RwLock<Playlist>,
    flags: ControlFlags,
    is_playing: AtomicBool,
    playback_channel: Mutex<Option<ChannelId>>,
    cancel: Mutex<Option<CancellationToken>>,
    resolvers: Arc<ResolverRegistry>,
    decoders: Arc<dyn DecoderFactory>,
    config: AudioConfig,
}

/// Apaga `is_playing` en todos los caminos de salida del bucle.
struct PlayingGuard<'a>(&'a AtomicBool);

impl Drop for PlayingGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::SeqCst);
    }
}

impl AudioSession {
    pub fn new(
        guild_id: GuildId,
        config: AudioConfig,
        resolvers: Arc<ResolverRegistry>,
        decoders: Arc<dyn DecoderFactory>,
    ) -> Self {
        Self {
            guild_id,
            playlist: RwLock::new(Playlist::new()),
            flags: ControlFlags::default(),
            is_playing: AtomicBool::new(false),
            playback_channel: Mutex::new(None),
            cancel: Mutex::new(None),
            resolvers,
            decoders,
            config,
        }
    }

    pub fn guild_id(&self) -> GuildId {
        self.guild_id
    }

    /// `true` exactamente mientras el bucle de frames de esta sesión corre.
    pub fn is_playing(&self) -> bool {
        self.is_playing.load(Ordering::SeqCst)
    }

    pub fn set_playback_channel(&self, channel: ChannelId) {
        *self.playback_channel.lock() = Some(channel);
    }

    pub fn playback_channel(&self) -> Option<ChannelId> {
        *self.playback_channel.lock()
    }

    // ------------------------------------------------------------------
    // Bucle de reproducción
    // ------------------------------------------------------------------

    /// Arranca la reproducción de la playlist y no retorna hasta que la
    /// sesión vuelve a quedar inactiva.
    ///
    /// Precondiciones, en orden: playlist no vacía, canal configurado, el
    /// canal existe y es de voz, el bot puede unirse y hablar. Cada fallo se
    /// reporta con su motivo concreto y la sesión queda como estaba. Si ya
    /// hay un bucle corriendo la llamada es un no-op silencioso.
    pub async fn start_playlist(
        &self,
        host: &dyn GuildHost,
        transport: &dyn VoiceTransport,
        feedback: &dyn Announcer,
    ) -> Result<()> {
        if self
            .is_playing
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            return Ok(());
        }
        let _guard = PlayingGuard(&self.is_playing);

        // Nada legítimo puede quedar pendiente de un bucle anterior
        self.flags.reset();

        if self.playlist.read().is_empty() {
            feedback.say("No hay pistas en la playlist.").await;
            return Ok(());
        }

        // copia el valor antes del match: el guard no debe cruzar un await
        let configured = *self.playback_channel.lock();
        let channel = match configured {
            Some(channel) => channel,
            None => {
                return self
                    .report_channel_issue(feedback, ChannelIssue::NotConfigured)
                    .await
            }
        };

        let profile = match host.channel_profile(self.guild_id, channel).await {
            Some(profile) => profile,
            None => return self.report_channel_issue(feedback, ChannelIssue::Gone).await,
        };

        if !profile.is_voice {
            return self.report_channel_issue(feedback, ChannelIssue::NotVoice).await;
        }
        if !profile.can_join {
            return self
                .report_channel_issue(feedback, ChannelIssue::MissingJoin)
                .await;
        }
        if !profile.can_speak {
            return self
                .report_channel_issue(feedback, ChannelIssue::MissingSpeak)
                .await;
        }

        let mut sink = match transport.join(self.guild_id, channel).await {
            Ok(sink) => sink,
            Err(e) => {
                return self
                    .report_channel_issue(feedback, ChannelIssue::JoinFailed(e.to_string()))
                    .await
            }
        };

        info!(
            "🔊 Sesión {} conectada al canal de voz `{}`",
            self.guild_id, profile.name
        );

        let cancel = CancellationToken::new();
        *self.cancel.lock() = Some(cancel.clone());

        let mut forced = false;

        loop {
            if self.flags.take_stop_playlist() {
                break;
            }

            if self.playlist.read().is_empty() {
                feedback.say("No hay pistas en la playlist.").await;
                break;
            }

            match self.play_current_track(sink.as_mut(), feedback, &cancel).await {
                TrackEnd::Completed => {}
                TrackEnd::Cancelled => {
                    forced = true;
                    break;
                }
            }

            // Exactamente un ajuste de cursor por vuelta: prev gana, un
            // salto de índice pendiente reemplaza el avance normal y un
            // seek pendiente deja el cursor donde está.
            if self.flags.take_prev() {
                self.playlist.write().retreat();
            } else {
                match self.flags.pending_skip() {
                    Some(SkipTarget::Index(index)) => {
                        self.flags.clear_skip();
                        self.playlist.write().jump(index);
                    }
                    Some(SkipTarget::Time(_)) => {} // se consume al arrancar la pista
                    None => self.playlist.write().advance(),
                }
            }
        }

        *self.cancel.lock() = None;

        if forced {
            info!("⏹️ Sesión {} detenida a la fuerza", self.guild_id);
        } else if let Err(e) = sink.flush().await {
            warn!("⚠️ Error drenando el transporte de voz: {}", e);
        }

        if let Err(e) = sink.disconnect().await {
            warn!("⚠️ Error al desconectar del canal de voz: {}", e);
        }

        debug!("📴 Sesión {} inactiva", self.guild_id);
        Ok(())
    }

    async fn report_channel_issue(
        &self,
        feedback: &dyn Announcer,
        issue: ChannelIssue,
    ) -> Result<()> {
        feedback.say(&format!("No puedo reproducir: {}.", issue)).await;
        Err(AudioError::ChannelUnavailable(issue))
    }

    /// Reproduce la pista bajo el cursor hasta su fin (natural o señalado).
    ///
    /// El decodificador que se abre acá muere al salir de esta función, sea
    /// cual sea el camino de salida.
    async fn play_current_track(
        &self,
        sink: &mut dyn VoiceSink,
        feedback: &dyn Announcer,
        cancel: &CancellationToken,
    ) -> TrackEnd {
        // Instantánea de la pista: la resolución trabaja sin lock tomado
        let current = { self.playlist.read().current().cloned() };
        let mut track = match current {
            Some(track) => track,
            None => return TrackEnd::Completed,
        };

        // La referencia de stream es efímera: se recalcula en cada arranque
        let stream_url = match track.stream_url(&self.resolvers).await {
            Ok(url) => url,
            Err(e) => {
                warn!("❌ Sin stream para `{}`: {}", track.location(), e);
                feedback
                    .say(&format!(
                        "No se pudo obtener el stream para {}.",
                        track.display_label()
                    ))
                    .await;
                return TrackEnd::Completed;
            }
        };

        self.write_back_resolver(&track);

        // Sondeo de duración diferido a la primera reproducción; si falla,
        // la pista sigue siendo válida con duración desconocida
        if track.length().is_zero() {
            match self.decoders.probe_duration(&stream_url).await {
                Some(length) => {
                    track.set_length(length);
                    self.write_back_length(&track, length);
                }
                None => warn!("⚠️ Duración desconocida para `{}`", track.location()),
            }
        }

        let seek = self.flags.take_seek();

        // Al retomar desde un seek no se re-anuncia la pista
        if seek.is_none() {
            feedback.say(&self.current_summary()).await;
        }

        let mut decoder = match self.decoders.open(&stream_url, seek).await {
            Ok(decoder) => decoder,
            Err(e) => {
                error!(
                    "❌ El decodificador no arrancó para `{}`: {}",
                    track.location(),
                    e
                );
                feedback
                    .say(&format!("El decodificador falló para {}.", track.display_label()))
                    .await;
                return TrackEnd::Completed;
            }
        };

        let mut frame = vec![0u8; self.config.frame_bytes()];
        let pause_poll = Duration::from_millis(self.config.pause_poll_ms);

        self.flags.stop_track.store(false, Ordering::SeqCst);
        debug!("▶️ Reproduciendo `{}` en guild {}", track.name(), self.guild_id);

        loop {
            if cancel.is_cancelled() {
                return TrackEnd::Cancelled;
            }

            if self.flags.take_stop_track() {
                self.flags.pause.store(false, Ordering::SeqCst);
                break;
            }

            // En pausa no se consume ningún frame: al reanudar se sigue
            // exactamente donde se quedó
            if self.flags.pause.load(Ordering::SeqCst) {
                tokio::time::sleep(pause_poll).await;
                continue;
            }

            match decoder.next_frame(&mut frame).await {
                Ok(true) => {
                    tokio::select! {
                        _ = cancel.cancelled() => return TrackEnd::Cancelled,
                        sent = sink.send_frame(&frame) => {
                            if let Err(e) = sent {
                                warn!("⚠️ El transporte rechazó un frame: {}", e);
                                break;
                            }
                        }
                    }
                }
                Ok(false) => break, // stream agotado: fin natural
                Err(e) => {
                    warn!("⚠️ Error leyendo del decodificador: {}", e);
                    break;
                }
            }
        }

        TrackEnd::Completed
    }

    fn write_back_resolver(&self, track: &Track) {
        if track.resolver_index().is_none() {
            return;
        }

        let mut playlist = self.playlist.write();
        if let Some(entry) = playlist.current_mut() {
            if entry.location() == track.location() {
                entry.set_resolver_index(track.resolver_index());
            }
        }
    }

    fn write_back_length(&self, track: &Track, length: Duration) {
        let mut playlist = self.playlist.write();
        if let Some(entry) = playlist.current_mut() {
            if entry.location() == track.location() {
                entry.set_length(length);
            }
        }
    }

    // ------------------------------------------------------------------
    // Comandos de control
    // ------------------------------------------------------------------

    /// Corta la pista actual y pasa a la siguiente (`next`).
    pub fn stop_playback(&self) {
        if !self.is_playing() {
            return;
        }

        self.flags.pause.store(false, Ordering::SeqCst);
        self.flags.stop_track.store(true, Ordering::SeqCst);
    }

    /// Corta la pista actual y retrocede una posición (`prev`).
    pub fn previous(&self) {
        if !self.is_playing() {
            return;
        }

        self.flags.prev.store(true, Ordering::SeqCst);
        self.stop_playback();
    }

    /// Salta a la pista en `index` (0-based). No-op si no hay nada sonando.
    pub fn skip_to_index(&self, index: usize) -> bool {
        if !self.is_playing() {
            return false;
        }

        self.flags.request_skip(SkipTarget::Index(index));
        self.flags.pause.store(false, Ordering::SeqCst);
        self.flags.stop_track.store(true, Ordering::SeqCst);
        true
    }

    /// Reinicia la pista actual desde `offset` (`goto`).
    ///
    /// Un offset más allá de la duración conocida se rechaza sin efecto;
    /// como la duración desconocida vale cero, esas pistas rechazan
    /// cualquier seek.
    pub fn skip_to_time(&self, offset: Duration) -> bool {
        if !self.is_playing() {
            return false;
        }

        let length = self
            .playlist
            .read()
            .current()
            .map(|t| t.length())
            .unwrap_or_default();

        if offset >= length {
            return false;
        }

        self.flags.request_skip(SkipTarget::Time(offset));
        self.flags.pause.store(false, Ordering::SeqCst);
        self.flags.stop_track.store(true, Ordering::SeqCst);
        true
    }

    /// Pausa o reanuda. `None` invierte el estado actual; devuelve el nuevo.
    pub fn set_pause(&self, value: Option<bool>) -> bool {
        if !self.is_playing() {
            return false;
        }

        let paused = value.unwrap_or(!self.flags.pause.load(Ordering::SeqCst));
        self.flags.pause.store(paused, Ordering::SeqCst);

        if paused {
            info!("⏸️ Sesión {} pausada", self.guild_id);
        } else {
            info!("▶️ Sesión {} reanudada", self.guild_id);
        }

        paused
    }

    pub fn toggle_pause(&self) -> bool {
        self.set_pause(None)
    }

    /// Detiene pista y playlist; el bucle drena el transporte y desconecta.
    pub fn stop_playlist(&self) {
        if !self.is_playing() {
            return;
        }

        self.flags.stop_playlist.store(true, Ordering::SeqCst);
        self.flags.pause.store(false, Ordering::SeqCst);
        self.flags.stop_track.store(true, Ordering::SeqCst);
    }

    /// Detención inmediata: tira el decodificador y desconecta sin drenar.
    pub fn force_stop(&self) {
        let token = self.cancel.lock().clone();
        if let Some(token) = token {
            token.cancel();
        }
    }

    /// Vacía la playlist. Vaciar nunca es silencioso con una pista viva:
    /// si hay reproducción en curso también la detiene.
    pub fn clear_playlist(&self) {
        if self.is_playing() {
            self.stop_playlist();
        }

        self.playlist.write().clear();
        info!("🗑️ Playlist del guild {} vaciada", self.guild_id);
    }

    // ------------------------------------------------------------------
    // Playlist
    // ------------------------------------------------------------------

    /// Resuelve `location` y agrega la pista al final de la playlist.
    pub async fn add_track(&self, location: &str) -> Result<Track> {
        let track = Track::parse(location, &self.resolvers).await?;

        self.playlist
            .write()
            .add(track.clone(), self.config.max_playlist_size)?;

        info!("➕ `{}` agregada a la playlist del guild {}", track.name(), self.guild_id);
        Ok(track)
    }

    /// Elimina la pista en `index` (0-based) y la devuelve.
    pub fn remove_track(&self, index: usize) -> Result<Track> {
        self.playlist.write().remove(index)
    }

    /// Descripción de la pista actual para el usuario.
    ///
    /// Un cursor fuera de rango es la única falla de consistencia interna
    /// posible: se auto-repara reseteando a 0 y se reporta "sin pista" en
    /// lugar de reventar.
    pub fn current_summary(&self) -> String {
        let (index, len, label) = {
            let playlist = self.playlist.read();
            (
                playlist.index(),
                playlist.len(),
                playlist.current().map(|t| t.display_label()),
            )
        };

        if len == 0 {
            return "No hay ninguna pista en reproducción.".to_string();
        }

        match label {
            Some(label) => format!("Reproduciendo: {}", label),
            None => {
                warn!(
                    "🩹 {}",
                    AudioError::StaleIndex { index, len }
                );
                self.playlist.write().jump(0);
                "No hay ninguna pista en reproducción.".to_string()
            }
        }
    }

    /// Copia del estado de la playlist para `list` y la persistencia.
    pub fn snapshot(&self) -> PlaylistSnapshot {
        let playlist = self.playlist.read();
        PlaylistSnapshot {
            tracks: playlist.tracks().to_vec(),
            index: playlist.index(),
            is_playing: self.is_playing(),
        }
    }

    /// Recarga el estado persistido de la sesión.
    pub(crate) fn restore_state(
        &self,
        tracks: Vec<Track>,
        index: usize,
        channel: Option<ChannelId>,
    ) {
        let mut playlist = self.playlist.write();
        playlist.clear();

        for track in tracks {
            if let Err(e) = playlist.add(track, self.config.max_playlist_size) {
                warn!("⚠️ Pista persistida descartada: {}", e);
            }
        }

        playlist.jump(index);
        drop(playlist);

        if let Some(channel) = channel {
            *self.playback_channel.lock() = Some(channel);
        }
    }

    #[cfg(test)]
    fn playlist_for_tests(&self) -> &RwLock<Playlist> {
        &self.playlist
    }
}
