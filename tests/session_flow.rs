//! Flujo completo de reproducción con decodificador y transporte simulados.

use async_trait::async_trait;
use parking_lot::Mutex;
use serenity::model::id::{ChannelId, GuildId};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use storm_audio::{
    Announcer, AudioConfig, AudioError, AudioSession, ChannelIssue, ChannelProfile, Decoder,
    DecoderFactory, GuildHost, ResolverRegistry, VoiceSink, VoiceTransport,
};

// ----------------------------------------------------------------------
// Dobles de prueba
// ----------------------------------------------------------------------

struct OpenRecord {
    stream_url: String,
    seek: Option<Duration>,
}

/// Fábrica determinista: cada apertura produce un decodificador que emite
/// una cantidad fija de frames, estampados con el número de apertura y el
/// número de frame para poder atribuirlos después.
struct ScriptedFactory {
    frames_per_track: usize,
    probe: Option<Duration>,
    opens: Mutex<Vec<OpenRecord>>,
    generation: AtomicUsize,
}

impl ScriptedFactory {
    fn new(frames_per_track: usize) -> Self {
        Self {
            frames_per_track,
            probe: Some(Duration::from_secs(300)),
            opens: Mutex::new(Vec::new()),
            generation: AtomicUsize::new(0),
        }
    }

    fn open_count(&self) -> usize {
        self.opens.lock().len()
    }

    fn open_seek(&self, index: usize) -> Option<Duration> {
        self.opens.lock()[index].seek
    }

    fn open_url(&self, index: usize) -> String {
        self.opens.lock()[index].stream_url.clone()
    }
}

#[async_trait]
impl DecoderFactory for ScriptedFactory {
    async fn open(
        &self,
        stream_url: &str,
        seek: Option<Duration>,
    ) -> storm_audio::Result<Box<dyn Decoder>> {
        let generation = self.generation.fetch_add(1, Ordering::SeqCst);
        self.opens.lock().push(OpenRecord {
            stream_url: stream_url.to_string(),
            seek,
        });

        Ok(Box::new(ScriptedDecoder {
            generation: generation as u8,
            remaining: self.frames_per_track,
            frame_no: 0,
        }))
    }

    async fn probe_duration(&self, _stream_url: &str) -> Option<Duration> {
        self.probe
    }
}

struct ScriptedDecoder {
    generation: u8,
    remaining: usize,
    frame_no: u8,
}

#[async_trait]
impl Decoder for ScriptedDecoder {
    async fn next_frame(&mut self, buf: &mut [u8]) -> storm_audio::Result<bool> {
        if self.remaining == 0 {
            return Ok(false);
        }
        self.remaining -= 1;

        buf[0] = self.generation;
        buf[1] = self.frame_no;
        self.frame_no = self.frame_no.wrapping_add(1);

        // simula el ritmo de lectura y deja intercalar comandos
        tokio::time::sleep(Duration::from_millis(2)).await;
        Ok(true)
    }
}

#[derive(Default)]
struct SinkLog {
    /// (apertura, número de frame) de cada frame entregado.
    frames: Vec<(u8, u8)>,
    flushes: usize,
    disconnects: usize,
}

struct MemoryTransport {
    log: Arc<Mutex<SinkLog>>,
    joins: Mutex<Vec<(GuildId, ChannelId)>>,
    fail_join: bool,
}

impl MemoryTransport {
    fn new() -> Self {
        Self {
            log: Arc::new(Mutex::new(SinkLog::default())),
            joins: Mutex::new(Vec::new()),
            fail_join: false,
        }
    }

    fn failing() -> Self {
        Self {
            fail_join: true,
            ..Self::new()
        }
    }

    fn frames(&self) -> Vec<(u8, u8)> {
        self.log.lock().frames.clone()
    }

    fn frames_of(&self, generation: u8) -> Vec<u8> {
        self.log
            .lock()
            .frames
            .iter()
            .filter(|(g, _)| *g == generation)
            .map(|(_, n)| *n)
            .collect()
    }

    fn flushes(&self) -> usize {
        self.log.lock().flushes
    }

    fn disconnects(&self) -> usize {
        self.log.lock().disconnects
    }

    fn join_count(&self) -> usize {
        self.joins.lock().len()
    }
}

#[async_trait]
impl VoiceTransport for MemoryTransport {
    async fn join(&self, guild: GuildId, channel: ChannelId) -> anyhow::Result<Box<dyn VoiceSink>> {
        if self.fail_join {
            anyhow::bail!("conexión rechazada");
        }

        self.joins.lock().push((guild, channel));
        Ok(Box::new(MemorySink {
            log: Arc::clone(&self.log),
        }))
    }
}

struct MemorySink {
    log: Arc<Mutex<SinkLog>>,
}

#[async_trait]
impl VoiceSink for MemorySink {
    async fn send_frame(&mut self, frame: &[u8]) -> anyhow::Result<()> {
        self.log.lock().frames.push((frame[0], frame[1]));
        Ok(())
    }

    async fn flush(&mut self) -> anyhow::Result<()> {
        self.log.lock().flushes += 1;
        Ok(())
    }

    async fn disconnect(&mut self) -> anyhow::Result<()> {
        self.log.lock().disconnects += 1;
        Ok(())
    }
}

struct StaticHost {
    profile: Option<ChannelProfile>,
}

impl StaticHost {
    fn voice() -> Self {
        Self {
            profile: Some(ChannelProfile {
                name: "General".to_string(),
                is_voice: true,
                can_join: true,
                can_speak: true,
            }),
        }
    }

    fn with(profile: Option<ChannelProfile>) -> Self {
        Self { profile }
    }
}

#[async_trait]
impl GuildHost for StaticHost {
    async fn guild_exists(&self, _guild: GuildId) -> bool {
        true
    }

    async fn channel_profile(
        &self,
        _guild: GuildId,
        _channel: ChannelId,
    ) -> Option<ChannelProfile> {
        self.profile.clone()
    }
}

#[derive(Default)]
struct CollectingAnnouncer {
    messages: Mutex<Vec<String>>,
}

impl CollectingAnnouncer {
    fn messages(&self) -> Vec<String> {
        self.messages.lock().clone()
    }
}

#[async_trait]
impl Announcer for CollectingAnnouncer {
    async fn say(&self, text: &str) {
        self.messages.lock().push(text.to_string());
    }
}

// ----------------------------------------------------------------------
// Armado de sesiones de prueba
// ----------------------------------------------------------------------

struct Rig {
    session: Arc<AudioSession>,
    factory: Arc<ScriptedFactory>,
    host: Arc<StaticHost>,
    transport: Arc<MemoryTransport>,
    feedback: Arc<CollectingAnnouncer>,
    _dir: tempfile::TempDir,
}

impl Rig {
    async fn new(track_names: &[&str], frames_per_track: usize) -> Self {
        Self::build(
            track_names,
            frames_per_track,
            StaticHost::voice(),
            MemoryTransport::new(),
            true,
        )
        .await
    }

    async fn build(
        track_names: &[&str],
        frames_per_track: usize,
        host: StaticHost,
        transport: MemoryTransport,
        configure_channel: bool,
    ) -> Self {
        let config = AudioConfig {
            pause_poll_ms: 10,
            ..AudioConfig::default()
        };

        let dir = tempfile::tempdir().unwrap();
        let factory = Arc::new(ScriptedFactory::new(frames_per_track));
        let session = Arc::new(AudioSession::new(
            GuildId::new(42),
            config.clone(),
            Arc::new(ResolverRegistry::with_defaults(&config)),
            Arc::clone(&factory) as Arc<dyn DecoderFactory>,
        ));

        if configure_channel {
            session.set_playback_channel(ChannelId::new(7));
        }

        // archivos locales: la resolución devuelve el path tal cual, sin red
        for name in track_names {
            let path = dir.path().join(format!("{name}.mp3"));
            std::fs::write(&path, b"pcm de mentira").unwrap();
            session
                .add_track(&path.to_string_lossy())
                .await
                .unwrap();
        }

        Self {
            session,
            factory,
            host: Arc::new(host),
            transport: Arc::new(transport),
            feedback: Arc::new(CollectingAnnouncer::default()),
            _dir: dir,
        }
    }

    fn start(&self) -> tokio::task::JoinHandle<storm_audio::Result<()>> {
        let session = Arc::clone(&self.session);
        let host = Arc::clone(&self.host);
        let transport = Arc::clone(&self.transport);
        let feedback = Arc::clone(&self.feedback);

        tokio::spawn(async move {
            session
                .start_playlist(host.as_ref(), transport.as_ref(), feedback.as_ref())
                .await
        })
    }
}

async fn wait_until(what: &str, mut cond: impl FnMut() -> bool) {
    for _ in 0..1000 {
        if cond() {
            return;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    panic!("esperando `{what}` sin éxito");
}

// ----------------------------------------------------------------------
// Precondiciones de arranque
// ----------------------------------------------------------------------

#[tokio::test]
async fn playback_future_moves_between_workers() {
    // el futuro de reproducción tiene que poder viajar a otro worker del
    // runtime, como hace SessionManager::spawn_playback
    fn require_send<F: std::future::Future + Send>(fut: F) -> F {
        fut
    }

    let rig = Rig::new(&[], 5).await;
    let fut = require_send(rig.session.start_playlist(
        rig.host.as_ref(),
        rig.transport.as_ref(),
        rig.feedback.as_ref(),
    ));
    assert!(fut.await.is_ok());
}

#[tokio::test]
async fn empty_playlist_start_is_a_noop() {
    let rig = Rig::new(&[], 5).await;

    let result = rig.start().await.unwrap();
    assert!(result.is_ok());

    assert!(!rig.session.is_playing());
    assert_eq!(rig.transport.join_count(), 0);
    assert!(rig
        .feedback
        .messages()
        .iter()
        .any(|m| m.contains("No hay pistas")));
}

#[tokio::test]
async fn unconfigured_channel_is_reported() {
    let rig = Rig::build(
        &["alpha"],
        5,
        StaticHost::voice(),
        MemoryTransport::new(),
        false,
    )
    .await;

    let result = rig.start().await.unwrap();
    assert!(matches!(
        result,
        Err(AudioError::ChannelUnavailable(ChannelIssue::NotConfigured))
    ));
    assert_eq!(rig.transport.join_count(), 0);
    assert!(!rig.session.is_playing());
}

#[tokio::test]
async fn vanished_channel_is_reported() {
    let rig = Rig::build(
        &["alpha"],
        5,
        StaticHost::with(None),
        MemoryTransport::new(),
        true,
    )
    .await;

    let result = rig.start().await.unwrap();
    assert!(matches!(
        result,
        Err(AudioError::ChannelUnavailable(ChannelIssue::Gone))
    ));
}

#[tokio::test]
async fn text_channel_is_rejected() {
    let rig = Rig::build(
        &["alpha"],
        5,
        StaticHost::with(Some(ChannelProfile {
            name: "general".to_string(),
            is_voice: false,
            can_join: true,
            can_speak: true,
        })),
        MemoryTransport::new(),
        true,
    )
    .await;

    let result = rig.start().await.unwrap();
    assert!(matches!(
        result,
        Err(AudioError::ChannelUnavailable(ChannelIssue::NotVoice))
    ));
}

#[tokio::test]
async fn missing_speak_permission_is_reported() {
    let rig = Rig::build(
        &["alpha"],
        5,
        StaticHost::with(Some(ChannelProfile {
            name: "Voz".to_string(),
            is_voice: true,
            can_join: true,
            can_speak: false,
        })),
        MemoryTransport::new(),
        true,
    )
    .await;

    let result = rig.start().await.unwrap();
    assert!(matches!(
        result,
        Err(AudioError::ChannelUnavailable(ChannelIssue::MissingSpeak))
    ));
}

#[tokio::test]
async fn transport_join_failure_is_reported() {
    let rig = Rig::build(
        &["alpha"],
        5,
        StaticHost::voice(),
        MemoryTransport::failing(),
        true,
    )
    .await;

    let result = rig.start().await.unwrap();
    assert!(matches!(
        result,
        Err(AudioError::ChannelUnavailable(ChannelIssue::JoinFailed(_)))
    ));
    assert_eq!(rig.transport.disconnects(), 0);
    assert!(!rig.session.is_playing());
}

// ----------------------------------------------------------------------
// Reproducción
// ----------------------------------------------------------------------

#[tokio::test]
async fn second_start_while_playing_is_silent() {
    let rig = Rig::new(&["alpha"], 500).await;
    let handle = rig.start();

    wait_until("primer frame", || !rig.transport.frames().is_empty()).await;

    // una segunda llamada no abre otra conexión ni otro bucle
    let again = rig
        .session
        .start_playlist(
            rig.host.as_ref(),
            rig.transport.as_ref(),
            rig.feedback.as_ref(),
        )
        .await;
    assert!(again.is_ok());
    assert_eq!(rig.transport.join_count(), 1);

    rig.session.stop_playlist();
    handle.await.unwrap().unwrap();
}

#[tokio::test]
async fn playlist_advances_and_wraps_around() {
    let rig = Rig::new(&["alpha", "beta"], 10).await;
    let handle = rig.start();

    // alfa, beta y de vuelta alfa: avanza y envuelve
    wait_until("tres pistas anunciadas", || rig.factory.open_count() >= 3).await;
    rig.session.stop_playlist();
    handle.await.unwrap().unwrap();

    let messages = rig.feedback.messages();
    assert!(messages[0].contains("alpha"));
    assert!(messages[1].contains("beta"));
    assert!(messages[2].contains("alpha"));

    assert_eq!(rig.transport.join_count(), 1);
    assert_eq!(rig.transport.flushes(), 1);
    assert_eq!(rig.transport.disconnects(), 1);
    assert!(!rig.session.is_playing());
}

#[tokio::test]
async fn track_frames_arrive_complete_and_in_order() {
    let rig = Rig::new(&["alpha"], 25).await;
    let handle = rig.start();

    wait_until("primera pista completa", || {
        rig.transport.frames_of(0).len() == 25
    })
    .await;
    rig.session.stop_playlist();
    handle.await.unwrap().unwrap();

    let expected: Vec<u8> = (0..25).collect();
    assert_eq!(rig.transport.frames_of(0), expected);

    // los archivos locales se decodifican desde su propio path
    assert!(rig.factory.open_url(0).ends_with("alpha.mp3"));
}

#[tokio::test]
async fn pause_holds_position_and_resume_loses_no_frames() {
    let rig = Rig::new(&["alpha"], 40).await;
    let handle = rig.start();

    wait_until("algunos frames", || rig.transport.frames().len() >= 5).await;

    assert!(rig.session.set_pause(Some(true)));
    tokio::time::sleep(Duration::from_millis(30)).await; // deja asentar el frame en vuelo

    let held = rig.transport.frames().len();
    tokio::time::sleep(Duration::from_millis(120)).await;
    assert_eq!(rig.transport.frames().len(), held);

    assert!(!rig.session.set_pause(Some(false)));
    wait_until("pista completa tras reanudar", || {
        rig.transport.frames_of(0).len() == 40
    })
    .await;

    rig.session.stop_playlist();
    handle.await.unwrap().unwrap();

    // ni huecos ni duplicados alrededor de la pausa
    let expected: Vec<u8> = (0..40).collect();
    assert_eq!(rig.transport.frames_of(0), expected);
}

#[tokio::test]
async fn next_and_previous_move_the_cursor() {
    let rig = Rig::new(&["alpha", "beta", "gamma"], 500).await;
    let handle = rig.start();

    wait_until("alfa sonando", || rig.factory.open_count() == 1).await;
    rig.session.stop_playback();

    wait_until("beta sonando", || rig.factory.open_count() == 2).await;
    rig.session.previous();

    wait_until("alfa de nuevo", || rig.factory.open_count() == 3).await;
    rig.session.stop_playlist();
    handle.await.unwrap().unwrap();

    let messages = rig.feedback.messages();
    assert!(messages[0].contains("alpha"));
    assert!(messages[1].contains("beta"));
    assert!(messages[2].contains("alpha"));
}

#[tokio::test]
async fn skip_jumps_to_the_requested_track() {
    let rig = Rig::new(&["alpha", "beta", "gamma"], 500).await;
    let handle = rig.start();

    wait_until("alfa sonando", || rig.factory.open_count() == 1).await;
    assert!(rig.session.skip_to_index(2));

    wait_until("gamma sonando", || rig.factory.open_count() == 2).await;
    rig.session.stop_playlist();
    handle.await.unwrap().unwrap();

    let messages = rig.feedback.messages();
    assert!(messages[1].contains("gamma"));
}

#[tokio::test]
async fn seek_restarts_the_decoder_without_reannouncing() {
    let rig = Rig::new(&["alpha"], 500).await;
    let handle = rig.start();

    wait_until("alfa sonando", || rig.factory.open_count() == 1).await;
    assert!(rig.session.skip_to_time(Duration::from_secs(60)));

    wait_until("decodificador reabierto", || rig.factory.open_count() == 2).await;
    rig.session.stop_playlist();
    handle.await.unwrap().unwrap();

    assert_eq!(rig.factory.open_seek(0), None);
    assert_eq!(rig.factory.open_seek(1), Some(Duration::from_secs(60)));

    // retomar desde un offset no re-anuncia la pista
    assert_eq!(rig.feedback.messages().len(), 1);
}

#[tokio::test]
async fn clear_halts_playback_and_disconnects() {
    let rig = Rig::new(&["alpha", "beta"], 500).await;
    let handle = rig.start();

    wait_until("algunos frames", || !rig.transport.frames().is_empty()).await;
    rig.session.clear_playlist();
    handle.await.unwrap().unwrap();

    assert!(!rig.session.is_playing());
    assert!(rig.session.snapshot().tracks.is_empty());
    assert_eq!(rig.transport.disconnects(), 1);
}

#[tokio::test]
async fn force_stop_drops_everything_without_draining() {
    let rig = Rig::new(&["alpha"], 500).await;
    let handle = rig.start();

    wait_until("algunos frames", || !rig.transport.frames().is_empty()).await;
    rig.session.force_stop();
    handle.await.unwrap().unwrap();

    assert!(!rig.session.is_playing());
    assert_eq!(rig.transport.flushes(), 0);
    assert_eq!(rig.transport.disconnects(), 1);
}

#[tokio::test]
async fn playback_can_restart_after_a_stop() {
    let rig = Rig::new(&["alpha"], 500).await;

    let handle = rig.start();
    wait_until("primer arranque", || rig.factory.open_count() == 1).await;
    rig.session.stop_playlist();
    handle.await.unwrap().unwrap();

    let handle = rig.start();
    wait_until("segundo arranque", || rig.factory.open_count() == 2).await;
    rig.session.stop_playlist();
    handle.await.unwrap().unwrap();

    assert_eq!(rig.transport.join_count(), 2);
    assert_eq!(rig.transport.disconnects(), 2);
}
