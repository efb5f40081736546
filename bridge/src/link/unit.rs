use crate::link::backoff::Backoff;
use crate::link::{LinkConfig, LinkError};
use bytes::Bytes;
use futures_util::stream::{SplitSink, SplitStream};
use futures_util::{SinkExt, Stream, StreamExt};
use log::{debug, error, info, trace, warn};
use radarcore::processing::{DigestPipeline, RawSampleBuffer};
use radarcore::telemetry::{IngestMetrics, LogManager, MetricsSnapshot};
use radarcore::wire::{Metadata, ProtocolError, SampleFrame, Telemetry, Unit, SCHEMA_VERSION};
use radarcore::{StageError, StageResult};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};
use tokio::net::TcpStream;
use tokio::sync::{mpsc, watch, Notify};
use tokio::time::{interval, timeout, MissedTickBehavior};
use tokio_tungstenite::tungstenite::{self, Message};
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};

type SensorSocket = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// Connection to one radar unit.
///
/// Cloning is cheap; every clone drives the same unit. Binary frames feed the
/// raw sample buffer, text frames update telemetry, and two per-session timers
/// digest the buffer and forward fresh snapshots to the outbound channel.
#[derive(Clone)]
pub struct RadarUnitLink {
    shared: Arc<Shared>,
}

struct Shared {
    address: String,
    config: LinkConfig,
    samples: Mutex<RawSampleBuffer>,
    display: RwLock<Display>,
    pipeline: Mutex<DigestPipeline>,
    metrics: IngestMetrics,
    outbound: mpsc::Sender<Bytes>,
    session: Mutex<Option<Session>>,
    done: Notify,
    shutdown: watch::Sender<bool>,
    identity: watch::Sender<Option<String>>,
}

/// Latest published snapshot plus the inputs of the next one.
struct Display {
    unit: Arc<Unit>,
    metadata: Metadata,
    telemetry: Telemetry,
    generation: u64,
    rendered: bool,
}

/// Handle of the live connection; dropping the stop sender ends its tasks.
struct Session {
    stop: watch::Sender<bool>,
}

impl RadarUnitLink {
    /// Creates an idle link. Nothing connects until [`connect`](Self::connect)
    /// or the watchdog started by [`spawn`](Self::spawn) runs.
    pub fn new(address: impl Into<String>, config: LinkConfig, outbound: mpsc::Sender<Bytes>) -> Self {
        let address = address.into();
        let pipeline = DigestPipeline::new(config.dsp.clone())
            .with_logger(LogManager::new(format!("digest {}", address)));
        let (shutdown, _) = watch::channel(false);
        let (identity, _) = watch::channel(None);
        Self {
            shared: Arc::new(Shared {
                samples: Mutex::new(RawSampleBuffer::with_capacity(config.dsp.window())),
                display: RwLock::new(Display {
                    unit: Arc::new(Unit::default()),
                    metadata: Metadata::default(),
                    telemetry: Telemetry::default(),
                    generation: 0,
                    rendered: true,
                }),
                pipeline: Mutex::new(pipeline),
                metrics: IngestMetrics::new(),
                session: Mutex::new(None),
                done: Notify::new(),
                address,
                config,
                outbound,
                shutdown,
                identity,
            }),
        }
    }

    /// Creates a link and starts its reconnect watchdog.
    pub fn spawn(address: impl Into<String>, config: LinkConfig, outbound: mpsc::Sender<Bytes>) -> Self {
        let link = Self::new(address, config, outbound);
        tokio::spawn(link.clone().watchdog());
        link
    }

    /// True if both handles drive the same connection.
    pub fn same_link(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.shared, &other.shared)
    }

    pub fn address(&self) -> &str {
        &self.shared.address
    }

    /// MAC reported by the last successful handshake.
    pub fn mac(&self) -> Option<String> {
        self.shared.identity.borrow().clone()
    }

    pub fn metadata(&self) -> Metadata {
        read(&self.shared.display).metadata.clone()
    }

    /// Latest published snapshot.
    #[cfg(test)]
    pub fn snapshot(&self) -> Arc<Unit> {
        Arc::clone(&read(&self.shared.display).unit)
    }

    /// Incremented by every published snapshot.
    #[cfg(test)]
    pub fn generation(&self) -> u64 {
        read(&self.shared.display).generation
    }

    /// Samples per channel currently held in the raw buffer.
    #[cfg(test)]
    pub fn buffered(&self) -> usize {
        lock(&self.shared.samples).len()
    }

    pub fn metrics(&self) -> MetricsSnapshot {
        self.shared.metrics.snapshot()
    }

    pub fn is_connected(&self) -> bool {
        lock(&self.shared.session).is_some()
    }

    pub fn is_closed(&self) -> bool {
        *self.shared.shutdown.borrow()
    }

    /// Resolves with the unit's MAC once a handshake succeeds, or `None` if
    /// the link is closed first.
    pub async fn wait_identified(&self) -> Option<String> {
        let mut identity = self.shared.identity.subscribe();
        let mut shutdown = self.shared.shutdown.subscribe();
        loop {
            let current = identity.borrow_and_update().clone();
            if let Some(mac) = current {
                return Some(mac);
            }
            let closed = *shutdown.borrow_and_update();
            if closed {
                return None;
            }
            tokio::select! {
                changed = identity.changed() => {
                    if changed.is_err() {
                        return None;
                    }
                }
                changed = shutdown.changed() => {
                    if changed.is_err() {
                        return None;
                    }
                }
            }
        }
    }

    /// Dials the sensor, performs the metadata handshake and starts the
    /// session tasks: the listener plus the digest and render timers.
    pub async fn connect(&self) -> Result<(), LinkError> {
        let config = &self.shared.config;
        let (socket, _) = connect_async(self.shared.address.as_str()).await?;
        let (mut sink, mut stream) = socket.split();

        sink.send(Message::Text(config.handshake.clone())).await?;
        let wait = config.handshake_timeout();
        let reply = timeout(wait, handshake_reply(&mut stream))
            .await
            .map_err(|_| LinkError::HandshakeTimeout(wait))??;
        let mut metadata = Metadata::decode(&reply)?;
        metadata.connected = true;
        let name = metadata.name.clone();
        let mac = metadata.mac.clone();

        let (stop, stop_rx) = watch::channel(false);
        let duplicate = {
            let mut session = lock(&self.shared.session);
            if session.is_some() {
                true
            } else {
                *session = Some(Session { stop });
                false
            }
        };
        if duplicate {
            debug!("{} already connected, dropping duplicate session", self.shared.address);
            let _ = sink.close().await;
            return Ok(());
        }

        lock(&self.shared.samples).clear();
        self.publish_metadata(metadata);
        self.shared.metrics.restart_window();
        self.shared.identity.send_replace(Some(mac.clone()));
        info!("Unit '{}' ({}) @ {} connected", name, mac, self.shared.address);

        tokio::spawn(self.clone().listen(sink, stream, stop_rx.clone()));
        tokio::spawn(self.clone().run_digest(stop_rx.clone()));
        tokio::spawn(self.clone().run_render(stop_rx));
        Ok(())
    }

    /// Connects unless a session is already live.
    pub async fn reconnect(&self) -> Result<(), LinkError> {
        if self.is_connected() {
            return Ok(());
        }
        self.connect().await
    }

    async fn listen(
        self,
        mut sink: SplitSink<SensorSocket, Message>,
        mut stream: SplitStream<SensorSocket>,
        mut stop: watch::Receiver<bool>,
    ) {
        loop {
            tokio::select! {
                _ = stop.changed() => {
                    let _ = sink.send(Message::Close(None)).await;
                    break;
                }
                message = stream.next() => match message {
                    Some(Ok(Message::Binary(frame))) => {
                        self.ingest(&frame);
                    }
                    Some(Ok(Message::Text(text))) => {
                        if let Err(err) = self.apply_telemetry(&text) {
                            warn!("{}: {}", self.shared.address, err);
                        }
                    }
                    Some(Ok(Message::Close(_))) | None => break,
                    Some(Ok(_)) => {}
                    Some(Err(err)) => {
                        warn!("Read from {} failed: {}", self.shared.address, err);
                        break;
                    }
                }
            }
        }
        let _ = sink.close().await;
        self.shared.done.notify_one();
    }

    /// Decodes one binary frame into the raw buffer. Frames too short to
    /// carry the trailer are counted and skipped.
    pub fn ingest(&self, frame: &[u8]) -> bool {
        match SampleFrame::decode(frame) {
            Some(decoded) => {
                self.shared.metrics.record_frame(decoded.adc_duration_us());
                lock(&self.shared.samples).push(&decoded);
                true
            }
            None => {
                trace!("Skipping {} byte frame from {}", frame.len(), self.shared.address);
                self.shared.metrics.record_skipped();
                false
            }
        }
    }

    /// Stores a telemetry report; it is folded into the next digest.
    pub fn apply_telemetry(&self, text: &str) -> Result<(), ProtocolError> {
        let telemetry = Telemetry::decode(text)?;
        write(&self.shared.display).telemetry = telemetry;
        Ok(())
    }

    /// Runs one digest over the raw window and publishes a new snapshot.
    /// Returns `false` while fewer than `W` samples are buffered.
    pub fn digest(&self) -> StageResult<bool> {
        let window = match lock(&self.shared.samples).snapshot() {
            Ok(window) => window,
            Err(StageError::InsufficientData { .. }) => return Ok(false),
            Err(err) => return Err(err),
        };
        let (mut metadata, telemetry) = {
            let display = read(&self.shared.display);
            (display.metadata.clone(), display.telemetry)
        };

        let output = lock(&self.shared.pipeline).execute(&metadata, &window)?;
        let metrics = self.shared.metrics.snapshot();
        metadata.rate = metrics.rate;
        metadata.duration = metrics.adc_duration_us;

        let unit = Unit {
            version: SCHEMA_VERSION,
            rssi: telemetry.rssi,
            temperature: telemetry.temperature,
            pan: telemetry.pan,
            tilt: telemetry.tilt,
            channels: output.channels,
            metadata,
            phase: output.phase,
            distance: output.distance,
            duration: metrics.adc_duration_us,
            rate: metrics.rate,
            samples: output.samples as f64,
        };
        {
            let mut display = write(&self.shared.display);
            display.unit = Arc::new(unit);
            display.generation += 1;
            display.rendered = false;
        }
        self.shared.metrics.record_digest();
        Ok(true)
    }

    /// Forwards the latest snapshot if it has not been sent yet.
    ///
    /// Waits at most one render interval for room in the outbound channel.
    /// On timeout the frame is dropped; only a newer snapshot is sent again.
    pub async fn tick(&self) -> Result<bool, LinkError> {
        let unit = {
            let mut display = write(&self.shared.display);
            if display.rendered {
                return Ok(false);
            }
            display.rendered = true;
            Arc::clone(&display.unit)
        };
        let payload = Bytes::from(serde_json::to_vec(unit.as_ref())?);

        let wait = self.shared.config.render_interval();
        match timeout(wait, self.shared.outbound.send(payload)).await {
            Ok(Ok(())) => Ok(true),
            Ok(Err(_)) => Err(LinkError::OutboundClosed),
            Err(_) => {
                self.shared.metrics.record_dropped();
                Err(LinkError::Backpressure(wait))
            }
        }
    }

    /// Replaces the unit metadata, e.g. after a settings update.
    pub fn replace_metadata(&self, metadata: Metadata) {
        self.publish_metadata(metadata);
    }

    /// Stops the session and the watchdog. The sensor receives a close frame.
    pub fn close(&self) {
        if self.shared.shutdown.send_replace(true) {
            return;
        }
        self.teardown();
        match self.mac() {
            Some(mac) => info!("Link to unit {} @ {} closed", mac, self.shared.address),
            None => info!("Link to {} closed before identification", self.shared.address),
        }
    }

    async fn run_digest(self, mut stop: watch::Receiver<bool>) {
        let mut ticker = interval(self.shared.config.digest_interval());
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
        loop {
            tokio::select! {
                _ = stop.changed() => break,
                _ = ticker.tick() => {
                    let link = self.clone();
                    match tokio::task::spawn_blocking(move || link.digest()).await {
                        Ok(Ok(_)) => {}
                        Ok(Err(err)) => warn!("Digest for {} failed: {}", self.shared.address, err),
                        Err(err) => error!("Digest task for {} aborted: {}", self.shared.address, err),
                    }
                }
            }
        }
    }

    async fn run_render(self, mut stop: watch::Receiver<bool>) {
        let mut ticker = interval(self.shared.config.render_interval());
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
        loop {
            tokio::select! {
                _ = stop.changed() => break,
                _ = ticker.tick() => match self.tick().await {
                    Ok(_) => {}
                    Err(err @ LinkError::Backpressure(_)) => error!("{}: {}", self.shared.address, err),
                    Err(err) => {
                        error!("Render for {} stopped: {}", self.shared.address, err);
                        break;
                    }
                }
            }
        }
    }

    /// Keeps the link connected until [`close`](Self::close) is called.
    async fn watchdog(self) {
        let config = &self.shared.config;
        let mut backoff = Backoff::new(config.reconnect_initial(), config.reconnect_max());
        let mut shutdown = self.shared.shutdown.subscribe();
        loop {
            if *shutdown.borrow_and_update() {
                break;
            }
            match self.reconnect().await {
                Ok(()) => {
                    backoff.reset();
                    tokio::select! {
                        _ = self.shared.done.notified() => {}
                        _ = shutdown.changed() => break,
                    }
                    self.teardown();
                    warn!("Unit @ {} disconnected. Reconnecting...", self.shared.address);
                }
                Err(err) => {
                    let delay = backoff.next_delay();
                    warn!(
                        "Connecting to {} failed: {}; retrying in {:?}",
                        self.shared.address, err, delay
                    );
                    tokio::select! {
                        _ = tokio::time::sleep(delay) => {}
                        _ = shutdown.changed() => break,
                    }
                }
            }
        }
        self.teardown();
        debug!("Watchdog for {} stopped", self.shared.address);
    }

    fn teardown(&self) {
        let session = lock(&self.shared.session).take();
        if let Some(session) = session {
            let _ = session.stop.send(true);
            info!("Unit @ {} session ended: {}", self.shared.address, self.metrics());
            let mut metadata = self.metadata();
            metadata.connected = false;
            self.publish_metadata(metadata);
        }
    }

    fn publish_metadata(&self, metadata: Metadata) {
        let mut display = write(&self.shared.display);
        let mut unit = Unit::clone(&display.unit);
        unit.metadata = metadata.clone();
        display.unit = Arc::new(unit);
        display.metadata = metadata;
        display.generation += 1;
        display.rendered = false;
    }
}

async fn handshake_reply<S>(stream: &mut S) -> Result<Vec<u8>, LinkError>
where
    S: Stream<Item = Result<Message, tungstenite::Error>> + Unpin,
{
    while let Some(message) = stream.next().await {
        match message? {
            Message::Text(text) => return Ok(text.into_bytes()),
            Message::Binary(data) => return Ok(data),
            Message::Close(_) => return Err(LinkError::Closed),
            _ => {}
        }
    }
    Err(LinkError::Closed)
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

fn read<T>(lock: &RwLock<T>) -> RwLockReadGuard<'_, T> {
    lock.read().unwrap_or_else(PoisonError::into_inner)
}

fn write<T>(lock: &RwLock<T>) -> RwLockWriteGuard<'_, T> {
    lock.write().unwrap_or_else(PoisonError::into_inner)
}
