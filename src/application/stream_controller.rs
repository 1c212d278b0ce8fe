// Stream controller - Live telemetry sessions with cancel/restart
use crate::application::errors::StreamingError;
use crate::application::history_repository::HistoryRepository;
use crate::application::ports::{ReadingObserver, SessionGate};
use crate::application::reading_generator::ReadingGenerator;
use crate::domain::device::Device;
use crate::domain::reading::Reading;
use chrono::Utc;
use futures::stream::Stream;
use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use tokio::sync::{Mutex, broadcast};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

/// Counters across all sessions of one controller.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StreamStats {
    /// Id of the live session, if any.
    pub session_id: Option<u64>,
    pub sessions_started: u64,
    pub ticks_completed: u64,
    pub readings_emitted: u64,
    pub callback_failures: u64,
}

#[derive(Debug, Default)]
struct Counters {
    current_session: AtomicU64,
    sessions_started: AtomicU64,
    ticks_completed: AtomicU64,
    readings_emitted: AtomicU64,
    callback_failures: AtomicU64,
}

/// Everything a tick loop needs, cloned into each session task.
#[derive(Clone)]
struct TickContext {
    generator: Arc<ReadingGenerator>,
    history: Arc<dyn HistoryRepository>,
    devices: Arc<[Device]>,
    interval: Duration,
    events: broadcast::Sender<Reading>,
    counters: Arc<Counters>,
}

struct StreamSession {
    id: u64,
    token: CancellationToken,
    handle: JoinHandle<()>,
}

impl StreamSession {
    /// Cancel the tick loop and wait until it has exited.
    async fn shutdown(self) {
        self.token.cancel();
        if let Err(e) = self.handle.await {
            tracing::error!("Stream session {} ended abnormally: {}", self.id, e);
        }
    }
}

/// Owns at most one streaming session.
///
/// Starting while a session is live cancels the old tick loop and waits for it
/// to exit before the new one is spawned, all under the session lock, so two
/// loops never emit at the same time.
pub struct StreamController {
    context: TickContext,
    gate: Arc<dyn SessionGate>,
    session: Mutex<Option<StreamSession>>,
}

impl StreamController {
    pub fn new(
        generator: Arc<ReadingGenerator>,
        history: Arc<dyn HistoryRepository>,
        devices: Vec<Device>,
        interval: Duration,
        gate: Arc<dyn SessionGate>,
        broadcast_capacity: usize,
    ) -> Self {
        let (events, _) = broadcast::channel(broadcast_capacity.max(1));
        Self {
            context: TickContext {
                generator,
                history,
                devices: devices.into(),
                interval,
                events,
                counters: Arc::new(Counters::default()),
            },
            gate,
            session: Mutex::new(None),
        }
    }

    pub fn devices(&self) -> &[Device] {
        &self.context.devices
    }

    pub fn interval(&self) -> Duration {
        self.context.interval
    }

    /// Start a new session delivering every reading to `observer`, replacing
    /// the live session if there is one. Returns the new session id.
    pub async fn start(&self, observer: Arc<dyn ReadingObserver>) -> Result<u64, StreamingError> {
        if !self.gate.is_session_active() {
            return Err(StreamingError::NotAuthenticated);
        }

        let mut slot = self.session.lock().await;
        if let Some(previous) = slot.take() {
            tracing::info!("Superseding stream session {}", previous.id);
            previous.shutdown().await;
        }

        let counters = &self.context.counters;
        let id = counters.sessions_started.fetch_add(1, Ordering::SeqCst) + 1;
        counters.current_session.store(id, Ordering::SeqCst);

        let token = CancellationToken::new();
        let handle = tokio::spawn(run_session(
            id,
            self.context.clone(),
            observer,
            token.clone(),
        ));
        *slot = Some(StreamSession { id, token, handle });

        tracing::info!(
            "Stream session {} started: {} devices every {:?}",
            id,
            self.context.devices.len(),
            self.context.interval
        );
        Ok(id)
    }

    /// Cancel the live session and wait for it to exit. No-op when idle.
    pub async fn stop(&self) {
        let mut slot = self.session.lock().await;
        if let Some(session) = slot.take() {
            let id = session.id;
            session.shutdown().await;
            self.context.counters.current_session.store(0, Ordering::SeqCst);
            tracing::info!("Stream session {} stopped", id);
        }
    }

    pub async fn is_running(&self) -> bool {
        self.session
            .lock()
            .await
            .as_ref()
            .is_some_and(|session| !session.handle.is_finished())
    }

    pub fn stats(&self) -> StreamStats {
        let counters = &self.context.counters;
        let current = counters.current_session.load(Ordering::SeqCst);
        StreamStats {
            session_id: (current != 0).then_some(current),
            sessions_started: counters.sessions_started.load(Ordering::SeqCst),
            ticks_completed: counters.ticks_completed.load(Ordering::SeqCst),
            readings_emitted: counters.readings_emitted.load(Ordering::SeqCst),
            callback_failures: counters.callback_failures.load(Ordering::SeqCst),
        }
    }

    /// Ordered stream of every reading emitted from now on, across sessions.
    ///
    /// A subscriber that falls more than the channel capacity behind skips the
    /// readings it missed; it never slows the tick loop down.
    pub fn subscribe(&self) -> impl Stream<Item = Reading> + Send + 'static {
        let mut rx = self.context.events.subscribe();
        async_stream::stream! {
            loop {
                match rx.recv().await {
                    Ok(reading) => yield reading,
                    Err(broadcast::error::RecvError::Lagged(skipped)) => {
                        tracing::warn!("Reading subscriber lagged, skipped {} readings", skipped);
                    }
                    Err(broadcast::error::RecvError::Closed) => break,
                }
            }
        }
    }
}

async fn run_session(
    id: u64,
    ctx: TickContext,
    observer: Arc<dyn ReadingObserver>,
    token: CancellationToken,
) {
    let mut tick: u64 = 0;

    'session: loop {
        if token.is_cancelled() {
            break;
        }

        for device in ctx.devices.iter() {
            // Cancellation lands on device boundaries, never mid-reading.
            if token.is_cancelled() {
                break 'session;
            }

            let reading = ctx.generator.generate(device, Utc::now());
            ctx.history.append(reading.clone());
            notify(observer.as_ref(), &reading, &ctx.counters);
            // No subscribers is not an error.
            let _ = ctx.events.send(reading);
            ctx.counters.readings_emitted.fetch_add(1, Ordering::SeqCst);
        }

        tick += 1;
        ctx.counters.ticks_completed.fetch_add(1, Ordering::SeqCst);
        tracing::debug!("Stream session {} completed tick {}", id, tick);

        tokio::select! {
            _ = token.cancelled() => break,
            _ = tokio::time::sleep(ctx.interval) => {}
        }
    }

    tracing::debug!("Stream session {} exited after {} ticks", id, tick);
}

/// Deliver one reading, isolating the loop from observer errors and panics.
fn notify(observer: &dyn ReadingObserver, reading: &Reading, counters: &Counters) {
    let failure = match panic::catch_unwind(AssertUnwindSafe(|| observer.on_reading(reading))) {
        Ok(Ok(())) => return,
        Ok(Err(source)) => StreamingError::Callback {
            device: reading.device_id.clone(),
            source,
        },
        Err(payload) => StreamingError::CallbackPanicked {
            device: reading.device_id.clone(),
            message: panic_message(payload.as_ref()),
        },
    };

    counters.callback_failures.fetch_add(1, Ordering::SeqCst);
    tracing::warn!("{}", failure);
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        message.to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic payload".to_string()
    }
}
