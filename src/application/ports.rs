// Ports between the streaming engine and its consumers/collaborators
use crate::domain::reading::Reading;

/// Receives every reading emitted by the stream controller, in emission order.
///
/// Called synchronously from the tick loop; implementations must return
/// quickly and hand expensive work to their own task.
pub trait ReadingObserver: Send + Sync {
    fn on_reading(&self, reading: &Reading) -> anyhow::Result<()>;
}

impl<F> ReadingObserver for F
where
    F: Fn(&Reading) -> anyhow::Result<()> + Send + Sync,
{
    fn on_reading(&self, reading: &Reading) -> anyhow::Result<()> {
        self(reading)
    }
}

/// "Is an operator logged in" as seen by the streaming engine.
pub trait SessionGate: Send + Sync {
    fn is_session_active(&self) -> bool;
}
