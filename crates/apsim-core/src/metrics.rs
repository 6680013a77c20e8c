use std::sync::Arc;

use apsim_model::FileKind;

/// How a transition of the backend slot ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SwapOutcome {
    /// A new upload replaced the backend.
    Started,
    /// The swap aborted; no backend is running.
    Failed,
    /// The ledger's input was restarted at startup.
    Resumed,
}

impl SwapOutcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            SwapOutcome::Started => "started",
            SwapOutcome::Failed => "failed",
            SwapOutcome::Resumed => "resumed",
        }
    }
}

/// Sink for manager metrics. Implementations must be cheap and non-blocking;
/// they are called while the swap lock is held.
pub trait MetricsBackend: Send + Sync + 'static {
    fn record_upload(&self, kind: FileKind);
    fn record_swap(&self, outcome: SwapOutcome);
    fn set_backend_running(&self, running: bool);
}

pub type MetricsHandle = Arc<dyn MetricsBackend>;

/// Discards everything.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopMetrics;

impl MetricsBackend for NoopMetrics {
    fn record_upload(&self, _kind: FileKind) {}
    fn record_swap(&self, _outcome: SwapOutcome) {}
    fn set_backend_running(&self, _running: bool) {}
}

pub fn noop_metrics() -> MetricsHandle {
    Arc::new(NoopMetrics)
}
