use apsim_core::{MetricsBackend, SwapOutcome};
use apsim_model::FileKind;
use prometheus::{
    Encoder, IntCounterVec, IntGauge, Opts, Registry, TextEncoder, proto::MetricFamily,
};
use tracing::warn;

#[derive(Clone)]
pub struct PrometheusMetrics {
    registry: Registry,
    uploads: IntCounterVec,
    swaps: IntCounterVec,
    running: IntGauge,
}

impl PrometheusMetrics {
    pub fn new() -> Result<Self, prometheus::Error> {
        let registry = Registry::new();

        let uploads = IntCounterVec::new(
            Opts::new("apsim_uploads_total", "Files accepted by the manager"),
            &["kind"],
        )?;
        let swaps = IntCounterVec::new(
            Opts::new("apsim_swaps_total", "Backend slot transitions by outcome"),
            &["outcome"],
        )?;
        let running = IntGauge::new("apsim_backend_running", "Whether a backend process is held")?;

        registry.register(Box::new(uploads.clone()))?;
        registry.register(Box::new(swaps.clone()))?;
        registry.register(Box::new(running.clone()))?;

        Ok(Self {
            registry,
            uploads,
            swaps,
            running,
        })
    }

    pub fn gather(&self) -> Vec<MetricFamily> {
        self.registry.gather()
    }

    /// Render all metrics in the text exposition format.
    pub fn encode_text(&self) -> Result<(String, String), prometheus::Error> {
        let encoder = TextEncoder::new();
        let mut buffer = Vec::new();
        encoder.encode(&self.gather(), &mut buffer)?;
        let body = String::from_utf8(buffer).map_err(|e| prometheus::Error::Msg(e.to_string()))?;
        Ok((encoder.format_type().to_string(), body))
    }
}

impl MetricsBackend for PrometheusMetrics {
    fn record_upload(&self, kind: FileKind) {
        match self.uploads.get_metric_with_label_values(&[kind.as_str()]) {
            Ok(counter) => counter.inc(),
            Err(e) => warn!(error = %e, "failed to record upload metric"),
        }
    }

    fn record_swap(&self, outcome: SwapOutcome) {
        match self.swaps.get_metric_with_label_values(&[outcome.as_str()]) {
            Ok(counter) => counter.inc(),
            Err(e) => warn!(error = %e, "failed to record swap metric"),
        }
    }

    fn set_backend_running(&self, running: bool) {
        self.running.set(i64::from(running));
    }
}
