use admissions::workflows::enrollment::TieBreak;
use metrics_exporter_prometheus::PrometheusHandle;
use std::sync::atomic::AtomicBool;
use std::sync::Arc;

#[derive(Clone)]
pub(crate) struct AppState {
    pub(crate) readiness: Arc<AtomicBool>,
    pub(crate) metrics: Arc<PrometheusHandle>,
}

pub(crate) fn parse_tie_break(raw: &str) -> Result<TieBreak, String> {
    raw.parse::<TieBreak>()
}
