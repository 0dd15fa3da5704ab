//! Shared application state

use crate::config::ServiceInfo;
use hatecheck_classifiers::ClassificationGateway;
use metrics_exporter_prometheus::PrometheusHandle;
use std::sync::Arc;

/// Application state shared across all requests
#[derive(Clone)]
pub struct AppState {
    /// Gateway wrapping the classifier loaded at startup
    pub gateway: Arc<ClassificationGateway>,

    /// Metadata for `GET /`
    pub service: Arc<ServiceInfo>,

    /// Prometheus metrics handle for rendering
    pub metrics_handle: Option<PrometheusHandle>,
}

impl AppState {
    pub fn new(gateway: ClassificationGateway, service: ServiceInfo) -> Self {
        Self {
            gateway: Arc::new(gateway),
            service: Arc::new(service),
            metrics_handle: None,
        }
    }

    pub fn with_metrics(mut self, handle: PrometheusHandle) -> Self {
        self.metrics_handle = Some(handle);
        self
    }
}
