use prometheus_client::{
    encoding::EncodeLabelSet,
    metrics::{counter::Counter, family::Family},
    registry::Registry,
};

/// Request metrics for the service, backed by a prometheus registry.
///
/// Built once at startup and handed to the router via
/// [`AppState`](crate::handler::AppState); handlers never reach for a global.
pub struct Metrics {
    registry: Registry,
    requests: Family<EndpointLabel, Counter>,
}

#[derive(Clone, Debug, Hash, PartialEq, Eq, EncodeLabelSet)]
pub struct EndpointLabel {
    pub endpoint: String,
}

impl Metrics {
    pub fn new() -> Self {
        let mut registry = Registry::default();
        let requests = Family::<EndpointLabel, Counter>::default();
        registry.register("requests", "Number of requests served", requests.clone());
        Metrics { registry, requests }
    }

    /// Count one served request against the given endpoint path.
    ///
    /// The underlying counter is atomic, so concurrent handlers never lose
    /// an increment. Counts only ever grow during the process lifetime.
    pub fn inc_requests(&self, endpoint: &str) {
        self.requests
            .get_or_create(&EndpointLabel { endpoint: endpoint.to_string() })
            .inc();
    }

    /// Render the registry in the OpenMetrics text exposition format.
    ///
    /// Counter samples carry the `_total` suffix and a family without any
    /// label combination yet emits only its `# HELP`/`# TYPE` lines.
    pub fn encode(&self) -> Result<String, std::fmt::Error> {
        let mut buffer = String::new();
        prometheus_client::encoding::text::encode(&mut buffer, &self.registry)?;
        Ok(buffer)
    }
}

impl Default for Metrics {
    fn default() -> Self {
        Self::new()
    }
}
