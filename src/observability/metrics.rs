use prometheus::{
    Encoder, HistogramOpts, HistogramVec, IntCounterVec, IntGauge, Opts, Registry, TextEncoder,
};

#[derive(Clone)]
pub struct Metrics {
    registry: Registry,
    pub dispatches_total: IntCounterVec,
    pub dispatch_latency_seconds: HistogramVec,
    pub dispatches_in_flight: IntGauge,
}

impl Metrics {
    pub fn new() -> Self {
        let registry = Registry::new();

        let dispatches_total = IntCounterVec::new(
            Opts::new("dispatches_total", "Total coordinate dispatches by outcome"),
            &["outcome"],
        )
        .expect("valid dispatches_total metric");

        let dispatch_latency_seconds = HistogramVec::new(
            HistogramOpts::new(
                "dispatch_latency_seconds",
                "Time from issuing a dispatch to its terminal state in seconds",
            )
            .buckets(vec![0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0]),
            &["outcome"],
        )
        .expect("valid dispatch_latency_seconds metric");

        let dispatches_in_flight = IntGauge::new(
            "dispatches_in_flight",
            "Number of dispatches currently pending",
        )
        .expect("valid dispatches_in_flight metric");

        registry
            .register(Box::new(dispatches_total.clone()))
            .expect("register dispatches_total");
        registry
            .register(Box::new(dispatch_latency_seconds.clone()))
            .expect("register dispatch_latency_seconds");
        registry
            .register(Box::new(dispatches_in_flight.clone()))
            .expect("register dispatches_in_flight");

        Self {
            registry,
            dispatches_total,
            dispatch_latency_seconds,
            dispatches_in_flight,
        }
    }

    pub fn observe(&self, outcome: &str, elapsed_seconds: f64) {
        self.dispatches_total.with_label_values(&[outcome]).inc();
        self.dispatch_latency_seconds
            .with_label_values(&[outcome])
            .observe(elapsed_seconds);
    }

    pub fn encode(&self) -> Result<String, String> {
        let metric_families = self.registry.gather();
        let mut buffer = Vec::new();

        TextEncoder::new()
            .encode(&metric_families, &mut buffer)
            .map_err(|err| format!("failed to encode metrics: {err}"))?;

        String::from_utf8(buffer).map_err(|err| format!("metrics are not valid utf8: {err}"))
    }
}

impl Default for Metrics {
    fn default() -> Self {
        Self::new()
    }
}
