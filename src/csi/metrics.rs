use prometheus::{CounterVec, Encoder, Gauge, HistogramOpts, HistogramVec, Opts, Registry, TextEncoder};
use std::sync::Arc;

/// CSI metrics collector
pub struct CsiMetrics {
    /// Total CSI operations
    pub operations_total: CounterVec,
    /// CSI operation duration in seconds
    pub operation_duration: HistogramVec,
    /// CSI operation errors
    pub operation_errors: CounterVec,
    /// Volumes created minus volumes deleted since this process started.
    /// Negative when volumes from an earlier run are deleted.
    pub volume_count: Gauge,
    /// Exports created minus exports removed since this process started.
    /// Negative when exports from an earlier run are removed.
    pub export_count: Gauge,
    registry: Arc<Registry>,
}

impl CsiMetrics {
    pub fn new(registry: Arc<Registry>) -> Result<Self, prometheus::Error> {
        let operations_total = CounterVec::new(
            Opts::new("lvm_csi_operations_total", "Total CSI operations"),
            &["method"],
        )?;

        let operation_duration = HistogramVec::new(
            HistogramOpts::new(
                "lvm_csi_operation_duration_seconds",
                "CSI operation duration in seconds",
            ),
            &["method"],
        )?;

        let operation_errors = CounterVec::new(
            Opts::new("lvm_csi_operation_errors_total", "CSI operation errors"),
            &["method"],
        )?;

        let volume_count = Gauge::new(
            "lvm_csi_volume_count",
            "Logical volumes created minus deleted since process start",
        )?;

        let export_count = Gauge::new(
            "lvm_csi_export_count",
            "LUN exports created minus removed since process start",
        )?;

        registry.register(Box::new(operations_total.clone()))?;
        registry.register(Box::new(operation_duration.clone()))?;
        registry.register(Box::new(operation_errors.clone()))?;
        registry.register(Box::new(volume_count.clone()))?;
        registry.register(Box::new(export_count.clone()))?;

        Ok(Self {
            operations_total,
            operation_duration,
            operation_errors,
            volume_count,
            export_count,
            registry,
        })
    }

    /// Metrics backed by a private registry.
    pub fn unregistered() -> Result<Self, prometheus::Error> {
        Self::new(Arc::new(Registry::new()))
    }

    /// Record an operation
    pub fn record_operation(&self, method: &str, duration_secs: f64, success: bool) {
        self.operations_total.with_label_values(&[method]).inc();
        self.operation_duration.with_label_values(&[method]).observe(duration_secs);
        if !success {
            self.operation_errors.with_label_values(&[method]).inc();
        }
    }

    pub fn volume_created(&self) {
        self.volume_count.inc();
    }

    pub fn volume_deleted(&self) {
        self.volume_count.dec();
    }

    pub fn export_created(&self) {
        self.export_count.inc();
    }

    pub fn export_removed(&self) {
        self.export_count.dec();
    }

    /// Render the registry in the Prometheus text exposition format.
    pub fn render(&self) -> Result<String, prometheus::Error> {
        let mut buffer = Vec::new();
        TextEncoder::new().encode(&self.registry.gather(), &mut buffer)?;
        Ok(String::from_utf8_lossy(&buffer).into_owned())
    }
}
