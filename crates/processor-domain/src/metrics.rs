//! Prometheus metrics for the job pipeline.
//!
//! The metrics value is constructed against an injected registry and passed
//! into the pipeline explicitly, so tests can assert on a fresh instance per
//! run. Exposition for scraping is a side channel: callers encode the
//! registry with [`PipelineMetrics::encode_text`].

use prometheus::{Encoder, Histogram, HistogramOpts, IntCounter, Registry, TextEncoder};

use crate::error::{DomainError, DomainResult};

/// Buckets for end-to-end processing duration in seconds; the unit of work
/// itself is on the order of seconds
const PROCESSING_BUCKETS: &[f64] = &[0.1, 0.5, 1.0, 2.0, 3.0, 5.0, 10.0];

/// Counters and histograms observed by the pipeline
///
/// All members use interior mutability; the struct is `Clone` and safe to
/// share across tasks.
#[derive(Clone)]
pub struct PipelineMetrics {
    /// Messages fetched from the inbound queue, whatever their outcome
    jobs_processed: IntCounter,
    /// Jobs driven to COMPLETED with a completion event published
    jobs_completed: IntCounter,
    /// Transient failures (store or transport) that were rejected for
    /// redelivery
    processing_failures: IntCounter,
    /// Permanent rejections: unparseable bodies and contract violations
    validation_failures: IntCounter,
    /// End-to-end duration of successful processing
    processing_seconds: Histogram,
}

impl PipelineMetrics {
    /// Create the metric families and register them with `registry`
    pub fn new(registry: &Registry) -> DomainResult<Self> {
        let jobs_processed = IntCounter::new(
            "processor_jobs_processed_total",
            "Total messages consumed from the inbound queue",
        )
        .map_err(Self::registration_error)?;

        let jobs_completed = IntCounter::new(
            "processor_jobs_completed_total",
            "Total jobs successfully completed",
        )
        .map_err(Self::registration_error)?;

        let processing_failures = IntCounter::new(
            "processor_processing_failures_total",
            "Total transient processing failures rejected for redelivery",
        )
        .map_err(Self::registration_error)?;

        let validation_failures = IntCounter::new(
            "processor_validation_failures_total",
            "Total messages rejected permanently for parse or contract failures",
        )
        .map_err(Self::registration_error)?;

        let processing_seconds = Histogram::with_opts(
            HistogramOpts::new(
                "processor_job_processing_seconds",
                "End-to-end time spent processing a job",
            )
            .buckets(PROCESSING_BUCKETS.to_vec()),
        )
        .map_err(Self::registration_error)?;

        registry
            .register(Box::new(jobs_processed.clone()))
            .map_err(Self::registration_error)?;
        registry
            .register(Box::new(jobs_completed.clone()))
            .map_err(Self::registration_error)?;
        registry
            .register(Box::new(processing_failures.clone()))
            .map_err(Self::registration_error)?;
        registry
            .register(Box::new(validation_failures.clone()))
            .map_err(Self::registration_error)?;
        registry
            .register(Box::new(processing_seconds.clone()))
            .map_err(Self::registration_error)?;

        Ok(Self {
            jobs_processed,
            jobs_completed,
            processing_failures,
            validation_failures,
            processing_seconds,
        })
    }

    fn registration_error(e: prometheus::Error) -> DomainError {
        DomainError::Configuration(format!("failed to register metric: {e}"))
    }

    pub fn inc_processed(&self) {
        self.jobs_processed.inc();
    }

    pub fn inc_completed(&self) {
        self.jobs_completed.inc();
    }

    pub fn inc_processing_failures(&self) {
        self.processing_failures.inc();
    }

    pub fn inc_validation_failures(&self) {
        self.validation_failures.inc();
    }

    pub fn observe_processing_seconds(&self, seconds: f64) {
        self.processing_seconds.observe(seconds);
    }

    pub fn processed(&self) -> u64 {
        self.jobs_processed.get()
    }

    pub fn completed(&self) -> u64 {
        self.jobs_completed.get()
    }

    pub fn processing_failures(&self) -> u64 {
        self.processing_failures.get()
    }

    pub fn validation_failures(&self) -> u64 {
        self.validation_failures.get()
    }

    /// Encode every family registered on `registry` in Prometheus text
    /// format
    ///
    /// Library surface for whatever scrape side-channel embeds this
    /// pipeline; the processor binary itself deliberately exposes no
    /// metrics endpoint.
    pub fn encode_text(registry: &Registry) -> DomainResult<String> {
        let mut buffer = Vec::new();
        let encoder = TextEncoder::new();
        encoder
            .encode(&registry.gather(), &mut buffer)
            .map_err(|e| DomainError::Configuration(format!("failed to encode metrics: {e}")))?;
        String::from_utf8(buffer)
            .map_err(|e| DomainError::Configuration(format!("metrics output not UTF-8: {e}")))
    }
}
