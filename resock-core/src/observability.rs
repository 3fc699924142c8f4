//! Logging, tracing and metrics bootstrap
//!
//! resock logs through the `tracing` crate and records metrics through the
//! global OpenTelemetry meter. Neither does anything until a subscriber and
//! a meter provider are installed; [`init_observability`] installs both:
//!
//! - an `EnvFilter` driven by `RUST_LOG` (or [`ObservabilityConfig::log_level`])
//! - a JSON `fmt` layer for local structured logs
//! - an OTLP/gRPC span exporter bridged through `tracing-opentelemetry`
//! - an OTLP/gRPC metric exporter on a 30 second periodic reader
//!
//! Applications that already own their subscriber can skip this module and
//! resock will log into whatever is installed.
//!
//! ```rust,no_run
//! use resock_core::ObservabilityConfig;
//!
//! #[tokio::main]
//! async fn main() {
//!     let config = ObservabilityConfig::new("ticker-feed")
//!         .with_endpoint("http://localhost:4317")
//!         .with_log_level("debug");
//!
//!     resock_core::init_observability(config).expect("Failed to init observability");
//!
//!     // ... run the application ...
//!
//!     resock_core::shutdown_observability();
//! }
//! ```

use opentelemetry::{global, KeyValue};
use opentelemetry_otlp::WithExportConfig;
use opentelemetry_sdk::Resource;
use std::time::Duration;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

type InitResult<T> = Result<T, Box<dyn std::error::Error + Send + Sync>>;

/// Observability configuration
///
/// Defaults read `OTEL_EXPORTER_OTLP_ENDPOINT` and `RUST_LOG`, falling back
/// to `http://localhost:4317` and `info`.
#[derive(Debug, Clone)]
pub struct ObservabilityConfig {
    /// Service name attached to every span and metric
    pub service_name: String,
    /// Service version attached to every span and metric
    pub service_version: String,
    /// OTLP collector endpoint (gRPC)
    pub otlp_endpoint: String,
    /// Export spans to the collector
    pub enable_traces: bool,
    /// Export metrics to the collector
    pub enable_metrics: bool,
    /// Emit JSON logs on stdout
    pub enable_logs: bool,
    /// `EnvFilter` directive used when `RUST_LOG` is unset
    pub log_level: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            service_name: "resock".to_string(),
            service_version: env!("CARGO_PKG_VERSION").to_string(),
            otlp_endpoint: std::env::var("OTEL_EXPORTER_OTLP_ENDPOINT")
                .unwrap_or_else(|_| "http://localhost:4317".to_string()),
            enable_traces: true,
            enable_metrics: true,
            enable_logs: true,
            log_level: std::env::var("RUST_LOG").unwrap_or_else(|_| "info".to_string()),
        }
    }
}

impl ObservabilityConfig {
    /// Create a configuration for the named service, other fields default
    pub fn new(service_name: impl Into<String>) -> Self {
        Self {
            service_name: service_name.into(),
            ..Default::default()
        }
    }

    /// Set the OTLP collector endpoint
    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.otlp_endpoint = endpoint.into();
        self
    }

    /// Set the fallback log filter
    pub fn with_log_level(mut self, level: impl Into<String>) -> Self {
        self.log_level = level.into();
        self
    }

    /// Set the service version
    pub fn with_version(mut self, version: impl Into<String>) -> Self {
        self.service_version = version.into();
        self
    }

    /// Enable or disable span export
    pub fn with_traces(mut self, enable: bool) -> Self {
        self.enable_traces = enable;
        self
    }

    /// Enable or disable metric export
    pub fn with_metrics(mut self, enable: bool) -> Self {
        self.enable_metrics = enable;
        self
    }

    /// Enable or disable local JSON logs
    pub fn with_logs(mut self, enable: bool) -> Self {
        self.enable_logs = enable;
        self
    }

    fn resource(&self) -> Resource {
        Resource::builder_empty()
            .with_attributes(vec![
                KeyValue::new(
                    opentelemetry_semantic_conventions::resource::SERVICE_NAME,
                    self.service_name.clone(),
                ),
                KeyValue::new(
                    opentelemetry_semantic_conventions::resource::SERVICE_VERSION,
                    self.service_version.clone(),
                ),
            ])
            .build()
    }
}

/// Install the tracing subscriber and the OpenTelemetry providers
///
/// Call once, early. A second call fails because the global subscriber is
/// already set.
pub fn init_observability(config: ObservabilityConfig) -> InitResult<()> {
    let tracer = if config.enable_traces {
        Some(init_tracer(&config)?)
    } else {
        None
    };

    if config.enable_metrics {
        init_metrics(&config)?;
    }

    init_tracing_subscriber(&config, tracer)?;

    tracing::info!(
        service_name = %config.service_name,
        otlp_endpoint = %config.otlp_endpoint,
        traces = config.enable_traces,
        metrics = config.enable_metrics,
        logs = config.enable_logs,
        "Observability initialized"
    );

    Ok(())
}

fn init_tracer(config: &ObservabilityConfig) -> InitResult<opentelemetry_sdk::trace::Tracer> {
    use opentelemetry::trace::TracerProvider as _;
    use opentelemetry_sdk::trace::{RandomIdGenerator, Sampler};

    let exporter = opentelemetry_otlp::SpanExporter::builder()
        .with_tonic()
        .with_endpoint(config.otlp_endpoint.clone())
        .build()?;

    let provider = opentelemetry_sdk::trace::SdkTracerProvider::builder()
        .with_batch_exporter(exporter)
        .with_resource(config.resource())
        .with_sampler(Sampler::AlwaysOn)
        .with_id_generator(RandomIdGenerator::default())
        .build();

    // The subscriber layer needs a tracer before the provider goes global
    let tracer = provider.tracer(config.service_name.clone());
    global::set_tracer_provider(provider);

    Ok(tracer)
}

fn init_metrics(config: &ObservabilityConfig) -> InitResult<()> {
    let exporter = opentelemetry_otlp::MetricExporter::builder()
        .with_tonic()
        .with_endpoint(config.otlp_endpoint.clone())
        .build()?;

    let reader = opentelemetry_sdk::metrics::PeriodicReader::builder(exporter)
        .with_interval(Duration::from_secs(30))
        .build();

    let provider = opentelemetry_sdk::metrics::SdkMeterProvider::builder()
        .with_reader(reader)
        .with_resource(config.resource())
        .build();

    global::set_meter_provider(provider);
    Ok(())
}

fn init_tracing_subscriber(
    config: &ObservabilityConfig,
    tracer: Option<opentelemetry_sdk::trace::Tracer>,
) -> InitResult<()> {
    let env_filter =
        EnvFilter::try_from_default_env().or_else(|_| EnvFilter::try_new(&config.log_level))?;

    let telemetry_layer = tracer.map(|tracer| tracing_opentelemetry::layer().with_tracer(tracer));

    let fmt_layer = config.enable_logs.then(|| {
        tracing_subscriber::fmt::layer()
            .with_target(true)
            .with_thread_ids(true)
            .with_line_number(true)
            .json()
    });

    tracing_subscriber::registry()
        .with(telemetry_layer)
        .with(env_filter)
        .with(fmt_layer)
        .try_init()?;

    Ok(())
}

/// Flush and release the telemetry pipeline
///
/// The 0.30 SDK providers flush on drop, so this only marks the shutdown in
/// the logs. Safe to call more than once.
pub fn shutdown_observability() {
    tracing::info!("Observability shut down");
}
