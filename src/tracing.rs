//! Logging and distributed tracing setup
//!
//! Console output always goes through `tracing-subscriber`. When an OTLP
//! endpoint is configured, spans are also exported to a collector:
//!
//! ```text
//! devbot → OTLP (gRPC) → OTel Collector → Tempo / Jaeger
//! ```
//!
//! Every agent turn opens an `agent_turn` span carrying a UUIDv7 `trace_id`;
//! `model_call` and `tool_call` spans nest under it.

use opentelemetry::KeyValue;
use opentelemetry_otlp::WithExportConfig;
use opentelemetry_sdk::{runtime, trace as sdktrace, Resource};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer};

use crate::config::LogFormat;

/// Filter used when `RUST_LOG` is unset
const DEFAULT_FILTER: &str = "info,devbot=debug";

/// Initialize the tracing subsystem
///
/// # Arguments
/// * `service_name` - Name for the service in exported traces
/// * `otlp_endpoint` - Collector URL; `None` disables export
/// * `format` - Plain text or JSON lines on stderr
///
/// # Example
/// ```ignore
/// init_tracing("devbot", None, LogFormat::Text)?;
/// ```
pub fn init_tracing(
    service_name: &str,
    otlp_endpoint: Option<&str>,
    format: LogFormat,
) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let otel_layer = match otlp_endpoint {
        Some(endpoint) => {
            let exporter = opentelemetry_otlp::new_exporter()
                .tonic()
                .with_endpoint(endpoint);

            let tracer = opentelemetry_otlp::new_pipeline()
                .tracing()
                .with_exporter(exporter)
                .with_trace_config(sdktrace::Config::default().with_resource(Resource::new(
                    vec![
                        KeyValue::new("service.name", service_name.to_string()),
                        KeyValue::new("service.version", env!("CARGO_PKG_VERSION")),
                    ],
                )))
                .install_batch(runtime::Tokio)?;

            Some(tracing_opentelemetry::layer().with_tracer(tracer))
        }
        None => None,
    };

    // Logs go to stderr so they never interleave with REPL replies on stdout
    let fmt_layer = match format {
        LogFormat::Text => tracing_subscriber::fmt::layer()
            .with_writer(std::io::stderr)
            .with_target(true)
            .with_file(false)
            .with_line_number(false)
            .boxed(),
        LogFormat::Json => tracing_subscriber::fmt::layer()
            .json()
            .with_writer(std::io::stderr)
            .with_current_span(true)
            .boxed(),
    };

    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER));

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt_layer)
        .with(otel_layer)
        .try_init()?;

    tracing::info!(
        service = service_name,
        otlp = otlp_endpoint.unwrap_or("disabled"),
        "tracing initialized"
    );

    Ok(())
}

/// Flush pending spans to the collector
pub fn shutdown_tracing() {
    opentelemetry::global::shutdown_tracer_provider();
    tracing::info!("tracing shutdown complete");
}

/// Fresh time-ordered trace id
pub fn new_trace_id() -> String {
    uuid::Uuid::now_v7().to_string()
}
