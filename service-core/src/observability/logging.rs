use opentelemetry::KeyValue;
use opentelemetry_otlp::WithExportConfig;
use opentelemetry_sdk::{Resource, runtime, trace as sdktrace};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Install the process-wide subscriber: env-filtered JSON logs to stdout
/// plus OTLP span export. Panics if the OTLP pipeline cannot be built;
/// a service without telemetry should not come up quietly.
pub fn init_tracing(service_name: &str, log_level: &str, otlp_endpoint: &str) {
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(log_level));

    let resource = Resource::new(vec![KeyValue::new(
        "service.name",
        service_name.to_string(),
    )]);

    let tracer = opentelemetry_otlp::new_pipeline()
        .tracing()
        .with_exporter(
            opentelemetry_otlp::new_exporter()
                .tonic()
                .with_endpoint(otlp_endpoint),
        )
        .with_trace_config(sdktrace::config().with_resource(resource))
        .install_batch(runtime::Tokio)
        .unwrap_or_else(|e| {
            panic!(
                "Failed to initialize OTLP tracer at '{}': {}",
                otlp_endpoint, e
            )
        });

    tracing_subscriber::registry()
        .with(env_filter)
        .with(tracing_opentelemetry::layer().with_tracer(tracer))
        .with(
            tracing_subscriber::fmt::layer()
                .with_file(true)
                .with_line_number(true)
                .json()
                .flatten_event(true),
        )
        .init();
}

/// Redact a session identifier for log output: keep a short recognizable
/// prefix plus a truncated digest so operators can correlate log lines
/// without the raw id ever reaching the logs.
pub fn redact_session_id(session_id: &str) -> String {
    use sha2::{Digest, Sha256};

    if session_id.len() < 8 {
        return "[redacted]".to_string();
    }
    let digest = hex::encode(Sha256::digest(session_id.as_bytes()));
    let prefix: String = session_id.chars().take(4).collect();
    format!("{}***{}", prefix, &digest[..8])
}
