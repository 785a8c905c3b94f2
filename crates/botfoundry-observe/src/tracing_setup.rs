//! Telemetry bootstrap for the bot factory.
//!
//! Installs the global `tracing` subscriber once at process start: an
//! `EnvFilter`, a structured fmt layer, and an optional OpenTelemetry
//! bridge. Span export is opt-in so local runs stay plain text.

use std::sync::OnceLock;

use opentelemetry::trace::TracerProvider as _;
use opentelemetry_sdk::trace::SdkTracerProvider;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::fmt::format::FmtSpan;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

/// Provider handle retained for the final flush in [`shutdown_tracing`].
static OTEL_PROVIDER: OnceLock<SdkTracerProvider> = OnceLock::new();

/// Install the global subscriber.
///
/// The filter honors `RUST_LOG` and falls back to `info`. The fmt layer
/// records targets and span close timings, which is where bot poll-loop
/// latency shows up. With `enable_otel`, spans are additionally bridged to
/// OpenTelemetry through the stdout exporter; swap in an OTLP exporter for
/// real deployments.
///
/// # Errors
///
/// Fails if a global subscriber is already installed.
pub fn init_tracing(enable_otel: bool) -> Result<(), Box<dyn std::error::Error>> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    let otel_layer = enable_otel.then(|| {
        let provider = SdkTracerProvider::builder()
            .with_simple_exporter(opentelemetry_stdout::SpanExporter::default())
            .build();
        let layer =
            tracing_opentelemetry::layer().with_tracer(provider.tracer("botfoundry"));
        let _ = OTEL_PROVIDER.set(provider.clone());
        opentelemetry::global::set_tracer_provider(provider);
        layer
    });

    tracing_subscriber::registry()
        .with(filter)
        .with(
            tracing_subscriber::fmt::layer()
                .with_target(true)
                .with_span_events(FmtSpan::CLOSE),
        )
        .with(otel_layer)
        .init();

    Ok(())
}

/// Flush buffered spans and shut the exporter down.
///
/// Call once before process exit. Without OTel enabled this is a no-op.
pub fn shutdown_tracing() {
    if let Some(provider) = OTEL_PROVIDER.get()
        && let Err(err) = provider.shutdown()
    {
        eprintln!("otel provider shutdown failed: {err}");
    }
}
