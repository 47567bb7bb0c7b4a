use anyhow::{Context, Result};
use opentelemetry::KeyValue;
use opentelemetry::trace::TracerProvider;
use opentelemetry_otlp::{Protocol, WithExportConfig};
use opentelemetry_sdk::{Resource, trace as sdktrace};
use opentelemetry_stdout::SpanExporter;
use std::borrow::Cow;
use tracing_opentelemetry::OpenTelemetryLayer;
use tracing_subscriber::filter::EnvFilter;
use tracing_subscriber::fmt;
use tracing_subscriber::{Registry, prelude::*};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SpanSink<'a> {
    /// No span export, logs only.
    Off,
    Stdout,
    Otlp(&'a str),
}

#[derive(Debug, Clone)]
pub struct Options<'a> {
    pub service_name: &'a str,
    /// `EnvFilter` directive used when `RUST_LOG` is not set.
    pub level: &'a str,
    /// plain | json | pretty
    pub format: &'a str,
    pub spans: SpanSink<'a>,
}

/// Keeps the tracer provider alive; call [`Telemetry::shutdown`] to flush.
pub struct Telemetry {
    provider: Option<sdktrace::SdkTracerProvider>,
}

impl Telemetry {
    pub fn shutdown(self) {
        if let Some(provider) = self.provider {
            if let Err(e) = provider.shutdown() {
                eprintln!("tracer provider shutdown failed: {e}");
            }
        }
    }
}

fn filter(level: &str) -> EnvFilter {
    EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(level))
        .unwrap_or_else(|_| EnvFilter::new("info"))
}

fn provider(service_name: &str, spans: SpanSink<'_>) -> Result<Option<sdktrace::SdkTracerProvider>> {
    let resource = Resource::builder()
        .with_service_name(Cow::Owned(service_name.to_string()))
        .with_attributes(vec![KeyValue::new("service.version", env!("CARGO_PKG_VERSION"))])
        .build();

    let provider = match spans {
        SpanSink::Off => return Ok(None),
        SpanSink::Otlp(endpoint) => {
            let exporter = opentelemetry_otlp::SpanExporter::builder()
                .with_http()
                .with_protocol(Protocol::HttpBinary)
                .with_endpoint(endpoint)
                .build()
                .with_context(|| format!("otlp exporter for {endpoint}"))?;
            sdktrace::SdkTracerProvider::builder()
                .with_batch_exporter(exporter)
                .with_resource(resource)
                .build()
        }
        SpanSink::Stdout => sdktrace::SdkTracerProvider::builder()
            .with_simple_exporter(SpanExporter::default())
            .with_resource(resource)
            .build(),
    };
    Ok(Some(provider))
}

/// Install the global subscriber: an env filter, a fmt layer writing to
/// stderr and, unless disabled, an OpenTelemetry layer.
pub fn init(options: &Options<'_>) -> Result<Telemetry> {
    let provider = provider(options.service_name, options.spans)?;
    let otel_layer = provider
        .as_ref()
        .map(|p| OpenTelemetryLayer::new(p.tracer(Cow::Owned(options.service_name.to_string()))));

    let filter = filter(options.level);
    let fmt_layer: Box<dyn tracing_subscriber::Layer<Registry> + Send + Sync> = match options.format {
        "json" => Box::new(
            fmt::layer()
                .json()
                .with_writer(std::io::stderr)
                .with_thread_ids(true)
                .with_thread_names(true)
                .with_filter(filter),
        ),
        "pretty" => Box::new(fmt::layer().pretty().with_writer(std::io::stderr).with_filter(filter)),
        _ => Box::new(fmt::layer().with_writer(std::io::stderr).with_filter(filter)),
    };

    let subscriber = Registry::default().with(fmt_layer).with(otel_layer);
    tracing::subscriber::set_global_default(subscriber).context("install tracing subscriber")?;
    Ok(Telemetry { provider })
}
