use crate::app::config::{FileRotation, LogSink, LoggingConfig, OtelProto};
use anyhow::{Context, Result, anyhow};
use chrono::Utc;
use opentelemetry::{KeyValue, global, trace::TracerProvider};
use opentelemetry_sdk::Resource;
use opentelemetry_sdk::metrics::{PeriodicReader, SdkMeterProvider};
use opentelemetry_sdk::propagation::TraceContextPropagator;
use opentelemetry_sdk::trace::{Sampler, SdkTracerProvider};
use std::collections::HashMap;
use std::path::Path;
use std::time::Duration;
use tracing::warn;
use tracing_appender::non_blocking::{NonBlocking, WorkerGuard};
use tracing_subscriber::fmt::format::{FmtSpan, Writer};
use tracing_subscriber::fmt::time::FormatTime;
use tracing_subscriber::layer::{Layer, SubscriberExt};
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, fmt};

type DynLayer = Box<dyn Layer<tracing_subscriber::Registry> + Send + Sync + 'static>;

struct CompactTime;

impl FormatTime for CompactTime {
    fn format_time(&self, w: &mut Writer<'_>) -> std::fmt::Result {
        write!(w, "{}", Utc::now().format("%Y-%m-%d %H:%M:%S"))
    }
}

/// Everything which must outlive the subscriber: otel providers
/// for flushing on shutdown, and the non blocking writer guards
pub struct Observability {
    tracer: Option<SdkTracerProvider>,
    meter: Option<SdkMeterProvider>,
    _guards: Vec<WorkerGuard>,
}

pub fn init(config: &LoggingConfig) -> Result<Observability> {
    config.validate()?;

    let crate_name = env!("CARGO_PKG_NAME");
    let filter = EnvFilter::from_default_env()
        .add_directive("warn".parse()?)
        .add_directive(format!("{}={}", crate_name, config.level).parse()?);

    let mut layers: Vec<DynLayer> = Vec::new();
    let mut guards = Vec::new();
    let mut tracer: Option<SdkTracerProvider> = None;
    let mut meter: Option<SdkMeterProvider> = None;

    for sink in &config.sinks {
        match sink {
            LogSink::Stdout { color, json, spans } => {
                let (writer, guard) = tracing_appender::non_blocking(std::io::stdout());
                guards.push(guard);
                layers.push(fmt_layer(writer, *json, *spans, *color));
            }
            LogSink::File {
                path,
                json,
                rotation,
                max_files,
                spans,
            } => {
                let (writer, guard) = create_file_writer(path, rotation, *max_files)?;
                guards.push(guard);
                layers.push(fmt_layer(writer, *json, *spans, false));
            }
            LogSink::Otel {
                endpoint,
                proto,
                metrics,
                metrics_interval,
                headers,
            } => {
                if tracer.is_some() {
                    return Err(anyhow!(
                        "Multiple OTLP sinks configured. Only one is currently supported."
                    ));
                }

                let (otel_layer, provider) =
                    create_otel_layer(endpoint, proto, headers, config.span_sample_rate)?;
                layers.push(otel_layer);
                tracer = Some(provider);

                if *metrics {
                    meter = Some(create_meter_provider(
                        endpoint,
                        proto,
                        headers,
                        *metrics_interval,
                    )?);
                }
            }
        }
    }

    tracing_subscriber::registry()
        .with(layers)
        .with(filter)
        .try_init()
        .context("failed to initialize tracing subscriber")?;

    if let Some(ref provider) = tracer {
        global::set_text_map_propagator(TraceContextPropagator::new());
        let _ = global::set_tracer_provider(provider.clone());
    }

    if let Some(ref provider) = meter {
        global::set_meter_provider(provider.clone());
    }

    Ok(Observability {
        tracer,
        meter,
        _guards: guards,
    })
}

/// Flushes and stops any otel exporters. Log writer guards
/// flush once the [`Observability`] value is dropped
pub fn shutdown(observability: &Observability) -> Result<()> {
    if let Some(meter) = &observability.meter {
        meter
            .shutdown()
            .context("failed to shutdown meter provider")?;
    }

    if let Some(tracer) = &observability.tracer {
        tracer
            .shutdown()
            .context("failed to shutdown tracer provider")?;
    }

    Ok(())
}

fn fmt_layer(writer: NonBlocking, json: bool, spans: bool, color: bool) -> DynLayer {
    let span_events = if spans {
        FmtSpan::NEW | FmtSpan::CLOSE
    } else {
        FmtSpan::NONE
    };

    if json {
        fmt::layer()
            .json()
            .with_writer(writer)
            .with_span_events(span_events)
            .boxed()
    } else {
        fmt::layer()
            .compact()
            .with_timer(CompactTime)
            .with_ansi(color)
            .with_writer(writer)
            .with_span_events(span_events)
            .boxed()
    }
}

fn create_file_writer(
    path: &Path,
    rotation: &FileRotation,
    max_files: usize,
) -> Result<(NonBlocking, WorkerGuard)> {
    let file_name = path
        .file_name()
        .and_then(|n| n.to_str())
        .ok_or_else(|| anyhow!("Invalid file name in path: {}", path.display()))?;

    let directory = path
        .parent()
        .ok_or_else(|| anyhow!("Invalid directory in path: {}", path.display()))?;

    if !directory.as_os_str().is_empty() {
        std::fs::create_dir_all(directory)
            .with_context(|| format!("failed to create log directory {}", directory.display()))?;
    }

    let file_appender = match rotation {
        FileRotation::Daily => tracing_appender::rolling::daily(directory, file_name),
        FileRotation::Hourly => tracing_appender::rolling::hourly(directory, file_name),
        FileRotation::Never => tracing_appender::rolling::never(directory, file_name),
    };

    cleanup_old_files(directory, file_name, max_files)?;

    Ok(tracing_appender::non_blocking(file_appender))
}

/// Removes all but the newest `max_files` files starting with `prefix`
fn cleanup_old_files(directory: &Path, prefix: &str, max_files: usize) -> Result<()> {
    if max_files == 0 {
        return Ok(());
    }

    let dir = if directory.as_os_str().is_empty() {
        Path::new(".")
    } else {
        directory
    };

    let mut files: Vec<_> = std::fs::read_dir(dir)?
        .filter_map(|entry| entry.ok())
        .filter(|entry| {
            entry
                .file_name()
                .to_str()
                .map(|name| name.starts_with(prefix))
                .unwrap_or(false)
        })
        .filter_map(|entry| {
            entry
                .metadata()
                .ok()
                .and_then(|meta| meta.modified().ok().map(|time| (entry.path(), time)))
        })
        .collect();

    if files.len() <= max_files {
        return Ok(());
    }

    files.sort_by(|a, b| b.1.cmp(&a.1));

    for (path, _) in files.iter().skip(max_files) {
        let _ = std::fs::remove_file(path);
    }

    Ok(())
}

fn resource() -> Resource {
    let service_name =
        std::env::var("OTEL_SERVICE_NAME").unwrap_or_else(|_| env!("CARGO_PKG_NAME").to_string());

    Resource::builder()
        .with_service_name(service_name)
        .with_attribute(KeyValue::new("service.version", env!("CARGO_PKG_VERSION")))
        .build()
}

fn create_otel_layer(
    endpoint: &str,
    proto: &OtelProto,
    headers: &HashMap<String, String>,
    sample_rate: f32,
) -> Result<(DynLayer, SdkTracerProvider)> {
    use opentelemetry_otlp::WithExportConfig;

    let exporter = match proto {
        OtelProto::Grpc => {
            warn_grpc_headers(headers);

            let mut builder = opentelemetry_otlp::SpanExporter::builder().with_tonic();
            if !endpoint.is_empty() {
                builder = builder.with_endpoint(endpoint);
            }

            builder
                .build()
                .context("failed to build OTLP gRPC span exporter")?
        }
        OtelProto::Http => build_http_span_exporter(endpoint, headers)?,
    };

    let sampler = Sampler::ParentBased(Box::new(Sampler::TraceIdRatioBased(sample_rate as f64)));

    let tracer_provider = SdkTracerProvider::builder()
        .with_sampler(sampler)
        .with_resource(resource())
        .with_batch_exporter(exporter)
        .build();

    let tracer = tracer_provider.tracer(env!("CARGO_PKG_NAME"));
    let layer = tracing_opentelemetry::layer().with_tracer(tracer).boxed();

    Ok((layer, tracer_provider))
}

fn create_meter_provider(
    endpoint: &str,
    proto: &OtelProto,
    headers: &HashMap<String, String>,
    interval: Duration,
) -> Result<SdkMeterProvider> {
    use opentelemetry_otlp::WithExportConfig;

    let exporter = match proto {
        OtelProto::Grpc => {
            let mut builder = opentelemetry_otlp::MetricExporter::builder().with_tonic();
            if !endpoint.is_empty() {
                builder = builder.with_endpoint(endpoint);
            }

            builder
                .build()
                .context("failed to build OTLP gRPC metric exporter")?
        }
        OtelProto::Http => build_http_metric_exporter(endpoint, headers)?,
    };

    let reader = PeriodicReader::builder(exporter)
        .with_interval(interval)
        .build();

    Ok(SdkMeterProvider::builder()
        .with_resource(resource())
        .with_reader(reader)
        .build())
}

fn warn_grpc_headers(headers: &HashMap<String, String>) {
    if !headers.is_empty() {
        warn!("OTLP headers are only applied to the http protocol, ignoring for grpc");
    }
}

#[cfg(feature = "otel-http")]
fn build_http_span_exporter(
    endpoint: &str,
    headers: &HashMap<String, String>,
) -> Result<opentelemetry_otlp::SpanExporter> {
    use opentelemetry_otlp::{WithExportConfig, WithHttpConfig};

    let mut builder = opentelemetry_otlp::SpanExporter::builder()
        .with_http()
        .with_headers(headers.clone());
    if !endpoint.is_empty() {
        builder = builder.with_endpoint(endpoint);
    }

    builder
        .build()
        .context("failed to build OTLP HTTP span exporter")
}

#[cfg(feature = "otel-http")]
fn build_http_metric_exporter(
    endpoint: &str,
    headers: &HashMap<String, String>,
) -> Result<opentelemetry_otlp::MetricExporter> {
    use opentelemetry_otlp::{WithExportConfig, WithHttpConfig};

    let mut builder = opentelemetry_otlp::MetricExporter::builder()
        .with_http()
        .with_headers(headers.clone());
    if !endpoint.is_empty() {
        builder = builder.with_endpoint(endpoint);
    }

    builder
        .build()
        .context("failed to build OTLP HTTP metric exporter")
}

#[cfg(not(feature = "otel-http"))]
fn build_http_span_exporter(
    _: &str,
    _: &HashMap<String, String>,
) -> Result<opentelemetry_otlp::SpanExporter> {
    Err(anyhow!(
        "OTLP HTTP exporter requested but the build does not enable the `otel-http` feature"
    ))
}

#[cfg(not(feature = "otel-http"))]
fn build_http_metric_exporter(
    _: &str,
    _: &HashMap<String, String>,
) -> Result<opentelemetry_otlp::MetricExporter> {
    Err(anyhow!(
        "OTLP HTTP exporter requested but the build does not enable the `otel-http` feature"
    ))
}
