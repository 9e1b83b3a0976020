use anyhow::{Result, bail};
use once_cell::sync::OnceCell;
use opentelemetry::propagation::TextMapCompositePropagator;
use opentelemetry::{KeyValue, global, trace::TracerProvider as _};
use opentelemetry_otlp::WithExportConfig;
use opentelemetry_sdk::{
    Resource,
    propagation::{BaggagePropagator, TraceContextPropagator},
    trace::{SdkTracerProvider, Tracer},
};
use std::{env::var, time::Duration};
use tracing::{Level, debug};
use tracing_subscriber::{EnvFilter, Registry, fmt, layer::SubscriberExt};
use ulid::Ulid;

const OTLP_ENDPOINT_ENV: &str = "OTEL_EXPORTER_OTLP_ENDPOINT";
const OTLP_EXPORT_TIMEOUT: Duration = Duration::from_secs(3);

static TRACER_PROVIDER: OnceCell<SdkTracerProvider> = OnceCell::new();

/// Resolve the collector address from `OTEL_EXPORTER_OTLP_ENDPOINT`.
///
/// Blank means tracing is off. The exporter speaks plaintext gRPC, so a bare
/// `host:port` becomes `http://host:port` and `https://` is refused.
fn otlp_endpoint(raw: Option<String>) -> Result<Option<String>> {
    let Some(raw) = raw else {
        return Ok(None);
    };
    let endpoint = raw.trim().trim_end_matches('/');
    if endpoint.is_empty() {
        return Ok(None);
    }
    if endpoint.starts_with("https://") {
        bail!("{OTLP_ENDPOINT_ENV}={endpoint}: TLS export is not supported, use http://");
    }
    if endpoint.starts_with("http://") {
        Ok(Some(endpoint.to_string()))
    } else {
        Ok(Some(format!("http://{endpoint}")))
    }
}

fn init_tracer(endpoint: &str) -> Result<Tracer> {
    let exporter = opentelemetry_otlp::SpanExporter::builder()
        .with_tonic()
        .with_endpoint(endpoint)
        .with_timeout(OTLP_EXPORT_TIMEOUT)
        .build()?;

    let instance_id = var("OTEL_SERVICE_INSTANCE_ID").unwrap_or_else(|_| Ulid::new().to_string());
    let resource = Resource::builder_empty()
        .with_attributes([
            KeyValue::new("service.name", env!("CARGO_PKG_NAME")),
            KeyValue::new("service.version", env!("CARGO_PKG_VERSION")),
            KeyValue::new("service.instance.id", instance_id),
        ])
        .build();

    let provider = SdkTracerProvider::builder()
        .with_batch_exporter(exporter)
        .with_resource(resource)
        .build();
    let tracer = provider.tracer(env!("CARGO_PKG_NAME"));

    global::set_tracer_provider(provider.clone());
    global::set_text_map_propagator(TextMapCompositePropagator::new(vec![
        Box::new(TraceContextPropagator::new()),
        Box::new(BaggagePropagator::new()),
    ]));
    let _ = TRACER_PROVIDER.set(provider);

    Ok(tracer)
}

/// Install the global subscriber: pretty stdout logs, plus OTLP span export
/// when `OTEL_EXPORTER_OTLP_ENDPOINT` is set.
///
/// # Errors
///
/// Returns an error for an unusable endpoint or if a subscriber is already set.
pub fn init(verbosity_level: Option<Level>) -> Result<()> {
    let filter = EnvFilter::builder()
        .with_default_directive(verbosity_level.unwrap_or(Level::ERROR).into())
        .from_env_lossy()
        .add_directive("hyper=error".parse()?)
        .add_directive("tokio=error".parse()?)
        .add_directive("sqlx=warn".parse()?)
        .add_directive("opentelemetry_sdk=warn".parse()?);

    let fmt_layer = fmt::layer()
        .with_target(false)
        .with_file(false)
        .with_line_number(false)
        .pretty();

    let otel_layer = match otlp_endpoint(var(OTLP_ENDPOINT_ENV).ok())? {
        Some(endpoint) => Some(tracing_opentelemetry::layer().with_tracer(init_tracer(&endpoint)?)),
        None => None,
    };

    let subscriber = Registry::default()
        .with(fmt_layer)
        .with(otel_layer)
        .with(filter);
    tracing::subscriber::set_global_default(subscriber)?;

    Ok(())
}

/// Flush and stop the span exporter, if one was started.
pub fn shutdown_tracer() {
    if let Some(provider) = TRACER_PROVIDER.get() {
        debug!("shutting down tracer provider");
        if let Err(err) = provider.shutdown() {
            debug!("tracer provider shutdown failed: {err}");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn endpoint(raw: &str) -> Option<String> {
        otlp_endpoint(Some(raw.to_string())).ok().flatten()
    }

    #[test]
    fn bare_host_defaults_to_plaintext() {
        assert_eq!(
            endpoint("collector:4317").as_deref(),
            Some("http://collector:4317")
        );
        assert_eq!(
            endpoint("collector.chirpy.dev:4317/").as_deref(),
            Some("http://collector.chirpy.dev:4317")
        );
    }

    #[test]
    fn http_endpoint_is_kept() {
        assert_eq!(
            endpoint("http://localhost:4317").as_deref(),
            Some("http://localhost:4317")
        );
    }

    #[test]
    fn https_endpoint_is_refused() {
        assert!(otlp_endpoint(Some("https://collector:4317".to_string())).is_err());
    }

    #[test]
    fn unset_or_blank_disables_export() {
        assert!(matches!(otlp_endpoint(None), Ok(None)));
        assert!(matches!(otlp_endpoint(Some("  ".to_string())), Ok(None)));
    }

    #[test]
    fn shutdown_without_provider_is_a_noop() {
        shutdown_tracer();
    }
}
