use anyhow::Result;
use opentelemetry::trace::TracerProvider as _;
use opentelemetry::KeyValue;
use opentelemetry_otlp::WithExportConfig;
use opentelemetry_sdk::runtime::Tokio;
use opentelemetry_sdk::trace::TracerProvider;
use opentelemetry_sdk::Resource;
use prometheus::Registry;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, Layer};

use crate::metrics;

const SERVICE_NAME: &str = "deals-api";
const DEFAULT_LOG_FILTER: &str = "deals_api=debug,api=debug,tower_http=debug";

pub struct Observability {
    pub registry: Registry,
    otel_enabled: bool,
}

pub fn build_registry() -> Result<Registry> {
    let registry = Registry::new_custom(Some("deals".into()), None)?;
    metrics::register_all(&registry)?;
    Ok(registry)
}

impl Observability {
    /// Prometheus registry plus the tracing subscriber.
    ///
    /// `LOG_FORMAT=json` switches to JSON lines. Spans are exported over OTLP
    /// only when `OTEL_EXPORTER_OTLP_ENDPOINT` is set.
    pub fn init() -> Result<Self> {
        let registry = build_registry()?;

        let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| DEFAULT_LOG_FILTER.into());

        let json = std::env::var("LOG_FORMAT")
            .map(|v| v.eq_ignore_ascii_case("json"))
            .unwrap_or(false);
        let fmt_layer = if json {
            tracing_subscriber::fmt::layer().json().boxed()
        } else {
            tracing_subscriber::fmt::layer().boxed()
        };

        let otel_endpoint = std::env::var("OTEL_EXPORTER_OTLP_ENDPOINT").ok();
        let otel_layer = match &otel_endpoint {
            Some(endpoint) => {
                let exporter = opentelemetry_otlp::SpanExporter::builder()
                    .with_tonic()
                    .with_endpoint(endpoint)
                    .build()?;

                let tracer_provider = TracerProvider::builder()
                    .with_batch_exporter(exporter, Tokio)
                    .with_resource(Resource::new(vec![KeyValue::new(
                        "service.name",
                        SERVICE_NAME,
                    )]))
                    .build();

                let tracer = tracer_provider.tracer(SERVICE_NAME);
                opentelemetry::global::set_tracer_provider(tracer_provider);
                Some(tracing_opentelemetry::layer().with_tracer(tracer))
            }
            None => None,
        };

        tracing_subscriber::registry()
            .with(env_filter)
            .with(fmt_layer)
            .with(otel_layer)
            .init();

        match &otel_endpoint {
            Some(endpoint) => {
                tracing::info!("Observability stack initialized (Prometheus + OTel → {})", endpoint)
            }
            None => tracing::info!("Observability stack initialized (Prometheus, OTel disabled)"),
        }

        Ok(Self {
            registry,
            otel_enabled: otel_endpoint.is_some(),
        })
    }

    pub fn shutdown(&self) {
        if self.otel_enabled {
            opentelemetry::global::shutdown_tracer_provider();
        }
    }
}
