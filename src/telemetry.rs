use once_cell::sync::Lazy;
use opentelemetry::{KeyValue, trace::TracerProvider as _};
use opentelemetry_otlp::{Protocol, WithExportConfig, WithTonicConfig};
use opentelemetry_sdk::{
    Resource,
    trace::{RandomIdGenerator, Sampler, SdkTracerProvider},
};
use opentelemetry_semantic_conventions::{
    SCHEMA_URL,
    attribute::{SERVICE_NAME, SERVICE_VERSION},
    resource::DEPLOYMENT_ENVIRONMENT_NAME,
};
use rocket::{
    Data, Request, Response,
    fairing::{Fairing, Info, Kind},
};
use std::sync::Mutex;
use std::time::Instant;
use tonic::metadata::MetadataMap;
use tracing::info_span;
use tracing_opentelemetry::OpenTelemetryLayer;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

static TELEMETRY_GUARD: Lazy<Mutex<Option<OtelGuard>>> = Lazy::new(|| Mutex::new(None));

pub struct TelemetryFairing;

#[rocket::async_trait]
impl Fairing for TelemetryFairing {
    fn info(&self) -> Info {
        Info {
            name: "OpenTelemetry",
            kind: Kind::Request | Kind::Response,
        }
    }

    async fn on_request(&self, request: &mut Request<'_>, _: &mut Data<'_>) {
        // Status and duration are declared up front so on_response can
        // record into the same span.
        let span = info_span!(
            "http_request",
            otel.name = format!("{} {}", request.method(), request.uri()),
            http.method = request.method().as_str(),
            http.uri = %request.uri(),
            http.route = request.route().map(|r| r.uri.to_string()),
            http.status_code = tracing::field::Empty,
            http.duration_ms = tracing::field::Empty,
        );

        request.local_cache(|| (span, Instant::now()));
    }

    async fn on_response<'r>(&self, request: &'r Request<'_>, response: &mut Response<'r>) {
        let (span, started) = request.local_cache(|| (info_span!("http_request"), Instant::now()));

        let elapsed_ms = started.elapsed().as_millis() as i64;
        let status = response.status().code;

        span.record("http.status_code", status);
        span.record("http.duration_ms", elapsed_ms);

        let _entered = span.enter();
        tracing::info!(status, elapsed_ms, "request completed");
    }
}

fn resource() -> Resource {
    let environment = std::env::var("APP_ENV").unwrap_or_else(|_| "dev".to_string());

    Resource::builder()
        .with_schema_url(
            [
                KeyValue::new(SERVICE_NAME, env!("CARGO_PKG_NAME")),
                KeyValue::new(SERVICE_VERSION, env!("CARGO_PKG_VERSION")),
                KeyValue::new(DEPLOYMENT_ENVIRONMENT_NAME, environment),
            ],
            SCHEMA_URL,
        )
        .build()
}

fn init_tracer_provider(api_key: &str) -> Result<SdkTracerProvider, anyhow::Error> {
    let mut metadata = MetadataMap::new();
    metadata.insert("x-honeycomb-team", api_key.parse()?);

    let exporter = opentelemetry_otlp::SpanExporter::builder()
        .with_tonic()
        .with_endpoint("https://api.honeycomb.io:443")
        .with_tls_config(tonic::transport::ClientTlsConfig::new().with_native_roots())
        .with_protocol(Protocol::Grpc)
        .with_metadata(metadata)
        .build()?;

    Ok(SdkTracerProvider::builder()
        .with_sampler(Sampler::AlwaysOn)
        .with_id_generator(RandomIdGenerator::default())
        .with_resource(resource())
        .with_batch_exporter(exporter)
        .build())
}

pub struct OtelGuard {
    tracer_provider: SdkTracerProvider,
}

impl Drop for OtelGuard {
    fn drop(&mut self) {
        if let Err(err) = self.tracer_provider.shutdown() {
            eprintln!("Tracer provider shutdown failed: {:?}", err);
        }
    }
}

/// Installs the tracing subscriber. Span export to Honeycomb is enabled only
/// when HONEYCOMB_API_KEY is set; the app runs fine without it.
pub fn init_tracing() {
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));

    let registry = tracing_subscriber::registry()
        .with(env_filter)
        .with(tracing_subscriber::fmt::layer());

    match std::env::var("HONEYCOMB_API_KEY") {
        Ok(api_key) if !api_key.is_empty() => match init_tracer_provider(&api_key) {
            Ok(tracer_provider) => {
                let tracer = tracer_provider.tracer(env!("CARGO_PKG_NAME"));
                registry.with(OpenTelemetryLayer::new(tracer)).init();

                if let Ok(mut guard) = TELEMETRY_GUARD.lock() {
                    *guard = Some(OtelGuard { tracer_provider });
                }
            }
            Err(err) => {
                registry.init();
                tracing::warn!("Span export disabled, exporter failed to build: {}", err);
            }
        },
        _ => {
            registry.init();
            tracing::debug!("HONEYCOMB_API_KEY not set, span export disabled");
        }
    }
}

pub fn shutdown_telemetry() {
    println!("Flushing telemetry before shutdown");

    // Dropping the guard shuts the provider down and flushes buffered spans
    let guard = TELEMETRY_GUARD.lock().unwrap().take();
    drop(guard);
}
