//! Crowdscout — Binary Entrypoint
//! Boots the Axum HTTP server, wiring the adapter registry, OCR pipeline,
//! repository, and result store into the search service.

use std::sync::Arc;

use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use crowdscout::adapters::registry::AdapterRegistry;
use crowdscout::api::{self, AppState};
use crowdscout::config::AppConfig;
use crowdscout::materialize::FileStore;
use crowdscout::metrics::Metrics;
use crowdscout::ocr::client::HttpOcrClient;
use crowdscout::ocr::OcrPipeline;
use crowdscout::renderer::remote::RemoteRenderer;
use crowdscout::repo::InMemoryRepository;
use crowdscout::search::SearchService;
use crowdscout::taxonomy::Taxonomy;

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().compact())
        .init();
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env in local/dev; no-op in prod environments.
    let _ = dotenvy::dotenv();
    init_tracing();

    let cfg = AppConfig::load()?;
    let taxonomy = Arc::new(Taxonomy::load()?);
    let renderer = Arc::new(RemoteRenderer::from_env());

    let registry = Arc::new(AdapterRegistry::new(
        renderer.clone(),
        cfg.scraper.clone(),
        taxonomy,
    ));
    let ocr_client = Arc::new(HttpOcrClient::new(&cfg.ocr));
    let pipeline = Arc::new(OcrPipeline::new(ocr_client, renderer, cfg.ocr.clone()));
    let repo = Arc::new(InMemoryRepository::new());
    let store = Arc::new(FileStore::new(&cfg.output.directory));

    let service = Arc::new(SearchService::new(registry, pipeline, repo, store));

    let metrics = Metrics::init(cfg.scraper.batch_size, cfg.ocr.force_enhance);
    let router = api::create_router(AppState::new(service)).merge(metrics.router());

    let port: u16 = std::env::var("PORT")
        .ok()
        .and_then(|p| p.parse().ok())
        .unwrap_or(3001);
    let listener = tokio::net::TcpListener::bind(("0.0.0.0", port)).await?;
    tracing::info!(port, "crowdscout listening");
    axum::serve(listener, router).await?;
    Ok(())
}
