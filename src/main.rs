use std::{sync::Arc, time::Duration};

use pairwatch_api::{
    api::{create_router, AppState},
    config::Config,
    db::{create_pool, create_redis_client, Cache, PgSessionStore},
    embeddings::VectorStore,
    services::{
        providers::{
            CachedEmbeddingProvider, EmbeddingProvider, OpenAiEmbeddingProvider,
            OpenAiPreferenceExtractor,
        },
        Catalog, RecommendationEngine, SessionService,
    },
};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "pairwatch_api=info,tower_http=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = Config::from_env()?;
    let settings = config.recommendation_settings()?;

    let catalog = Arc::new(Catalog::load(&config.catalog_path)?);

    let http_client = reqwest::Client::builder()
        .timeout(Duration::from_secs(config.request_timeout_secs))
        .build()?;

    let openai: Arc<dyn EmbeddingProvider> = Arc::new(OpenAiEmbeddingProvider::new(
        http_client.clone(),
        config.openai_api_key.clone(),
        config.openai_api_url.clone(),
        config.embedding_model.clone(),
    ));

    // Query embeddings go through Redis only when it is configured
    let (embedder, cache_writer) = match &config.redis_url {
        Some(redis_url) => {
            let (cache, writer) = Cache::new(create_redis_client(redis_url)?).await;
            let cached: Arc<dyn EmbeddingProvider> = Arc::new(CachedEmbeddingProvider::new(
                openai,
                cache,
                config.embedding_model.clone(),
                config.embedding_cache_ttl,
            ));
            (cached, Some(writer))
        }
        None => {
            tracing::info!("REDIS_URL not set, query embeddings will not be cached");
            (openai, None)
        }
    };

    let extractor = Arc::new(OpenAiPreferenceExtractor::new(
        http_client,
        config.openai_api_key.clone(),
        config.openai_api_url.clone(),
        config.chat_model.clone(),
    ));

    let pool = create_pool(&config.database_url).await?;
    let store = Arc::new(PgSessionStore::new(pool));

    let engine = Arc::new(RecommendationEngine::new(
        catalog,
        embedder,
        VectorStore::new(&config.embeddings_cache_path),
        config.embedding_batch_size,
    ));
    let report = engine
        .initialize_embeddings(config.force_refresh_embeddings)
        .await?;
    if report.failed > 0 {
        tracing::warn!(
            failed = report.failed,
            "Some movies have no embeddings and will not be recommended"
        );
    }

    let sessions = Arc::new(SessionService::new(
        store,
        engine.clone(),
        extractor,
        settings,
    ));

    let app = create_router(AppState::new(engine, sessions));

    let addr = format!("{}:{}", config.host, config.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!("Server running on http://{}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            tokio::signal::ctrl_c().await.ok();
        })
        .await?;

    if let Some(writer) = cache_writer {
        writer.shutdown().await;
    }

    Ok(())
}
