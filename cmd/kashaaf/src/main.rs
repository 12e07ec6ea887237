//! # Kashaaf server
//!
//! Loads settings, picks the adapters for the configured backend, wires the
//! services and serves the HTTP API until SIGINT/SIGTERM.

#[cfg(not(feature = "web-axum"))]
compile_error!("the kashaaf binary needs the `web-axum` feature");

use std::sync::Arc;

use ai_adapters::GeminiClient;
use api_adapters::web::{self, AppState};
use api_adapters::Metrics;
use auth_adapters::{JwtIssuer, JwtVerifier, MemoryAuth};
use configs::{BackendKind, LogFormat, LogSettings, Settings};
use domains::{
    AnalysisModel, AnalysisRequestRepository, AuthAdmin, BlockRepository, CommentRepository, LikeRepository,
    MediaSource, MediaStorage, PostRepository, ProfileRepository, StatsRepository, StatsSubscriber,
};
use secrecy::ExposeSecret;
use services::{AccountService, AnalysisService, AttachmentPolicy, FeedService, LiveCounter, MediaService};
use storage_adapters::MemoryStore;
use tracing_subscriber::EnvFilter;

/// One adapter per port.
struct Backend {
    profiles:   Arc<dyn ProfileRepository>,
    auth:       Arc<dyn AuthAdmin>,
    posts:      Arc<dyn PostRepository>,
    likes:      Arc<dyn LikeRepository>,
    comments:   Arc<dyn CommentRepository>,
    blocks:     Arc<dyn BlockRepository>,
    stats:      Arc<dyn StatsRepository>,
    subscriber: Option<Arc<dyn StatsSubscriber>>,
    media:      Arc<dyn MediaStorage>,
    /// Set when `media` hands out URLs that this server has to answer.
    serve:      Option<Arc<dyn MediaSource>>,
    analyses:   Arc<dyn AnalysisRequestRepository>,
}

fn memory_backend(settings: &Settings) -> Backend {
    let store = Arc::new(MemoryStore::new(format!("http://{}/media", settings.server.bind_addr())));
    let issuer = JwtIssuer::new(settings.auth.jwt_secret.expose_secret().as_bytes(), settings.auth.token_ttl_secs);
    Backend {
        profiles:   store.clone(),
        auth:       Arc::new(MemoryAuth::new(issuer)),
        posts:      store.clone(),
        likes:      store.clone(),
        comments:   store.clone(),
        blocks:     store.clone(),
        stats:      store.clone(),
        subscriber: Some(store.clone()),
        media:      store.clone(),
        serve:      Some(store.clone()),
        analyses:   store,
    }
}

#[cfg(feature = "supabase")]
fn supabase_backend(settings: &Settings) -> anyhow::Result<Backend> {
    use auth_adapters::GoTrueAdmin;
    use storage_adapters::{SupabaseClient, SupabaseStore};

    let cfg = settings
        .supabase
        .as_ref()
        .ok_or_else(|| anyhow::anyhow!("backend = \"supabase\" requires a [supabase] section"))?;
    let client = SupabaseClient::new(&cfg.url, cfg.anon_key.clone(), cfg.service_role_key.clone(), cfg.timeout())?;
    let store = Arc::new(SupabaseStore::new(client.clone()));

    // No realtime client: the live counter polls.
    Ok(Backend {
        profiles:   store.clone(),
        auth:       Arc::new(GoTrueAdmin::new(client)),
        posts:      store.clone(),
        likes:      store.clone(),
        comments:   store.clone(),
        blocks:     store.clone(),
        stats:      store.clone(),
        subscriber: None,
        media:      store.clone(),
        serve:      None,
        analyses:   store,
    })
}

#[cfg(not(feature = "supabase"))]
fn supabase_backend(_settings: &Settings) -> anyhow::Result<Backend> {
    anyhow::bail!("this build has no Supabase support; rebuild with the `supabase` feature or set backend = \"memory\"")
}

fn analysis_model(settings: &Settings) -> anyhow::Result<Option<Arc<dyn AnalysisModel>>> {
    let Some(cfg) = &settings.gemini else {
        tracing::warn!("no [gemini] api_key configured; /api/ai/analyze will fail");
        return Ok(None);
    };
    let client = GeminiClient::new(cfg.api_key.clone(), cfg.timeout())?
        .with_model(&cfg.model)
        .with_base_url(&cfg.base_url);
    Ok(Some(Arc::new(client)))
}

fn init_tracing(log: &LogSettings) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&log.filter));
    let builder = tracing_subscriber::fmt().with_env_filter(filter);
    match log.format {
        LogFormat::Json => builder.json().init(),
        LogFormat::Pretty => builder.pretty().init(),
    }
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "could not listen for ctrl-c");
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "could not listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
    tracing::info!("shutdown signal received");
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let settings = Settings::load()?;
    init_tracing(&settings.log);

    let backend = match settings.backend {
        BackendKind::Supabase => supabase_backend(&settings)?,
        BackendKind::Memory => {
            tracing::warn!("using the in-memory backend; data is lost on restart");
            memory_backend(&settings)
        }
    };

    let policy = AttachmentPolicy { max_items: settings.feed.max_items, max_videos: settings.feed.max_videos };
    let media = MediaService::new(backend.media.clone(), policy);

    let counter = LiveCounter::spawn(backend.stats.clone(), backend.subscriber.clone(), settings.stats.poll_interval());

    let state = AppState {
        accounts: AccountService::new(backend.profiles.clone(), backend.auth.clone()),
        feed:     FeedService::new(
            backend.posts.clone(),
            backend.likes.clone(),
            backend.comments.clone(),
            backend.blocks.clone(),
            media,
            settings.feed.page_size,
        ),
        analysis: AnalysisService::new(backend.analyses.clone(), analysis_model(&settings)?, settings.analysis.max_frames),
        counter:  Arc::new(counter),
        tokens:   Arc::new(JwtVerifier::new(settings.auth.jwt_secret.expose_secret().as_bytes())),
        metrics:  Arc::new(Metrics::new()),
        media:    backend.serve.clone(),
    };

    let app = web::router(state, settings.server.body_limit_bytes());
    let addr = settings.server.bind_addr();
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!(%addr, backend = ?settings.backend, "kashaaf listening");

    axum::serve(listener, app).with_graceful_shutdown(shutdown_signal()).await?;
    Ok(())
}
