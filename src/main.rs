use std::sync::Arc;

use memoflow::auth::session::SessionStore;
use memoflow::config::ServerConfig;
use memoflow::http::{AppState, router};
use memoflow::memos::sweep::spawn_expiry_sweep;
use memoflow::memos::workflow::WorkflowService;
use memoflow::notify::{EmailConfig, Notifier};
use memoflow::store::{Database, LibSqlBackend};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Install rustls crypto provider before any TLS usage (SMTP)
    rustls::crypto::ring::default_provider()
        .install_default()
        .expect("Failed to install rustls crypto provider");

    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_target(false)
        .init();

    let config = ServerConfig::from_env();

    eprintln!("📄 Memoflow v{}", env!("CARGO_PKG_VERSION"));
    eprintln!("   API: http://0.0.0.0:{}/api", config.port);

    // ── Database ─────────────────────────────────────────────────────
    let db: Arc<dyn Database> = Arc::new(
        LibSqlBackend::new_local(&config.db_path)
            .await
            .unwrap_or_else(|e| {
                eprintln!(
                    "Error: Failed to open database at {}: {}",
                    config.db_path.display(),
                    e
                );
                std::process::exit(1);
            }),
    );
    eprintln!("   Database: {}", config.db_path.display());

    // ── Notifications ────────────────────────────────────────────────
    let email_config = EmailConfig::from_env();
    match &email_config {
        Some(email) => eprintln!("   Email: enabled (SMTP: {})", email.smtp_host),
        None => eprintln!("   Email: disabled (in-app notifications only)"),
    }
    let notifier = Arc::new(Notifier::new(Arc::clone(&db), email_config));

    // ── Workflow + sessions ──────────────────────────────────────────
    let workflow = Arc::new(WorkflowService::new(
        Arc::clone(&db),
        Arc::clone(&notifier),
    ));
    let sessions = Arc::new(SessionStore::new(config.session_ttl));

    // ── Expiry sweep ─────────────────────────────────────────────────
    let _sweep_handle = spawn_expiry_sweep(Arc::clone(&db), config.sweep_interval);
    eprintln!(
        "   Expiry sweep: every {}s",
        config.sweep_interval.as_secs()
    );

    // ── HTTP server ──────────────────────────────────────────────────
    let state = AppState {
        db,
        sessions,
        workflow,
    };
    let app = router(state);

    let listener = tokio::net::TcpListener::bind(format!("0.0.0.0:{}", config.port)).await?;
    tracing::info!(port = config.port, "Memo service started");
    axum::serve(listener, app).await?;

    Ok(())
}
