mod editors;
mod error;
mod handlers;
mod router;
mod sessions;
mod settings;
mod state;

use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use market_data::clients::http::build_client;
use market_data::clients::{Notifier, Telegram};
use market_data::{
    rules, Clock, EventBus, FatalSwitch, RuleContext, SystemClock, TradingCalendar,
    SERVICE_VERSION,
};
use persistence::{Backup, DocumentStore, MemoryStore};
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};
use tracing_subscriber::filter::LevelFilter;
use tracing_subscriber::EnvFilter;

use router::create_router;
use settings::Settings;
use state::AppState;

const SESSION_SWEEP_PERIOD: Duration = Duration::from_secs(60);

#[tokio::main]
async fn main() -> ExitCode {
    init_tracing();

    match run().await {
        Ok(code) => code,
        Err(err) => {
            error!(error = ?err, "service failed");
            ExitCode::FAILURE
        }
    }
}

fn init_tracing() {
    let filter = EnvFilter::builder()
        .with_default_directive(LevelFilter::INFO.into())
        .from_env_lossy();
    tracing_subscriber::fmt().with_env_filter(filter).init();
}

async fn run() -> anyhow::Result<ExitCode> {
    let settings = Settings::build().context("can't load settings")?;
    info!(version = SERVICE_VERSION, "starting market data service");

    let store: Arc<dyn DocumentStore> = Arc::new(MemoryStore::new());
    let backup = Arc::new(Backup::new(
        Arc::clone(&store),
        settings.dump_path(),
        settings.db.keep_dumps,
    ));
    let restored = backup.restore_all().await.context("can't restore dumps")?;
    info!(restored, "collections restored");

    let http = build_client(settings.http.request_timeout).context("can't build http client")?;
    let token = CancellationToken::new();
    let fatal = FatalSwitch::new(token.clone());
    let notifier = settings.telegram.as_ref().map(|telegram| {
        Arc::new(Telegram::new(
            http.clone(),
            settings.sources.telegram.clone(),
            telegram.token.clone(),
            telegram.chat_id.clone(),
        )) as Arc<dyn Notifier>
    });
    let clock: Arc<dyn Clock> = Arc::new(SystemClock);
    let calendar = TradingCalendar::default();

    let ctx = RuleContext {
        store: Arc::clone(&store),
        http,
        sources: settings.sources.clone(),
        clock: Arc::clone(&clock),
        calendar,
        timeout: settings.rules.timeout,
        backup_timeout: settings.rules.backup_timeout,
        tick: settings.rules.tick,
        backup: backup.clone(),
        notifier,
        fatal: fatal.clone(),
    };
    let bus = EventBus::new(rules::all(&ctx).context("can't build rules")?);

    let state = AppState::new(store, clock, calendar, Arc::new(bus.publisher()));
    let app = create_router(state.clone());
    let listener = TcpListener::bind(settings.server.addr)
        .await
        .with_context(|| format!("can't bind {}", settings.server.addr))?;
    info!(addr = %settings.server.addr, "listening");

    tokio::spawn(shutdown_signal(token.clone()));
    tokio::spawn(state.sweep_sessions(SESSION_SWEEP_PERIOD, token.clone()));

    let server = {
        let token = token.clone();
        async move {
            let served = axum::serve(listener, app)
                .with_graceful_shutdown(token.clone().cancelled_owned())
                .await;
            token.cancel();
            served
        }
    };
    let (served, drained) = tokio::join!(server, bus.run(token.clone()));

    let mut code = ExitCode::SUCCESS;
    if let Err(err) = served {
        error!(%err, "http server failed");
        code = ExitCode::FAILURE;
    }
    if let Err(err) = drained {
        error!(%err, "event bus failed");
        code = ExitCode::FAILURE;
    }
    match backup.dump_all().await {
        Ok(count) => info!(count, "collections dumped"),
        Err(err) => {
            error!(%err, "can't dump collections");
            code = ExitCode::FAILURE;
        }
    }
    if let Some(reason) = fatal.reason() {
        error!(reason, "stopped after fatal error");
        code = ExitCode::FAILURE;
    }

    info!("market data service stopped");
    Ok(code)
}

/// Cancel `token` on SIGINT or SIGTERM.
async fn shutdown_signal(token: CancellationToken) {
    let ctrl_c = async {
        if let Err(err) = tokio::signal::ctrl_c().await {
            warn!(%err, "can't listen for ctrl-c");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{signal, SignalKind};

        match signal(SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(err) => {
                warn!(%err, "can't listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("SIGINT received"),
        _ = terminate => info!("SIGTERM received"),
        _ = token.cancelled() => return,
    }
    token.cancel();
}
