use std::{net::SocketAddr, sync::Arc};

use tokio::signal;
use tracing::{error, info, warn};

use zajel_api as api;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cfg = api::config::load_config()?;
    api::config::init_tracing(cfg.log_level(), cfg.log_json);

    // Init DB
    let db_pool = api::db::establish_connection_from_app_config(&cfg).await?;
    if cfg.auto_migrate {
        api::db::run_migrations(&db_pool).await.map_err(|e| {
            error!("Failed running migrations: {}", e);
            e
        })?;
    }
    let db_arc = Arc::new(db_pool);

    // Push delivery, with dead tokens cleared from the principal tables
    let token_store: Arc<dyn api::push::token_store::PushTokenStore> =
        Arc::new(api::push::token_store::DbPushTokenStore::new(db_arc.clone()));
    let dispatcher = Arc::new(api::push::build_dispatcher(&cfg.push, Some(token_store))?);

    // Init events
    let (event_sender, event_rx) = api::events::EventSender::channel(cfg.event_channel_capacity);
    let event_sender = Arc::new(event_sender);

    let services = api::handlers::AppServices::new(
        db_arc.clone(),
        Some(event_sender.clone()),
        dispatcher,
        &cfg,
    );

    // Notifications are produced off the request path
    let handler: Arc<dyn api::events::EventHandler> = services.notifications.clone();
    let event_worker = tokio::spawn(api::events::process_events(event_rx, handler));

    let app_state = api::AppState {
        db: db_arc,
        config: cfg.clone(),
        event_sender: Some(event_sender),
        services,
    };
    let app = api::app_router(app_state);

    // Bind and serve
    let addr: SocketAddr = format!("{}:{}", cfg.host, cfg.port).parse()?;
    info!("zajel-api listening on http://{}", addr);
    let listener = tokio::net::TcpListener::bind(addr).await?;

    axum::serve(listener, app.into_make_service())
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    // The router held the last senders; the worker drains what is queued and exits.
    if let Err(e) = event_worker.await {
        warn!(error = %e, "Event worker ended abnormally");
    }

    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!(error = %e, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{signal, SignalKind};

        match signal(SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                error!(error = %e, "Failed to install SIGTERM handler");
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
    info!("Shutdown signal received");
}
