use std::sync::Arc;

use tokio::net::TcpListener;

use roomcast::config::Config;
use roomcast::db::events::SqliteEventStore;
use roomcast::db::rooms::SqliteMembership;
use roomcast::gateway::Gateway;
use roomcast::state::AppState;

/// Public broadcast group for background status updates.
const STATUS_ROOM: &str = "status";

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "roomcast=debug,tower_http=debug".into()),
        )
        .init();

    let config = Config::from_env();
    print_banner(&config);

    let db = roomcast::db::create_pool(&config.database_url)
        .await
        .expect("failed to create database pool");

    match roomcast::db::rooms::ensure_room(&db, STATUS_ROOM, "Status", true).await {
        Ok(true) => tracing::info!("created public room {STATUS_ROOM:?}"),
        Ok(false) => {}
        Err(e) => tracing::warn!("failed to ensure status room: {e:?}"),
    }

    match roomcast::db::auth::purge_expired_tokens(&db).await {
        Ok(0) => {}
        Ok(n) => tracing::info!("purged {n} expired token(s)"),
        Err(e) => tracing::warn!("failed to purge expired tokens: {e:?}"),
    }

    let gateway = Gateway::new(
        Arc::new(SqliteMembership::new(db.clone())),
        config.gateway.clone(),
    )
    .with_store(Arc::new(SqliteEventStore::new(db.clone())));

    let state = AppState {
        db,
        gateway: Arc::new(gateway),
        publish_key: config.publish_key.as_deref().map(Arc::from),
    };

    let app = roomcast::routes::router(state);

    let listener = TcpListener::bind(("0.0.0.0", config.port))
        .await
        .expect("failed to bind");

    let actual_port = listener
        .local_addr()
        .expect("failed to get local address")
        .port();
    eprintln!("  \x1b[32m-> listening on 0.0.0.0:{actual_port}\x1b[0m");
    eprintln!();

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .expect("server error");
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("failed to listen for shutdown signal: {e}");
        std::future::pending::<()>().await;
    }
    tracing::info!("shutting down");
}

fn print_banner(config: &Config) {
    let version = env!("CARGO_PKG_VERSION");
    let gateway = &config.gateway;

    eprintln!();
    eprintln!("  \x1b[1;36mroomcast\x1b[0m \x1b[2mv{version}\x1b[0m");
    eprintln!();
    eprintln!("  \x1b[2mport\x1b[0m         {}", config.port);
    eprintln!("  \x1b[2mdatabase\x1b[0m     {}", config.database_url);
    eprintln!(
        "  \x1b[2mauthorize\x1b[0m    {}ms timeout",
        gateway.authorize_timeout.as_millis()
    );
    eprintln!("  \x1b[2mqueue\x1b[0m        {} per session", gateway.outbound_capacity);
    eprintln!(
        "  \x1b[2mhistory\x1b[0m      {} (persist {})",
        gateway.history_limit,
        if gateway.persist_events { "on" } else { "off" }
    );

    if config.publish_key.is_none() {
        eprintln!();
        eprintln!("  \x1b[33m! ROOMCAST_PUBLISH_KEY unset, operator endpoints disabled\x1b[0m");
    }

    eprintln!();
}
