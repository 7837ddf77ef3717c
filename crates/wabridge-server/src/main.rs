//! Bridge server binary.
//!
//! Wires the session store, the gateway connector and the connection
//! manager together and serves the HTTP facade.

use std::{net::SocketAddr, path::PathBuf, sync::Arc};

use anyhow::Context;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use wabridge_connection::{ConnectionManager, ManagerConfig};
use wabridge_core::traits::SessionStore;
use wabridge_gateway::{GatewayConfig, WsConnector};
use wabridge_store::FsStore;

mod routes;

/// Which session-store variant this deployment uses.
enum StoreVariant {
    File,
    Postgres,
}

struct ServerConfig {
    port: u16,
    store: StoreVariant,
    session_dir: PathBuf,
    database_url: Option<String>,
    gateway_url: String,
}

impl ServerConfig {
    fn from_env() -> anyhow::Result<Self> {
        let port = std::env::var("PORT")
            .ok()
            .map(|p| p.parse())
            .transpose()
            .context("PORT must be a number")?
            .unwrap_or(8080);

        let store = match std::env::var("WABRIDGE_STORE").as_deref() {
            Ok("postgres") => StoreVariant::Postgres,
            Ok("file") | Err(_) => StoreVariant::File,
            Ok(other) => anyhow::bail!("unknown WABRIDGE_STORE variant: {other}"),
        };

        Ok(Self {
            port,
            store,
            session_dir: std::env::var("WABRIDGE_SESSION_DIR")
                .map_or_else(|_| PathBuf::from("./wa-session"), PathBuf::from),
            database_url: std::env::var("DATABASE_URL").ok(),
            gateway_url: std::env::var("WABRIDGE_GATEWAY_URL")
                .unwrap_or_else(|_| "http://127.0.0.1:8077".into()),
        })
    }
}

async fn open_store(config: &ServerConfig) -> anyhow::Result<Arc<dyn SessionStore>> {
    match config.store {
        StoreVariant::File => {
            let store = FsStore::open(config.session_dir.clone()).await?;
            tracing::info!("Session store: {}", store.dir().display());
            Ok(Arc::new(store))
        }
        StoreVariant::Postgres => {
            // a missing connection string is a startup-fatal
            // misconfiguration for this variant only
            let url = config
                .database_url
                .as_deref()
                .context("DATABASE_URL is required when WABRIDGE_STORE=postgres")?;
            open_postgres(url).await
        }
    }
}

#[cfg(feature = "postgres")]
async fn open_postgres(url: &str) -> anyhow::Result<Arc<dyn SessionStore>> {
    let store = wabridge_store::PgStore::connect(url).await?;
    tracing::info!("Session store: postgres");
    Ok(Arc::new(store))
}

#[cfg(not(feature = "postgres"))]
async fn open_postgres(_url: &str) -> anyhow::Result<Arc<dyn SessionStore>> {
    anyhow::bail!("built without postgres support")
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer())
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .init();

    let config = ServerConfig::from_env()?;
    let store = open_store(&config).await?;

    let connector = WsConnector::new(GatewayConfig::from_base(&config.gateway_url));
    let (manager, handle) = ConnectionManager::new(store, connector, ManagerConfig::default());
    manager.spawn();

    let app = routes::router(handle);

    let addr = SocketAddr::from(([0, 0, 0, 0], config.port));
    tracing::info!("Server listening on http://{addr}");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;
    Ok(())
}
