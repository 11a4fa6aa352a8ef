//! The `clearbook` binary: read configuration, assemble the service, serve.

use std::sync::Arc;

use clearbook_channel::{ClearinghouseClient, SessionManager, StateSigner, WalletSigner};
use clearbook_engine::{BookRegistry, Ledger};
use clearbook_gateway::{Hub, Service, StructuralValidator};
use clearbook_market::{AutoLock, MarketBoard};
use clearbook_types::ServiceConfig;
use tokio::net::TcpListener;
use tokio::signal;
use tokio::sync::watch;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() {
    let _ = dotenvy::dotenv();

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    let config = match ServiceConfig::from_env() {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Failed to load config: {e}");
            std::process::exit(1);
        }
    };
    info!(version = clearbook_types::constants::VERSION, "clearbook starting");

    // Core components.
    let markets = Arc::new(MarketBoard::new());
    let books = Arc::new(BookRegistry::new());
    let ledger = Arc::new(Ledger::new());
    let hub = Arc::new(Hub::new());

    // The channel subsystem only comes up with a broker key configured.
    let sessions = if config.channel_enabled() {
        match connect_clearinghouse(&config).await {
            Ok(sessions) => {
                info!("clearinghouse connected and authenticated");
                Some(sessions)
            }
            Err(e) => {
                warn!(error = %e, "clearinghouse unavailable; running without channel updates");
                None
            }
        }
    } else {
        info!("no BROKER_PRIVATE_KEY set; channel subsystem disabled");
        None
    };

    let service = Service::new(
        config.clone(),
        Arc::clone(&markets),
        books,
        ledger,
        Arc::clone(&hub),
        sessions,
    );

    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    // Auto-lock sweep: TRADING -> LOCKED once resolves_at passes.
    tokio::spawn(AutoLock::new(markets).run(shutdown_rx.clone()));

    let listener = match TcpListener::bind(config.bind_addr()).await {
        Ok(listener) => listener,
        Err(e) => {
            error!(addr = %config.bind_addr(), error = %e, "failed to bind");
            std::process::exit(1);
        }
    };

    let push = tokio::spawn(clearbook_gateway::push::serve(
        listener,
        service.hub(),
        Arc::new(StructuralValidator),
        shutdown_rx,
    ));

    tokio::select! {
        result = push => {
            if let Ok(Err(e)) = result {
                error!(error = %e, "push channel failed");
            }
        }
        _ = signal::ctrl_c() => {
            info!("shutdown signal received");
        }
    }

    let _ = shutdown_tx.send(true);
    info!("clearbook stopped");
}

/// Dial, authenticate, and wrap the clearinghouse in a session manager.
async fn connect_clearinghouse(
    config: &ServiceConfig,
) -> clearbook_types::Result<Arc<SessionManager>> {
    let signer = Arc::new(WalletSigner::from_hex(&config.broker_private_key)?);
    info!(address = %signer.address(), "broker signer ready");

    let client = ClearinghouseClient::connect(&config.clearinghouse_url, signer.clone()).await?;
    client.authenticate().await?;

    Ok(Arc::new(SessionManager::new(
        client,
        signer,
        config.adjudicator_addr.clone(),
    )))
}
