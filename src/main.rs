use anyhow::Result;
use axum::routing::get;
use dotenv::dotenv;
use futures::future::join_all;
use sqlx::postgres::PgPoolOptions;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tokio::signal;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use evm_holder_indexer::api::{self, AppState};
use evm_holder_indexer::config::Settings;
use evm_holder_indexer::db::{self, parse_address, IndexerStore, PgStore};
use evm_holder_indexer::eth_rpc::EthRpcClient;
use evm_holder_indexer::holders::HolderQueryEngine;
use evm_holder_indexer::indexer::{ChainPoller, StatusBoard};
use evm_holder_indexer::metrics;

/// After a shutdown signal, pollers get this long to finish their in-flight
/// batch before the process exits unconditionally.
const DRAIN_TIMEOUT: Duration = Duration::from_secs(30);

#[tokio::main]
async fn main() -> Result<()> {
    dotenv().ok();

    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "info".into()),
        ))
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting ERC-20 holder indexer");

    let settings = Settings::new()?;
    let chains = Arc::new(settings.chains());
    info!(
        chains = chains.iter().count(),
        "configuration loaded"
    );

    let prometheus_handle = metrics::setup_metrics_recorder();

    let pool = PgPoolOptions::new()
        .max_connections(settings.database.max_connections)
        .min_connections(settings.database.min_connections)
        .connect(&settings.database.url)
        .await?;
    db::schema::initialize_database(&pool).await?;
    info!("database initialized");

    let store: Arc<PgStore> = Arc::new(PgStore::new(pool));

    for (chain_id, token) in &settings.indexer.seed_tokens {
        if !chains.is_supported(*chain_id) {
            warn!(
                chain_id = *chain_id,
                token = %token,
                "seed token references unsupported chain, skipping"
            );
            continue;
        }
        match parse_address(token) {
            Some(address) => {
                store.enqueue_reindex(*chain_id, address, None).await?;
                info!(chain_id = *chain_id, token = %token, "seed token enqueued");
            }
            None => warn!(
                chain_id = *chain_id,
                token = %token,
                "seed token address is malformed, skipping"
            ),
        }
    }

    let status = StatusBoard::new();
    let cancel = CancellationToken::new();

    let mut poller_handles = Vec::new();
    for chain in chains.iter() {
        let rpc = EthRpcClient::new(
            chain.rpc_url.clone(),
            EthRpcClient::min_delay_for(chain.qps, settings.indexer.rpc_min_delay_ms),
        );
        let poller = ChainPoller::new(
            chain.clone(),
            settings.poller_settings(chain),
            Arc::new(rpc),
            store.clone(),
            status.clone(),
            cancel.child_token(),
        );
        poller_handles.push(tokio::spawn(poller.run()));
    }

    if settings.indexer.once {
        for handle in poller_handles {
            handle.await??;
        }
        info!("single pass finished, exiting");
        return Ok(());
    }

    let engine = HolderQueryEngine::new(store.clone(), store.clone(), chains.clone());
    let state = Arc::new(AppState {
        engine,
        store: store.clone(),
        chains: chains.clone(),
        status: status.clone(),
    });

    let app = api::create_router(state).route(
        "/metrics",
        get(move || async move {
            let rendered = prometheus_handle.render();
            (
                [(axum::http::header::CONTENT_TYPE, "text/plain; version=0.0.4")],
                rendered,
            )
        }),
    );

    let addr: SocketAddr =
        format!("{}:{}", settings.application.host, settings.application.port).parse()?;
    info!("listening on {}", addr);

    let listener = TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    // Signal received: stop the pollers and give them a bounded window to
    // finish any in-flight transaction.
    cancel.cancel();
    match tokio::time::timeout(DRAIN_TIMEOUT, join_all(poller_handles)).await {
        Ok(results) => {
            for result in results {
                if let Err(e) = result? {
                    error!(error = %e, "poller exited with error during drain");
                }
            }
            info!("all pollers drained, shutting down");
        }
        Err(_) => warn!("drain timeout exceeded, exiting anyway"),
    }

    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    info!("shutdown signal received");
}
