use anyhow::{Context, Result};
use clap::Parser;
use plinko_server::api::{Api, AppState};
use plinko_server::config::Args;
use plinko_server::game_loop::MarketLoop;
use plinko_server::ledger::WagerLedger;
use plinko_server::lease::LeaseManager;
use plinko_server::metrics::WsMetrics;
use plinko_server::payout::PayoutPipeline;
use plinko_server::rooms::Rooms;
use plinko_server::rtp::RtpTracker;
use plinko_server::session::RedisSessionStore;
use plinko_server::snapshot::RedisSnapshotProvider;
use plinko_server::store::RedisStore;
use plinko_server::wallet::HttpWalletGateway;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tracing::info;
use tracing_subscriber::filter::{EnvFilter, LevelFilter};
use uuid::Uuid;

fn init_tracing() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::builder()
                .with_default_directive(LevelFilter::INFO.into())
                .from_env_lossy(),
        )
        .init();
}

const ROOM_CAPACITY: usize = 256;

#[tokio::main]
async fn main() -> Result<()> {
    init_tracing();
    let args = Args::parse();
    let config = args
        .game_config()
        .map_err(anyhow::Error::msg)
        .context("invalid game configuration")?;

    let instance_id = Uuid::new_v4().to_string();
    info!(instance = %instance_id, markets = ?args.markets, "starting plinko engine");

    let store = Arc::new(
        RedisStore::connect(&args.redis_url)
            .await
            .context("redis connection failed")?,
    );
    let wallet = Arc::new(
        HttpWalletGateway::new(
            &args.wallet_base_url,
            &args.wallet_signature_secret,
            Duration::from_millis(args.wallet_timeout_ms),
        )
        .context("wallet client build failed")?,
    );
    let rooms = Arc::new(Rooms::new(ROOM_CAPACITY));
    let rtp = Arc::new(RtpTracker::new(
        store.clone(),
        config.threshold_playcount,
        config.limit_playcount,
    ));
    let payout = Arc::new(PayoutPipeline::new(
        store.clone(),
        wallet.clone(),
        rtp.clone(),
        rooms.clone(),
        args.game_name.clone(),
    ));
    let ledger = Arc::new(WagerLedger::new(
        store.clone(),
        wallet.clone(),
        rtp.clone(),
        args.game_name.clone(),
    ));
    let snapshots = Arc::new(RedisSnapshotProvider::new(store.clone()));
    let sessions = Arc::new(RedisSessionStore::new(store.clone()));
    let lease = Arc::new(LeaseManager::new(store.clone(), instance_id));

    for market in &args.markets {
        MarketLoop::new(
            market.clone(),
            config.clone(),
            store.clone(),
            snapshots.clone(),
            lease.clone(),
            rooms.clone(),
            payout.clone(),
            rtp.clone(),
        )
        .spawn();
    }

    let api = Api::new(Arc::new(AppState {
        markets: args.markets.clone(),
        store,
        sessions,
        ledger,
        rooms,
        metrics: Arc::new(WsMetrics::default()),
    }));

    let addr = SocketAddr::from((args.host, args.port));
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("bind failed on {addr}"))?;
    info!(%addr, "listening");
    axum::serve(listener, api.router())
        .await
        .context("server exited")?;
    Ok(())
}
