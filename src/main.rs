//!
//! ChargePal fleet controller service.
//! Reads configuration from TOML file (~/.config/chargepal-fleet/config.toml).

use std::sync::Arc;

use tracing::{error, info, warn};

use chargepal_fleet::application::battery::LogPublisher;
use chargepal_fleet::application::{BatteryCommunicator, Planner, PlannerConfig, StationPicker};
use chargepal_fleet::infrastructure::database::plan;
use chargepal_fleet::{
    create_rpc_router, default_config_path, init_plan_database, AppConfig, AppState, LiveStore,
    LiveStoreConfig, ShutdownSignal,
};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // ── Load configuration ─────────────────────────────────────
    let config_path = std::env::var("CHARGEPAL_CONFIG")
        .map(std::path::PathBuf::from)
        .unwrap_or_else(|_| default_config_path());
    let config = match AppConfig::load(&config_path) {
        Ok(config) => {
            tracing_subscriber::fmt()
                .with_env_filter(
                    tracing_subscriber::EnvFilter::try_from_default_env()
                        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&config.logging.level)),
                )
                .init();
            info!("Configuration loaded from {}", config_path.display());
            config
        }
        Err(e) => {
            tracing_subscriber::fmt()
                .with_env_filter(tracing_subscriber::EnvFilter::new("info"))
                .init();
            warn!("Failed to load config: {}. Using defaults.", e);
            AppConfig::default()
        }
    };

    info!("Starting ChargePal fleet controller...");

    // ── Live database bridge ───────────────────────────────────
    let live = Arc::new(
        LiveStore::connect(&LiveStoreConfig {
            mysql_url: config.live_database.mysql_url.clone(),
            sqlite_path: config.live_database.sqlite_path.clone(),
        })
        .await?,
    );

    if config.planner.clear_bookings_on_start {
        warn!("Development mode: clearing bookings table");
        live.delete_bookings().await?;
    }

    // ── Planning store ─────────────────────────────────────────
    let plan_db = match init_plan_database(&config.plan_database_url()).await {
        Ok(db) => db,
        Err(e) => {
            error!("Failed to open planning store: {}", e);
            return Err(e.into());
        }
    };

    let env_infos = live.fetch_env_infos().await?;
    info!(
        robots = env_infos.get("robot_names").map(Vec::len).unwrap_or(0),
        carts = env_infos.get("cart_names").map(Vec::len).unwrap_or(0),
        "Parking area environment info received"
    );
    let robot_infos = live
        .fetch_by_first_header("robot_info", &["name", "robot_location"])
        .await?;
    let cart_infos = live
        .fetch_by_first_header("cart_info", &["name", "cart_location"])
        .await?;
    plan::seed_from_live(&plan_db, &env_infos, &robot_infos, &cart_infos).await?;
    info!("Planning store seeded");

    // ── Planner and RPC surface ────────────────────────────────
    let picker = Arc::new(StationPicker::new());
    let planner_config = PlannerConfig {
        update_interval: config.update_interval(),
        robot_job_duration: config.robot_job_duration(),
    };
    let (planner, handle) = Planner::new(
        live.clone(),
        plan_db.clone(),
        picker.clone(),
        planner_config,
    );

    let battery = Arc::new(BatteryCommunicator::new(live.clone(), Arc::new(LogPublisher)));

    let shutdown = ShutdownSignal::new();
    shutdown.listen_for_os_signals();

    let state = AppState {
        handle,
        live: live.clone(),
        plan: plan_db.clone(),
        picker,
        battery,
        logs_dir: config.logs_dir(),
        rpc_lock: Arc::new(tokio::sync::Mutex::new(())),
    };
    let router = create_rpc_router(state);

    let address = format!("{}:{}", config.server.host, config.server.port);
    let listener = tokio::net::TcpListener::bind(&address).await?;
    info!("RPC server listening on http://{}", address);

    let rpc_shutdown = shutdown.clone();
    let rpc_server = axum::serve(listener, router).with_graceful_shutdown(async move {
        rpc_shutdown.wait().await;
        info!("RPC server received shutdown signal");
    });

    let planner_task = tokio::spawn(planner.run(shutdown.clone()));
    let rpc_task = tokio::spawn(async move { rpc_server.await });

    // The planner only returns early on an invariant violation; the
    // process then exits for external supervision to restart it.
    tokio::select! {
        result = planner_task => {
            match result {
                Ok(Ok(())) => info!("Planner finished"),
                Ok(Err(e)) => {
                    error!("Planner error: {}", e);
                    shutdown.trigger();
                    return Err(e.into());
                }
                Err(e) => error!("Planner task panicked: {}", e),
            }
        }
        result = rpc_task => {
            match result {
                Ok(Ok(())) => info!("RPC server stopped"),
                Ok(Err(e)) => error!("RPC server error: {}", e),
                Err(e) => error!("RPC server task panicked: {}", e),
            }
        }
    }

    shutdown.trigger();
    if let Err(e) = plan_db.close().await {
        warn!("Error closing planning store: {}", e);
    }
    info!("ChargePal fleet controller shutdown complete");
    Ok(())
}
