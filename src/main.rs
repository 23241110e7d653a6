use std::sync::Arc;

use anyhow::Context;
use tokio::sync::broadcast::error::RecvError;
use tracing_subscriber::EnvFilter;

use fleet_router::config::{Config, CostProviderConfig};
use fleet_router::coordinator::{RouteCoordinator, RouteDiff};
use fleet_router::haversine::HaversineMatrix;
use fleet_router::http::{AppState, router};
use fleet_router::memory::{FleetSeed, InMemoryFleet};
use fleet_router::osrm::OsrmClient;
use fleet_router::service::RouteService;
use fleet_router::tracker::LocationTracker;
use fleet_router::traits::PathCostProvider;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::from_filename("./.env.local").ok();
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let config = Config::from_env()?;

    let seed = match &config.seed_path {
        Some(path) => {
            let raw = std::fs::read_to_string(path)
                .with_context(|| format!("reading seed file {}", path.display()))?;
            serde_json::from_str::<FleetSeed>(&raw).context("parsing seed file")?
        }
        None => FleetSeed::default(),
    };
    let fleet = Arc::new(InMemoryFleet::from_seed(seed));

    let costs: Arc<dyn PathCostProvider> = match &config.cost_provider {
        CostProviderConfig::Haversine => Arc::new(HaversineMatrix),
        CostProviderConfig::Osrm(osrm) => {
            tracing::info!(base_url = %osrm.base_url, "using OSRM travel costs");
            Arc::new(OsrmClient::new(osrm.clone())?)
        }
    };
    let service = Arc::new(
        RouteService::new(fleet.clone(), fleet.clone(), costs).with_fetch_timeout(config.fetch_timeout),
    );

    // The tracked set is fixed at startup. A driver first seen through
    // `POST /drivers/{id}/location` is served by the on-demand route endpoint
    // but gets no live route until the next restart.
    let drivers = fleet.driver_ids();
    let tracker = LocationTracker::with_config(fleet.clone(), config.tracker.clone());
    let tracking = tracker.subscribe(drivers.clone()).await?;
    let coordinator = RouteCoordinator::with_config(service.clone(), config.coordinator.clone());
    let routes = coordinator.spawn(tracking.watch());

    let mut diffs = routes.subscribe_diffs();
    tokio::spawn(async move {
        loop {
            match diffs.recv().await {
                Ok(RouteDiff::Upserted { entity_id, route }) => tracing::info!(
                    entity_id = %entity_id,
                    stops = route.route.stop_ids.len(),
                    total_distance_km = ?route.route.total_distance_km,
                    "route updated"
                ),
                Ok(diff) => tracing::info!(entity_id = %diff.entity_id(), ?diff, "route changed"),
                Err(RecvError::Lagged(skipped)) => tracing::warn!(skipped, "route diff log lagged"),
                Err(RecvError::Closed) => break,
            }
        }
    });

    let app = router(AppState {
        routes: service,
        sink: fleet,
    });
    let listener = tokio::net::TcpListener::bind(config.listen_addr).await?;
    tracing::info!(addr = %config.listen_addr, drivers = drivers.len(), "fleet router listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            if let Err(err) = tokio::signal::ctrl_c().await {
                tracing::error!(error = %err, "failed to listen for shutdown signal");
                std::future::pending::<()>().await;
            }
        })
        .await?;

    tracing::info!("shutting down");
    routes.stop();
    tracking.unsubscribe();
    Ok(())
}
