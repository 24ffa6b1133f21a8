use anyhow::Result;
use config::Config;
use offgrid_controller::{api, config, controller, telemetry};
use tracing::{info, warn};

#[tokio::main]
async fn main() -> Result<()> {
    let cfg = Config::load()?;
    telemetry::init_tracing(&cfg.log);

    let app_state = controller::AppState::new(cfg.clone()).await?;

    if cfg.relay.reset_on_startup {
        if let Err(e) = app_state.controller.reset_relays().await {
            warn!(error = %e, "relay reset on startup failed");
        }
    }

    let app = api::router(app_state);
    let addr = cfg.server.socket_addr()?;

    if cfg.server.host == "0.0.0.0" {
        warn!("server binding to 0.0.0.0, the API is reachable from the network");
    }

    info!(
        %addr,
        channels = cfg.power.channels.len(),
        "starting off-grid channel controller"
    );

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(telemetry::shutdown_signal())
        .await?;

    warn!("shutdown complete");
    Ok(())
}
