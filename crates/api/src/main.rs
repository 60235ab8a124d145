use anyhow::Context;

use orderdesk_infra::AppConfig;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    orderdesk_observability::init();

    let config = AppConfig::from_env().context("invalid configuration")?;
    tracing::info!(
        app_env = %config.app_env,
        inventory_url = %config.inventory.base_url,
        inventory_check_on_create = config.inventory_check_on_create,
        "starting order service"
    );

    let app = orderdesk_api::app::build_app(&config)
        .await
        .context("failed to assemble services")?;

    let addr = config.listen_addr();
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("failed to bind {addr}"))?;

    tracing::info!("listening on {}", listener.local_addr()?);

    axum::serve(listener, app).await?;
    Ok(())
}
