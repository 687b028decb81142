use std::sync::Arc;

use anyhow::Context;

use stockrecon_api::app::{AppServices, build_app};
use stockrecon_infra::config::{HttpStoreConfig, ReconcileConfig};
use stockrecon_infra::remote::{HttpRecordStore, RecordStore};

const BIND_ENV: &str = "STOCKRECON_BIND";

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    stockrecon_observability::init();

    let config = ReconcileConfig::from_env().context("invalid reconciliation config")?;
    let store_config = HttpStoreConfig::from_env().context("invalid record store config")?;
    let remote: Arc<dyn RecordStore> =
        Arc::new(HttpRecordStore::new(&store_config).context("failed to build record store client")?);

    let services = Arc::new(AppServices::new(remote, config)?);
    let app = build_app(services);

    let bind = std::env::var(BIND_ENV).unwrap_or_else(|_| "0.0.0.0:8080".to_string());
    let listener = tokio::net::TcpListener::bind(&bind)
        .await
        .with_context(|| format!("failed to bind {bind}"))?;

    tracing::info!("listening on {}", listener.local_addr()?);

    axum::serve(listener, app).await?;
    Ok(())
}
