use anyhow::{Context, Result};
use doc_gateway::{
    api, config, documents::DocumentService, inference::GradioClient, inference::InferenceClient,
    logging,
};
use std::{net::SocketAddr, sync::Arc};
use tokio::net::TcpListener;

const STARTUP_ECHO: &str = "Hello!!";

#[tokio::main]
async fn main() -> Result<()> {
    config::init_config();
    logging::init_tracing();
    let config = config::get_config();
    tracing::debug!(
        documents_dir = %config.documents_dir.display(),
        inference_space = %config.inference_space,
        metadata_write_mode = ?config.metadata_write_mode,
        server_port = config.server_port,
        "Loaded configuration"
    );

    let inference: Arc<dyn InferenceClient> = Arc::new(
        GradioClient::from_config(config).context("failed to build inference client")?,
    );
    let reply = inference
        .echo(STARTUP_ECHO)
        .await
        .context("inference service did not answer the startup echo")?;
    tracing::info!(space = %config.inference_space, reply = %reply, "Inference service reachable");

    let service = DocumentService::from_config(config, inference)
        .await
        .context("failed to prepare the uploads directory")?;
    let app = api::create_router(Arc::new(service), config.max_upload_bytes);

    let addr = SocketAddr::new(config.server_host, config.server_port);
    let listener = TcpListener::bind(addr)
        .await
        .with_context(|| format!("failed to bind {addr}"))?;
    tracing::info!("Listening on http://{}", addr);
    axum::serve(listener, app)
        .await
        .context("HTTP server terminated unexpectedly")?;
    Ok(())
}
