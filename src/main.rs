use std::net::SocketAddr;
use std::process::ExitCode;
use std::sync::Arc;

use tracing_subscriber::EnvFilter;

mod config;
mod detect;
mod error;
mod fetch;
mod labels;
mod model;
mod policy;
mod preprocess;
mod render;
mod routes;
mod upload;

use config::Config;
use fetch::ensure_model_exists;
use model::TensorFlowModel;
use routes::AppState;
use upload::UploadStore;

#[tokio::main]
async fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    match run().await {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            tracing::error!("{}", err);
            ExitCode::FAILURE
        }
    }
}

async fn run() -> Result<(), Box<dyn std::error::Error>> {
    let config = Config::from_env()?;

    ensure_model_exists(
        &config.model_path,
        config.model_url.as_deref(),
        config.model_token.as_deref(),
    )
    .await?;
    let model = TensorFlowModel::load(&config.model_path, &config.input_op, &config.output_op)?;

    let store = UploadStore::new(config.upload_dir.clone());
    store.ensure_dir()?;

    let state = Arc::new(AppState {
        classifier: Arc::new(model),
        store,
        body_limit_bytes: config.body_limit_bytes,
    });
    let app = routes::router(state);

    let addr = SocketAddr::from(([0, 0, 0, 0], config.port));
    tracing::info!("Listening on http://{}", addr);
    axum::Server::bind(&addr)
        .serve(app.into_make_service())
        .await?;

    Ok(())
}
