use convertr_core::Config;

#[tokio::main]
async fn main() -> Result<(), anyhow::Error> {
    let config = Config::from_env()?;

    let (state, router, reaper) = convertr_api::setup::initialize_app(config.clone()).await?;

    convertr_api::setup::server::start_server(&config, router).await?;

    reaper.shutdown().await;
    tracing::info!(
        jobs = state.worker.jobs.len(),
        uploads = state.worker.uploads.len(),
        "Server stopped"
    );

    Ok(())
}
