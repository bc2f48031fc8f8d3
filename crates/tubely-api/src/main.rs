use tubely_core::Config;

// mimalloc holds up better than the system allocator under many concurrent
// multipart uploads, especially on musl-based container images.
#[global_allocator]
static GLOBAL: mimalloc::MiMalloc = mimalloc::MiMalloc;

#[tokio::main]
async fn main() -> Result<(), anyhow::Error> {
    // Load configuration
    let config = Config::from_env()?;

    // Initialize the application (telemetry, database, storage, routes)
    let (_state, router) = tubely_api::setup::initialize_app(config.clone()).await?;

    tubely_api::setup::server::start_server(&config, router).await?;

    Ok(())
}
