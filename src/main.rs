// Aventyr Server - adventure editing, playback and archive API

use tokio::net::TcpListener;
use tracing::info;
use tracing_subscriber::EnvFilter;

use aventyr::{
    adventure_interface::create_adventure_router,
    app_state::AppState,
    config::Config,
    infrastructure::sqlite_database::database_file,
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let config = Config::from_env()?;

    // sqlite creates the file but not its directory
    if let Some(parent) = database_file(&config.database.url)
        .as_deref()
        .and_then(|path| path.parent())
        .filter(|parent| !parent.as_os_str().is_empty())
    {
        tokio::fs::create_dir_all(parent).await?;
    }
    tokio::fs::create_dir_all(config.media.upload_root()).await?;

    let app_state = AppState::new(config.clone()).await?;
    let app = create_adventure_router(app_state);

    let addr = config.server_address();
    let listener = TcpListener::bind(&addr).await?;
    info!("Aventyr server listening on http://{}", addr);
    info!(
        "Media root {} (uploads in {}, web assets in {})",
        config.media.system_path.display(),
        config.media.upload_dir,
        config.media.web_dir
    );

    axum::serve(listener, app).await?;
    Ok(())
}
