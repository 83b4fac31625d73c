use anyhow::{Context, Result};
use clap::Parser;
use tokio_util::sync::CancellationToken;
use tracing::info;
use tracing_subscriber::EnvFilter;

use fileferry::cli::DaemonOpts;
use fileferry::net::server::Server;

fn main() -> Result<()> {
    let opts = DaemonOpts::parse();

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();

    if !opts.root.exists() {
        anyhow::bail!("root directory does not exist: {}", opts.root.display());
    }
    if !opts.root.is_dir() {
        anyhow::bail!("root path is not a directory: {}", opts.root.display());
    }

    let rt = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .context("failed to build tokio runtime")?;

    rt.block_on(async {
        let server = Server::bind(&opts.bind, &opts.root).await?;
        info!(bind = %opts.bind, "ferryd listening");

        let shutdown = CancellationToken::new();
        let trigger = shutdown.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                info!("interrupt received, shutting down");
                trigger.cancel();
            }
        });

        server.run(shutdown).await?;
        Ok::<(), anyhow::Error>(())
    })?;

    info!("ferryd exited cleanly");
    Ok(())
}
