use anyhow::Context;
use eunion_stream::core::logging::init_tracing;
use eunion_stream::{EunionBuilder, ExchangeConfig};
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

#[cfg(feature = "env-file")]
fn load_config() -> anyhow::Result<ExchangeConfig> {
    ExchangeConfig::from_env_file("eunion").context("loading Eunion credentials")
}

#[cfg(not(feature = "env-file"))]
fn load_config() -> anyhow::Result<ExchangeConfig> {
    ExchangeConfig::from_env("eunion").context("loading Eunion credentials")
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_tracing("info");

    let config = load_config()?;
    let mut tracker = EunionBuilder::new()
        .with_config(config)
        .build_tracker()
        .context("building user stream tracker")?;

    let mut user_stream = tracker
        .take_user_stream()
        .context("user stream already taken")?;
    let cancel = CancellationToken::new();
    let mut handle = tracker.spawn(cancel.clone());

    let result = loop {
        tokio::select! {
            Some(message) = user_stream.recv() => {
                info!(%message, "user stream message");
            }
            result = &mut handle => break result.context("user stream task panicked")?,
            _ = tokio::signal::ctrl_c() => {
                info!("Shutting down user stream");
                cancel.cancel();
                break handle.await.context("user stream task panicked")?;
            }
        }
    };

    match result {
        Ok(()) => {}
        Err(e) if e.is_cancelled() => {}
        Err(e) => error!(error = %e, "User stream stopped"),
    }

    Ok(())
}
