use std::fs::OpenOptions;
use std::sync::Mutex;
use tracing_subscriber::EnvFilter;

/// Sends `tracing` output to `path`, the terminal belongs to the UI.
///
/// The filter comes from `RUST_LOG` and defaults to `info`.
pub fn init(path: &str) -> color_eyre::Result<()> {
    let file = OpenOptions::new().create(true).append(true).open(path)?;

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(Mutex::new(file))
        .with_ansi(false)
        .try_init()
        .map_err(|e| color_eyre::eyre::eyre!("Failed to initialize logging: {}", e))?;

    Ok(())
}
