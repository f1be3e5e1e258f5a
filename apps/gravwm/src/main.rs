mod core;
mod ewmh;
mod window;

use std::path::{Path, PathBuf};

use anyhow::{anyhow, Result};
use clap::Parser;
use gravwm_config::Config;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;
use x11rb::connection::Connection;
use x11rb::errors::{ConnectionError, ReplyError};

use crate::core::context::Context;
use crate::ewmh::setup::{acquire_wm_selection, setup_hints, teardown_hints, Support};
use crate::window::error::ErrorCategory;
use crate::window::hooks::{HookArgs, HookEvent};
use crate::window::manager::{LoopExit, WindowManager};

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Replace the existing window manager
    #[arg(long)]
    replace: bool,

    /// Configuration file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Log at debug level unless RUST_LOG says otherwise
    #[arg(short, long)]
    debug: bool,

    /// X display to manage
    #[arg(long)]
    display: Option<String>,
}

async fn load_config(path: &Path) -> Result<Config> {
    Config::load(path).await.map_err(|e| anyhow!("{}: {}", path.display(), e))
}

/// Lost connections end the window manager, everything else is survivable
fn is_fatal(error: &anyhow::Error) -> bool {
    if error.downcast_ref::<ConnectionError>().is_some() {
        return true;
    }
    matches!(error.downcast_ref::<ReplyError>(), Some(ReplyError::ConnectionError(_)))
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let level = if args.debug { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level)))
        .init();

    info!("Starting gravwm...");

    let config_path = args.config.clone().unwrap_or_else(Config::default_path);
    let config = load_config(&config_path).await?;

    let ctx = match Context::new(args.display.as_deref(), config.options.modifier) {
        Ok(ctx) => ctx,
        Err(e) => {
            error!("Failed to connect to X11 server: {}", e);
            return Err(e);
        }
    };
    info!("Screen: {}, Root Window: {:#x}", ctx.screen_num, ctx.root_window);

    let selection_window = acquire_wm_selection(&ctx, args.replace)?;
    ctx.select_root_events()
        .map_err(|e| anyhow!("Cannot redirect root window events, is another WM running? {}", e))?;
    let check_window = setup_hints(&ctx)?;
    let support = Support { check_window, selection_window };

    let mut wm = WindowManager::new(ctx, &config)?;
    wm.hooks.add(
        HookEvent::TileWeight,
        Box::new(|args| {
            if let HookArgs::Weight { window, weight } = args {
                info!("Tile weight of {:#x} set to {}%", window, weight);
            }
        }),
    );
    wm.start()?;

    let existing = wm.backend.scan()?;
    wm.adopt(&existing)?;
    info!("Managing {} windows", wm.registry.len());

    loop {
        match wm.run() {
            Ok(LoopExit::Quit) => break,
            Ok(LoopExit::Reload) => match load_config(&config_path).await {
                Ok(config) => {
                    if let Err(e) = wm.reload(&config) {
                        error!("Reload failed: {}", e);
                    } else {
                        info!("Reloaded configuration from {}", config_path.display());
                    }
                }
                Err(e) => warn!("Keeping current configuration: {}", e),
            },
            Err(e) if is_fatal(&e) => {
                error!("Fatal X11 error - server disconnected: {}", e);
                return Err(e);
            }
            Err(e) => wm.error_tracker.record_x11_error("event loop (continuing)", e),
        }
    }

    info!("Shutting down");
    wm.teardown()?;
    wm.error_tracker
        .warn_if_failed(teardown_hints(&wm.backend, &support), "teardown", ErrorCategory::X11);
    wm.backend.conn.flush()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[tokio::test]
    async fn test_missing_config_uses_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config = load_config(&dir.path().join("absent.toml")).await.unwrap();
        assert_eq!(config, Config::default());
    }

    #[tokio::test]
    async fn test_invalid_config_names_the_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[colors]\nfocus = \"not a color\"").unwrap();
        let err = load_config(file.path()).await.unwrap_err();
        assert!(err.to_string().contains(&file.path().display().to_string()));
    }

    #[test]
    fn test_connection_errors_are_fatal() {
        assert!(is_fatal(&anyhow::Error::from(ConnectionError::UnknownError)));
        assert!(is_fatal(&anyhow::Error::from(ReplyError::ConnectionError(ConnectionError::UnknownError))));
        assert!(!is_fatal(&anyhow!("BadWindow")));
    }

    #[test]
    fn test_args_parse() {
        let args = Args::parse_from(["gravwm", "--replace", "-d", "--config", "/tmp/wm.toml"]);
        assert!(args.replace);
        assert!(args.debug);
        assert_eq!(args.config, Some(PathBuf::from("/tmp/wm.toml")));
        assert_eq!(args.display, None);
    }
}
