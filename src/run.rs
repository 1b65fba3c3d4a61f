//! Main entrypoint for running Driftfield

use std::sync::Arc;

use clap::Parser as _;
use color_eyre::eyre::{ContextCompat as _, Result};
use tracing_subscriber::{layer::SubscriberExt as _, util::SubscriberInitExt as _, Layer as _};

use crate::cli_args::CliArgs;
use crate::input::Input;
use crate::renderer::Renderer;
use crate::shared_state::SharedState;

/// A fully built frame on its way to the renderer.
pub(crate) enum FrameUpdate {
    /// A frame of the particle field.
    FieldSurface(crate::surface::Surface),
}

/// Commands to control the various tasks/threads
#[non_exhaustive]
#[derive(Clone, Debug)]
pub(crate) enum Protocol {
    /// The entire application is exiting.
    End,
    /// User's TTY is resized.
    Resize {
        /// Width of new terminal.
        width: u16,
        /// Height of new terminal.
        height: u16,
    },
    /// A fresh mouse position sample, in half-block pixel coordinates.
    Pointer {
        /// Horizontal pixel coordinate.
        x: f32,
        /// Vertical pixel coordinate.
        y: f32,
    },
}

/// Main entrypoint
pub(crate) async fn run(state_arc: &std::sync::Arc<SharedState>) -> Result<()> {
    let protocol_tx = state_arc.protocol_tx.clone();
    let cli_args = setup(state_arc).await?;

    let (renderer_handle, surfaces_tx) =
        Renderer::start(Arc::clone(state_arc), protocol_tx.clone());

    let pointer_interval = state_arc.config.read().await.pointer_interval_ms;
    let input_thread_handle = Input::start(protocol_tx.clone(), pointer_interval);

    let field_result = crate::field::main::ParticleField::start(
        protocol_tx.clone(),
        surfaces_tx,
        Arc::clone(state_arc),
        cli_args.seed,
    )
    .await;
    tracing::debug!("🏁 left the particle field loop, exiting Driftfield...");
    broadcast_protocol_end(&protocol_tx);

    if input_thread_handle.is_finished() {
        // The STDIN loop blocks on `read()`, so it can't always exit its loop on `End`.
        // Therefore we should only join it if it finished of its own accord.
        input_thread_handle
            .join()
            .map_err(|err| color_eyre::eyre::eyre!("STDIN handle: {err:?}"))??;
    }
    renderer_handle.await??;
    field_result?;

    tracing::trace!("Leaving Driftfield's main `run()` function");
    Ok(())
}

/// Signal all task/thread loops to exit.
///
/// We keep it in its own function because we need to handle the error separately. If the error
/// were to be bubbled with `?` as usual, there's a chance it would never be logged, because the
/// protocol end signal is itself what allows the central error handler to even be reached.
pub(crate) fn broadcast_protocol_end(protocol_tx: &tokio::sync::broadcast::Sender<Protocol>) {
    tracing::debug!("Broadcasting the protocol `End` message to all listeners");
    let result = protocol_tx.send(Protocol::End);
    if let Err(error) = result {
        tracing::error!("{error:?}");
    }
}

/// Prepare the application to start.
async fn setup(state: &std::sync::Arc<SharedState>) -> Result<CliArgs> {
    let cli_args = CliArgs::parse();

    let mut main_config_file = state.main_config_file.write().await;
    (*main_config_file).clone_from(&cli_args.main_config);
    drop(main_config_file);

    let directory_result =
        crate::config::Config::setup_directory(cli_args.config_dir.clone(), state).await;
    if let Err(directory_error) = directory_result {
        color_eyre::eyre::bail!("Error setting up config directory: {directory_error:?}");
    }

    let config_result = crate::config::Config::load_config_into_shared_state(state).await;
    if let Err(config_error) = config_result {
        let path = crate::config::Config::main_config_path(state).await;
        color_eyre::eyre::bail!(
            "Bad config file: {config_error:?}\n\nConfig path: {}",
            path.display()
        );
    }

    apply_cli_overrides(&cli_args, state).await;
    setup_logging(cli_args.clone(), state).await?;

    tracing::info!("Starting Driftfield");
    tracing::debug!("Loaded config: {:?}", state.config.read().await);

    let tty_size = crate::renderer::Renderer::get_users_tty_size()?;
    state
        .set_tty_size(tty_size.cols.try_into()?, tty_size.rows.try_into()?)
        .await;

    Ok(cli_args)
}

/// CLI arguments take precedence over the config file.
async fn apply_cli_overrides(cli_args: &CliArgs, state: &std::sync::Arc<SharedState>) {
    let mut config = state.config.write().await;
    if let Some(density) = cli_args.density {
        config.density = density;
    }
    if let Some(frame_rate) = cli_args.frame_rate {
        config.frame_rate = frame_rate;
    }
    if cli_args.non_interactive {
        config.interactive = false;
    }
}

/// Setup logging
async fn setup_logging(cli_args: CliArgs, state: &std::sync::Arc<SharedState>) -> Result<()> {
    let are_log_filters_manually_set = std::env::var("DRIFTFIELD_LOG").is_ok();
    let mut path = state.config.read().await.log_path.clone();

    if let Some(cli_override_path) = cli_args.log_path {
        path = cli_override_path;
    }

    let mut level = state.config.read().await.log_level.clone();
    if let Some(cli_override_level) = cli_args.log_level {
        level = cli_override_level;
    }
    let level_as_string = format!("{level:?}").to_lowercase();

    let is_loggable =
        !matches!(level, crate::config::LogLevel::Off) || are_log_filters_manually_set;

    if !is_loggable {
        return Ok(());
    }

    let directory = path.parent().context("Couldn't get log path's parent")?;
    std::fs::create_dir_all(directory)?;
    let file = std::fs::File::create(path)?;

    let filters = if are_log_filters_manually_set {
        if let Ok(user_filters) = std::env::var("DRIFTFIELD_LOG") {
            std::env::set_var("RUST_LOG", user_filters);
        }

        tracing_subscriber::EnvFilter::builder()
            .with_default_directive("error".parse()?)
            .from_env_lossy()
    } else {
        tracing_subscriber::EnvFilter::builder()
            .with_default_directive("off".parse()?)
            .from_env_lossy()
            .add_directive(format!("driftfield={level_as_string}").parse()?)
    };

    let logfile_layer = tracing_subscriber::fmt::layer()
        .with_writer(file)
        .with_filter(filters);

    tracing_subscriber::registry().with(logfile_layer).init();

    let mut is_logging = state.is_logging.write().await;
    *is_logging = true;
    drop(is_logging);

    Ok(())
}
