//! All of the user config for Driftfield.

use color_eyre::eyre::ContextCompat as _;
use color_eyre::eyre::Result;

/// A copy of the default config file. It gets copied to the user's config folder the first time
/// they start Driftfield.
static DEFAULT_CONFIG: &str = include_str!("../default_config.toml");

/// The valid log levels. Based on our `tracing` crate.
#[derive(serde::Serialize, serde::Deserialize, clap::ValueEnum, Debug, Clone, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum LogLevel {
    /// Error
    Error,
    /// Warnings
    Warn,
    /// Info
    Info,
    /// Debug
    Debug,
    /// Trace
    Trace,
    /// No logging
    Off,
}

/// Managing user config.
#[derive(serde::Deserialize, Debug, Clone)]
#[serde(default)]
pub(crate) struct Config {
    /// The number of particles in the field.
    pub density: usize,
    /// Whether particles react to the mouse.
    pub interactive: bool,
    /// Target frame rate
    pub frame_rate: u32,
    /// The minimum interval between accepted mouse position samples. Pointer sampling is
    /// deliberately decoupled from the frame rate.
    pub pointer_interval_ms: u64,
    /// The maximum log level
    pub log_level: LogLevel,
    /// The location of the log file.
    pub log_path: std::path::PathBuf,
}

impl Default for Config {
    fn default() -> Self {
        let log_directory = match dirs::state_dir() {
            Some(directory) => directory,
            None => std::path::PathBuf::new().join("./"),
        };
        let log_path = log_directory.join("driftfield").join("driftfield.log");

        Self {
            density: 50,
            interactive: true,
            frame_rate: 60,
            pointer_interval_ms: 16,
            log_level: LogLevel::Off,
            log_path,
        }
    }
}

impl Config {
    /// Canonical path to the config directory.
    pub async fn directory(
        state: &std::sync::Arc<crate::shared_state::SharedState>,
    ) -> std::path::PathBuf {
        state.config_path.read().await.clone()
    }

    /// Get the stable location of Driftfield's config directory on the user's system.
    pub fn default_directory() -> Result<std::path::PathBuf> {
        Ok(dirs::config_dir()
            .context("Couldn't get standard config directory")?
            .join("driftfield"))
    }

    /// Figure out where our config is being stored, and create the directory if needed.
    pub async fn setup_directory(
        maybe_custom_path: Option<std::path::PathBuf>,
        state: &std::sync::Arc<crate::shared_state::SharedState>,
    ) -> Result<()> {
        let path = match maybe_custom_path {
            None => Self::default_directory()?,
            Some(path_string) => std::path::PathBuf::new().join(path_string),
        };

        std::fs::create_dir_all(path.clone())?;

        *state.config_path.write().await = path;

        Ok(())
    }

    /// Canonical path to the main config file.
    pub async fn main_config_path(
        state: &std::sync::Arc<crate::shared_state::SharedState>,
    ) -> std::path::PathBuf {
        let directory = Self::directory(state).await;
        let main_config_file = state.main_config_file.read().await.clone();
        directory.join(main_config_file)
    }

    /// Load the main config
    pub async fn load(state: &std::sync::Arc<crate::shared_state::SharedState>) -> Result<Self> {
        let config_path = Self::main_config_path(state).await;
        let config_file_name = config_path
            .file_name()
            .context("Couldn't get file name from config path")?;
        let is_default_config = config_file_name == crate::cli_args::DEFAULT_CONFIG_FILE_NAME;
        if is_default_config && !config_path.exists() {
            tracing::info!(
                "Writing default config to: {}",
                config_path.display()
            );
            std::fs::write(&config_path, DEFAULT_CONFIG)?;
        }

        let contents = std::fs::read_to_string(&config_path)?;
        let config: Self = toml::from_str(&contents)?;

        Ok(config)
    }

    /// Load the main config file into the shared state.
    pub async fn load_config_into_shared_state(
        state: &std::sync::Arc<crate::shared_state::SharedState>,
    ) -> Result<()> {
        let config = Self::load(state).await?;
        *state.config.write().await = config;

        Ok(())
    }
}

#[cfg(test)]
#[expect(clippy::unwrap_used, reason = "Tests aren't so strict")]
mod test {
    use super::*;

    #[test]
    fn bundled_default_config_parses() {
        let config: Config = toml::from_str(DEFAULT_CONFIG).unwrap();
        assert_eq!(config.density, 50);
        assert!(config.interactive);
        assert_eq!(config.frame_rate, 60);
        assert_eq!(config.pointer_interval_ms, 16);
        assert_eq!(config.log_level, LogLevel::Off);
    }

    #[test]
    fn partial_config_falls_back_to_defaults() {
        let config: Config = toml::from_str("density = 7\ninteractive = false\n").unwrap();
        assert_eq!(config.density, 7);
        assert!(!config.interactive);
        assert_eq!(config.frame_rate, Config::default().frame_rate);
    }
}
