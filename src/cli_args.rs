//! All the CLI arguments for Driftfield

/// The name of the main config file in the config directory.
pub const DEFAULT_CONFIG_FILE_NAME: &str = "driftfield.toml";

/// An ambient, mouse-reactive particle field for your terminal
#[derive(clap::Parser, Debug, Clone)]
#[command(version, about)]
#[non_exhaustive]
pub struct CliArgs {
    /// The number of particles in the field.
    #[arg(short, long)]
    pub density: Option<usize>,

    /// The target frame rate.
    #[arg(short, long)]
    pub frame_rate: Option<u32>,

    /// Disable mouse interaction. Particles drift on their orbits only.
    #[arg(long)]
    pub non_interactive: bool,

    /// Seed the field's random number generator for a reproducible layout.
    #[arg(long)]
    pub seed: Option<u64>,

    /// Use a custom config directory.
    #[arg(long)]
    pub config_dir: Option<std::path::PathBuf>,

    /// The name of the main config file, relative to the config directory.
    #[arg(long, default_value = DEFAULT_CONFIG_FILE_NAME)]
    pub main_config: std::path::PathBuf,

    /// Override the configured log path.
    #[arg(long)]
    pub log_path: Option<std::path::PathBuf>,

    /// Override the configured log level.
    #[arg(long)]
    pub log_level: Option<crate::config::LogLevel>,
}
