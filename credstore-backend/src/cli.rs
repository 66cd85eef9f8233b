use clap::Parser;

/// Parsed command-line arguments.
#[derive(Debug, Parser)]
#[command(name = "credstore-backend", about = "Credential store web backend")]
pub struct CliArgs {
    /// Path to configuration file (TOML, YAML or JSON)
    #[arg(short = 'c', long = "config-path", env = "CREDSTORE_CONFIG_PATH")]
    pub config_path: Option<String>,
}
