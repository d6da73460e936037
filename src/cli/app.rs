// ABOUTME: Main application orchestration for the cliq CLI
// ABOUTME: Coordinates between CLI arguments, configuration, and command execution

use anyhow::Result;
use tracing::{debug, info};
use tracing_subscriber::EnvFilter;

use super::commands;
use super::{Args, Commands, Config};

pub struct App {
    config: Config,
}

impl App {
    /// Create a new application instance
    pub fn new(config: Config) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Initialize logging based on configuration. Logs go to stderr so
    /// stdout carries only command output.
    pub fn init_logging(&self, verbose: bool, no_color: bool) -> Result<()> {
        let log_level = if verbose {
            "debug"
        } else {
            &self.config.logging.level
        };

        let env_filter = if verbose {
            EnvFilter::new(log_level)
        } else {
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(log_level))
        };

        match self.config.logging.format.as_str() {
            "compact" => {
                tracing_subscriber::fmt()
                    .compact()
                    .with_env_filter(env_filter)
                    .with_writer(std::io::stderr)
                    .with_ansi(!no_color)
                    .with_target(false)
                    .try_init()
                    .map_err(|e| anyhow::anyhow!("Failed to initialize logging: {}", e))?;
            }
            _ => {
                tracing_subscriber::fmt()
                    .with_env_filter(env_filter)
                    .with_writer(std::io::stderr)
                    .with_ansi(!no_color)
                    .with_target(false)
                    .try_init()
                    .map_err(|e| anyhow::anyhow!("Failed to initialize logging: {}", e))?;
            }
        }

        debug!("Logging initialized with level: {}", log_level);
        Ok(())
    }

    /// Run the application with parsed arguments
    pub async fn run(&mut self, args: Args) -> Result<()> {
        self.init_logging(args.verbose, args.no_color)?;

        info!("Starting cliq v{}", env!("CARGO_PKG_VERSION"));
        debug!("Configuration loaded from: {:?}", args.config);

        match args.command {
            Commands::List { file } => commands::list_templates(file, &self.config).await,

            Commands::Show { file, command_id } => {
                commands::show_command(file, command_id, &self.config).await
            }

            Commands::Render {
                file,
                command_id,
                vars,
            } => commands::render_command(file, command_id, vars, &self.config).await,

            Commands::Run {
                file,
                command_id,
                vars,
                format,
            } => commands::run_command(file, command_id, vars, format, &self.config).await,

            Commands::Validate { file } => commands::validate_template(file, &self.config).await,

            Commands::Migrate { file, output } => {
                commands::migrate_template(file, output, &self.config).await
            }

            Commands::Generate { command, output } => {
                commands::generate_template(command, output, &self.config).await
            }

            Commands::Import { url, hub, output } => {
                commands::import_template(url, hub, output, &self.config).await
            }
        }
    }

    /// Parse command line arguments and load the configuration they name
    pub fn from_args() -> Result<(Self, Args)> {
        let args = Args::parse_args();
        let config = Config::load(args.config.clone())?;
        Ok((Self::new(config), args))
    }
}
