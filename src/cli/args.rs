// ABOUTME: Command line argument definitions and parsing using Clap
// ABOUTME: Defines the main CLI structure and subcommands for cliq

use clap::{Parser, Subcommand, ValueEnum};
use std::collections::HashMap;
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "cliq")]
#[command(about = "Run reusable, parameterized shell command templates")]
#[command(version)]
pub struct Args {
    #[command(subcommand)]
    pub command: Commands,

    #[arg(short, long, global = true, help = "Enable verbose output")]
    pub verbose: bool,

    #[arg(short, long, global = true, help = "Path to configuration file")]
    pub config: Option<PathBuf>,

    #[arg(long, global = true, help = "Disable colored output")]
    pub no_color: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum Format {
    Text,
    Json,
    Yaml,
}

impl Format {
    pub fn as_str(&self) -> &'static str {
        match self {
            Format::Text => "text",
            Format::Json => "json",
            Format::Yaml => "yaml",
        }
    }
}

#[derive(Subcommand)]
pub enum Commands {
    /// List templates and their commands
    List {
        #[arg(help = "Template file (defaults to the configured template directory)")]
        file: Option<PathBuf>,
    },

    /// Show the variables a command accepts
    Show {
        #[arg(help = "Path to template file")]
        file: PathBuf,

        #[arg(help = "Command id")]
        command_id: String,
    },

    /// Print the command line that would run, without running it
    Render {
        #[arg(help = "Path to template file")]
        file: PathBuf,

        #[arg(help = "Command id")]
        command_id: String,

        #[arg(short = 'V', long = "var", help = "Variable value (key=value)")]
        vars: Vec<String>,
    },

    /// Run a command, streaming its output
    Run {
        #[arg(help = "Path to template file")]
        file: PathBuf,

        #[arg(help = "Command id")]
        command_id: String,

        #[arg(short = 'V', long = "var", help = "Variable value (key=value)")]
        vars: Vec<String>,

        #[arg(long, value_enum, default_value = "text", help = "Result format")]
        format: Format,
    },

    /// Validate a template file without loading it
    Validate {
        #[arg(help = "Path to template file")]
        file: PathBuf,
    },

    /// Rewrite a template file in the current schema
    Migrate {
        #[arg(help = "Path to template file")]
        file: PathBuf,

        #[arg(short, long, help = "Destination (.json, .yaml or .yml)")]
        output: PathBuf,
    },

    /// Create a template from a command line containing {{placeholders}}
    Generate {
        #[arg(help = "Command line, e.g. \"ping -c {{count}} {{host}}\"")]
        command: String,

        #[arg(short, long, help = "Destination file (prints YAML when omitted)")]
        output: Option<PathBuf>,
    },

    /// Download a template and save it locally
    Import {
        #[arg(help = "Template URL", required_unless_present = "hub")]
        url: Option<String>,

        #[arg(long, conflicts_with = "url", help = "Path relative to the hub base URL")]
        hub: Option<String>,

        #[arg(short, long, help = "Destination file")]
        output: Option<PathBuf>,
    },
}

impl Args {
    /// Parse command line arguments
    pub fn parse_args() -> Self {
        Self::parse()
    }

    /// Parse variables from key=value format
    pub fn parse_variables(vars: &[String]) -> anyhow::Result<HashMap<String, String>> {
        let mut variables = HashMap::new();

        for var in vars {
            if let Some((key, value)) = var.split_once('=') {
                variables.insert(key.trim().to_string(), value.to_string());
            } else {
                return Err(anyhow::anyhow!(
                    "Invalid variable format '{}'. Expected 'key=value'",
                    var
                ));
            }
        }

        Ok(variables)
    }
}
