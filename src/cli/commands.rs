// ABOUTME: Command implementations for the cliq CLI
// ABOUTME: Handles list, show, render, run, validate, migrate, generate and import

use anyhow::{Context, Result};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::broadcast::error::{RecvError, TryRecvError};
use tracing::{debug, info, warn};

use super::args::{Args, Format};
use super::config::Config;
use crate::engine::{OutputChunk, OutputStream, RunStatus};
use crate::output::{OutputHandler, OutputOptions};
use crate::parser::{DocumentFormat, TemplateParser, VariableDefinition, VariableKind};
use crate::registry::{RegistryError, TemplateRegistry};
use crate::store::HttpFetcher;
use crate::template::input_values_from_strings;

fn registry(config: &Config) -> TemplateRegistry {
    let fetcher = HttpFetcher::new().with_max_bytes(config.max_template_bytes);
    TemplateRegistry::new(config.execution_config(), Arc::new(config.clone()))
        .with_fetcher(Arc::new(fetcher))
}

/// Print a render failure the way `--format` asks and turn it into an error
fn report_failure(err: RegistryError, format: Format) -> anyhow::Error {
    if let Some(failure) = err.validation_failure() {
        let handler = OutputHandler::new();
        match handler.format_failure(format.as_str(), failure, &OutputOptions::default()) {
            Ok(text) => eprint!("{}", text),
            Err(e) => warn!("Failed to format validation errors: {}", e),
        }
        return anyhow::anyhow!("Invalid variables for command '{}'", failure.command_id);
    }
    err.into()
}

/// List templates and their commands
pub async fn list_templates(file: Option<PathBuf>, config: &Config) -> Result<()> {
    let registry = registry(config);

    match (file, &config.template_dir) {
        (Some(file), _) => {
            registry.load_template(&file).await?;
        }
        (None, Some(dir)) => {
            let loaded = registry.load_dir(dir).await?;
            debug!("Loaded {} templates from {}", loaded.len(), dir.display());
        }
        (None, None) => {
            return Err(anyhow::anyhow!(
                "No template file given and no template_dir configured"
            ));
        }
    }

    for template in registry.list_templates().await {
        println!("{} ({})", template.name, template.id);
        if !template.description.is_empty() {
            println!("  {}", template.description);
        }
        for command in registry.list_commands(&template.id).await? {
            println!(
                "  - {}: {} [{} variables]",
                command.id, command.name, command.variable_count
            );
        }
    }

    Ok(())
}

fn describe_variable(variable: &VariableDefinition) -> String {
    let mut line = format!("{} ({})", variable.name, variable.kind.type_name());
    if variable.required {
        line.push_str(" required");
    }
    if let Some(flag) = variable.flag() {
        line.push_str(&format!(" flag {}", flag));
    }
    match &variable.kind {
        VariableKind::Select(options) => {
            line.push_str(&format!(" one of: {}", options.values().join(", ")));
        }
        VariableKind::Number(options) => {
            if let (Some(min), Some(max)) = (options.min, options.max) {
                line.push_str(&format!(" range {}..{}", min, max));
            }
        }
        _ => {}
    }
    if !variable.description.is_empty() {
        line.push_str(&format!(" - {}", variable.description));
    }
    line
}

/// Show the variables a command accepts
pub async fn show_command(file: PathBuf, command_id: String, config: &Config) -> Result<()> {
    let registry = registry(config);
    let template_id = registry.load_template(&file).await?;
    let command = registry.get_command(&template_id, &command_id).await?;

    println!("{} ({})", command.name, command.id);
    if !command.description.is_empty() {
        println!("  {}", command.description);
    }
    println!("  Command: {}", command.command);
    if command.variables.is_empty() {
        println!("  No variables");
    }
    for variable in &command.variables {
        println!("  - {}", describe_variable(variable));
    }

    Ok(())
}

/// Print the command line that would run
pub async fn render_command(
    file: PathBuf,
    command_id: String,
    vars: Vec<String>,
    config: &Config,
) -> Result<()> {
    let registry = registry(config);
    let template_id = registry.load_template(&file).await?;
    let values = input_values_from_strings(Args::parse_variables(&vars)?);

    let rendered = registry
        .render_command(&template_id, &command_id, &values)
        .await
        .map_err(|e| report_failure(e, Format::Text))?;

    println!("{}", rendered.display());
    Ok(())
}

fn write_chunk(chunk: &OutputChunk) {
    let result = match chunk.stream {
        OutputStream::Stdout => {
            let mut out = std::io::stdout().lock();
            out.write_all(chunk.data.as_bytes()).and_then(|_| out.flush())
        }
        OutputStream::Stderr => {
            let mut err = std::io::stderr().lock();
            err.write_all(chunk.data.as_bytes()).and_then(|_| err.flush())
        }
    };
    if let Err(e) = result {
        debug!("Failed to write output chunk: {}", e);
    }
}

/// Run a command to completion, streaming output when the format is text.
/// Ctrl-C cancels the run.
pub async fn run_command(
    file: PathBuf,
    command_id: String,
    vars: Vec<String>,
    format: Format,
    config: &Config,
) -> Result<()> {
    let registry = registry(config);
    let template_id = registry.load_template(&file).await?;
    let values = input_values_from_strings(Args::parse_variables(&vars)?);

    let (run_id, mut output_rx) = registry
        .start_run_subscribed(&template_id, &command_id, &values)
        .await
        .map_err(|e| report_failure(e, format))?;
    info!("Started run {}", run_id);

    let stream = format == Format::Text;
    let wait = registry.wait_run(run_id);
    tokio::pin!(wait);
    let mut cancel_requested = false;

    let snapshot = loop {
        tokio::select! {
            snapshot = &mut wait => break snapshot?,
            chunk = output_rx.recv() => match chunk {
                Ok(chunk) if stream => write_chunk(&chunk),
                Ok(_) => {}
                Err(RecvError::Lagged(skipped)) => warn!("Skipped {} output chunks", skipped),
                Err(RecvError::Closed) => {}
            },
            signal = tokio::signal::ctrl_c(), if !cancel_requested => {
                cancel_requested = true;
                if let Err(e) = signal {
                    warn!("Failed to listen for Ctrl-C: {}", e);
                    continue;
                }
                match registry.cancel_run(run_id).await {
                    Ok(_) => info!("Cancelling run {}", run_id),
                    Err(e) => debug!("Cancel ignored: {}", e),
                }
            }
        }
    };

    // Readers finish before the run is marked done, so the rest is buffered
    loop {
        match output_rx.try_recv() {
            Ok(chunk) if stream => write_chunk(&chunk),
            Ok(_) => {}
            Err(TryRecvError::Lagged(skipped)) => warn!("Skipped {} output chunks", skipped),
            Err(TryRecvError::Empty) | Err(TryRecvError::Closed) => break,
        }
    }

    let options = OutputOptions {
        include_output: !stream,
        ..OutputOptions::default()
    };
    let handler = OutputHandler::new();
    let text = handler.format_run(format.as_str(), &snapshot, &options)?;
    if stream {
        eprint!("{}", text);
    } else {
        println!("{}", text.trim_end());
    }

    match snapshot.status {
        RunStatus::Succeeded => Ok(()),
        status => Err(anyhow::anyhow!("Run {} finished with status: {}", run_id, status)),
    }
}

/// Validate a template file and print its report
pub async fn validate_template(file: PathBuf, _config: &Config) -> Result<()> {
    let content = tokio::fs::read_to_string(&file)
        .await
        .with_context(|| format!("Failed to read {}", file.display()))?;
    let parser = TemplateParser::new();
    let report = parser.check_string(&content, DocumentFormat::from_path(&file))?;

    for warning in &report.warnings {
        println!("  warning: {}", warning);
    }
    for error in &report.errors {
        println!("  error: {}", error);
    }

    if report.is_valid {
        println!("✓ Template '{}' is valid", file.display());
        Ok(())
    } else {
        Err(anyhow::anyhow!(
            "Template '{}' has {} error(s)",
            file.display(),
            report.errors.len()
        ))
    }
}

/// Rewrite a template in the current schema
pub async fn migrate_template(file: PathBuf, output: PathBuf, config: &Config) -> Result<()> {
    let registry = registry(config);
    let template_id = registry.load_template(&file).await?;
    registry.save_template(&template_id, &output).await?;
    println!("✓ Wrote {}", output.display());
    Ok(())
}

/// Create a template from a command line with placeholders
pub async fn generate_template(command: String, output: Option<PathBuf>, config: &Config) -> Result<()> {
    let registry = registry(config);
    let template = registry.generate_template(&command)?;

    match output {
        Some(path) => {
            registry.store().save(&template, &path).await?;
            println!("✓ Wrote {}", path.display());
        }
        None => {
            let text = TemplateParser::new().to_string(&template, DocumentFormat::Yaml)?;
            print!("{}", text);
        }
    }
    Ok(())
}

/// Template id for an import: the destination's stem, else the URL's last segment
fn import_id(source: &str, output: Option<&Path>) -> String {
    output
        .and_then(|path| path.file_stem())
        .and_then(|stem| stem.to_str())
        .map(str::to_string)
        .unwrap_or_else(|| {
            let last = source
                .trim_end_matches('/')
                .rsplit('/')
                .next()
                .unwrap_or(source);
            Path::new(last)
                .file_stem()
                .and_then(|stem| stem.to_str())
                .filter(|stem| !stem.is_empty())
                .unwrap_or("imported")
                .to_string()
        })
}

/// Download a template, validate it and save it locally
pub async fn import_template(
    url: Option<String>,
    hub: Option<String>,
    output: Option<PathBuf>,
    config: &Config,
) -> Result<()> {
    let registry = registry(config);

    let (template_id, template) = match (url, hub) {
        (Some(url), _) => {
            let id = import_id(&url, output.as_deref());
            let template = registry.import_from_url(&url, &id).await?;
            (id, template)
        }
        (None, Some(path)) => {
            let id = import_id(&path, output.as_deref());
            let template = registry.import_from_hub(&path, &id).await?;
            (id, template)
        }
        (None, None) => return Err(anyhow::anyhow!("Either a URL or --hub is required")),
    };

    let destination = match output {
        Some(path) => path,
        None => {
            let dir = config.template_dir.clone().unwrap_or_else(|| PathBuf::from("."));
            dir.join(format!("{}.{}", template_id, DocumentFormat::Yaml.file_extension()))
        }
    };
    registry.save_template(&template_id, &destination).await?;

    println!(
        "✓ Imported '{}' ({} commands) to {}",
        template.name,
        template.cmds.len(),
        destination.display()
    );
    Ok(())
}
