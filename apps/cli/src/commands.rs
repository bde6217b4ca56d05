//! CLI command definitions, routing, and tracing setup.

use std::io::Read;
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use color_eyre::eyre::{Result, WrapErr};
use indicatif::{ProgressBar, ProgressStyle};
use serde_json::{Value, json};
use tracing::info;

use outreach_core::{Pipeline, PipelineConfig, PipelineState, ProgressReporter, input_schema};
use outreach_llm::OpenRouterClient;
use outreach_shared::{
    AppConfig, OutreachError, init_config, load_config, load_config_from, validate_api_key,
};
use outreach_web::HttpFetcher;

// ---------------------------------------------------------------------------
// CLI structure
// ---------------------------------------------------------------------------

/// Outreach — cold emails grounded in what the company actually says about itself.
#[derive(Parser)]
#[command(
    name = "outreach",
    version,
    about = "Research a company's site and draft personalized cold outreach emails.",
    long_about = None,
)]
pub(crate) struct Cli {
    /// Log format: text (default) or json.
    #[arg(long, default_value = "text", global = true)]
    pub log_format: LogFormat,

    /// Verbosity level (-v, -vv).
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Config file to use instead of ~/.outreach/outreach.toml.
    #[arg(long, global = true, env = "OUTREACH_CONFIG")]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

/// Log output format.
#[derive(Clone, Debug, clap::ValueEnum)]
pub(crate) enum LogFormat {
    Text,
    Json,
}

/// Top-level CLI subcommands.
#[derive(Subcommand)]
pub(crate) enum Command {
    /// Run the full pipeline over a JSON request.
    Run {
        /// Request file, or `-` for stdin (the default).
        #[arg(short, long)]
        input: Option<String>,

        /// Override the global deadline, in seconds.
        #[arg(long, value_parser = clap::value_parser!(u64).range(1..))]
        deadline_secs: Option<u64>,

        /// Pretty-print the JSON output.
        #[arg(long)]
        pretty: bool,
    },

    /// Validate a JSON request without running any stage.
    Validate {
        /// Request file, or `-` for stdin (the default).
        #[arg(short, long)]
        input: Option<String>,

        /// Pretty-print the JSON output.
        #[arg(long)]
        pretty: bool,
    },

    /// Print the request field schema.
    Schema,

    /// Configuration management.
    Config {
        /// Config subcommand.
        #[command(subcommand)]
        action: ConfigAction,
    },
}

/// Config subcommands.
#[derive(Subcommand)]
pub(crate) enum ConfigAction {
    /// Initialize config file with defaults.
    Init,
    /// Show resolved configuration.
    Show,
}

// ---------------------------------------------------------------------------
// Tracing setup
// ---------------------------------------------------------------------------

/// Initialize tracing based on CLI flags. Logs go to stderr; stdout carries
/// only JSON output.
pub(crate) fn init_tracing(cli: &Cli) {
    use tracing_subscriber::{EnvFilter, fmt};

    let filter = match cli.verbose {
        0 => "outreach=info",
        1 => "outreach=debug",
        _ => "outreach=trace",
    };

    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(filter));

    match cli.log_format {
        LogFormat::Text => {
            fmt()
                .with_env_filter(env_filter)
                .with_target(false)
                .with_writer(std::io::stderr)
                .init();
        }
        LogFormat::Json => {
            fmt()
                .json()
                .with_env_filter(env_filter)
                .with_writer(std::io::stderr)
                .init();
        }
    }
}

// ---------------------------------------------------------------------------
// Command dispatch
// ---------------------------------------------------------------------------

/// Run the CLI command.
pub(crate) async fn run(cli: Cli) -> Result<ExitCode> {
    let config_path = cli.config.as_deref();
    match cli.command {
        Command::Run {
            input,
            deadline_secs,
            pretty,
        } => cmd_run(config_path, input.as_deref(), deadline_secs, pretty).await,
        Command::Validate { input, pretty } => cmd_validate(input.as_deref(), pretty),
        Command::Schema => cmd_schema(),
        Command::Config { action } => match action {
            ConfigAction::Init => cmd_config_init(),
            ConfigAction::Show => cmd_config_show(config_path),
        },
    }
}

// ---------------------------------------------------------------------------
// Command handlers
// ---------------------------------------------------------------------------

async fn cmd_run(
    config_path: Option<&Path>,
    input: Option<&str>,
    deadline_secs: Option<u64>,
    pretty: bool,
) -> Result<ExitCode> {
    let mut config = resolve_config(config_path)?;
    validate_api_key(&config)?;
    if let Some(secs) = deadline_secs {
        config.pipeline.deadline_secs = secs;
    }

    let raw = match read_request(input)? {
        Ok(raw) => raw,
        Err(err) => return emit_error(&err, pretty),
    };

    let fetcher = HttpFetcher::new(&config.scraper)?;
    let generator = OpenRouterClient::from_config(&config.openrouter)?;
    let pipeline = Pipeline::new(fetcher, generator, PipelineConfig::from(&config));

    info!(
        deadline_secs = config.pipeline.deadline_secs,
        "running outreach pipeline"
    );

    let reporter = CliProgress::new();
    match pipeline.run(&raw, &reporter).await {
        Ok(result) => {
            print_json(&serde_json::to_value(&result)?, pretty)?;
            Ok(ExitCode::SUCCESS)
        }
        Err(err) => emit_error(&err, pretty),
    }
}

fn cmd_validate(input: Option<&str>, pretty: bool) -> Result<ExitCode> {
    let raw = match read_request(input)? {
        Ok(raw) => raw,
        Err(err) => return emit_error(&err, pretty),
    };

    match outreach_core::validate_input(&raw) {
        Ok(request) => {
            print_json(&json!({ "valid": true, "request": request }), pretty)?;
            Ok(ExitCode::SUCCESS)
        }
        Err(err) => emit_error(&err, pretty),
    }
}

fn cmd_schema() -> Result<ExitCode> {
    print_json(&json!({ "input_data": input_schema() }), true)?;
    Ok(ExitCode::SUCCESS)
}

fn cmd_config_init() -> Result<ExitCode> {
    let path = init_config()?;
    println!("Config initialized at: {}", path.display());
    Ok(ExitCode::SUCCESS)
}

fn cmd_config_show(config_path: Option<&Path>) -> Result<ExitCode> {
    let config = resolve_config(config_path)?;
    let toml_str = toml::to_string_pretty(&config)?;
    println!("{toml_str}");
    Ok(ExitCode::SUCCESS)
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn resolve_config(path: Option<&Path>) -> Result<AppConfig> {
    let config = match path {
        Some(p) => load_config_from(p)?,
        None => load_config()?,
    };
    Ok(config)
}

/// Read and parse the request body. A body that is not JSON at all is a
/// caller error, reported like any other validation failure.
fn read_request(input: Option<&str>) -> Result<std::result::Result<Value, OutreachError>> {
    let text = match input {
        None | Some("-") => {
            let mut buf = String::new();
            std::io::stdin()
                .read_to_string(&mut buf)
                .wrap_err("failed to read request from stdin")?;
            buf
        }
        Some(path) => std::fs::read_to_string(path)
            .wrap_err_with(|| format!("failed to read request file '{path}'"))?,
    };

    Ok(serde_json::from_str(&text).map_err(|e| {
        OutreachError::validation(format!("request body is not valid JSON: {e}"))
    }))
}

/// Print the error response body on stdout and signal failure.
fn emit_error(err: &OutreachError, pretty: bool) -> Result<ExitCode> {
    let response = err.to_response();
    print_json(&serde_json::to_value(&response)?, pretty)?;
    Ok(ExitCode::FAILURE)
}

fn print_json(value: &Value, pretty: bool) -> Result<()> {
    let out = if pretty {
        serde_json::to_string_pretty(value)?
    } else {
        serde_json::to_string(value)?
    };
    println!("{out}");
    Ok(())
}

// ---------------------------------------------------------------------------
// CLI progress reporter
// ---------------------------------------------------------------------------

/// CLI progress reporter using an indicatif spinner on stderr.
struct CliProgress {
    spinner: ProgressBar,
}

impl CliProgress {
    fn new() -> Self {
        let spinner = ProgressBar::new_spinner();
        if let Ok(style) = ProgressStyle::with_template("{spinner:.cyan} {msg} {elapsed:.dim}") {
            spinner.set_style(
                style.tick_strings(&["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏"]),
            );
        }
        spinner.enable_steady_tick(std::time::Duration::from_millis(80));
        Self { spinner }
    }
}

impl ProgressReporter for CliProgress {
    fn transition(&self, _from: PipelineState, to: PipelineState) {
        let message = match to {
            PipelineState::Start => return,
            PipelineState::Validating => "Validating request",
            PipelineState::Researching => "Researching company site",
            PipelineState::Copywriting => "Drafting emails",
            PipelineState::Assessing => "Assessing spam risk",
            PipelineState::Finalizing => "Finalizing result",
            PipelineState::Succeeded | PipelineState::Failed(_) => {
                self.spinner.finish_and_clear();
                return;
            }
        };
        self.spinner.set_message(message);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn run_flags_parse() {
        let cli = Cli::try_parse_from([
            "outreach",
            "run",
            "--input",
            "acme.json",
            "--deadline-secs",
            "30",
            "--pretty",
            "-v",
        ])
        .unwrap();
        assert_eq!(cli.verbose, 1);
        match cli.command {
            Command::Run {
                input,
                deadline_secs,
                pretty,
            } => {
                assert_eq!(input.as_deref(), Some("acme.json"));
                assert_eq!(deadline_secs, Some(30));
                assert!(pretty);
            }
            _ => panic!("expected run"),
        }
    }

    #[test]
    fn zero_deadline_is_rejected() {
        assert!(Cli::try_parse_from(["outreach", "run", "--deadline-secs", "0"]).is_err());
    }
}
