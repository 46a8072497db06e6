mod commands;
mod config;
mod runner;
mod tap;

use std::path::PathBuf;
use std::process;

use clap::{Args, Parser, Subcommand, ValueEnum};
use tracing_subscriber::EnvFilter;

use crate::config::Settings;

/// Output format for CLI responses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub(crate) enum OutputFormat {
    Text,
    Json,
}

/// CASE/NLG config format converter.
#[derive(Parser)]
#[command(name = "caseconf", version, about = "CASE/NLG config format converter")]
struct Cli {
    /// Output format (text or json)
    #[arg(long, global = true, default_value = "text", value_enum)]
    output: OutputFormat,

    /// Suppress non-essential output
    #[arg(long, global = true)]
    quiet: bool,

    /// Log pipeline progress to stderr
    #[arg(long, global = true)]
    verbose: bool,

    /// Path to a caseconf.toml configuration file
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

/// Options shared by every command that converts a document.
#[derive(Args)]
struct ConvertArgs {
    /// Path to the config document
    file: PathBuf,

    /// Extra assignment, `Class.property[==][{spec}]=value` (repeatable)
    #[arg(long = "set", value_name = "KEY=VALUE")]
    set: Vec<String>,

    /// Treat a property defined twice in one object as an error
    #[arg(long)]
    strict_merge: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Convert a document and print the object graph as JSON
    Parse(ConvertArgs),

    /// Convert a document and report warnings
    Check(ConvertArgs),

    /// Print the object graph as an indented tree
    Tree(ConvertArgs),

    /// Convert a document and write it back in canonical form
    Emit(ConvertArgs),

    /// Run the conformance test suite
    Test {
        /// Path to the conformance suite directory
        #[arg(default_value = "conformance")]
        suite_dir: PathBuf,
    },
}

fn main() {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    match &cli.command {
        Commands::Parse(args) => {
            let settings = settings_or_exit(&cli, args);
            commands::parse::cmd_parse(&args.file, &settings, cli.output, cli.quiet);
        }
        Commands::Check(args) => {
            let settings = settings_or_exit(&cli, args);
            commands::check::cmd_check(&args.file, &settings, cli.output, cli.quiet);
        }
        Commands::Tree(args) => {
            let settings = settings_or_exit(&cli, args);
            commands::tree::cmd_tree(&args.file, &settings, cli.output, cli.quiet);
        }
        Commands::Emit(args) => {
            let settings = settings_or_exit(&cli, args);
            commands::emit::cmd_emit(&args.file, &settings, cli.output, cli.quiet);
        }
        Commands::Test { suite_dir } => {
            commands::test::cmd_test(suite_dir, cli.quiet);
        }
    }
}

fn init_tracing(verbose: bool) {
    let filter = if verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| "warn".into())
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

/// Load the config file (if any) and layer the command-line flags over it.
fn settings_or_exit(cli: &Cli, args: &ConvertArgs) -> Settings {
    let config = match config::locate_config(cli.config.as_deref()) {
        Some(path) => {
            tracing::debug!(path = %path.display(), "loading config");
            match config::read_config(&path) {
                Ok(c) => c,
                Err(msg) => exit_with_error(&msg, cli.output, cli.quiet),
            }
        }
        None => config::Config::default(),
    };
    match config::resolve_settings(&config, args.strict_merge, &args.set) {
        Ok(settings) => settings,
        Err(msg) => exit_with_error(&msg, cli.output, cli.quiet),
    }
}

fn exit_with_error(msg: &str, output: OutputFormat, quiet: bool) -> ! {
    report_error(msg, output, quiet);
    process::exit(1);
}

pub(crate) fn report_error(msg: &str, output: OutputFormat, quiet: bool) {
    if quiet {
        return;
    }
    match output {
        OutputFormat::Text => eprintln!("{}", msg),
        OutputFormat::Json => {
            eprintln!("{}", serde_json::json!({ "error": msg }));
        }
    }
}
