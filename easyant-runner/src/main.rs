//! EasyAnt build step runner.
//!
//! Standalone host for the `easyant-step` library: loads the installation
//! registry from a TOML file, assembles a job context from the process
//! environment and working directory, runs one build step locally, and
//! renders annotation markers as ANSI styling on the streamed output.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use easyant_step::annotate::LogSink;
use easyant_step::classify::{BuildOutcome, Marker};
use easyant_step::config::{default_config_path, load_registry};
use easyant_step::installation::validate_home;
use easyant_step::step::BuildListener;
use easyant_step::{
    EasyAntStep, EnvVars, InstallationRegistry, JobContext, LocalNode, LogConfig, TokioLauncher,
    init_logging,
};
use std::collections::BTreeMap;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use tracing::info;

#[derive(Parser)]
#[command(name = "easyant-runner")]
#[command(author, version, about = "Run an EasyAnt build step locally")]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Path to the installations registry file
    #[arg(long, global = true)]
    config: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// Run a build step
    Run {
        /// Name of the configured installation to use
        #[arg(short, long)]
        easyant: Option<String>,

        /// Targets to execute, whitespace separated
        #[arg(short, long, default_value = "")]
        targets: String,

        /// Build module path, relative to the module root
        #[arg(long)]
        build_module: Option<String>,

        /// Build file path, relative to the module root
        #[arg(long)]
        build_file: Option<String>,

        /// Extra options exported as EASYANT_OPTS (macro-expanded)
        #[arg(long)]
        easyant_opts: Option<String>,

        /// Path to a properties file passed as -D flags
        #[arg(long)]
        properties: Option<PathBuf>,

        /// Job-level build variable (repeatable)
        #[arg(short = 'D', value_name = "KEY=VALUE")]
        define: Vec<String>,

        /// Mark a build variable as sensitive (repeatable)
        #[arg(long, value_name = "KEY")]
        sensitive: Vec<String>,

        /// Module root directory; defaults to the working directory
        #[arg(long)]
        module_root: Option<PathBuf>,

        /// Workspace root directory; defaults to the module root
        #[arg(long)]
        workspace_root: Option<PathBuf>,
    },

    /// List configured installations
    List,

    /// Validate a configured installation's home directory
    Check {
        /// Installation name
        name: String,
    },
}

const ANSI_BOLD: &str = "\x1b[1m";
const ANSI_GREEN: &str = "\x1b[32m";
const ANSI_RED: &str = "\x1b[31m";
const ANSI_RESET: &str = "\x1b[0m";

/// Sink that renders markers as ANSI styling around the decorated line.
struct AnsiSink<W: Write> {
    inner: W,
    pending: Vec<Marker>,
}

impl<W: Write> AnsiSink<W> {
    fn new(inner: W) -> Self {
        Self {
            inner,
            pending: Vec::new(),
        }
    }
}

impl<W: Write> LogSink for AnsiSink<W> {
    fn marker(&mut self, marker: Marker) -> io::Result<()> {
        self.pending.push(marker);
        Ok(())
    }

    fn data(&mut self, bytes: &[u8]) -> io::Result<()> {
        if self.pending.is_empty() {
            return self.inner.write_all(bytes);
        }

        for marker in self.pending.drain(..) {
            let code = match marker {
                Marker::TargetBoundary => ANSI_BOLD,
                Marker::Outcome(BuildOutcome::Success) => ANSI_GREEN,
                Marker::Outcome(BuildOutcome::Failure) => ANSI_RED,
            };
            self.inner.write_all(code.as_bytes())?;
        }

        let content_end = bytes.len()
            - bytes
                .iter()
                .rev()
                .take_while(|&&b| b == b'\n' || b == b'\r')
                .count();
        self.inner.write_all(&bytes[..content_end])?;
        self.inner.write_all(ANSI_RESET.as_bytes())?;
        self.inner.write_all(&bytes[content_end..])
    }

    fn flush(&mut self) -> io::Result<()> {
        self.inner.flush()
    }
}

/// Listener writing job-log lines and diagnostics to stderr, keeping stdout
/// for the annotated console stream.
struct ConsoleListener;

impl BuildListener for ConsoleListener {
    fn log(&mut self, line: &str) {
        eprintln!("{line}");
    }

    fn error(&mut self, message: &str) {
        eprintln!("ERROR: {message}");
    }

    fn fatal_error(&mut self, message: &str) {
        eprintln!("FATAL: {message}");
    }
}


#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let mut log_config = LogConfig::from_env("info").with_stderr();
    if cli.verbose {
        log_config = log_config.with_level("debug");
    }
    let _logging_guards = init_logging(&log_config)?;

    let config_path = cli.config.unwrap_or_else(default_config_path);
    let registry = InstallationRegistry::new();
    registry.replace(load_registry(&config_path)?);

    match cli.command {
        Commands::List => {
            for installation in registry.snapshot().iter() {
                let validation = validate_home(Path::new(installation.home()));
                println!(
                    "{}\t{}\t{}",
                    installation.name(),
                    installation.home(),
                    validation
                );
            }
            Ok(())
        }

        Commands::Check { name } => {
            let Some(installation) = registry.find(&name) else {
                eprintln!("no installation named '{name}' in {}", config_path.display());
                std::process::exit(1);
            };
            let validation = validate_home(Path::new(installation.home()));
            println!("{}: {}", installation.name(), validation);
            if !validation.is_ok() {
                std::process::exit(1);
            }
            Ok(())
        }

        Commands::Run {
            easyant,
            targets,
            build_module,
            build_file,
            easyant_opts,
            properties,
            define,
            sensitive,
            module_root,
            workspace_root,
        } => {
            let cwd = std::env::current_dir().context("failed to resolve working directory")?;
            let module_root = module_root.unwrap_or(cwd);
            let workspace_root = workspace_root.unwrap_or_else(|| module_root.clone());

            let mut build_variables = BTreeMap::new();
            for pair in define {
                let (key, value) = pair
                    .split_once('=')
                    .with_context(|| format!("-D expects KEY=VALUE, got '{pair}'"))?;
                build_variables.insert(key.to_string(), value.to_string());
            }

            let ctx = JobContext {
                env: EnvVars::from_process(),
                build_variables,
                sensitive_variables: sensitive.into_iter().collect(),
                module_root,
                workspace_root,
            };

            let mut step = EasyAntStep::new().with_targets(targets);
            if let Some(name) = easyant {
                step = step.with_installation(name);
            }
            if let Some(module) = build_module {
                step = step.with_build_module(module);
            }
            if let Some(file) = build_file {
                step = step.with_build_file(file);
            }
            if let Some(opts) = easyant_opts {
                step = step.with_easyant_opts(opts);
            }
            if let Some(path) = properties {
                let text = std::fs::read_to_string(&path)
                    .with_context(|| format!("failed to read properties file {}", path.display()))?;
                step = step.with_properties(text);
            }

            let mut listener = ConsoleListener;
            let sink = AnsiSink::new(io::stdout());
            let ok = step
                .perform(&ctx, &registry, &LocalNode, &TokioLauncher, &mut listener, sink)
                .await;

            info!(ok, "build step finished");
            if !ok {
                std::process::exit(1);
            }
            Ok(())
        }
    }
}
