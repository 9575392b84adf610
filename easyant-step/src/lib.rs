//! EasyAnt build step engine.
//!
//! Lets a CI job invoke the EasyAnt build tool as a build step: resolve a
//! named installation for the execution node, construct the command line
//! (targets, properties, build-file flags, environment overrides), stream
//! and annotate the tool's console output, and map the exit code to a
//! pass/fail result.
//!
//! The host system supplies its collaborators through small seams:
//! [`node::NodeHandle`] for the execution node's filesystem,
//! [`step::ProcessLauncher`] for running the subprocess,
//! [`step::BuildListener`] for the job log, and [`annotate::LogSink`] for
//! the annotated console stream. `easyant-runner` wires local
//! implementations of all four into a CLI.

pub mod annotate;
pub mod classify;
pub mod command;
pub mod config;
pub mod env;
pub mod error;
pub mod installation;
pub mod logging;
pub mod markup;
pub mod node;
pub mod properties;
pub mod step;
pub mod testing;

pub use annotate::{LineAnnotator, LogSink, PlainSink};
pub use classify::{BuildOutcome, Classification, Marker, classify};
pub use command::{CommandLine, InvocationSpec};
pub use env::EnvVars;
pub use error::StepError;
pub use installation::{
    EasyAntInstallation, InstallationRegistry, Resolution, ResolvedInstallation,
};
pub use logging::{LogConfig, init_logging};
pub use node::{LocalNode, NodeHandle};
pub use step::{BuildListener, EasyAntStep, JobContext, ProcessLauncher, TokioLauncher};
