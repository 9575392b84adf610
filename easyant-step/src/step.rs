//! Build step orchestration.
//!
//! One run per invocation:
//! resolve the installation, construct the command, launch the subprocess,
//! stream its combined output through the annotator, and map the exit code
//! to a pass/fail result. Every fatal condition is caught at the step
//! boundary and converted into a boolean plus a log entry; nothing
//! propagates to the host as an unhandled fault.

use crate::annotate::{LineAnnotator, LogSink};
use crate::command::{CommandLine, InvocationSpec, resolve_build_path};
use crate::env::EnvVars;
use crate::error::StepError;
use crate::installation::{self, InstallationRegistry, Resolution, ResolvedInstallation};
use crate::node::NodeHandle;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};
use std::io;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use tokio::io::AsyncReadExt;
use tracing::{debug, info, warn};

/// Environment variable exposing the resolved installation's home to the
/// build subprocess.
pub const EASYANT_HOME_VAR: &str = "EASYANT_HOME";

/// Environment variable carrying extra options for the build tool's JVM.
pub const EASYANT_OPTS_VAR: &str = "EASYANT_OPTS";

/// The job's side of a build-step execution.
#[derive(Debug, Clone, Default)]
pub struct JobContext {
    /// The build's inherited environment.
    pub env: EnvVars,
    /// Job-level build variables, emitted as `-D` flags sorted by key.
    pub build_variables: BTreeMap<String, String>,
    /// Keys whose values must never appear in logs in cleartext.
    pub sensitive_variables: HashSet<String>,
    pub module_root: PathBuf,
    pub workspace_root: PathBuf,
}

/// Sink for job-log text and error diagnostics.
pub trait BuildListener {
    /// A line of job-log output.
    fn log(&mut self, line: &str);

    /// A user-visible error that fails the step.
    fn error(&mut self, message: &str) {
        self.log(&format!("ERROR: {message}"));
    }

    /// A fatal diagnostic with full detail.
    fn fatal_error(&mut self, message: &str) {
        self.log(&format!("FATAL: {message}"));
    }
}

/// Runs a constructed invocation to completion, feeding its combined output
/// through the annotator and returning the exit code.
pub trait ProcessLauncher {
    fn launch<S: LogSink + Send>(
        &self,
        spec: &InvocationSpec,
        annotator: &mut LineAnnotator<S>,
    ) -> impl Future<Output = io::Result<i32>> + Send;
}

/// Launcher backed by `tokio::process`.
///
/// stdout and stderr are piped and drained concurrently into the annotator
/// so a full OS pipe buffer can never deadlock the child. The child is
/// spawned kill-on-drop: cancelling the enclosing future terminates the
/// subprocess, which is how job abortion reaches it.
#[derive(Debug, Clone, Copy, Default)]
pub struct TokioLauncher;

impl ProcessLauncher for TokioLauncher {
    async fn launch<S: LogSink + Send>(
        &self,
        spec: &InvocationSpec,
        annotator: &mut LineAnnotator<S>,
    ) -> io::Result<i32> {
        let (program, rest) = spec
            .command
            .args()
            .split_first()
            .ok_or_else(|| io::Error::new(io::ErrorKind::InvalidInput, "empty command line"))?;

        let mut command = tokio::process::Command::new(program);
        command
            .args(rest)
            .envs(spec.env.iter())
            .current_dir(&spec.working_dir)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        let mut child = command.spawn()?;
        let mut stdout = child
            .stdout
            .take()
            .ok_or_else(|| io::Error::other("child stdout not piped"))?;
        let mut stderr = child
            .stderr
            .take()
            .ok_or_else(|| io::Error::other("child stderr not piped"))?;

        let mut out_buf = [0u8; 8192];
        let mut err_buf = [0u8; 8192];
        let mut out_open = true;
        let mut err_open = true;
        while out_open || err_open {
            tokio::select! {
                read = stdout.read(&mut out_buf), if out_open => {
                    let n = read?;
                    if n == 0 {
                        out_open = false;
                    } else {
                        annotator.write(&out_buf[..n])?;
                    }
                }
                read = stderr.read(&mut err_buf), if err_open => {
                    let n = read?;
                    if n == 0 {
                        err_open = false;
                    } else {
                        annotator.write(&err_buf[..n])?;
                    }
                }
            }
        }

        let status = child.wait().await?;
        Ok(exit_code(&status))
    }
}

fn exit_code(status: &std::process::ExitStatus) -> i32 {
    if let Some(code) = status.code() {
        return code;
    }
    // Killed by a signal: report 128 + signal number like a shell would.
    #[cfg(unix)]
    {
        use std::os::unix::process::ExitStatusExt;
        if let Some(signal) = status.signal() {
            return 128 + signal;
        }
    }
    -1
}

/// Configuration of one EasyAnt build step.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EasyAntStep {
    /// Name of the configured installation; the bare command is used when
    /// absent or unknown.
    pub easyant_name: Option<String>,
    /// Whitespace-separated target list; may contain `${VAR}` references.
    pub targets: String,
    pub build_module: Option<String>,
    pub build_file: Option<String>,
    /// Extra options exported as `EASYANT_OPTS`, macro-expanded.
    pub easyant_opts: Option<String>,
    /// Free-text properties in Java properties syntax.
    pub properties: Option<String>,
}

fn fix_empty_and_trim(value: impl Into<String>) -> Option<String> {
    let trimmed = value.into().trim().to_string();
    if trimmed.is_empty() { None } else { Some(trimmed) }
}

impl EasyAntStep {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_installation(mut self, name: impl Into<String>) -> Self {
        self.easyant_name = fix_empty_and_trim(name);
        self
    }

    pub fn with_targets(mut self, targets: impl Into<String>) -> Self {
        self.targets = targets.into();
        self
    }

    pub fn with_build_module(mut self, module: impl Into<String>) -> Self {
        self.build_module = fix_empty_and_trim(module);
        self
    }

    pub fn with_build_file(mut self, file: impl Into<String>) -> Self {
        self.build_file = fix_empty_and_trim(file);
        self
    }

    pub fn with_easyant_opts(mut self, opts: impl Into<String>) -> Self {
        self.easyant_opts = fix_empty_and_trim(opts);
        self
    }

    pub fn with_properties(mut self, properties: impl Into<String>) -> Self {
        self.properties = fix_empty_and_trim(properties);
        self
    }

    /// Execute the step. Returns true iff the subprocess exited with 0.
    ///
    /// All fatal conditions are converted into a failure result plus a
    /// diagnostic on the listener; this never panics or returns an error.
    pub async fn perform<N, L, B, S>(
        &self,
        ctx: &JobContext,
        registry: &InstallationRegistry,
        node: &N,
        launcher: &L,
        listener: &mut B,
        sink: S,
    ) -> bool
    where
        N: NodeHandle,
        L: ProcessLauncher,
        B: BuildListener,
        S: LogSink + Send,
    {
        match self.run(ctx, registry, node, launcher, listener, sink).await {
            Ok(code) => {
                debug!(code, "EasyAnt subprocess finished");
                code == 0
            }
            Err(error) => {
                match &error {
                    StepError::ExecutableNotFound { .. } => listener.error(&error.to_string()),
                    StepError::BuildFileNotFound { .. } => listener.fatal_error(&error.to_string()),
                    StepError::Launch(_) => listener.fatal_error(&error.to_string()),
                }
                warn!(%error, "EasyAnt step failed");
                false
            }
        }
    }

    async fn run<N, L, B, S>(
        &self,
        ctx: &JobContext,
        registry: &InstallationRegistry,
        node: &N,
        launcher: &L,
        listener: &mut B,
        sink: S,
    ) -> Result<i32, StepError>
    where
        N: NodeHandle,
        L: ProcessLauncher,
        B: BuildListener,
        S: LogSink + Send,
    {
        let mut env = ctx.env.clone();
        let windows = node.is_windows();

        let mut command = CommandLine::new();
        let resolved = self.resolve_executable(registry, node, &env, &mut command).await?;

        let build_module = env.expand_opt(self.build_module.as_deref());
        let build_file = env.expand_opt(self.build_file.as_deref());
        let targets = env.expand(&self.targets);

        if let Some(module) = &build_module {
            let path =
                resolve_build_path(node, &ctx.module_root, &ctx.workspace_root, module).await?;
            command.add_flag_value("-buildModule", file_name(&path));
        }
        if let Some(file) = &build_file {
            let path =
                resolve_build_path(node, &ctx.module_root, &ctx.workspace_root, file).await?;
            command.add_flag_value("-buildFile", file_name(&path));
        }

        command.add_key_value_pairs(
            "-D",
            ctx.build_variables
                .iter()
                .map(|(k, v)| (k.as_str(), v.as_str())),
            &ctx.sensitive_variables,
        );
        if let Some(properties) = &self.properties {
            command.add_properties_text("-D", properties, &env, &ctx.sensitive_variables);
        }
        command.add_tokenized(&targets);

        if let Some(resolved) = &resolved {
            env.put(EASYANT_HOME_VAR, resolved.home.clone());
        }
        if let Some(opts) = &self.easyant_opts {
            let expanded = env.expand(opts);
            env.put(EASYANT_OPTS_VAR, expanded);
        }

        if windows {
            command = command.to_windows_command();
        }

        let working_dir = working_directory(&ctx.module_root, build_file.as_deref());

        let spec = InvocationSpec {
            command,
            env,
            working_dir,
            windows,
        };

        let echo = spec.command.echo();
        listener.log(&format!("$ {echo}"));
        info!(command = %echo, "launching EasyAnt");

        let mut annotator = LineAnnotator::new(sink);
        let launched = launcher.launch(&spec, &mut annotator).await;
        let closed = annotator.close();
        let code = launched?;
        closed?;
        Ok(code)
    }

    async fn resolve_executable<N: NodeHandle>(
        &self,
        registry: &InstallationRegistry,
        node: &N,
        env: &EnvVars,
        command: &mut CommandLine,
    ) -> Result<Option<ResolvedInstallation>, StepError> {
        let Some(name) = &self.easyant_name else {
            command.add(installation::command_name(node.is_windows()));
            return Ok(None);
        };
        match installation::resolve(registry, name, node, env).await? {
            Resolution::Resolved(resolved) => {
                command.add(resolved.executable.to_string_lossy().into_owned());
                Ok(Some(resolved))
            }
            Resolution::NotFound => {
                command.add(installation::command_name(node.is_windows()));
                Ok(None)
            }
        }
    }
}

fn file_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default()
}

/// The step's working directory: the build file's containing directory
/// under the module root when a build file was configured, the module root
/// otherwise.
fn working_directory(module_root: &Path, build_file: Option<&str>) -> PathBuf {
    match build_file {
        Some(file) if !file.trim().is_empty() => match Path::new(file).parent() {
            Some(parent) if !parent.as_os_str().is_empty() => module_root.join(parent),
            _ => module_root.to_path_buf(),
        },
        _ => module_root.to_path_buf(),
    }
}
