//! EasyAnt installation records, registry, and executable resolution.
//!
//! Administrators configure named installations pointing at a distribution's
//! home directory. During a build the shared record is never mutated;
//! node- and environment-specific views are derived per execution, and the
//! executable's existence is verified in the execution node's context.

use crate::env::EnvVars;
use crate::error::StepError;
use crate::node::NodeHandle;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::{Arc, RwLock};
use tracing::debug;

/// Command name used when no installation is configured, Unix flavor.
pub const UNIX_EASYANT_COMMAND: &str = "easyant";

/// Command name used when no installation is configured, Windows flavor.
pub const WINDOWS_EASYANT_COMMAND: &str = "easyant.bat";

/// Platform-appropriate command name.
pub fn command_name(windows: bool) -> &'static str {
    if windows {
        WINDOWS_EASYANT_COMMAND
    } else {
        UNIX_EASYANT_COMMAND
    }
}

/// A named, administrator-configured EasyAnt installation.
///
/// The home path may still contain `${VAR}` references; they are expanded
/// per execution via [`EasyAntInstallation::for_environment`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EasyAntInstallation {
    name: String,
    home: String,
}

impl EasyAntInstallation {
    /// Create an installation, laundering the home path.
    ///
    /// The build tool rejects a home ending in a path separator, so exactly
    /// one trailing `/` or `\` is stripped at construction.
    pub fn new(name: impl Into<String>, home: impl Into<String>) -> Self {
        let home = home.into();
        let home = match home.strip_suffix('/').or_else(|| home.strip_suffix('\\')) {
            Some(stripped) => stripped.to_string(),
            None => home,
        };
        Self {
            name: name.into(),
            home,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn home(&self) -> &str {
        &self.home
    }

    /// Derive the node-specific view: the home re-homed to the execution
    /// node's filesystem convention.
    pub fn for_node<N: NodeHandle>(&self, node: &N) -> Self {
        Self {
            name: self.name.clone(),
            home: node.translate_path(&self.home),
        }
    }

    /// Derive the environment-specific view: `${VAR}` references in the
    /// home expanded against the job environment.
    pub fn for_environment(&self, env: &EnvVars) -> Self {
        Self {
            name: self.name.clone(),
            home: env.expand(&self.home),
        }
    }

    /// Candidate executable path under this home for the node's platform.
    pub fn executable_path(&self, windows: bool) -> PathBuf {
        Path::new(&self.home).join("bin").join(command_name(windows))
    }

    /// Locate the executable on the execution node, checking existence in
    /// the node's filesystem context.
    pub async fn executable<N: NodeHandle>(&self, node: &N) -> io::Result<Option<PathBuf>> {
        let candidate = self.executable_path(node.is_windows());
        if node.file_exists(&candidate).await? {
            Ok(Some(candidate))
        } else {
            Ok(None)
        }
    }
}

/// A fully resolved installation, valid for one (node, environment) pair.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedInstallation {
    pub name: String,
    /// Home with node translation and environment expansion applied.
    pub home: String,
    /// Verified executable path on the execution node.
    pub executable: PathBuf,
}

/// Outcome of looking up a named installation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Resolution {
    /// No installation with that name is configured; the caller invokes the
    /// bare command and relies on the node's search path.
    NotFound,
    Resolved(ResolvedInstallation),
}

/// Resolve a named installation for a node and environment.
///
/// A missing executable under a configured home is a fatal condition, not a
/// fallback: the administrator pointed the job at a broken installation.
pub async fn resolve<N: NodeHandle>(
    registry: &InstallationRegistry,
    name: &str,
    node: &N,
    env: &EnvVars,
) -> Result<Resolution, StepError> {
    let Some(installation) = registry.find(name) else {
        debug!(name, "no EasyAnt installation configured under this name");
        return Ok(Resolution::NotFound);
    };

    let specific = installation.for_node(node).for_environment(env);
    match specific.executable(node).await? {
        Some(executable) => {
            debug!(name, exe = %executable.display(), "resolved EasyAnt executable");
            Ok(Resolution::Resolved(ResolvedInstallation {
                name: specific.name,
                home: specific.home,
                executable,
            }))
        }
        None => Err(StepError::ExecutableNotFound {
            path: specific.executable_path(node.is_windows()),
        }),
    }
}

/// Process-wide, read-mostly registry of configured installations.
///
/// Reads take an immutable snapshot; administrative updates replace the
/// whole list atomically. A running step keeps whatever snapshot it took.
#[derive(Debug)]
pub struct InstallationRegistry {
    installations: RwLock<Arc<[EasyAntInstallation]>>,
}

impl InstallationRegistry {
    pub fn new() -> Self {
        Self {
            installations: RwLock::new(Arc::from(Vec::new())),
        }
    }

    /// Replace the full list of installations.
    pub fn replace(&self, installations: Vec<EasyAntInstallation>) {
        *self.installations.write().unwrap() = Arc::from(installations);
    }

    /// Current immutable snapshot, in configuration order.
    pub fn snapshot(&self) -> Arc<[EasyAntInstallation]> {
        Arc::clone(&self.installations.read().unwrap())
    }

    /// First installation whose name matches exactly.
    pub fn find(&self, name: &str) -> Option<EasyAntInstallation> {
        self.snapshot().iter().find(|i| i.name() == name).cloned()
    }
}

impl Default for InstallationRegistry {
    fn default() -> Self {
        Self::new()
    }
}

/// Administration-time diagnostic for a configured home directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HomeValidation {
    Ok,
    /// The path is not a directory.
    NotADirectory(PathBuf),
    /// The directory does not look like an EasyAnt distribution.
    MissingCore(PathBuf),
}

impl HomeValidation {
    pub fn is_ok(&self) -> bool {
        matches!(self, HomeValidation::Ok)
    }
}

impl std::fmt::Display for HomeValidation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            HomeValidation::Ok => write!(f, "ok"),
            HomeValidation::NotADirectory(path) => {
                write!(f, "{} is not a directory", path.display())
            }
            HomeValidation::MissingCore(path) => {
                write!(
                    f,
                    "{} does not look like an EasyAnt directory (missing lib/easyant-core.jar)",
                    path.display()
                )
            }
        }
    }
}

/// Validate a home directory on the local filesystem.
///
/// An empty path validates clean so a half-filled form does not nag.
pub fn validate_home(home: &Path) -> HomeValidation {
    if home.as_os_str().is_empty() {
        return HomeValidation::Ok;
    }
    if !home.is_dir() {
        return HomeValidation::NotADirectory(home.to_path_buf());
    }
    if !home.join("lib").join("easyant-core.jar").exists() {
        return HomeValidation::MissingCore(home.to_path_buf());
    }
    HomeValidation::Ok
}
