//! Test doubles for the node, launcher, listener, and sink seams.
//!
//! These run entirely in memory so unit tests exercise resolution,
//! command construction, and streaming without a real node or subprocess.

use crate::annotate::{LineAnnotator, LogSink};
use crate::classify::Marker;
use crate::command::InvocationSpec;
use crate::node::NodeHandle;
use crate::step::{BuildListener, ProcessLauncher};
use std::collections::{HashMap, HashSet};
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

/// In-memory execution node: a file set, a path translation table, and a
/// platform flavor.
#[derive(Debug, Default)]
pub struct MockNode {
    files: HashSet<PathBuf>,
    translations: HashMap<String, String>,
    windows: bool,
}

impl MockNode {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn windows(mut self, windows: bool) -> Self {
        self.windows = windows;
        self
    }

    /// Declare a file as existing on this node.
    pub fn with_file(mut self, path: impl Into<PathBuf>) -> Self {
        self.files.insert(path.into());
        self
    }

    /// Map a control-node path to this node's convention.
    pub fn with_translation(
        mut self,
        from: impl Into<String>,
        to: impl Into<String>,
    ) -> Self {
        self.translations.insert(from.into(), to.into());
        self
    }
}

impl NodeHandle for MockNode {
    fn translate_path(&self, path: &str) -> String {
        self.translations
            .get(path)
            .cloned()
            .unwrap_or_else(|| path.to_string())
    }

    async fn file_exists(&self, path: &Path) -> io::Result<bool> {
        Ok(self.files.contains(path))
    }

    fn is_windows(&self) -> bool {
        self.windows
    }
}

/// One event observed by a [`VecSink`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SinkEvent {
    Marker(Marker),
    Data(Vec<u8>),
}

/// Recording sink: keeps every marker and data call in order.
#[derive(Debug, Default)]
pub struct VecSink {
    events: Vec<SinkEvent>,
    close_count: usize,
}

impl VecSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> &[SinkEvent] {
        &self.events
    }

    /// All forwarded bytes, concatenated.
    pub fn bytes(&self) -> Vec<u8> {
        self.events
            .iter()
            .filter_map(|e| match e {
                SinkEvent::Data(bytes) => Some(bytes.as_slice()),
                SinkEvent::Marker(_) => None,
            })
            .collect::<Vec<_>>()
            .concat()
    }

    /// All markers, in emission order.
    pub fn markers(&self) -> Vec<Marker> {
        self.events
            .iter()
            .filter_map(|e| match e {
                SinkEvent::Marker(m) => Some(*m),
                SinkEvent::Data(_) => None,
            })
            .collect()
    }

    pub fn close_count(&self) -> usize {
        self.close_count
    }
}

impl LogSink for VecSink {
    fn marker(&mut self, marker: Marker) -> io::Result<()> {
        self.events.push(SinkEvent::Marker(marker));
        Ok(())
    }

    fn data(&mut self, bytes: &[u8]) -> io::Result<()> {
        self.events.push(SinkEvent::Data(bytes.to_vec()));
        Ok(())
    }

    fn close(&mut self) -> io::Result<()> {
        self.close_count += 1;
        Ok(())
    }
}

/// What a [`MockLauncher`] was asked to run.
#[derive(Debug, Clone)]
pub struct LaunchRecord {
    pub args: Vec<String>,
    pub env: HashMap<String, String>,
    pub working_dir: PathBuf,
}

/// Scripted launcher: plays back configured output chunks and an exit code,
/// or fails to launch, while recording every invocation.
#[derive(Debug)]
pub struct MockLauncher {
    output: Vec<Vec<u8>>,
    exit_code: i32,
    launch_error: Option<String>,
    launches: Mutex<Vec<LaunchRecord>>,
}

impl MockLauncher {
    pub fn new(exit_code: i32) -> Self {
        Self {
            output: Vec::new(),
            exit_code,
            launch_error: None,
            launches: Mutex::new(Vec::new()),
        }
    }

    /// Append a chunk of combined output to play back.
    pub fn with_output(mut self, chunk: impl Into<Vec<u8>>) -> Self {
        self.output.push(chunk.into());
        self
    }

    /// Fail the launch itself with an I/O error.
    pub fn with_launch_error(mut self, message: impl Into<String>) -> Self {
        self.launch_error = Some(message.into());
        self
    }

    pub fn launches(&self) -> Vec<LaunchRecord> {
        self.launches.lock().unwrap().clone()
    }
}

impl ProcessLauncher for MockLauncher {
    async fn launch<S: LogSink + Send>(
        &self,
        spec: &InvocationSpec,
        annotator: &mut LineAnnotator<S>,
    ) -> io::Result<i32> {
        self.launches.lock().unwrap().push(LaunchRecord {
            args: spec.command.args().to_vec(),
            env: spec
                .env
                .iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect(),
            working_dir: spec.working_dir.clone(),
        });

        if let Some(message) = &self.launch_error {
            return Err(io::Error::other(message.clone()));
        }

        for chunk in &self.output {
            annotator.write(chunk)?;
        }
        Ok(self.exit_code)
    }
}

/// Listener that records log lines, errors, and fatal diagnostics.
#[derive(Debug, Default)]
pub struct RecordingListener {
    pub lines: Vec<String>,
    pub errors: Vec<String>,
    pub fatals: Vec<String>,
}

impl RecordingListener {
    pub fn new() -> Self {
        Self::default()
    }
}

impl BuildListener for RecordingListener {
    fn log(&mut self, line: &str) {
        self.lines.push(line.to_string());
    }

    fn error(&mut self, message: &str) {
        self.errors.push(message.to_string());
    }

    fn fatal_error(&mut self, message: &str) {
        self.fatals.push(message.to_string());
    }
}
