//! Execution-node capability seam.
//!
//! A build step may run on a node whose filesystem namespace differs from
//! the control node's. Everything the step needs from that node goes
//! through this trait, so unit tests substitute an in-memory double and
//! production wires in real dispatch.

use std::io;
use std::path::Path;

/// Capabilities of a (possibly remote) execution node.
pub trait NodeHandle {
    /// Translate a control-node path into this node's convention.
    fn translate_path(&self, path: &str) -> String;

    /// Check file existence in the node's filesystem namespace.
    fn file_exists(&self, path: &Path) -> impl Future<Output = io::Result<bool>> + Send;

    /// Whether the node runs Windows. Picks the `easyant.bat` command name
    /// and the `cmd.exe` quoting rules.
    fn is_windows(&self) -> bool;
}

/// The node the current process runs on.
#[derive(Debug, Clone, Copy, Default)]
pub struct LocalNode;

impl NodeHandle for LocalNode {
    fn translate_path(&self, path: &str) -> String {
        path.to_string()
    }

    async fn file_exists(&self, path: &Path) -> io::Result<bool> {
        tokio::fs::try_exists(path).await
    }

    fn is_windows(&self) -> bool {
        cfg!(windows)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[tokio::test]
    async fn local_node_sees_real_files() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "x").unwrap();

        let node = LocalNode;
        assert!(node.file_exists(file.path()).await.unwrap());
        assert!(
            !node
                .file_exists(Path::new("/nonexistent/easyant/bin/easyant"))
                .await
                .unwrap()
        );
    }

    #[test]
    fn local_node_translation_is_identity() {
        assert_eq!(LocalNode.translate_path("/opt/easyant"), "/opt/easyant");
    }
}
