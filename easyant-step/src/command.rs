//! Invocation construction.
//!
//! Builds the subprocess argument list: executable, module/build-file
//! flags, `-Dkey=value` property flags with sensitive-value masking, and
//! target tokens, plus the Windows `cmd.exe` wrapping with its empty-value
//! fix-up. Sensitive values ride in the argument list for execution but are
//! masked in every textual echo.

use crate::env::EnvVars;
use crate::error::StepError;
use crate::node::NodeHandle;
use crate::properties::parse_properties;
use std::borrow::Cow;
use std::collections::HashSet;
use std::path::{Path, PathBuf};

/// Placeholder used for masked values in command echoes.
const MASK: &str = "***";

/// An argument list with a parallel mask bit per argument.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommandLine {
    args: Vec<String>,
    masks: Vec<bool>,
}

impl CommandLine {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, arg: impl Into<String>) -> &mut Self {
        self.args.push(arg.into());
        self.masks.push(false);
        self
    }

    pub fn add_masked(&mut self, arg: impl Into<String>) -> &mut Self {
        self.args.push(arg.into());
        self.masks.push(true);
        self
    }

    /// Add a flag followed by its value as two arguments.
    pub fn add_flag_value(&mut self, flag: &str, value: impl Into<String>) -> &mut Self {
        self.add(flag);
        self.add(value.into());
        self
    }

    /// Append one `<prefix><key>=<value>` flag per pair. Pairs whose key is
    /// in `sensitive` are passed through for execution but masked in echoes.
    pub fn add_key_value_pairs<'a>(
        &mut self,
        prefix: &str,
        pairs: impl IntoIterator<Item = (&'a str, &'a str)>,
        sensitive: &HashSet<String>,
    ) -> &mut Self {
        for (key, value) in pairs {
            let arg = format!("{prefix}{key}={value}");
            if sensitive.contains(key) {
                self.add_masked(arg);
            } else {
                self.add(arg);
            }
        }
        self
    }

    /// Append flags parsed from properties text, expanding `${VAR}`
    /// references in values against the job environment, in file order.
    pub fn add_properties_text(
        &mut self,
        prefix: &str,
        text: &str,
        env: &EnvVars,
        sensitive: &HashSet<String>,
    ) -> &mut Self {
        for (key, value) in parse_properties(text) {
            let expanded = env.expand(&value);
            self.add_key_value_pairs(prefix, [(key.as_str(), expanded.as_str())], sensitive);
        }
        self
    }

    /// Append whitespace-separated tokens, preserving order.
    pub fn add_tokenized(&mut self, text: &str) -> &mut Self {
        for token in text.split_whitespace() {
            self.add(token);
        }
        self
    }

    pub fn args(&self) -> &[String] {
        &self.args
    }

    pub fn is_empty(&self) -> bool {
        self.args.is_empty()
    }

    /// Render the command for logs and diagnostics, masking sensitive
    /// values. A masked `-Dkey=value` flag keeps the key and replaces the
    /// value; any other masked argument is replaced wholesale.
    pub fn echo(&self) -> String {
        let rendered: Vec<Cow<'_, str>> = self
            .args
            .iter()
            .zip(&self.masks)
            .map(|(arg, &masked)| {
                if masked {
                    Cow::Owned(mask_argument(arg))
                } else {
                    shell_escape::unix::escape(Cow::Borrowed(arg.as_str()))
                }
            })
            .collect();
        rendered.join(" ")
    }

    /// Wrap the invocation for `cmd.exe`.
    ///
    /// The whole command becomes a single `cmd.exe /C` token. `cmd.exe`
    /// rejects a bare trailing `=` on a property flag, so empty-valued
    /// `-Dkey=` flags inside that final token get their value quoted as
    /// `""`; everything else is left untouched. The final token is masked
    /// as a whole if any source argument was.
    pub fn to_windows_command(&self) -> CommandLine {
        let joined = self
            .args
            .iter()
            .map(|arg| shell_escape::windows::escape(Cow::Borrowed(arg.as_str())))
            .collect::<Vec<_>>()
            .join(" ");
        let fixed = fix_empty_property_values(&joined);

        let mut wrapped = CommandLine::new();
        wrapped.add("cmd.exe");
        wrapped.add("/C");
        if self.masks.iter().any(|&m| m) {
            wrapped.add_masked(fixed);
        } else {
            wrapped.add(fixed);
        }
        wrapped
    }
}

fn mask_argument(arg: &str) -> String {
    match arg.split_once('=') {
        // A flag keeps its key; anything else is blanked wholesale.
        Some((key, _)) if key.starts_with('-') => format!("{key}={MASK}"),
        _ => MASK.to_string(),
    }
}

/// Quote empty `-Dkey=` values inside a joined command string.
///
/// Matches only space-delimited `-Dkey=` words that are followed by
/// another word (the flag must precede something for `cmd.exe` to trip
/// over it) and whose key carries no quote character.
fn fix_empty_property_values(joined: &str) -> String {
    let words: Vec<&str> = joined.split(' ').collect();
    let last = words.len().saturating_sub(1);
    words
        .iter()
        .enumerate()
        .map(|(i, word)| {
            if i > 0 && i < last && is_empty_property_flag(word) {
                format!("{word}\"\"")
            } else {
                (*word).to_string()
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}

fn is_empty_property_flag(word: &str) -> bool {
    word.len() >= 4
        && word.starts_with("-D")
        && word.ends_with('=')
        && !word[2..word.len() - 1].contains('"')
}

/// Resolve a build module/file path against the module root, falling back
/// to the workspace root.
///
/// Version-control layouts sometimes put the module root elsewhere than
/// the workspace root, so a path missing under the first is retried under
/// the second. When neither exists the diagnostic names the module-root
/// candidate, which is what the user most likely meant.
pub async fn resolve_build_path<N: NodeHandle>(
    node: &N,
    module_root: &Path,
    workspace_root: &Path,
    file: &str,
) -> Result<PathBuf, StepError> {
    let candidate = module_root.join(file);
    if node.file_exists(&candidate).await? {
        return Ok(candidate);
    }

    let fallback = workspace_root.join(file);
    if node.file_exists(&fallback).await? {
        return Ok(fallback);
    }

    Err(StepError::BuildFileNotFound {
        attempted: candidate,
    })
}

/// Everything needed to launch the build subprocess.
#[derive(Debug, Clone)]
pub struct InvocationSpec {
    pub command: CommandLine,
    /// Full environment for the subprocess, job overrides included.
    pub env: EnvVars,
    pub working_dir: PathBuf,
    pub windows: bool,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::MockNode;

    fn sensitive(keys: &[&str]) -> HashSet<String> {
        keys.iter().map(|k| k.to_string()).collect()
    }

    #[test]
    fn key_value_pairs_execute_in_cleartext_but_echo_masked() {
        let mut cmd = CommandLine::new();
        cmd.add("easyant");
        cmd.add_key_value_pairs("-D", [("SECRET", "hunter2")], &sensitive(&["SECRET"]));

        assert_eq!(cmd.args(), &["easyant", "-DSECRET=hunter2"]);
        let echo = cmd.echo();
        assert!(echo.contains("-DSECRET=***"));
        assert!(!echo.contains("hunter2"));
    }

    #[test]
    fn properties_text_expands_values_in_file_order() {
        let env = EnvVars::from([("STAGE", "prod")]);
        let mut cmd = CommandLine::new();
        cmd.add_properties_text("-D", "first=1\nstage=${STAGE}\n", &env, &HashSet::new());
        assert_eq!(cmd.args(), &["-Dfirst=1", "-Dstage=prod"]);
    }

    #[test]
    fn tokenized_targets_preserve_order() {
        let mut cmd = CommandLine::new();
        cmd.add_tokenized("clean compile  dist");
        assert_eq!(cmd.args(), &["clean", "compile", "dist"]);
    }

    #[test]
    fn echo_quotes_arguments_with_spaces() {
        let mut cmd = CommandLine::new();
        cmd.add("/opt/easy ant/bin/easyant");
        assert_eq!(cmd.echo(), "'/opt/easy ant/bin/easyant'");
    }

    #[test]
    fn windows_command_quotes_empty_property_values_only() {
        let mut cmd = CommandLine::new();
        cmd.add("easyant.bat");
        cmd.add("-Dfoo=");
        cmd.add("-Dbar=baz");
        cmd.add("dist");

        let wrapped = cmd.to_windows_command();
        assert_eq!(wrapped.args()[..2], ["cmd.exe", "/C"]);
        assert_eq!(wrapped.args()[2], "easyant.bat -Dfoo=\"\" -Dbar=baz dist");
    }

    #[test]
    fn windows_fixup_skips_trailing_flag_and_quoted_keys() {
        // A trailing empty flag has no following word; cmd.exe never sees
        // a dangling `= ` there, so it stays untouched.
        assert_eq!(
            fix_empty_property_values("easyant.bat -Dfoo="),
            "easyant.bat -Dfoo="
        );
        assert_eq!(
            fix_empty_property_values("easyant.bat -D\"q\"= dist"),
            "easyant.bat -D\"q\"= dist"
        );
        assert_eq!(
            fix_empty_property_values("easyant.bat -D= dist"),
            "easyant.bat -D= dist"
        );
    }

    #[test]
    fn windows_command_masks_the_joined_token_when_any_source_was_masked() {
        let mut cmd = CommandLine::new();
        cmd.add("easyant.bat");
        cmd.add_key_value_pairs("-D", [("TOKEN", "tok")], &sensitive(&["TOKEN"]));

        let wrapped = cmd.to_windows_command();
        // Execution still carries the cleartext value.
        assert!(wrapped.args()[2].contains("-DTOKEN=tok"));
        assert!(!wrapped.echo().contains("tok"));
    }

    #[tokio::test]
    async fn build_path_prefers_module_root() {
        let node = MockNode::new()
            .with_file("/job/module/build.xml")
            .with_file("/job/workspace/build.xml");
        let resolved = resolve_build_path(
            &node,
            Path::new("/job/module"),
            Path::new("/job/workspace"),
            "build.xml",
        )
        .await
        .unwrap();
        assert_eq!(resolved, PathBuf::from("/job/module/build.xml"));
    }

    #[tokio::test]
    async fn build_path_falls_back_to_workspace_root() {
        let node = MockNode::new().with_file("/job/workspace/build.xml");
        let resolved = resolve_build_path(
            &node,
            Path::new("/job/module"),
            Path::new("/job/workspace"),
            "build.xml",
        )
        .await
        .unwrap();
        assert_eq!(resolved, PathBuf::from("/job/workspace/build.xml"));
    }

    #[tokio::test]
    async fn build_path_missing_everywhere_names_module_candidate() {
        let node = MockNode::new();
        let err = resolve_build_path(
            &node,
            Path::new("/job/module"),
            Path::new("/job/workspace"),
            "build.xml",
        )
        .await
        .unwrap_err();
        match err {
            StepError::BuildFileNotFound { attempted } => {
                assert_eq!(attempted, PathBuf::from("/job/module/build.xml"));
            }
            other => panic!("unexpected error: {other}"),
        }
    }
}
