use std::io::ErrorKind;
use std::path::Path;

use tokio::process::Command;
use tracing::debug;

use crate::error::{ArticleError, Result};

/// External tool invocation: binary, arguments and a human readable description
#[derive(Debug, Clone)]
pub struct ToolCommand {
    pub binary_path: String,
    pub args: Vec<String>,
    pub description: String,
}

/// Captured result of a finished tool invocation
#[derive(Debug, Clone)]
pub struct ToolOutput {
    pub stdout: String,
    pub stderr: String,
}

impl ToolCommand {
    pub fn new<S1: Into<String>, S2: Into<String>>(binary_path: S1, description: S2) -> Self {
        Self {
            binary_path: binary_path.into(),
            args: Vec::new(),
            description: description.into(),
        }
    }

    /// Add an argument
    pub fn arg<S: Into<String>>(mut self, arg: S) -> Self {
        self.args.push(arg.into());
        self
    }

    /// Add multiple arguments
    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(|s| s.into()));
        self
    }

    /// Add a path argument
    pub fn path<P: AsRef<Path>>(self, path: P) -> Self {
        self.arg(path.as_ref().to_string_lossy().to_string())
    }

    /// Add a `flag value` pair
    pub fn option<S1: Into<String>, S2: Into<String>>(self, flag: S1, value: S2) -> Self {
        self.arg(flag).arg(value)
    }

    /// Whether the binary can be launched at all
    pub async fn is_available(&self) -> bool {
        match Command::new(&self.binary_path).args(&self.args).output().await {
            Ok(_) => true,
            Err(e) => {
                debug!("{} is not available: {}", self.binary_path, e);
                false
            }
        }
    }

    /// Run to completion; a non-zero exit status is an error carrying stderr.
    ///
    /// `on_failure` maps the failure message into the caller's error kind.
    pub async fn execute<F>(&self, on_failure: F) -> Result<ToolOutput>
    where
        F: Fn(String) -> ArticleError,
    {
        debug!("Executing: {} {:?}", self.binary_path, self.args);
        debug!("Description: {}", self.description);

        let output = Command::new(&self.binary_path)
            .args(&self.args)
            .output()
            .await
            .map_err(|e| match e.kind() {
                ErrorKind::NotFound => ArticleError::DependencyMissing {
                    dependency: self.binary_path.clone(),
                    hint: format!("required for {}", self.description.to_lowercase()),
                },
                _ => on_failure(format!("Failed to execute {}: {}", self.binary_path, e)),
            })?;

        let stdout = String::from_utf8_lossy(&output.stdout).to_string();
        let stderr = String::from_utf8_lossy(&output.stderr).to_string();

        if !output.status.success() {
            return Err(on_failure(format!(
                "{} failed ({}): {}",
                self.description,
                output.status,
                stderr.trim()
            )));
        }

        Ok(ToolOutput { stdout, stderr })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_missing_binary_is_dependency_missing() {
        let command = ToolCommand::new("v2a-no-such-binary-4f2a", "Probe").arg("--version");

        assert!(!command.is_available().await);
        let result = command.execute(ArticleError::Generation).await;
        assert!(matches!(result, Err(ArticleError::DependencyMissing { .. })));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_execute_captures_stdout_and_failures() {
        let ok = ToolCommand::new("sh", "Echo")
            .option("-c", "printf hello")
            .execute(ArticleError::Retrieval)
            .await
            .unwrap();
        assert_eq!(ok.stdout, "hello");

        let failed = ToolCommand::new("sh", "Failing step")
            .option("-c", "echo boom >&2; exit 3")
            .execute(ArticleError::Retrieval)
            .await;
        match failed {
            Err(ArticleError::Retrieval(message)) => {
                assert!(message.contains("Failing step"));
                assert!(message.contains("boom"));
            }
            other => panic!("unexpected result: {:?}", other),
        }
    }
}
