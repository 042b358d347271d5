//! Running conversion hooks
//!
//! [`CommandExecutor`] runs a hook command with two files:
//! - `BINDING_CONTEXT_PATH`: JSON array of binding contexts to read
//! - `CONVERSION_RESPONSE_PATH`: where the hook writes its [`ConversionResponse`]

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use thiserror::Error;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::conversion::types::{ConversionResponse, ResponseError};

use super::binding_context::BindingExecutionInfo;
use super::manager::Hook;

/// Environment variable with the binding context file path
pub const BINDING_CONTEXT_PATH_ENV: &str = "BINDING_CONTEXT_PATH";

/// Environment variable with the conversion response file path
pub const CONVERSION_RESPONSE_PATH_ENV: &str = "CONVERSION_RESPONSE_PATH";

#[derive(Debug, Error)]
pub enum ExecutionError {
    #[error("hook '{0}' has an empty command")]
    EmptyCommand(String),

    #[error("hook I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("cannot serialize binding context: {0}")]
    Serialize(#[from] serde_json::Error),

    #[error("hook '{hook}' failed with {status}: {stderr}")]
    Failed {
        hook: String,
        status: String,
        stderr: String,
    },

    #[error("hook '{0}' wrote no conversion response")]
    NoResponse(String),

    #[error(transparent)]
    Response(#[from] ResponseError),
}

/// Runs a hook for a binding execution
///
/// Production code uses `CommandExecutor`.
/// Tests use in-memory executors that convert objects directly.
#[async_trait]
pub trait HookExecutor: Send + Sync {
    async fn run(
        &self,
        hook: &Hook,
        info: &BindingExecutionInfo,
    ) -> Result<ConversionResponse, ExecutionError>;
}

/// Executor that runs the hook command as a child process
#[derive(Debug, Clone)]
pub struct CommandExecutor {
    tmp_dir: PathBuf,
}

impl CommandExecutor {
    pub fn new(tmp_dir: impl Into<PathBuf>) -> Self {
        Self {
            tmp_dir: tmp_dir.into(),
        }
    }

    fn tmp_path(&self, hook: &Hook, kind: &str) -> PathBuf {
        self.tmp_dir
            .join(format!("hook-{}-{}-{}.json", hook.name, kind, Uuid::new_v4()))
    }

    async fn run_command(
        &self,
        hook: &Hook,
        info: &BindingExecutionInfo,
        context_path: &Path,
        response_path: &Path,
    ) -> Result<ConversionResponse, ExecutionError> {
        let (program, args) = hook
            .command
            .split_first()
            .ok_or_else(|| ExecutionError::EmptyCommand(hook.name.clone()))?;

        tokio::fs::write(context_path, serde_json::to_vec(&info.binding_context)?).await?;

        debug!(
            hook = %hook.name,
            binding = %info.binding,
            "Running conversion hook"
        );

        let output = tokio::process::Command::new(program)
            .args(args)
            .env(BINDING_CONTEXT_PATH_ENV, context_path)
            .env(CONVERSION_RESPONSE_PATH_ENV, response_path)
            .output()
            .await?;

        if !output.status.success() {
            return Err(ExecutionError::Failed {
                hook: hook.name.clone(),
                status: output.status.to_string(),
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }

        if !response_path.exists() {
            return Err(ExecutionError::NoResponse(hook.name.clone()));
        }
        ConversionResponse::from_file(response_path)?
            .ok_or_else(|| ExecutionError::NoResponse(hook.name.clone()))
    }
}

#[async_trait]
impl HookExecutor for CommandExecutor {
    async fn run(
        &self,
        hook: &Hook,
        info: &BindingExecutionInfo,
    ) -> Result<ConversionResponse, ExecutionError> {
        let context_path = self.tmp_path(hook, "binding-context");
        let response_path = self.tmp_path(hook, "conversion-response");

        let result = self
            .run_command(hook, info, &context_path, &response_path)
            .await;

        for path in [&context_path, &response_path] {
            if let Err(e) = tokio::fs::remove_file(path).await {
                if e.kind() != std::io::ErrorKind::NotFound {
                    warn!(path = %path.display(), error = %e, "Failed to remove hook temp file");
                }
            }
        }

        result
    }
}

#[cfg(test)]
#[path = "executor_test.rs"]
mod tests;
