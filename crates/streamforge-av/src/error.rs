//! Error types for streamforge-av.

use std::time::Duration;

/// Result type alias using our Error type.
pub type Result<T> = std::result::Result<T, Error>;

/// Failure of a single external tool invocation.
#[derive(Debug, thiserror::Error)]
pub enum ToolError {
    /// The binary could not be started (missing, not executable, ...).
    #[error("failed to spawn {tool}: {source}")]
    Spawn {
        tool: String,
        #[source]
        source: std::io::Error,
    },

    /// The tool ran and exited unsuccessfully.
    #[error("{tool} exited with {}: {}", describe_exit(*exit_code), stderr.trim())]
    Execution {
        tool: String,
        /// `None` when the process was ended by a signal.
        exit_code: Option<i32>,
        stdout: String,
        stderr: String,
    },

    /// The tool exceeded its deadline and was killed.
    #[error("{tool} timed out after {after:?}")]
    Timeout { tool: String, after: Duration },

    /// Waiting on the child or reading its output failed.
    #[error("I/O error while running {tool}: {source}")]
    Io {
        tool: String,
        #[source]
        source: std::io::Error,
    },
}

impl ToolError {
    /// Name of the tool that failed.
    pub fn tool(&self) -> &str {
        match self {
            ToolError::Spawn { tool, .. }
            | ToolError::Execution { tool, .. }
            | ToolError::Timeout { tool, .. }
            | ToolError::Io { tool, .. } => tool,
        }
    }
}

fn describe_exit(code: Option<i32>) -> String {
    match code {
        Some(code) => format!("exit code {code}"),
        None => "a signal".to_string(),
    }
}

/// Errors that can occur while running a segmentation stage.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// An external tool failed.
    #[error(transparent)]
    Tool(#[from] ToolError),

    /// A required external tool is not available.
    #[error("tool not found: {tool}")]
    ToolNotFound { tool: String },

    /// The tool reported success but expected files are missing.
    #[error("expected output missing: {}", missing.join(", "))]
    PartialOutput { missing: Vec<String> },

    /// Workspace creation or publishing failed.
    #[error("workspace error: {0}")]
    Workspace(String),

    /// Invalid input provided.
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// An I/O error occurred.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    /// Create a tool not found error.
    pub fn tool_not_found(tool: impl Into<String>) -> Self {
        Self::ToolNotFound { tool: tool.into() }
    }

    /// Create a partial output error for a single missing path.
    pub fn missing(path: impl Into<String>) -> Self {
        Self::PartialOutput {
            missing: vec![path.into()],
        }
    }
}
