//! Workspace file access: the collaborator behind the `read_file` tool.

use std::path::PathBuf;
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::json;

use crate::error::{Result, TernError};

use super::tool::Tool;

/// Read-only view of the active project's files.
#[async_trait]
pub trait Workspace: Send + Sync {
    /// Relative paths of the files available to the model.
    async fn list_files(&self) -> Vec<String>;

    /// Read one file's text content.
    async fn read_file(&self, path: &str) -> Result<String>;
}

/// Workspace backed by a directory on disk.
pub struct DirWorkspace {
    root: PathBuf,
}

impl DirWorkspace {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    fn resolve(&self, path: &str) -> Result<PathBuf> {
        if path.contains("..") || path.starts_with('/') {
            return Err(TernError::ToolExecution {
                tool_name: "read_file".to_string(),
                message: format!("path escapes workspace: {path}"),
            });
        }
        Ok(self.root.join(path))
    }
}

#[async_trait]
impl Workspace for DirWorkspace {
    async fn list_files(&self) -> Vec<String> {
        let mut files = Vec::new();
        let mut pending = vec![self.root.clone()];
        while let Some(dir) = pending.pop() {
            let Ok(mut entries) = tokio::fs::read_dir(&dir).await else { continue };
            while let Ok(Some(entry)) = entries.next_entry().await {
                let path = entry.path();
                if path.is_dir() {
                    pending.push(path);
                } else if let Ok(rel) = path.strip_prefix(&self.root) {
                    files.push(rel.to_string_lossy().to_string());
                }
            }
        }
        files.sort();
        files
    }

    async fn read_file(&self, path: &str) -> Result<String> {
        let full = self.resolve(path)?;
        tokio::fs::read_to_string(&full)
            .await
            .map_err(|e| TernError::ToolExecution {
                tool_name: "read_file".to_string(),
                message: format!("{path}: {e}"),
            })
    }
}

/// The built-in `read_file(filepath)` tool.
pub struct ReadFileTool {
    workspace: Arc<dyn Workspace>,
}

impl ReadFileTool {
    pub fn new(workspace: Arc<dyn Workspace>) -> Self {
        Self { workspace }
    }
}

#[async_trait]
impl Tool for ReadFileTool {
    fn name(&self) -> &str {
        "read_file"
    }

    fn description(&self) -> &str {
        "Read the text content of a file from the active project"
    }

    fn parameters(&self) -> serde_json::Value {
        json!({
            "type": "object",
            "properties": {
                "filepath": {
                    "type": "string",
                    "description": "Project-relative path of the file to read"
                }
            },
            "required": ["filepath"]
        })
    }

    async fn execute(&self, args: &serde_json::Value) -> Result<serde_json::Value> {
        let path = args
            .get("filepath")
            .and_then(serde_json::Value::as_str)
            .ok_or_else(|| TernError::ToolExecution {
                tool_name: "read_file".to_string(),
                message: "missing required argument 'filepath'".to_string(),
            })?;
        let content = self.workspace.read_file(path).await?;
        Ok(json!({ "content": content }))
    }
}

/// System-prompt preamble describing the files the model can request.
pub async fn file_preamble(workspace: &dyn Workspace) -> String {
    let files = workspace.list_files().await;
    if files.is_empty() {
        return String::new();
    }
    let mut preamble = String::from(
        "You have read access to the user's project files via the read_file tool. \
         Available files:\n",
    );
    for file in files {
        preamble.push_str("- ");
        preamble.push_str(&file);
        preamble.push('\n');
    }
    preamble
}
