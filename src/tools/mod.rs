//! Locally-executed tools and the workspace collaborator.

pub mod tool;
pub mod workspace;

pub use tool::Tool;
pub use workspace::{file_preamble, DirWorkspace, ReadFileTool, Workspace};
