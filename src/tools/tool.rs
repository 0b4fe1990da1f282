//! Tool trait for locally-executed function calls.

use async_trait::async_trait;

use crate::error::Result;
use crate::provider::FunctionDeclaration;

/// A locally-executed tool the model can call during generation.
#[async_trait]
pub trait Tool: Send + Sync {
    /// Tool name (must match what the model calls).
    fn name(&self) -> &str;

    /// Human-readable description.
    fn description(&self) -> &str;

    /// JSON Schema for the tool's parameters.
    fn parameters(&self) -> serde_json::Value;

    /// Execute with the model-supplied arguments.
    async fn execute(&self, args: &serde_json::Value) -> Result<serde_json::Value>;

    /// The declaration advertised to the provider.
    fn declaration(&self) -> FunctionDeclaration {
        FunctionDeclaration {
            name: self.name().to_string(),
            description: self.description().to_string(),
            parameters: self.parameters(),
        }
    }
}
