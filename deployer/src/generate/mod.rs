//! Artifact generation through a text-generation service

pub mod completions;
pub mod extract;

use async_trait::async_trait;
use tracing::{debug, info};

use crate::errors::DeployerError;
use crate::generate::extract::extract_code;

/// System instruction sent with every generation call
pub const SYSTEM_INSTRUCTION: &str = "You generate minimal, complete, deployable HTML/JS front-end code. \
Respond with a single self-contained file.";

/// A text-generation backend
#[async_trait]
pub trait TextGenerator: Send + Sync {
    /// Return the raw generated text for `prompt`
    async fn complete(&self, system: &str, prompt: &str) -> Result<String, DeployerError>;
}

/// Prompt for a first-round artifact, built from the brief alone
pub fn fresh_prompt(brief: &str) -> String {
    format!(
        "{}\nGenerate a complete, deployable single-file HTML/JS code snippet.",
        brief
    )
}

/// Prompt asking to evolve `existing` so that it satisfies `brief`
pub fn revision_prompt(existing: &str, brief: &str) -> String {
    format!(
        "Here is the existing code of a deployed single-file web page:\n\
```html\n{}\n```\n\n\
Modify this existing code to satisfy this new requirement, keeping all existing functionality:\n\
{}\n\n\
Return the complete updated file.",
        existing, brief
    )
}

/// Generate an artifact and strip the formatting around it
pub async fn generate(generator: &dyn TextGenerator, prompt: &str) -> Result<String, DeployerError> {
    debug!("Requesting generation ({} prompt bytes)", prompt.len());
    let raw = generator.complete(SYSTEM_INSTRUCTION, prompt).await?;
    let artifact = extract_code(&raw);
    info!("Generated artifact ({} bytes)", artifact.len());
    Ok(artifact)
}
