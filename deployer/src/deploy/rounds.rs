//! Round-over-round accumulation of the narrative document and artifact
//!
//! The narrative document doubles as the round ledger: a round counts as
//! applied once its `## Round N` heading exists there. The artifact is
//! reconciled first so that a failed generation never records a round.

use tracing::info;

use crate::deploy::reconciler::apply;
use crate::errors::DeployerError;
use crate::generate::{fresh_prompt, generate, revision_prompt, TextGenerator};
use crate::hosting::HostingProvider;
use crate::models::repository::{
    FileContent, FileDesired, FileLookup, ReconciliationOutcome, RepositoryHandle,
};

pub const NARRATIVE_PATH: &str = "README.md";
pub const ARTIFACT_PATH: &str = "index.html";

/// Per-file outcomes of one round
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RoundOutcome {
    pub artifact: ReconciliationOutcome,
    pub narrative: ReconciliationOutcome,
}

fn round_heading(round: u32) -> String {
    format!("## Round {}", round)
}

/// Whether `narrative` already records `round`
pub fn round_applied(narrative: &str, round: u32) -> bool {
    let heading = round_heading(round);
    narrative.lines().any(|line| line.trim_end() == heading)
}

/// Initial narrative document of a task
pub fn seed_narrative(task_id: &str) -> String {
    format!(
        "# {}\n\nAuto-generated via LLM. Each round's brief is recorded below.\n",
        task_id
    )
}

/// Append the section for `round` unless it is already there
pub fn append_round(existing: &str, round: u32, brief: &str) -> String {
    if round_applied(existing, round) {
        return existing.to_string();
    }

    let mut narrative = existing.to_string();
    if !narrative.is_empty() && !narrative.ends_with('\n') {
        narrative.push('\n');
    }
    narrative.push('\n');
    narrative.push_str(&round_heading(round));
    narrative.push_str("\n\n");
    match brief.trim() {
        "" => narrative.push_str("_No brief provided._"),
        brief => narrative.push_str(brief),
    }
    narrative.push('\n');
    narrative
}

/// Reconcile the artifact and narrative document for one round
pub async fn accumulate_round(
    provider: &dyn HostingProvider,
    generator: &dyn TextGenerator,
    repo: &RepositoryHandle,
    task_id: &str,
    round: u32,
    brief: &str,
) -> Result<RoundOutcome, DeployerError> {
    let narrative = provider.read_file(repo, NARRATIVE_PATH).await?;
    let already_applied = narrative
        .text()
        .is_some_and(|text| round_applied(&text, round));

    let artifact = reconcile_artifact(provider, generator, repo, round, brief, already_applied).await?;
    let narrative = reconcile_narrative(provider, repo, task_id, round, brief, narrative).await?;

    Ok(RoundOutcome {
        artifact,
        narrative,
    })
}

async fn reconcile_artifact(
    provider: &dyn HostingProvider,
    generator: &dyn TextGenerator,
    repo: &RepositoryHandle,
    round: u32,
    brief: &str,
    already_applied: bool,
) -> Result<ReconciliationOutcome, DeployerError> {
    let existing = provider.read_file(repo, ARTIFACT_PATH).await?;
    if already_applied && existing.exists() {
        info!("Round {} already applied, keeping {}", round, ARTIFACT_PATH);
        return Ok(ReconciliationOutcome::Unchanged);
    }

    let (prompt, message) = if round <= 1 {
        (fresh_prompt(brief), format!("Round {}: generate {}", round, ARTIFACT_PATH))
    } else {
        let prior = existing.text().unwrap_or_default();
        info!("Revising {} ({} bytes of prior content)", ARTIFACT_PATH, prior.len());
        (
            revision_prompt(&prior, brief),
            format!("Round {}: revise {}", round, ARTIFACT_PATH),
        )
    };

    let artifact = generate(generator, &prompt).await?;
    let desired = FileDesired {
        path: ARTIFACT_PATH.to_string(),
        content: FileContent::Text(artifact),
        commit_message: message,
    };
    apply(provider, repo, &desired, existing).await
}

async fn reconcile_narrative(
    provider: &dyn HostingProvider,
    repo: &RepositoryHandle,
    task_id: &str,
    round: u32,
    brief: &str,
    existing: FileLookup,
) -> Result<ReconciliationOutcome, DeployerError> {
    let current = existing.text().unwrap_or_else(|| seed_narrative(task_id));
    let desired = FileDesired {
        path: NARRATIVE_PATH.to_string(),
        content: FileContent::Text(append_round(&current, round, brief)),
        commit_message: format!("Round {}: record brief in {}", round, NARRATIVE_PATH),
    };
    apply(provider, repo, &desired, existing).await
}
