//! Embeds the commit and build time reported by `GET /version` and `--version`

use std::env;
use std::process::Command;

use chrono::Utc;

/// Set by image builds that have no `.git` directory
const HASH_OVERRIDE_VAR: &str = "DEPLOYER_GIT_HASH";

fn main() {
    let git_hash = env::var(HASH_OVERRIDE_VAR)
        .ok()
        .filter(|hash| !hash.trim().is_empty())
        .or_else(head_commit)
        .unwrap_or_else(|| "unknown".to_string());

    let build_time = Utc::now().to_rfc3339_opts(chrono::SecondsFormat::Secs, true);

    println!("cargo:rustc-env=GIT_HASH={}", git_hash);
    println!("cargo:rustc-env=BUILD_TIME={}", build_time);

    // The workspace root holds .git, one level above this crate
    println!("cargo:rerun-if-changed=../.git/HEAD");
    println!("cargo:rerun-if-env-changed={}", HASH_OVERRIDE_VAR);
}

fn head_commit() -> Option<String> {
    let output = Command::new("git")
        .args(["rev-parse", "--short=12", "HEAD"])
        .output()
        .ok()?;
    if !output.status.success() {
        return None;
    }
    let hash = String::from_utf8(output.stdout).ok()?;
    Some(hash.trim().to_string()).filter(|hash| !hash.is_empty())
}
