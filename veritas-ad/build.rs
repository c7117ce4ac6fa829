//! Build identification for veritas-ad
//!
//! Exposes `GIT_HASH`, `BUILD_TIMESTAMP` and `BUILD_PROFILE` to the crate
//! via `env!`; `/health` and the startup banner report them.

use std::process::Command;

/// Set by packaging pipelines that build from a source tarball
const GIT_HASH_OVERRIDE: &str = "VERITAS_BUILD_GIT_HASH";

fn main() {
    let git_hash = std::env::var(GIT_HASH_OVERRIDE)
        .ok()
        .filter(|hash| !hash.trim().is_empty())
        .or_else(git_describe)
        .unwrap_or_else(|| "unknown".to_string());

    let build_timestamp = chrono::Utc::now().to_rfc3339_opts(chrono::SecondsFormat::Secs, true);
    let profile = std::env::var("PROFILE").unwrap_or_else(|_| "unknown".to_string());

    for (key, value) in [
        ("GIT_HASH", git_hash),
        ("BUILD_TIMESTAMP", build_timestamp),
        ("BUILD_PROFILE", profile),
    ] {
        println!("cargo:rustc-env={}={}", key, value);
    }
}

/// Short commit hash, suffixed `-dirty` when the tree has local changes
fn git_describe() -> Option<String> {
    let hash = git(&["rev-parse", "--short=8", "HEAD"])?;
    let dirty = git(&["status", "--porcelain", "--untracked-files=no"]).is_some_and(|out| !out.is_empty());
    Some(if dirty { format!("{}-dirty", hash) } else { hash })
}

fn git(args: &[&str]) -> Option<String> {
    let output = Command::new("git").args(args).output().ok()?;
    if !output.status.success() {
        return None;
    }
    String::from_utf8(output.stdout).ok().map(|s| s.trim().to_string())
}
