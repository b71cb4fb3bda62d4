use std::env;
use std::process::Command;

// Exposes the short git sha as GAKNN_GIT_SHA, from the environment or from git itself
fn main() {
    println!("cargo:rerun-if-env-changed=GAKNN_GIT_SHA");
    println!("cargo:rerun-if-changed=.git/HEAD");
    println!("cargo:rerun-if-changed=.git/refs");

    if let Some(sha) = git_sha() {
        println!("cargo:rustc-env=GAKNN_GIT_SHA={}", sha);
    }
}

fn git_sha() -> Option<String> {
    if let Ok(sha) = env::var("GAKNN_GIT_SHA") {
        let sha = sha.trim();
        return if sha.is_empty() { None } else { Some(sha.to_string()) };
    }

    let output = Command::new("git")
        .args(["rev-parse", "--short", "HEAD"])
        .output()
        .ok()?;
    if !output.status.success() {
        return None;
    }
    let sha = String::from_utf8_lossy(&output.stdout).trim().to_string();
    if sha.is_empty() {
        None
    } else {
        Some(sha)
    }
}
