use std::process::Command;

/// Short commit hash of the checkout, or "unknown" outside a git tree.
fn git_commit() -> String {
    Command::new("git")
        .args(["rev-parse", "--short=7", "HEAD"])
        .output()
        .ok()
        .filter(|out| out.status.success())
        .and_then(|out| String::from_utf8(out.stdout).ok())
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .unwrap_or_else(|| "unknown".to_string())
}

fn main() {
    // Stamped into `gapfind --version`
    println!("cargo:rerun-if-changed=../../.git/HEAD");
    println!("cargo:rustc-env=GIT_COMMIT_HASH={}", git_commit());
    println!(
        "cargo:rustc-env=TARGET={}",
        std::env::var("TARGET").unwrap_or_else(|_| "unknown".to_string())
    );
}
