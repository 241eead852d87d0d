//! Embeds the build date and git revision shown by `sitekeep version`

use std::process::Command;

fn git(args: &[&str]) -> Option<String> {
    let output = Command::new("git").args(args).output().ok()?;
    if !output.status.success() {
        return None;
    }
    let text = String::from_utf8_lossy(&output.stdout).trim().to_string();
    (!text.is_empty()).then_some(text)
}

fn main() {
    println!(
        "cargo:rustc-env=BUILD_DATE={}",
        chrono::Utc::now().format("%Y-%m-%d")
    );

    if let Some(sha) = git(&["describe", "--always", "--dirty", "--exclude", "*"]) {
        println!("cargo:rustc-env=GIT_SHA={}", sha);
    }

    if let Some(git_dir) = git(&["rev-parse", "--git-dir"]) {
        println!("cargo:rerun-if-changed={}/HEAD", git_dir);
    }
    println!("cargo:rerun-if-changed=build.rs");
}
