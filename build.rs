//! Bakes the version reported by `--version` and `/health` into the binary.
//!
//! A build of a commit tagged `v<package version>` reports the bare package
//! version. Anything else reports `<package version>-dev+<short hash>`, or
//! `<package version>-dev` outside a git checkout.

use std::process::Command;

fn git(args: &[&str]) -> Option<String> {
    Command::new("git")
        .args(args)
        .output()
        .ok()
        .filter(|o| o.status.success())
        .map(|o| String::from_utf8_lossy(&o.stdout).trim().to_string())
        .filter(|s| !s.is_empty())
}

fn main() {
    println!("cargo:rerun-if-changed=.git/HEAD");
    println!("cargo:rerun-if-changed=.git/refs/");

    let package = env!("CARGO_PKG_VERSION");
    let release_tag = format!("v{package}");
    let tagged = git(&["tag", "--points-at", "HEAD"])
        .is_some_and(|tags| tags.lines().any(|t| t.trim() == release_tag));

    let version = match (tagged, git(&["rev-parse", "--short", "HEAD"])) {
        (true, _) => package.to_string(),
        (false, Some(hash)) => format!("{package}-dev+{hash}"),
        (false, None) => format!("{package}-dev"),
    };
    println!("cargo:rustc-env=IMAGEDESK_VERSION={version}");
}
