//! Build script for vox-speak
//!
//! Stamps the binary with a short git revision and build time so the startup
//! log identifies exactly which build produced a given WAV file.

use std::process::Command;

fn git_revision() -> Option<String> {
    let output = Command::new("git")
        .args(["rev-parse", "--short=8", "HEAD"])
        .output()
        .ok()?;
    if !output.status.success() {
        return None;
    }
    String::from_utf8(output.stdout)
        .ok()
        .map(|s| s.trim().to_string())
}

fn main() {
    let revision = git_revision().unwrap_or_else(|| "unknown".to_string());
    let built_at = chrono::Utc::now().to_rfc3339_opts(chrono::SecondsFormat::Secs, true);

    println!("cargo:rustc-env=VOX_GIT_REVISION={}", revision);
    println!("cargo:rustc-env=VOX_BUILD_TIMESTAMP={}", built_at);
    println!("cargo:rerun-if-changed=build.rs");
    println!("cargo:rerun-if-changed=../.git/HEAD");
}
