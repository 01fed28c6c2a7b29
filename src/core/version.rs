//! Build metadata accessors.
//! Includes the generated version.rs from the build script so the binary
//! and the diagnostics banner share one source of truth.

include!(concat!(env!("OUT_DIR"), "/version.rs"));

/// Crate version from Cargo metadata
pub fn version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}

/// One-line package description captured by the build script
pub fn description() -> &'static str {
    PACKAGE_DESCRIPTION
}

/// Build time string from the build script (UTC)
pub fn build_time() -> &'static str {
    BUILD_TIME
}

/// Short git hash captured by the build script
pub fn git_hash() -> &'static str {
    GIT_HASH
}

/// Banner line used by the CLI and the diagnostics console
pub fn banner() -> String {
    format!(
        "livequeue {} ({}, built {})",
        version(),
        git_hash(),
        build_time()
    )
}
