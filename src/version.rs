//! Version information for the rozgar binary.
//!
//! Provides version strings that include git revision information when the
//! ROZGAR_GIT_REV environment variable is set at build time (CI does this).

use std::sync::LazyLock;

/// The package version from Cargo.toml.
pub const PKG_VERSION: &str = env!("CARGO_PKG_VERSION");

/// Git revision from the build environment (empty string if not set).
pub const GIT_REV: &str = match option_env!("ROZGAR_GIT_REV") {
    Some(rev) => rev,
    None => "",
};

/// Static full version string for clap compatibility.
static FULL_VERSION: LazyLock<String> = LazyLock::new(|| {
    if GIT_REV.is_empty() {
        PKG_VERSION.to_string()
    } else {
        format!("{} ({})", PKG_VERSION, GIT_REV)
    }
});

/// Returns the full version string for display.
///
/// With a git revision: `"X.Y.Z (abcdef0)"`. Otherwise just `"X.Y.Z"`.
pub fn full_version() -> String {
    FULL_VERSION.clone()
}

/// Returns the version string for clap's version flag.
pub fn clap_version() -> &'static str {
    PKG_VERSION
}
