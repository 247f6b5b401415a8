//! PATH-based executable lookup with fallback locations.

use std::path::PathBuf;

/// System directories checked when an executable is not on PATH.
const FALLBACK_DIRS: &[&str] = &["/usr/local/bin", "/usr/bin", "/opt/homebrew/bin"];

/// Find an executable by name.
///
/// Tries the PATH via the `which` crate first, then a few common system
/// directories, then the per-user `~/.local/bin` and `~/bin`.
pub(crate) fn find_executable(name: &str) -> Option<PathBuf> {
    if let Ok(path) = which::which(name) {
        return Some(path);
    }

    let mut candidates: Vec<PathBuf> = FALLBACK_DIRS.iter().map(|dir| PathBuf::from(dir).join(name)).collect();
    if let Some(home) = std::env::var_os("HOME") {
        let home = PathBuf::from(home);
        candidates.push(home.join(".local").join("bin").join(name));
        candidates.push(home.join("bin").join(name));
    }

    candidates.into_iter().find(|path| path.is_file())
}
