use anyhow::{anyhow, Context, Result};
use std::path::{Path, PathBuf};

/// Resolve the server's home directory.
///
/// - `Some(path)`: expand a leading `~` against the platform home directory,
///   then resolve to an absolute path.
/// - `None`: fall back to the platform default, `<platform home>/<default_subdir>`
///   (e.g. `$HOME/.hyperspot` on Unix/macOS, `%APPDATA%/.hyperspot` on Windows).
///
/// When `create` is `true`, the resolved directory is created if missing.
pub fn resolve_home_dir(opt: Option<String>, default_subdir: &str, create: bool) -> Result<PathBuf> {
    let resolved = match opt {
        Some(raw) => expand_tilde(&raw)?,
        None => platform_default_dir(default_subdir)?,
    };

    let absolute = if resolved.is_absolute() {
        resolved
    } else {
        std::env::current_dir()
            .context("failed to read current directory")?
            .join(resolved)
    };

    if create {
        std::fs::create_dir_all(&absolute)
            .with_context(|| format!("failed to create home_dir at {}", absolute.display()))?;
    }

    Ok(absolute)
}

/// Expand a leading `~` or `~/...` into the platform home directory.
/// Paths without a leading `~` are returned unchanged (still subject to
/// absolutization by the caller).
fn expand_tilde(raw: &str) -> Result<PathBuf> {
    if raw == "~" {
        return platform_home_dir();
    }
    if let Some(rest) = raw.strip_prefix("~/").or_else(|| raw.strip_prefix("~\\")) {
        return Ok(platform_home_dir()?.join(rest));
    }
    Ok(PathBuf::from(raw))
}

fn platform_home_dir() -> Result<PathBuf> {
    dirs::home_dir().ok_or_else(|| anyhow!("could not determine the platform home directory"))
}

fn platform_default_dir(default_subdir: &str) -> Result<PathBuf> {
    Ok(platform_home_dir()?.join(default_subdir))
}

#[allow(dead_code)]
fn is_absolute_on_this_platform(p: &Path) -> bool {
    p.is_absolute()
}
