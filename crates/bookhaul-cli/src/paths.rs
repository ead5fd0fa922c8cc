use std::path::{Path, PathBuf};

use anyhow::{Context, Result};

/// `<user config dir>/bookhaul`, holding the browser profile.
pub fn config_root() -> Result<PathBuf> {
    dirs::config_dir()
        .map(|dir| dir.join("bookhaul"))
        .context("Could not determine the user config directory; pass --profile-dir")
}

/// Browser profile directory, created private to the user.
///
/// The profile holds the storefront session cookies.
pub fn profile_dir(explicit: Option<PathBuf>) -> Result<PathBuf> {
    let dir = match explicit {
        Some(dir) => dir,
        None => config_root()?.join("browser"),
    };
    create_private_dir(&dir)?;
    Ok(dir)
}

/// Absolute download directory, created if missing.
///
/// The browser resolves relative download paths against its own working
/// directory, so the path handed over must be absolute.
pub fn download_dir(output: &Path) -> Result<PathBuf> {
    std::fs::create_dir_all(output)
        .with_context(|| format!("Failed to create download directory {}", output.display()))?;
    std::path::absolute(output)
        .with_context(|| format!("Failed to resolve download directory {}", output.display()))
}

fn create_private_dir(dir: &Path) -> Result<()> {
    std::fs::create_dir_all(dir)
        .with_context(|| format!("Failed to create profile directory {}", dir.display()))?;

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        std::fs::set_permissions(dir, std::fs::Permissions::from_mode(0o700))
            .with_context(|| format!("Failed to restrict permissions on {}", dir.display()))?;
    }
    Ok(())
}
