use std::path::Path;
use std::process::ExitStatus;

use bookhaul_core::error::AppError;
use tokio::process::Command;

use crate::binary::find_chrome_binary_or_path;

/// Opens a normal browser window on the listing with the persistent profile
/// so the operator can sign in by hand.
///
/// Returns once the operator closes the window. The session cookies then
/// live in `profile_dir` and headless runs reuse them.
pub async fn interactive_login(profile_dir: &Path, listing_url: &str) -> Result<(), AppError> {
    let binary = find_chrome_binary_or_path().ok_or_else(|| {
        AppError::Browser("no Chrome/Chromium binary found; set CHROME_BIN".to_string())
    })?;

    tracing::info!(
        browser = %binary.display(),
        profile = %profile_dir.display(),
        "Opening browser for login, close it when you are signed in"
    );
    let status = login_command(&binary, profile_dir, listing_url)
        .status()
        .await
        .map_err(|e| AppError::Browser(format!("failed to start {}: {e}", binary.display())))?;

    check_exit(status)?;
    tracing::info!("Login window closed, rerun without `login` to start downloading");
    Ok(())
}

fn check_exit(status: ExitStatus) -> Result<(), AppError> {
    if status.success() {
        Ok(())
    } else {
        Err(AppError::Browser(format!("browser run failed: {status}")))
    }
}

fn login_command(binary: &Path, profile_dir: &Path, listing_url: &str) -> Command {
    let mut command = Command::new(binary);
    command
        .arg(format!("--user-data-dir={}", profile_dir.display()))
        .arg("--no-first-run")
        .arg(listing_url);
    command
}
