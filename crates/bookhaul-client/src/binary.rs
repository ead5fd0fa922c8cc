use std::path::PathBuf;

/// Well-known install locations, checked in order.
///
/// On systems where Chromium is installed via **snap**, the wrapper at
/// `/snap/bin/chromium` strips unknown CLI flags, breaking headless mode, so
/// the real binary inside the snap comes first.
const KNOWN_LOCATIONS: &[&str] = &[
    // Snap (Ubuntu default)
    "/snap/chromium/current/usr/lib/chromium-browser/chrome",
    // Flatpak
    "/var/lib/flatpak/exports/bin/org.chromium.Chromium",
    // Common apt / manual installs
    "/usr/bin/google-chrome-stable",
    "/usr/bin/google-chrome",
    "/usr/bin/chromium",
    "/usr/bin/chromium-browser",
    // macOS
    "/Applications/Google Chrome.app/Contents/MacOS/Google Chrome",
    "/Applications/Chromium.app/Contents/MacOS/Chromium",
];

/// Executable names looked up on `$PATH` when nothing else matched.
const PATH_NAMES: &[&str] = &[
    "google-chrome-stable",
    "google-chrome",
    "chromium",
    "chromium-browser",
    "chrome",
];

/// Tries to locate the real Chrome/Chromium binary.
///
/// An existing `CHROME_BIN` wins, then the well-known install paths. If
/// nothing is found we return `None` and let `chromiumoxide` do its own
/// lookup.
pub fn find_chrome_binary() -> Option<PathBuf> {
    if let Some(path) = std::env::var_os("CHROME_BIN").map(PathBuf::from) {
        if path.exists() {
            return Some(path);
        }
        tracing::warn!(path = %path.display(), "CHROME_BIN does not exist, ignoring");
    }

    KNOWN_LOCATIONS
        .iter()
        .map(PathBuf::from)
        .find(|p| p.exists())
}

/// Like [`find_chrome_binary`], also searching `$PATH`.
///
/// Used where no launcher library can fill the gap, such as the interactive
/// login window.
pub fn find_chrome_binary_or_path() -> Option<PathBuf> {
    find_chrome_binary().or_else(|| first_found(|name| which::which(name).ok()))
}

/// First of [`PATH_NAMES`] that `lookup` resolves, in name order.
fn first_found(lookup: impl FnMut(&str) -> Option<PathBuf>) -> Option<PathBuf> {
    PATH_NAMES.iter().copied().find_map(lookup)
}
