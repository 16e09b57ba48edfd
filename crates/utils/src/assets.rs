use std::path::PathBuf;

use directories::ProjectDirs;

const PROJECT_ROOT: &str = env!("CARGO_MANIFEST_DIR");

/// Base directory for everything the process writes to disk.
///
/// Respects `PLANK_ASSET_DIR`. Debug builds default to `dev_assets/` at the
/// workspace root so development data never lands in the user's profile.
pub fn asset_dir() -> PathBuf {
    let path = if let Ok(custom) = std::env::var("PLANK_ASSET_DIR") {
        crate::path::expand_tilde(&custom)
    } else if cfg!(debug_assertions) {
        PathBuf::from(PROJECT_ROOT).join("../../dev_assets")
    } else {
        match ProjectDirs::from("dev", "plank", "plank") {
            Some(dirs) => dirs.data_dir().to_path_buf(),
            None => PathBuf::from(".plank"),
        }
    };

    if !path.exists()
        && let Err(e) = std::fs::create_dir_all(&path)
    {
        tracing::warn!(path = %path.display(), error = %e, "Failed to create asset directory");
    }

    path
    // ✔ macOS → ~/Library/Application Support/dev.plank.plank
    // ✔ Linux → ~/.local/share/plank   (respects XDG_DATA_HOME)
    // ✔ Windows → %APPDATA%\plank\plank
}

/// Get the local database file path.
///
/// Respects the `PLANK_DATABASE_PATH` environment variable for custom locations.
/// Supports tilde expansion (e.g., `~/plank/plank.sqlite`).
///
/// Default: `{asset_dir}/plank.sqlite`
pub fn database_path() -> PathBuf {
    if let Ok(path) = std::env::var("PLANK_DATABASE_PATH") {
        return crate::path::expand_tilde(&path);
    }
    asset_dir().join("plank.sqlite")
}

/// Directory for rotated log files.
///
/// Respects `PLANK_LOG_DIR`. Default: `{asset_dir}/logs`
pub fn log_dir() -> PathBuf {
    if let Ok(path) = std::env::var("PLANK_LOG_DIR") {
        return crate::path::expand_tilde(&path);
    }
    asset_dir().join("logs")
}
