//! Saving finished rasters to disk.

use std::fs;
use std::path::{Path, PathBuf};

use chrono::Local;

use super::types::DeliveryError;

/// Configuration for saving output files.
#[derive(Debug, Clone)]
pub struct FileSaveConfig {
    /// Directory output files land in.
    pub directory: PathBuf,
    /// chrono format specifiers for the timestamp part of filenames.
    pub timestamp_format: String,
    /// Image format extension.
    pub format: String,
}

impl Default for FileSaveConfig {
    fn default() -> Self {
        Self {
            directory: dirs::picture_dir()
                .unwrap_or_else(|| PathBuf::from("~"))
                .join("Scrollshot"),
            timestamp_format: "%Y%m%d-%H%M%S".to_string(),
            format: "png".to_string(),
        }
    }
}

/// Generate a `<stem>-<timestamp>.<ext>` filename for the current time.
pub fn generate_filename(stem: &str, config: &FileSaveConfig) -> String {
    let timestamp = Local::now().format(&config.timestamp_format);
    format!("{stem}-{timestamp}.{}", config.format)
}

/// Ensure the save directory exists, creating it if necessary.
pub fn ensure_directory_exists(directory: &Path) -> Result<PathBuf, DeliveryError> {
    if !directory.exists() {
        log::info!("creating output directory: {}", directory.display());
        fs::create_dir_all(directory)?;
    }

    // Canonicalize to resolve relative paths
    let canonical = directory
        .canonicalize()
        .unwrap_or_else(|_| directory.to_path_buf());

    Ok(canonical)
}

/// Save encoded image bytes under a timestamped name.
///
/// Two captures landing in the same second get distinct names via a
/// numeric suffix.
pub fn save_png(png: &[u8], stem: &str, config: &FileSaveConfig) -> Result<PathBuf, DeliveryError> {
    let directory = ensure_directory_exists(&config.directory)?;
    let file_path = unique_path(&directory, &generate_filename(stem, config));

    log::info!(
        "saving raster to {} ({} bytes)",
        file_path.display(),
        png.len()
    );
    fs::write(&file_path, png)?;

    // Keep captures private to the user
    #[cfg(unix)]
    {
        use std::fs::Permissions;
        use std::os::unix::fs::PermissionsExt;
        fs::set_permissions(&file_path, Permissions::from_mode(0o600))?;
    }

    Ok(file_path)
}

fn unique_path(directory: &Path, filename: &str) -> PathBuf {
    let candidate = directory.join(filename);
    if !candidate.exists() {
        return candidate;
    }

    let (base, ext) = filename.rsplit_once('.').unwrap_or((filename, "png"));
    let mut n = 2;
    loop {
        let candidate = directory.join(format!("{base}-{n}.{ext}"));
        if !candidate.exists() {
            return candidate;
        }
        n += 1;
    }
}

/// Expand tilde (~) in path strings.
pub fn expand_tilde(path: &str) -> PathBuf {
    if let Some(stripped) = path.strip_prefix("~/")
        && let Some(home) = dirs::home_dir()
    {
        return home.join(stripped);
    }
    PathBuf::from(path)
}
