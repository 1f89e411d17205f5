use std::path::PathBuf;
use std::sync::OnceLock;

/// XDG-compliant directory layout for voxrange.
///
/// On Linux this follows the XDG Base Directory Specification:
///   Config:  $XDG_CONFIG_HOME/voxrange  (~/.config/voxrange)
///
/// On macOS:
///   Config:  ~/Library/Application Support/voxrange
///
/// The `dirs` crate handles platform detection. The resolved base path is
/// cached in a static OnceLock so the lookup only happens once.
static CONFIG_DIR: OnceLock<PathBuf> = OnceLock::new();

/// Root config directory: $XDG_CONFIG_HOME/voxrange
pub fn config_dir() -> &'static PathBuf {
    CONFIG_DIR.get_or_init(|| {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("voxrange")
    })
}

/// Config file path: <config_dir>/config.toml
pub fn config_file() -> PathBuf {
    config_dir().join("config.toml")
}
