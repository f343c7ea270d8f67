//! Settings file loading and saving

use std::path::{Path, PathBuf};

use surge_core::prelude::*;

use super::types::Settings;

/// Directory holding surge configuration, relative to the project root
pub const SURGE_DIR: &str = ".surge";

/// Settings file name inside [`SURGE_DIR`]
pub const CONFIG_FILENAME: &str = "config.toml";

/// Path of the settings file for a project directory
pub fn config_path(project_path: &Path) -> PathBuf {
    project_path.join(SURGE_DIR).join(CONFIG_FILENAME)
}

/// Load settings from .surge/config.toml
///
/// Returns default settings if file doesn't exist or can't be parsed.
/// Invalid buffer options are also replaced by defaults so a bad file never
/// prevents startup.
pub fn load_settings(project_path: &Path) -> Settings {
    let path = config_path(project_path);

    if !path.exists() {
        debug!("No config file at {:?}, using defaults", path);
        return Settings::default();
    }

    match std::fs::read_to_string(&path) {
        Ok(content) => match toml::from_str::<Settings>(&content) {
            Ok(settings) => {
                if let Err(e) = settings.buffer.validate() {
                    warn!("Ignoring buffer settings in {:?}: {}", path, e);
                    return Settings {
                        buffer: Default::default(),
                        ..settings
                    };
                }
                debug!("Loaded settings from {:?}", path);
                settings
            }
            Err(e) => {
                warn!("Failed to parse {:?}: {}", path, e);
                Settings::default()
            }
        },
        Err(e) => {
            warn!("Failed to read {:?}: {}", path, e);
            Settings::default()
        }
    }
}

/// Save settings to .surge/config.toml, creating the directory if needed
pub fn save_settings(project_path: &Path, settings: &Settings) -> Result<()> {
    let dir = project_path.join(SURGE_DIR);
    std::fs::create_dir_all(&dir)
        .map_err(|e| Error::config_file(format!("Failed to create {:?}: {}", dir, e)))?;

    let content = toml::to_string_pretty(settings)
        .map_err(|e| Error::config_file(format!("Failed to serialize settings: {}", e)))?;

    let path = config_path(project_path);
    std::fs::write(&path, content)
        .map_err(|e| Error::config_file(format!("Failed to write {:?}: {}", path, e)))?;

    debug!("Saved settings to {:?}", path);
    Ok(())
}

/// Create a commented default config file if none exists
pub fn init_config_dir(project_path: &Path) -> Result<()> {
    let dir = project_path.join(SURGE_DIR);
    std::fs::create_dir_all(&dir)
        .map_err(|e| Error::config_file(format!("Failed to create {:?}: {}", dir, e)))?;

    let path = config_path(project_path);
    if !path.exists() {
        std::fs::write(&path, generate_default_config())
            .map_err(|e| Error::config_file(format!("Failed to write {:?}: {}", path, e)))?;
        info!("Created default config at {:?}", path);
    }

    Ok(())
}

fn generate_default_config() -> String {
    r#"# surge configuration

[buffer]
# Soft capacity; pruning trims normal-priority items down to this size
max_messages = 1000
# Hard ceiling; exceeding it prunes immediately
prune_threshold = 1500
# Pending items that force an immediate flush
batch_size = 10
# Delay before a deferred flush fires (ms)
update_interval_ms = 100
enable_pruning = true
enable_batching = true
# normal | high_frequency | ultra_performance
performance_mode = "normal"
# chronological | batch_recency
ordering = "chronological"

[monitor]
sample_interval_ms = 1000
history_size = 60
auto_mode = true
mode_stability_samples = 3

[view]
item_height_px = 20.0
overscan = 5
"#
    .to_string()
}
