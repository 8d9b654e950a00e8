use std::path::PathBuf;

use serde::{Deserialize, Serialize};

const APP_DIR_NAME: &str = "modkeep";

/// Engine configuration, provided by the host application's config layer.
///
/// The engine never reads a config file itself; the host loads whatever it
/// loads and hands over the two values the core actually needs.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CoreConfig {
    /// Root directory containing one subdirectory per instance.
    pub instances_dir: PathBuf,
    /// How many file transfers may run at once.
    pub download_concurrency: usize,
}

impl Default for CoreConfig {
    fn default() -> Self {
        Self {
            instances_dir: default_instances_dir(),
            download_concurrency: 5,
        }
    }
}

fn default_instances_dir() -> PathBuf {
    dirs::data_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(APP_DIR_NAME)
        .join("instances")
}
