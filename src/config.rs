use serde::{Deserialize, Serialize};
use std::path::Path;

const DEFAULT_VIEWPORT_PADDING: f32 = 100.0;
const DEFAULT_GRID_CELL_SIZE: f32 = 25.0;

/// Tuning knobs for the placement pass.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PlacementConfig {
    /// Extra screen pixels kept around the viewport so labels sliding into
    /// view are already placed when they arrive.
    pub viewport_padding: f32,
    /// Collision grid cell size in screen pixels.
    pub grid_cell_size: f32,
    /// Compute full debug geometry (every circle's used flag) instead of
    /// rejecting at the first hit.
    pub show_collision_boxes: bool,
}

impl Default for PlacementConfig {
    fn default() -> Self {
        Self {
            viewport_padding: DEFAULT_VIEWPORT_PADDING,
            grid_cell_size: DEFAULT_GRID_CELL_SIZE,
            show_collision_boxes: false,
        }
    }
}

pub fn load_config(path: Option<&Path>) -> anyhow::Result<PlacementConfig> {
    let Some(path) = path else {
        return Ok(PlacementConfig::default());
    };
    let contents = std::fs::read_to_string(path)?;
    let config: PlacementConfig = serde_json::from_str(&contents)?;
    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_path_yields_defaults() {
        let config = load_config(None).unwrap();
        assert_eq!(config.viewport_padding, 100.0);
        assert_eq!(config.grid_cell_size, 25.0);
        assert!(!config.show_collision_boxes);
    }

    #[test]
    fn partial_file_keeps_unset_defaults() {
        let config: PlacementConfig = serde_json::from_str(r#"{"viewport_padding": 50}"#).unwrap();
        assert_eq!(config.viewport_padding, 50.0);
        assert_eq!(config.grid_cell_size, 25.0);
    }
}
