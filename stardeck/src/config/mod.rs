use crate::error::{Error, Result};
use crate::i18n::Language;
use crate::model::{SortKey, ViewMode, ViewState};
use crate::render::{WindowGeometry, DEFAULT_BUFFER};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Two terminal lines per row in the wide layout.
pub const DEFAULT_ITEM_EXTENT: f64 = 2.0;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Preferences {
    /// When the last successful sync finished.
    pub last_sync_at: Option<DateTime<Utc>>,
    pub ui_language: Language,
    pub default_view_mode: ViewMode,
    pub default_sort: SortKey,
    pub render_buffer: usize,
    pub item_extent: f64,
}

impl Default for Preferences {
    fn default() -> Self {
        Preferences {
            last_sync_at: None,
            ui_language: Language::default(),
            default_view_mode: ViewMode::default(),
            default_sort: SortKey::default(),
            render_buffer: DEFAULT_BUFFER,
            item_extent: DEFAULT_ITEM_EXTENT,
        }
    }
}

impl Preferences {
    /// Load preferences from `path`. A missing file yields the defaults.
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            log::debug!("No preferences at {}, using defaults", path.display());
            return Ok(Self::default());
        }
        let content = std::fs::read_to_string(path)?;
        Self::parse(&content)
    }

    pub fn parse(yaml: &str) -> Result<Self> {
        if yaml.trim().is_empty() {
            return Ok(Self::default());
        }
        let prefs: Preferences = serde_yaml::from_str(yaml)?;
        if !(prefs.item_extent.is_finite() && prefs.item_extent > 0.0) {
            return Err(Error::Config(format!(
                "item_extent must be a positive number, got {}",
                prefs.item_extent
            )));
        }
        Ok(prefs)
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, serde_yaml::to_string(self)?)?;
        Ok(())
    }

    /// The view state a fresh session starts in.
    pub fn view_state(&self) -> ViewState {
        ViewState {
            sort: self.default_sort,
            view_mode: self.default_view_mode,
            ..ViewState::default()
        }
    }

    pub fn geometry(&self, viewport_extent: f64) -> WindowGeometry {
        WindowGeometry::new(self.item_extent, viewport_extent, self.render_buffer)
    }
}
