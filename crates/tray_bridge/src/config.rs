use crate::*;

use serde::{Deserialize, Serialize};
use std::path::Path;

/// Persisted settings of the tray.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TrayConfig {
    /// Maximum icon size, or 0 to follow the panel's icon size.
    pub icon_size: i32,
    pub single_row: bool,
    pub square_icons: bool,
    pub symbolic_icons: bool,
    /// Open the item menu on primary click, even for items that can be activated.
    pub menu_is_primary: bool,
    pub hide_new_items: bool,
    pub known_items: Vec<String>,
    pub hidden_items: Vec<String>,
    pub known_legacy_items: Vec<String>,
    pub hidden_legacy_items: Vec<String>,
}

impl Default for TrayConfig {
    fn default() -> Self {
        Self {
            icon_size: 22,
            single_row: false,
            square_icons: false,
            symbolic_icons: false,
            menu_is_primary: false,
            hide_new_items: false,
            known_items: Vec::new(),
            hidden_items: Vec::new(),
            known_legacy_items: Vec::new(),
            hidden_legacy_items: Vec::new(),
        }
    }
}

/// The read-only part of [`TrayConfig`] that decides how items behave.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct TrayPolicy {
    pub icon_size: i32,
    pub single_row: bool,
    pub square_icons: bool,
    pub menu_is_primary: bool,
    pub hide_new_items: bool,
}

/// Icon layout for a given panel size.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Dimensions {
    pub icon_size: i32,
    pub n_rows: i32,
    pub row_size: i32,
    pub padding: i32,
}

impl TrayConfig {
    /// Load the configuration from `path`. A missing file yields the defaults.
    pub fn load(path: &Path) -> Result<Self> {
        match std::fs::read_to_string(path) {
            Ok(content) => Ok(serde_json::from_str(&content)?),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
                log::debug!("No configuration at {}, using defaults", path.display());
                Ok(Self::default())
            },
            Err(err) => Err(err.into()),
        }
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, serde_json::to_string_pretty(self)?)?;
        Ok(())
    }

    pub fn policy(&self) -> TrayPolicy {
        TrayPolicy {
            icon_size: self.icon_size,
            single_row: self.single_row,
            square_icons: self.square_icons,
            menu_is_primary: self.menu_is_primary,
            hide_new_items: self.hide_new_items,
        }
    }

    pub fn known_items(&self) -> KnownItems {
        KnownItems::new(self.known_items.clone(), self.hidden_items.iter().cloned())
    }

    pub fn known_legacy_items(&self) -> KnownItems {
        KnownItems::new(self.known_legacy_items.clone(), self.hidden_legacy_items.iter().cloned())
    }

    /// Take over the item lists, keeping every other setting.
    pub fn set_item_lists(&mut self, known: &KnownItems, legacy: &KnownItems) {
        self.known_items = known.names().to_vec();
        self.hidden_items = known.hidden();
        self.known_legacy_items = legacy.names().to_vec();
        self.hidden_legacy_items = legacy.hidden();
    }

    /// Icon size to use, given the icon size the panel suggests.
    pub fn effective_icon_size(&self, panel_icon_size: i32) -> i32 {
        if self.icon_size > 0 {
            self.icon_size
        } else {
            panel_icon_size
        }
    }

    /// Lay the icons out in a panel that is `panel_size` pixels thick and configured for `nrows`
    /// rows.
    pub fn dimensions(&self, panel_size: i32, nrows: i32, panel_icon_size: i32) -> Dimensions {
        let icon_size = self.effective_icon_size(panel_icon_size);

        let (cell_size, n_rows, row_size) = if self.square_icons {
            let n_rows = if self.single_row { 1 } else { nrows.max(1) };
            let size = panel_size / n_rows;
            (size, n_rows, size)
        } else {
            let cell_size = (icon_size + 2).min(panel_size);
            let n_rows = if self.single_row || cell_size <= 0 { 1 } else { (panel_size / cell_size).max(1) };
            (cell_size, n_rows, panel_size / n_rows)
        };

        let mut icon_size = icon_size.min(cell_size).min(row_size);
        if icon_size % 2 != 0 {
            icon_size -= 1;
        }

        let padding = if self.square_icons { 0 } else { (row_size - icon_size) / 2 };
        Dimensions { icon_size, n_rows, row_size, padding }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_missing_keys_use_defaults() {
        let config: TrayConfig = serde_json::from_str(r#"{"hide_new_items": true, "known_items": ["b", "a"]}"#).unwrap();
        assert!(config.hide_new_items);
        assert_eq!(config.known_items, vec!["b".to_owned(), "a".to_owned()]);
        assert_eq!(config.icon_size, TrayConfig::default().icon_size);
    }

    #[test]
    fn test_lists_round_trip_verbatim() {
        let config = TrayConfig {
            known_legacy_items: vec!["zz".to_owned(), "Ünïcode".to_owned(), "aa".to_owned()],
            hidden_legacy_items: vec!["zz".to_owned()],
            ..Default::default()
        };
        let json = serde_json::to_string(&config).unwrap();
        assert_eq!(serde_json::from_str::<TrayConfig>(&json).unwrap(), config);
    }

    #[test]
    fn test_load_missing_file() {
        let config = TrayConfig::load(Path::new("/nonexistent/trayd/config.json")).unwrap();
        assert_eq!(config, TrayConfig::default());
    }

    #[test]
    fn test_dimensions_fitted_icons() {
        let config = TrayConfig { icon_size: 22, ..Default::default() };
        assert_eq!(config.dimensions(48, 1, 16), Dimensions { icon_size: 22, n_rows: 2, row_size: 24, padding: 1 });

        let config = TrayConfig { icon_size: 22, single_row: true, ..Default::default() };
        assert_eq!(config.dimensions(48, 1, 16), Dimensions { icon_size: 22, n_rows: 1, row_size: 48, padding: 13 });
    }

    #[test]
    fn test_dimensions_square_icons() {
        let config = TrayConfig { icon_size: 0, square_icons: true, ..Default::default() };
        assert_eq!(config.dimensions(31, 1, 24), Dimensions { icon_size: 24, n_rows: 1, row_size: 31, padding: 0 });
        assert_eq!(config.dimensions(31, 2, 24), Dimensions { icon_size: 14, n_rows: 2, row_size: 15, padding: 0 });
    }

    #[test]
    fn test_dimensions_icon_larger_than_panel() {
        let config = TrayConfig { icon_size: 64, ..Default::default() };
        assert_eq!(config.dimensions(27, 1, 16), Dimensions { icon_size: 26, n_rows: 1, row_size: 27, padding: 0 });
    }
}
