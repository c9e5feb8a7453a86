use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::entities::merge::{SheetMergeConfig, MAX_HEADER_ROW};
use crate::domain::errors::ConfigError;

pub const PROFILE_VERSION: &str = "1.0";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProfileSettings {
    #[serde(default = "default_true")]
    pub show_warnings: bool,
    #[serde(default = "default_preview_rows")]
    pub preview_rows: usize,
}

fn default_true() -> bool {
    true
}

fn default_preview_rows() -> usize {
    100
}

impl Default for ProfileSettings {
    fn default() -> Self {
        Self {
            show_warnings: true,
            preview_rows: default_preview_rows(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Profile {
    pub version: String,
    pub profile_name: String,
    pub created_at: Option<DateTime<Utc>>,
    pub updated_at: Option<DateTime<Utc>>,
    pub base_file_name: String,
    #[serde(default)]
    pub sheets: Vec<SheetMergeConfig>,
    #[serde(default)]
    pub settings: ProfileSettings,
}

impl Profile {
    pub fn new(name: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            version: PROFILE_VERSION.to_string(),
            profile_name: name.into(),
            created_at: Some(now),
            updated_at: Some(now),
            base_file_name: String::new(),
            sheets: Vec::new(),
            settings: ProfileSettings::default(),
        }
    }

    fn touch(&mut self) {
        self.updated_at = Some(Utc::now());
    }

    pub fn add_sheet(&mut self, config: SheetMergeConfig) {
        self.sheets.push(config);
        self.touch();
    }

    pub fn sheet_config(&self, sheet_name: &str) -> Option<&SheetMergeConfig> {
        self.sheets.iter().find(|s| s.sheet_name == sheet_name)
    }

    pub fn update_sheet(&mut self, sheet_name: &str, config: SheetMergeConfig) -> bool {
        let Some(slot) = self.sheets.iter_mut().find(|s| s.sheet_name == sheet_name) else {
            return false;
        };
        *slot = config;
        self.touch();
        true
    }

    pub fn remove_sheet(&mut self, sheet_name: &str) -> bool {
        let Some(idx) = self.sheets.iter().position(|s| s.sheet_name == sheet_name) else {
            return false;
        };
        self.sheets.remove(idx);
        self.touch();
        true
    }

    pub fn enabled_sheets(&self) -> Vec<&SheetMergeConfig> {
        self.sheets.iter().filter(|s| s.enabled).collect()
    }

    pub fn sheet_configs(&self) -> BTreeMap<String, SheetMergeConfig> {
        self.sheets
            .iter()
            .map(|s| (s.sheet_name.clone(), s.clone()))
            .collect()
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.profile_name.is_empty() {
            return Err(ConfigError::EmptyProfileName);
        }
        if self.base_file_name.is_empty() {
            return Err(ConfigError::EmptyBaseFile);
        }
        for sheet in &self.sheets {
            if sheet.sheet_name.is_empty() {
                return Err(ConfigError::EmptySheetName);
            }
            if sheet.header_row < 1 {
                return Err(ConfigError::InvalidHeaderRow {
                    sheet: sheet.sheet_name.clone(),
                    header_row: sheet.header_row,
                });
            }
            if sheet.header_row > MAX_HEADER_ROW {
                return Err(ConfigError::HeaderRowTooLarge {
                    sheet: sheet.sheet_name.clone(),
                    header_row: sheet.header_row,
                    max: MAX_HEADER_ROW,
                });
            }
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProfileInfo {
    pub file_name: String,
    pub name: String,
    pub base_file: String,
    pub sheets_count: usize,
    pub created_at: Option<DateTime<Utc>>,
    pub updated_at: Option<DateTime<Utc>>,
    pub modified_at: Option<DateTime<Utc>>,
    pub size: u64,
    pub is_corrupt: bool,
}
