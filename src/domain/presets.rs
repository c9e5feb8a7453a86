use std::collections::BTreeMap;

use crate::domain::entities::merge::SheetMergeConfig;

pub const MARKETPLACE_TEMPLATE_SHEET: &str = "Шаблон";
pub const MARKETPLACE_VIDEO_SHEET: &str = "Озон.Видео";
pub const MARKETPLACE_VIDEO_COVER_SHEET: &str = "Озон.Видеообложка";
pub const MARKETPLACE_BRAND_MARKER: &str = "бренд в одежде и обуви";
const MARKETPLACE_HEADER_ROW: usize = 4;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PresetSheet {
    pub config: SheetMergeConfig,
    /// Header marker used to locate `config.filter_column` in a concrete file.
    pub filter_column_marker: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Preset {
    pub name: String,
    pub sheets: BTreeMap<String, PresetSheet>,
}

impl Preset {
    pub fn by_name(name: &str, brands: Vec<String>) -> Option<Self> {
        match name {
            "marketplace" => Some(Self::marketplace_template(brands)),
            _ => None,
        }
    }

    pub fn marketplace_template(brands: Vec<String>) -> Self {
        let mut template =
            SheetMergeConfig::template(MARKETPLACE_TEMPLATE_SHEET, MARKETPLACE_HEADER_ROW);
        template.filter_values = brands;

        let mut sheets = BTreeMap::new();
        sheets.insert(
            MARKETPLACE_TEMPLATE_SHEET.to_string(),
            PresetSheet {
                filter_column_marker: (!template.filter_values.is_empty())
                    .then(|| MARKETPLACE_BRAND_MARKER.to_string()),
                config: template,
            },
        );
        for name in [MARKETPLACE_VIDEO_SHEET, MARKETPLACE_VIDEO_COVER_SHEET] {
            sheets.insert(
                name.to_string(),
                PresetSheet {
                    config: SheetMergeConfig::new(name, MARKETPLACE_HEADER_ROW)
                        .with_extracted_keys(),
                    filter_column_marker: None,
                },
            );
        }

        Self {
            name: "marketplace".to_string(),
            sheets,
        }
    }
}
