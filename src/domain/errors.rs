#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCode {
    FileNotFound,
    FileReadError,
    SheetNotFound,
    InvalidHeaderRow,
    EmptyFile,
    InvalidFormat,
    PermissionDenied,
    FileCorrupted,
    ConfigError,
    MergeError,
    SaveError,
}

impl ErrorCode {
    pub fn code(self) -> &'static str {
        match self {
            ErrorCode::FileNotFound => "E001",
            ErrorCode::FileReadError => "E002",
            ErrorCode::SheetNotFound => "E003",
            ErrorCode::InvalidHeaderRow => "E004",
            ErrorCode::EmptyFile => "E005",
            ErrorCode::InvalidFormat => "E006",
            ErrorCode::PermissionDenied => "E007",
            ErrorCode::FileCorrupted => "E008",
            ErrorCode::ConfigError => "E009",
            ErrorCode::MergeError => "E010",
            ErrorCode::SaveError => "E011",
        }
    }

    pub fn user_message(self) -> &'static str {
        match self {
            ErrorCode::FileNotFound => "File not found. Please check the file path.",
            ErrorCode::FileReadError => {
                "The file could not be read. It may be damaged or open in another program."
            }
            ErrorCode::SheetNotFound => "The sheet was not found in the file. Check the settings.",
            ErrorCode::InvalidHeaderRow => {
                "Invalid header row number. Use a value of 1 or greater."
            }
            ErrorCode::EmptyFile => "The file is empty or contains no data.",
            ErrorCode::InvalidFormat => {
                "Unsupported file format. Use .xlsx, .xlsm, .xlsb, .xls or .ods files."
            }
            ErrorCode::PermissionDenied => "Access to the file was denied. Check permissions.",
            ErrorCode::FileCorrupted => "The file is corrupted and cannot be read.",
            ErrorCode::ConfigError => "Configuration error. Check the profile settings.",
            ErrorCode::MergeError => "Merging the files failed. Check the logs.",
            ErrorCode::SaveError => "The file could not be saved. Check the path and permissions.",
        }
    }
}

impl std::fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.code())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConfigError {
    #[error("sheet name must not be empty")]
    EmptySheetName,

    #[error("sheet '{sheet}': header row must be 1 or greater, got {header_row}")]
    InvalidHeaderRow { sheet: String, header_row: usize },

    #[error("sheet '{sheet}': header row {header_row} is past the last worksheet row {max}")]
    HeaderRowTooLarge {
        sheet: String,
        header_row: usize,
        max: usize,
    },

    #[error("sheet config stored under '{key}' names sheet '{sheet}'")]
    SheetNameMismatch { key: String, sheet: String },

    #[error("sheet '{sheet}': filter column {column} is set but no filter values are given")]
    FilterWithoutValues { sheet: String, column: usize },

    #[error("sheet '{sheet}' cannot both extract and consume extracted keys")]
    KeysProducedAndConsumed { sheet: String },

    #[error("profile name must not be empty")]
    EmptyProfileName,

    #[error("base file is not specified")]
    EmptyBaseFile,
}

impl ConfigError {
    pub fn code(&self) -> ErrorCode {
        match self {
            ConfigError::InvalidHeaderRow { .. } | ConfigError::HeaderRowTooLarge { .. } => {
                ErrorCode::InvalidHeaderRow
            }
            _ => ErrorCode::ConfigError,
        }
    }
}
