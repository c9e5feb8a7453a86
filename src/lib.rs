pub mod domain;
pub mod infra;
pub mod platform;
pub mod usecase;

pub use domain::entities::merge::{
    ExtractedKeySet, MergeRequest, MergeResult, ProgressUpdate, Row, SheetMergeConfig, SheetStat,
};
pub use domain::entities::profile::{Profile, ProfileInfo, ProfileSettings};
pub use domain::errors::{ConfigError, ErrorCode};
pub use usecase::services::merge_service::{MergeError, MergeOrchestrator};

#[cfg(test)]
mod tests;
