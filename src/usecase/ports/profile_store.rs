use std::path::{Path, PathBuf};

use crate::domain::entities::profile::{Profile, ProfileInfo};
use crate::domain::errors::{ConfigError, ErrorCode};

#[derive(Debug, thiserror::Error)]
pub enum ProfileError {
    #[error("profile not found: {0}")]
    NotFound(String),

    #[error("invalid profile file name '{0}'")]
    InvalidName(String),

    #[error("invalid profile: {0}")]
    Invalid(#[from] ConfigError),

    #[error("failed to parse profile {}: {source}", .path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("failed to serialize profile: {0}")]
    Serialize(#[source] serde_json::Error),

    #[error("profile storage error at {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("unable to resolve the profile directory")]
    NoProfileDir,
}

impl ProfileError {
    pub fn code(&self) -> ErrorCode {
        match self {
            ProfileError::Invalid(err) => err.code(),
            ProfileError::Io { source, .. }
                if source.kind() == std::io::ErrorKind::PermissionDenied =>
            {
                ErrorCode::PermissionDenied
            }
            _ => ErrorCode::ConfigError,
        }
    }
}

pub trait ProfileStore: Send + Sync {
    fn save(&self, profile: &mut Profile, file_name: &str) -> Result<PathBuf, ProfileError>;
    fn load(&self, file_name: &str) -> Result<Profile, ProfileError>;
    fn list(&self) -> Result<Vec<ProfileInfo>, ProfileError>;
    fn delete(&self, file_name: &str) -> Result<(), ProfileError>;
    fn exists(&self, file_name: &str) -> bool;
    fn export(&self, file_name: &str, dest_dir: &Path) -> Result<PathBuf, ProfileError>;
    fn import(&self, src_path: &Path) -> Result<Profile, ProfileError>;
}
