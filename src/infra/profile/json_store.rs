use std::fs;
use std::io::ErrorKind;
use std::path::{Component, Path, PathBuf};

use chrono::{DateTime, Utc};
use directories::ProjectDirs;
use tracing::{info, warn};

use crate::domain::entities::profile::{Profile, ProfileInfo};
use crate::usecase::ports::profile_store::{ProfileError, ProfileStore};

const PROFILE_EXTENSION: &str = ".json";

/// Profiles stored as `<dir>/<file_name>.json`.
#[derive(Debug, Clone)]
pub struct JsonProfileStore {
    dir: PathBuf,
}

fn io_error(path: &Path, source: std::io::Error) -> ProfileError {
    ProfileError::Io {
        path: path.to_path_buf(),
        source,
    }
}

fn strip_extension(file_name: &str) -> &str {
    file_name.strip_suffix(PROFILE_EXTENSION).unwrap_or(file_name)
}

/// A profile file name must stay inside the store directory: one plain path
/// component, no separators of either platform.
fn checked_name(file_name: &str) -> Result<&str, ProfileError> {
    let name = strip_extension(file_name);
    let mut components = Path::new(name).components();
    let single_normal = matches!(
        (components.next(), components.next()),
        (Some(Component::Normal(_)), None)
    );
    if !single_normal || name.contains(|c| c == '/' || c == '\\') {
        return Err(ProfileError::InvalidName(file_name.to_string()));
    }
    Ok(name)
}

/// Reads and validates a profile file outside the store directory.
pub fn read_profile_file(path: &Path) -> Result<Profile, ProfileError> {
    let data = fs::read_to_string(path).map_err(|err| match err.kind() {
        ErrorKind::NotFound => ProfileError::NotFound(path.display().to_string()),
        _ => io_error(path, err),
    })?;
    let profile: Profile = serde_json::from_str(&data).map_err(|source| ProfileError::Parse {
        path: path.to_path_buf(),
        source,
    })?;
    profile.validate()?;
    Ok(profile)
}

impl JsonProfileStore {
    /// Creates `dir` if it is missing.
    pub fn new(dir: impl Into<PathBuf>) -> Result<Self, ProfileError> {
        let dir = dir.into();
        fs::create_dir_all(&dir).map_err(|err| io_error(&dir, err))?;
        Ok(Self { dir })
    }

    pub fn open_default() -> Result<Self, ProfileError> {
        Self::new(Self::default_dir()?)
    }

    pub fn default_dir() -> Result<PathBuf, ProfileError> {
        let project_dirs = ProjectDirs::from("com", "excel-merger", "excel-merger")
            .ok_or(ProfileError::NoProfileDir)?;
        Ok(project_dirs.config_dir().join("profiles"))
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn profile_path(&self, file_name: &str) -> Result<PathBuf, ProfileError> {
        let name = checked_name(file_name)?;
        Ok(self.dir.join(format!("{name}{PROFILE_EXTENSION}")))
    }

    fn existing_path(&self, file_name: &str) -> Result<PathBuf, ProfileError> {
        let path = self.profile_path(file_name)?;
        if !path.is_file() {
            return Err(ProfileError::NotFound(strip_extension(file_name).to_string()));
        }
        Ok(path)
    }

    fn describe(&self, path: &Path) -> Option<ProfileInfo> {
        let file_name = path.file_name()?.to_str()?.strip_suffix(PROFILE_EXTENSION)?;
        let metadata = match fs::metadata(path) {
            Ok(metadata) => metadata,
            Err(err) => {
                warn!(file = %path.display(), error = %err, "cannot stat profile file");
                return None;
            }
        };
        let modified_at = metadata.modified().ok().map(DateTime::<Utc>::from);

        let info = match read_profile_file(path) {
            Ok(profile) => ProfileInfo {
                file_name: file_name.to_string(),
                name: profile.profile_name,
                base_file: profile.base_file_name,
                sheets_count: profile.sheets.len(),
                created_at: profile.created_at,
                updated_at: profile.updated_at,
                modified_at,
                size: metadata.len(),
                is_corrupt: false,
            },
            Err(err) => {
                warn!(file = %path.display(), error = %err, "cannot load profile");
                ProfileInfo {
                    file_name: file_name.to_string(),
                    name: file_name.to_string(),
                    base_file: String::new(),
                    sheets_count: 0,
                    created_at: None,
                    updated_at: None,
                    modified_at,
                    size: metadata.len(),
                    is_corrupt: true,
                }
            }
        };
        Some(info)
    }
}

impl ProfileStore for JsonProfileStore {
    fn save(&self, profile: &mut Profile, file_name: &str) -> Result<PathBuf, ProfileError> {
        profile.validate()?;

        let now = Utc::now();
        profile.updated_at = Some(now);
        if profile.created_at.is_none() {
            profile.created_at = Some(now);
        }

        let path = self.profile_path(file_name)?;
        let data = serde_json::to_string_pretty(profile).map_err(ProfileError::Serialize)?;
        fs::write(&path, data).map_err(|err| io_error(&path, err))?;

        info!(
            profile = %profile.profile_name,
            file = %path.display(),
            sheets_count = profile.sheets.len(),
            "profile saved"
        );
        Ok(path)
    }

    fn load(&self, file_name: &str) -> Result<Profile, ProfileError> {
        let path = self.existing_path(file_name)?;
        let profile = read_profile_file(&path)?;
        info!(
            profile = %profile.profile_name,
            file = %path.display(),
            sheets_count = profile.sheets.len(),
            "profile loaded"
        );
        Ok(profile)
    }

    fn list(&self) -> Result<Vec<ProfileInfo>, ProfileError> {
        let entries = fs::read_dir(&self.dir).map_err(|err| io_error(&self.dir, err))?;

        let mut profiles = Vec::new();
        for entry in entries {
            let entry = entry.map_err(|err| io_error(&self.dir, err))?;
            let path = entry.path();
            if !path.is_file() {
                continue;
            }
            if let Some(info) = self.describe(&path) {
                profiles.push(info);
            }
        }
        profiles.sort_by(|a, b| a.file_name.cmp(&b.file_name));

        info!(count = profiles.len(), "listed profiles");
        Ok(profiles)
    }

    fn delete(&self, file_name: &str) -> Result<(), ProfileError> {
        let path = self.existing_path(file_name)?;
        fs::remove_file(&path).map_err(|err| io_error(&path, err))?;
        info!(file = %path.display(), "profile deleted");
        Ok(())
    }

    fn exists(&self, file_name: &str) -> bool {
        self.profile_path(file_name)
            .map(|path| path.is_file())
            .unwrap_or(false)
    }

    fn export(&self, file_name: &str, dest_dir: &Path) -> Result<PathBuf, ProfileError> {
        let source = self.existing_path(file_name)?;
        let dest = dest_dir.join(format!("{}{PROFILE_EXTENSION}", checked_name(file_name)?));
        fs::copy(&source, &dest).map_err(|err| io_error(&dest, err))?;
        info!(source = %source.display(), destination = %dest.display(), "profile exported");
        Ok(dest)
    }

    fn import(&self, src_path: &Path) -> Result<Profile, ProfileError> {
        let mut profile = read_profile_file(src_path)?;
        let file_name = src_path
            .file_stem()
            .and_then(|stem| stem.to_str())
            .ok_or_else(|| ProfileError::NotFound(src_path.display().to_string()))?;

        self.save(&mut profile, file_name)?;
        info!(source = %src_path.display(), profile = %profile.profile_name, "profile imported");
        Ok(profile)
    }
}
