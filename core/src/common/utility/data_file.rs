use anyhow::{Context, Result};
use serde::{de::DeserializeOwned, Serialize};
use std::path::{Path, PathBuf};

/// A json record stored as a single named file inside some parent directory
/// (the server root for [`Config`](crate::Config), a world's root for [`WorldData`](crate::world::WorldData)).
pub trait DataFile: Serialize + DeserializeOwned {
	fn file_name() -> &'static str;

	fn make_path(parent_dir: &Path) -> PathBuf {
		let mut path = parent_dir.to_owned();
		path.push(Self::file_name());
		path
	}

	fn save(&self, parent_dir: &Path) -> Result<()> {
		if !parent_dir.exists() {
			std::fs::create_dir_all(&parent_dir)?;
		}
		self.save_to(&Self::make_path(&parent_dir))?;
		Ok(())
	}

	/// Reads the file from the parent directory.
	/// Returns `Ok(None)` if the file does not exist yet.
	fn load(parent_dir: &Path) -> Result<Option<Self>> {
		let path = Self::make_path(&parent_dir);
		if !path.exists() {
			return Ok(None);
		}
		Ok(Some(Self::load_from(&path)?))
	}

	/// Writes to a sibling temporary file first so a crash mid-write never truncates the record.
	fn save_to(&self, file_path: &Path) -> Result<()> {
		let json = serde_json::to_string_pretty(&self)?;
		let tmp_path = file_path.with_extension("json.tmp");
		std::fs::write(&tmp_path, json)
			.with_context(|| format!("failed to write {}", tmp_path.display()))?;
		std::fs::rename(&tmp_path, file_path)
			.with_context(|| format!("failed to replace {}", file_path.display()))?;
		Ok(())
	}

	fn load_from(file_path: &Path) -> Result<Self> {
		let raw = std::fs::read_to_string(file_path)
			.with_context(|| format!("failed to read {}", file_path.display()))?;
		Ok(serde_json::from_str(&raw)?)
	}
}
