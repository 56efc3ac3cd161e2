use std::path::{Path, PathBuf};

/// A uniquely named directory under the system temp dir, removed when dropped.
pub(crate) struct ScratchDir(PathBuf);

impl ScratchDir {
	pub(crate) fn new(label: &str) -> Self {
		let mut path = std::env::temp_dir();
		path.push(format!("voxel-realm-{}-{}", label, uuid::Uuid::new_v4()));
		std::fs::create_dir_all(&path).expect("failed to create scratch dir");
		Self(path)
	}

	pub(crate) fn path(&self) -> &Path {
		&self.0
	}
}

impl Drop for ScratchDir {
	fn drop(&mut self) {
		let _ = std::fs::remove_dir_all(&self.0);
	}
}
