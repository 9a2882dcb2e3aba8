//! Bookkeeping of generated snapshots
use std::fs;
use std::io;
use std::path::Path;

use serde::{Deserialize, Serialize};

use super::Error;

#[derive(Clone, PartialEq, Eq, Debug, Default, Serialize, Deserialize)]
pub struct Snapshot {
    pub name: String,
    pub version: String,
    /// Path of the generated file
    pub file: String,
}

#[derive(Clone, PartialEq, Eq, Debug, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Manifest {
    pub current_version: String,
    pub previous_version: String,
    pub snapshots: Vec<Snapshot>,
}

impl Manifest {
    /// Reads the manifest at `path`. A missing file is an empty manifest.
    pub fn load(path: &Path) -> Result<Manifest, Error> {
        let content = match fs::read_to_string(path) {
            Ok(content) => content,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(Manifest::default()),
            Err(e) => return Err(Error::Manifest(format!("unable to read {}: {}", path.display(), e))),
        };
        if content.trim().is_empty() {
            return Ok(Manifest::default());
        }
        serde_yaml::from_str(&content).map_err(|e| Error::Manifest(format!("in {}: {}", path.display(), e)))
    }

    /// Writes the manifest to `path`, creating its directory.
    pub fn save(&self, path: &Path) -> Result<(), Error> {
        if let Some(dir) = path.parent().filter(|d| !d.as_os_str().is_empty()) {
            fs::create_dir_all(dir)
                .map_err(|e| Error::Manifest(format!("unable to create {}: {}", dir.display(), e)))?;
        }
        let yaml = serde_yaml::to_string(self).map_err(|e| Error::Manifest(e.to_string()))?;
        fs::write(path, yaml).map_err(|e| Error::Manifest(format!("unable to write {}: {}", path.display(), e)))
    }

    /// Records `snapshot` as the current version. The previous current version
    /// becomes the previous one, and an entry with the same name and version
    /// is replaced.
    pub fn add_snapshot(&mut self, snapshot: Snapshot) {
        if !self.current_version.is_empty() {
            self.previous_version = std::mem::take(&mut self.current_version);
        }
        self.current_version = snapshot.version.clone();

        match self
            .snapshots
            .iter_mut()
            .find(|s| s.name == snapshot.name && s.version == snapshot.version)
        {
            Some(existing) => *existing = snapshot,
            None => self.snapshots.push(snapshot),
        }
    }

    /// Path of the file generated for `version`
    pub fn snapshot_file(&self, version: &str) -> Option<&str> {
        self.snapshots
            .iter()
            .find(|s| s.version == version)
            .map(|s| s.file.as_str())
    }
}
