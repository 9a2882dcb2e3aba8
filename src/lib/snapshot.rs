//! Versioned snapshots of the generated file, and diffs between them
use std::fmt::Write;
use std::fs;
use std::path::{Component, Path, PathBuf};

use similar::{ChangeTag, TextDiff};
use tracing::info;

use super::manifest::{Manifest, Snapshot};
use super::options::Options;
use super::source::DeclarationSource;
use super::Error;

pub const DEFAULT_MANIFEST: &str = ".dtoc/manifest.yaml";
pub const DEFAULT_DIR: &str = ".dtoc/snapshots";
pub const DEFAULT_NAME: &str = "current";

/// Where a snapshot is generated to, and where it is recorded
#[derive(Clone, PartialEq, Eq, Debug)]
pub struct Target {
    pub manifest: PathBuf,
    pub dir: PathBuf,
    pub name: String,
    pub version: String,
}

impl Target {
    /// `<dir>/<name>/<version>`
    pub fn out_dir(&self) -> PathBuf { self.dir.join(&self.name).join(&self.version) }
}

/// Drops `.` components, and `..` components which follow a normal one
fn clean(path: &Path) -> PathBuf {
    let mut out = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => (),
            Component::ParentDir if matches!(out.components().next_back(), Some(Component::Normal(_))) => {
                out.pop();
            }
            c => out.push(c.as_os_str()),
        }
    }
    if out.as_os_str().is_empty() {
        out.push(".");
    }
    out
}

/// Generates into the directory of `target` and records the result as the
/// current version. Returns the path of the generated file.
pub fn generate(opts: &Options, source: &mut dyn DeclarationSource, target: &Target) -> Result<PathBuf, Error> {
    let mut manifest = Manifest::load(&target.manifest)?;

    let opts = Options {
        out_dir: target.out_dir(),
        ..opts.clone()
    };
    let contents = super::generate(&opts, source)?;
    let path = clean(&super::write(&opts, &contents)?);

    manifest.add_snapshot(Snapshot {
        name: target.name.clone(),
        version: target.version.clone(),
        file: path.display().to_string(),
    });
    manifest.save(&target.manifest)?;
    info!(
        name = %target.name,
        version = %target.version,
        previous = %manifest.previous_version,
        "recorded snapshot"
    );
    Ok(path)
}

pub fn list(manifest: &Path) -> Result<Manifest, Error> { Manifest::load(manifest) }

/// Unified diff of the previous snapshot's file against the current one's.
/// Identical files give an empty diff.
pub fn diff_current_with_previous(manifest: &Path) -> Result<String, Error> {
    let manifest = Manifest::load(manifest)?;
    let (current, previous) = (&manifest.current_version, &manifest.previous_version);
    if current.is_empty() || previous.is_empty() {
        return Err(Error::Snapshot("no current and previous snapshots recorded".to_string()));
    }
    let (current_file, previous_file) = match (manifest.snapshot_file(current), manifest.snapshot_file(previous)) {
        (Some(c), Some(p)) => (c, p),
        _ => return Err(Error::Snapshot("snapshot files not found in manifest".to_string())),
    };

    let read = |file: &str| {
        fs::read_to_string(file).map_err(|source| Error::Io {
            path: PathBuf::from(file),
            source,
        })
    };
    Ok(unified_diff(
        &read(previous_file)?,
        &read(current_file)?,
        previous,
        current,
    ))
}

fn unified_diff(old: &str, new: &str, old_name: &str, new_name: &str) -> String {
    let diff = TextDiff::from_lines(old, new);
    let mut out = String::new();
    for (idx, group) in diff.grouped_ops(3).iter().enumerate() {
        if idx == 0 {
            appendln!(out, "--- {}", old_name);
            appendln!(out, "+++ {}", new_name);
        } else {
            appendln!(out, "...");
        }
        for op in group {
            for change in diff.iter_changes(op) {
                let sign = match change.tag() {
                    ChangeTag::Delete => "-",
                    ChangeTag::Insert => "+",
                    ChangeTag::Equal => " ",
                };
                append!(out, "{}{}", sign, change);
                if change.missing_newline() {
                    appendln!(out);
                }
            }
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;
    use crate::source::Memory;

    fn target(root: &Path, version: &str) -> Target {
        Target {
            manifest: root.join(DEFAULT_MANIFEST),
            dir: root.join(DEFAULT_DIR),
            name: DEFAULT_NAME.to_string(),
            version: version.to_string(),
        }
    }

    #[test]
    fn records_and_diffs_snapshots() {
        let root = tempfile::tempdir().unwrap();
        let opts = Options::default();

        let mut v1 = Memory::parse("package model\n\ntype Widget struct {\n\tName string\n}\n").unwrap();
        let first = generate(&opts, &mut v1, &target(root.path(), "v1")).unwrap();
        assert_eq!(first, clean(&root.path().join(".dtoc/snapshots/current/v1/api_gen.go")));
        assert!(first.exists());
        assert!(matches!(
            diff_current_with_previous(&root.path().join(DEFAULT_MANIFEST)),
            Err(Error::Snapshot(_))
        ));

        let mut v2 = Memory::parse("package model\n\ntype Widget struct {\n\tName string\n\tAge  int\n}\n").unwrap();
        generate(&opts, &mut v2, &target(root.path(), "v2")).unwrap();

        let manifest = list(&root.path().join(DEFAULT_MANIFEST)).unwrap();
        assert_eq!(manifest.current_version, "v2");
        assert_eq!(manifest.previous_version, "v1");
        assert_eq!(
            manifest.snapshots.iter().map(|s| s.version.as_str()).collect::<Vec<_>>(),
            vec!["v1", "v2"]
        );

        let diff = diff_current_with_previous(&root.path().join(DEFAULT_MANIFEST)).unwrap();
        assert!(diff.starts_with("--- v1\n+++ v2\n"));
        assert!(diff.contains("-package v1\n"));
        assert!(diff.contains("+package v2\n"));
        assert!(diff.contains("+\tAge int\n"));
        assert!(diff.contains("+\tAge *int\n"));
    }

    #[test]
    fn missing_files_are_errors() {
        let root = tempfile::tempdir().unwrap();
        let path = root.path().join("manifest.yaml");
        let mut manifest = Manifest::default();
        manifest.add_snapshot(Snapshot {
            name: "current".to_string(),
            version: "v1".to_string(),
            file: root.path().join("v1.go").display().to_string(),
        });
        manifest.current_version = "v2".to_string();
        manifest.save(&path).unwrap();
        assert!(matches!(diff_current_with_previous(&path), Err(Error::Snapshot(_))));

        manifest.add_snapshot(Snapshot {
            name: "current".to_string(),
            version: "v3".to_string(),
            file: root.path().join("v3.go").display().to_string(),
        });
        manifest.previous_version = "v1".to_string();
        manifest.save(&path).unwrap();
        assert!(matches!(diff_current_with_previous(&path), Err(Error::Io { .. })));
    }

    #[test]
    fn diffs_lines() {
        assert_eq!(unified_diff("a\nb\n", "a\nb\n", "old", "new"), "");
        assert_eq!(unified_diff("a\nb\n", "a\nc", "old", "new"), "--- old\n+++ new\n a\n-b\n+c\n");
    }

    #[test]
    fn cleans_paths() {
        assert_eq!(clean(Path::new("./a/./b/../c")), PathBuf::from("a/c"));
        assert_eq!(clean(Path::new("../a")), PathBuf::from("../a"));
        assert_eq!(clean(Path::new(".")), PathBuf::from("."));
    }
}
