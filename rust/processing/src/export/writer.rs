// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! All-or-nothing artifact writer
//!
//! Every artifact is first written to a temporary file in the target
//! directory. Nothing becomes visible under its final name until all of
//! them were written and synced. Artifacts of an earlier run are moved
//! aside during the commit and put back if any rename fails.

use crate::error::ExportError;
use std::io::Write;
use std::path::{Path, PathBuf};
use tempfile::{NamedTempFile, TempPath};

/// Artifacts written to temporary files, waiting to be moved into place
pub struct StagedArtifacts {
    dir: PathBuf,
    staged: Vec<(NamedTempFile, PathBuf)>,
}

/// A file moved into place, with the file it replaced
struct Placed {
    target: PathBuf,
    previous: Option<TempPath>,
}

impl StagedArtifacts {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            staged: Vec::new(),
        }
    }

    /// Write `bytes` to a temporary file that will become `file_name`
    pub fn stage(&mut self, file_name: &str, bytes: &[u8]) -> Result<(), ExportError> {
        let target = self.dir.join(file_name);
        let mut file = NamedTempFile::new_in(&self.dir).map_err(|e| ExportError::io(&target, e))?;
        file.write_all(bytes).map_err(|e| ExportError::io(&target, e))?;
        file.as_file().sync_all().map_err(|e| ExportError::io(&target, e))?;
        self.staged.push((file, target));
        Ok(())
    }

    /// Move every staged file to its final name.
    ///
    /// If one rename fails, every target is restored to what it held before
    /// the commit. Replaced files are deleted once all renames succeeded.
    pub fn commit(self) -> Result<Vec<PathBuf>, ExportError> {
        let mut placed: Vec<Placed> = Vec::with_capacity(self.staged.len());
        for (file, target) in self.staged {
            let previous = match move_aside(&self.dir, &target) {
                Ok(previous) => previous,
                Err(source) => {
                    roll_back(placed);
                    return Err(ExportError::Persist { path: target, source });
                }
            };
            if let Err(err) = file.persist(&target) {
                if let Some(previous) = previous {
                    restore(previous, &target);
                }
                roll_back(placed);
                return Err(ExportError::Persist {
                    path: target,
                    source: err.error,
                });
            }
            placed.push(Placed { target, previous });
        }

        tracing::debug!(dir = %self.dir.display(), files = placed.len(), "Artifacts committed");
        // Dropping the placed entries deletes the replaced files
        Ok(placed.into_iter().map(|p| p.target).collect())
    }
}

/// Rename an existing `target` to a temporary name in `dir`
fn move_aside(dir: &Path, target: &Path) -> std::io::Result<Option<TempPath>> {
    if !target.exists() {
        return Ok(None);
    }
    let previous = tempfile::Builder::new()
        .prefix(".previous-")
        .tempfile_in(dir)?
        .into_temp_path();
    std::fs::rename(target, &previous)?;
    Ok(Some(previous))
}

fn restore(previous: TempPath, target: &Path) {
    if let Err(e) = previous.persist(target) {
        tracing::warn!(path = %target.display(), error = %e.error, "Failed to restore previous artifact");
    }
}

fn roll_back(placed: Vec<Placed>) {
    for Placed { target, previous } in placed.into_iter().rev() {
        match previous {
            Some(previous) => restore(previous, &target),
            None => {
                if let Err(e) = std::fs::remove_file(&target) {
                    tracing::warn!(path = %target.display(), error = %e, "Failed to roll back artifact");
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_nothing_visible_before_commit() {
        let dir = tempfile::tempdir().unwrap();
        let mut staged = StagedArtifacts::new(dir.path());
        staged.stage("a.obj", b"o a\n").unwrap();
        staged.stage("a_metadata.json", b"{}\n").unwrap();
        assert!(!dir.path().join("a.obj").exists());

        let paths = staged.commit().unwrap();
        assert_eq!(paths, [dir.path().join("a.obj"), dir.path().join("a_metadata.json")]);
        assert_eq!(std::fs::read(dir.path().join("a.obj")).unwrap(), b"o a\n");
    }

    #[test]
    fn test_dropped_stage_leaves_no_files() {
        let dir = tempfile::tempdir().unwrap();
        {
            let mut staged = StagedArtifacts::new(dir.path());
            staged.stage("a.glb", b"glTF").unwrap();
        }
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);
    }

    #[test]
    fn test_stage_into_missing_dir_fails() {
        let dir = tempfile::tempdir().unwrap();
        let mut staged = StagedArtifacts::new(dir.path().join("missing"));
        assert!(matches!(staged.stage("a.obj", b""), Err(ExportError::Io { .. })));
    }

    #[test]
    fn test_commit_replaces_previous_run() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("a.obj"), b"old").unwrap();

        let mut staged = StagedArtifacts::new(dir.path());
        staged.stage("a.obj", b"new").unwrap();
        staged.commit().unwrap();

        assert_eq!(std::fs::read(dir.path().join("a.obj")).unwrap(), b"new");
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 1);
    }

    #[test]
    fn test_failed_commit_restores_previous_run() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("a.obj"), b"old obj").unwrap();
        std::fs::write(dir.path().join("a.mtl"), b"old mtl").unwrap();
        // A non-empty directory cannot be replaced by a file
        std::fs::create_dir(dir.path().join("a.glb")).unwrap();
        std::fs::write(dir.path().join("a.glb").join("keep"), b"").unwrap();

        let mut staged = StagedArtifacts::new(dir.path());
        staged.stage("a.obj", b"new obj").unwrap();
        staged.stage("a.mtl", b"new mtl").unwrap();
        staged.stage("a.glb", b"glTF").unwrap();
        let err = staged.commit().unwrap_err();
        assert!(matches!(err, ExportError::Persist { .. }));

        assert_eq!(std::fs::read(dir.path().join("a.obj")).unwrap(), b"old obj");
        assert_eq!(std::fs::read(dir.path().join("a.mtl")).unwrap(), b"old mtl");
        let names: Vec<_> = std::fs::read_dir(dir.path())
            .unwrap()
            .map(|e| e.unwrap().file_name().into_string().unwrap())
            .collect();
        assert_eq!(names.len(), 3, "leftover files: {names:?}");
    }
}
