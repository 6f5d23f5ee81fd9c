// Copyright 2025 Benchwatch Contributors
// SPDX-License-Identifier: Apache-2.0

//! Per-run isolated working directories.
//!
//! Every evaluation run gets `<root>/<run_id>/base` and `<root>/<run_id>/head`.
//! A run directory is never reused: allocating an identifier whose directory
//! already exists fails. [`WorkspaceLease`] removes the tree when dropped so a
//! workspace cannot outlive its run on any exit path.
//!
//! Allocated paths are always absolute, even when the manager root is
//! relative, so commands run inside a checkout see the same paths as the
//! process that allocated it.

use crate::execution::RunId;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{debug, warn};

/// Directory name of the base checkout inside a run workspace.
pub const BASE_DIR: &str = "base";

/// Directory name of the head checkout inside a run workspace.
pub const HEAD_DIR: &str = "head";

/// Errors raised while allocating or releasing workspaces.
#[derive(Debug, Error)]
pub enum WorkspaceError {
    /// The run directory already exists.
    #[error("Workspace already exists: {}", .path.display())]
    AlreadyExists {
        /// Colliding path.
        path: PathBuf,
    },

    /// A directory could not be created.
    #[error("Failed to create workspace directory {}: {source}", .path.display())]
    Create {
        /// Path that could not be created.
        path: PathBuf,
        /// Underlying I/O error.
        #[source]
        source: io::Error,
    },

    /// The run tree could not be removed.
    #[error("Failed to remove workspace {}: {source}", .path.display())]
    Remove {
        /// Path that could not be removed.
        path: PathBuf,
        /// Underlying I/O error.
        #[source]
        source: io::Error,
    },
}

/// The base/head directory pair of one run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Workspace {
    /// Owning run.
    pub run_id: RunId,
    /// Run-scoped root (`<root>/<run_id>`).
    pub root: PathBuf,
    /// Base checkout directory.
    pub base_dir: PathBuf,
    /// Head checkout directory.
    pub head_dir: PathBuf,
}

/// Allocates and releases run workspaces under a common root.
#[derive(Debug, Clone)]
pub struct WorkspaceManager {
    root: PathBuf,
}

impl WorkspaceManager {
    /// Manage workspaces below `root`. The root is created lazily.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// The directory all run workspaces live in.
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Path of the workspace for `run_id`, whether or not it exists.
    pub fn run_dir(&self, run_id: &RunId) -> PathBuf {
        self.root.join(run_id.as_str())
    }

    /// Create a fresh `base`/`head` directory pair for `run_id`.
    ///
    /// Fails with [`WorkspaceError::AlreadyExists`] if the run directory is
    /// already present; a partially created tree is removed before returning
    /// any other error. The returned paths are absolute.
    pub fn allocate(&self, run_id: &RunId) -> Result<Workspace, WorkspaceError> {
        let create_error = |source| WorkspaceError::Create {
            path: self.root.clone(),
            source,
        };
        fs::create_dir_all(&self.root).map_err(create_error)?;
        let managed_root = fs::canonicalize(&self.root).map_err(create_error)?;

        let root = managed_root.join(run_id.as_str());
        // create_dir (not create_dir_all) so an existing directory is a collision.
        fs::create_dir(&root).map_err(|source| {
            if source.kind() == io::ErrorKind::AlreadyExists {
                WorkspaceError::AlreadyExists { path: root.clone() }
            } else {
                WorkspaceError::Create {
                    path: root.clone(),
                    source,
                }
            }
        })?;

        let base_dir = root.join(BASE_DIR);
        let head_dir = root.join(HEAD_DIR);
        for dir in [&base_dir, &head_dir] {
            if let Err(source) = fs::create_dir(dir) {
                let _ = fs::remove_dir_all(&root);
                return Err(WorkspaceError::Create {
                    path: dir.clone(),
                    source,
                });
            }
        }

        debug!(run_id = %run_id, path = %root.display(), "Workspace allocated");
        Ok(Workspace {
            run_id: run_id.clone(),
            root,
            base_dir,
            head_dir,
        })
    }

    /// Recursively remove the workspace of `run_id`. Idempotent.
    pub fn release(&self, run_id: &RunId) -> Result<(), WorkspaceError> {
        let root = self.run_dir(run_id);
        match fs::remove_dir_all(&root) {
            Ok(()) => {
                debug!(run_id = %run_id, path = %root.display(), "Workspace released");
                Ok(())
            }
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(source) => Err(WorkspaceError::Remove { path: root, source }),
        }
    }

    /// Allocate a workspace wrapped in a guard that releases it on drop.
    pub fn lease(&self, run_id: &RunId) -> Result<WorkspaceLease, WorkspaceError> {
        let workspace = self.allocate(run_id)?;
        Ok(WorkspaceLease {
            manager: self.clone(),
            workspace,
            released: false,
        })
    }
}

/// Scoped ownership of a run workspace.
///
/// Call [`WorkspaceLease::release`] to observe the cleanup result; otherwise
/// the workspace is removed when the lease is dropped and any failure is
/// logged.
#[derive(Debug)]
pub struct WorkspaceLease {
    manager: WorkspaceManager,
    workspace: Workspace,
    released: bool,
}

impl WorkspaceLease {
    /// The leased directories.
    pub fn workspace(&self) -> &Workspace {
        &self.workspace
    }

    /// Remove the workspace now and report the result.
    pub fn release(mut self) -> Result<(), WorkspaceError> {
        self.released = true;
        self.manager.release(&self.workspace.run_id)
    }
}

impl std::ops::Deref for WorkspaceLease {
    type Target = Workspace;
    fn deref(&self) -> &Self::Target {
        &self.workspace
    }
}

impl Drop for WorkspaceLease {
    fn drop(&mut self) {
        if self.released {
            return;
        }
        if let Err(e) = self.manager.release(&self.workspace.run_id) {
            warn!(run_id = %self.workspace.run_id, error = %e, "Workspace cleanup on drop failed");
        }
    }
}
