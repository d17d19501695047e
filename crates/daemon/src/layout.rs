// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Mapping from stream ids to files under a root directory

use rakaia_core::StreamId;
use std::path::{Component, Path, PathBuf};
use thiserror::Error;

const EXTENSION: &str = "log";

#[derive(Debug, Error)]
#[error("stream id {id} escapes {}", root.display())]
pub struct LayoutError {
    pub id: StreamId,
    pub root: PathBuf,
}

/// `<root>/<relative_path>.log` for every stream id
#[derive(Debug, Clone)]
pub struct StreamLayout {
    root: PathBuf,
}

impl StreamLayout {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// File backing `id`
    ///
    /// Ids are validated on construction; the joined path is checked again
    /// so a layout never hands out a path outside its root.
    pub fn path_for(&self, id: &StreamId) -> Result<PathBuf, LayoutError> {
        let relative = id.relative_path();
        let contained = relative
            .components()
            .all(|c| matches!(c, Component::Normal(_)));
        if !contained {
            return Err(self.escape(id));
        }

        let mut path = self.root.join(relative);
        let file_name = match path.file_name() {
            Some(name) => format!("{}.{EXTENSION}", name.to_string_lossy()),
            None => return Err(self.escape(id)),
        };
        path.set_file_name(file_name);

        if path.starts_with(&self.root) {
            Ok(path)
        } else {
            Err(self.escape(id))
        }
    }

    fn escape(&self, id: &StreamId) -> LayoutError {
        LayoutError {
            id: id.clone(),
            root: self.root.clone(),
        }
    }
}

#[cfg(test)]
#[path = "layout_tests.rs"]
mod tests;
