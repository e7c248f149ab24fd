//! JSON snapshots of the published content tree.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::info;

use crate::domain::content::PublishedNode;

use super::tree::{ContentTree, TreeError};

#[derive(Debug, Error)]
pub enum SnapshotError {
    #[error("failed to read content snapshot `{path}`: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("content snapshot `{path}` is not valid JSON: {source}")]
    Json {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
    #[error("content snapshot `{path}` is inconsistent: {source}")]
    Tree {
        path: PathBuf,
        #[source]
        source: TreeError,
    },
}

/// On-disk shape: a flat node list, parents referenced by id.
#[derive(Debug, Default, Serialize, Deserialize)]
pub struct Snapshot {
    #[serde(default)]
    pub nodes: Vec<PublishedNode>,
}

/// Parse the snapshot at `path` without building a tree from it.
pub fn read(path: &Path) -> Result<Snapshot, SnapshotError> {
    let raw = fs::read_to_string(path).map_err(|source| SnapshotError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    serde_json::from_str(&raw).map_err(|source| SnapshotError::Json {
        path: path.to_path_buf(),
        source,
    })
}

pub fn load(path: &Path) -> Result<ContentTree, SnapshotError> {
    let snapshot = read(path)?;
    let tree = ContentTree::new(snapshot.nodes).map_err(|source| SnapshotError::Tree {
        path: path.to_path_buf(),
        source,
    })?;
    info!(path = %path.display(), nodes = tree.len(), "Loaded content snapshot");
    Ok(tree)
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use super::*;

    fn write_snapshot(body: &str) -> tempfile::NamedTempFile {
        let mut file = tempfile::NamedTempFile::new().expect("temp file");
        file.write_all(body.as_bytes()).expect("write snapshot");
        file
    }

    #[test]
    fn loads_nodes_into_a_tree() {
        let file = write_snapshot(
            r#"{"nodes": [
                {"id": 1, "parent_id": -1, "name": "Home", "url_name": "home",
                 "document_type_alias": "page", "path": "-1,1", "level": 1,
                 "create_date": "2024-01-01T00:00:00Z", "update_date": "2024-01-02T00:00:00Z"},
                {"id": 2, "parent_id": 1, "name": "About", "url_name": "about",
                 "document_type_alias": "page", "path": "-1,1,2", "level": 2, "sort_order": 1,
                 "create_date": "2024-01-01T00:00:00Z", "update_date": "2024-01-02T00:00:00Z",
                 "url_alias": "about-us"}
            ]}"#,
        );

        let tree = load(file.path()).expect("load");
        assert_eq!(tree.len(), 2);
        let about = tree.get(2).expect("about");
        assert_eq!(about.url_alias.as_deref(), Some("about-us"));
        assert_eq!(about.sort_order, 1);
    }

    #[test]
    fn reports_the_failing_stage() {
        let missing = Path::new("/nonexistent/cairn/snapshot.json");
        assert!(matches!(load(missing), Err(SnapshotError::Io { .. })));

        let garbage = write_snapshot("{not json");
        assert!(matches!(load(garbage.path()), Err(SnapshotError::Json { .. })));

        let orphan = write_snapshot(
            r#"{"nodes": [{"id": 4, "parent_id": 3, "name": "x", "url_name": "x",
                "document_type_alias": "page", "path": "", "level": 2,
                "create_date": "2024-01-01T00:00:00Z", "update_date": "2024-01-01T00:00:00Z"}]}"#,
        );
        assert!(matches!(load(orphan.path()), Err(SnapshotError::Tree { .. })));
    }
}
