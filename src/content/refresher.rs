//! Keeps the published-content store in step with refresh instructions.

use std::path::PathBuf;
use std::sync::Arc;

use serde::Deserialize;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::messaging::{CacheRefresher, MessengerError};

use super::snapshot;
use super::store::PublishedContentStore;

/// Well-known id under which peers address the published-content cache.
pub const PUBLISHED_CONTENT_REFRESHER_ID: Uuid =
    Uuid::from_u128(0x27ab3022_3dfa_47b6_9119_5945bc88fd66);

#[derive(Debug, Deserialize)]
struct JsonEntry {
    id: i32,
    #[serde(default)]
    removed: bool,
}

pub struct PublishedContentRefresher {
    store: Arc<PublishedContentStore>,
    snapshot_path: Option<PathBuf>,
}

impl PublishedContentRefresher {
    pub fn new(store: Arc<PublishedContentStore>, snapshot_path: Option<PathBuf>) -> Self {
        Self {
            store,
            snapshot_path,
        }
    }
}

impl CacheRefresher for PublishedContentRefresher {
    fn id(&self) -> Uuid {
        PUBLISHED_CONTENT_REFRESHER_ID
    }

    fn name(&self) -> &str {
        "published-content"
    }

    /// Reload the snapshot when there is one; a failed reload keeps the current tree.
    fn refresh_all(&self) {
        let Some(path) = self.snapshot_path.as_deref() else {
            self.store.clear_routes();
            return;
        };
        match snapshot::load(path) {
            Ok(tree) => {
                info!(nodes = tree.len(), "Reloaded published content");
                self.store.replace_tree(tree);
            }
            Err(err) => {
                error!(error = %err, "Failed to reload published content; keeping current tree");
                self.store.clear_routes();
            }
        }
    }

    /// Reload node `id` from the snapshot: republish it, or drop it with its
    /// subtree when the snapshot no longer has it. Without a snapshot only the
    /// routes memoized for `id` are forgotten.
    fn refresh_int(&self, id: i32) {
        let Some(path) = self.snapshot_path.as_deref() else {
            self.store.evict_node(id);
            return;
        };
        let snapshot = match snapshot::read(path) {
            Ok(snapshot) => snapshot,
            Err(err) => {
                error!(id, error = %err, "Failed to reload content node; keeping current tree");
                self.store.evict_node(id);
                return;
            }
        };

        let outcome = match snapshot.nodes.into_iter().find(|node| node.id == id) {
            Some(node) => self.store.upsert_node(node).map(|()| "republished"),
            None => self.store.remove_node(id).map(|_| "removed"),
        };
        match outcome {
            Ok(action) => debug!(id, action, "Reloaded content node"),
            Err(err) => {
                // The node moved under a parent this process has not seen yet.
                warn!(id, error = %err, "Content node does not fit the current tree; reloading all");
                self.refresh_all();
            }
        }
    }

    fn refresh_guid(&self, _id: Uuid) {
        // Nodes are keyed by integer id; any route may be affected.
        self.store.clear_routes();
    }

    fn remove(&self, id: i32) {
        match self.store.remove_node(id) {
            Ok(removed) => debug!(id, removed, "Removed content node"),
            Err(err) => {
                error!(id, error = %err, "Failed to remove content node");
                self.store.clear_routes();
            }
        }
    }

    /// Accepts `[{"id": 1}, {"id": 2, "removed": true}]`.
    fn refresh_json(&self, payload: &str) -> Result<(), MessengerError> {
        let entries: Vec<JsonEntry> = serde_json::from_str(payload)
            .map_err(|err| MessengerError::Payload(format!("malformed content payload: {err}")))?;
        for entry in entries {
            if entry.removed {
                self.remove(entry.id);
            } else {
                self.refresh_int(entry.id);
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::io::Write;
    use std::num::NonZeroUsize;

    use super::*;
    use crate::content::snapshot::Snapshot;
    use crate::content::tree::ContentTree;
    use crate::domain::content::PublishedNode;
    use crate::domain::content::fixtures::node;

    fn snapshot_file(nodes: Vec<PublishedNode>) -> tempfile::NamedTempFile {
        let mut file = tempfile::NamedTempFile::new().expect("temp file");
        let body = serde_json::to_string(&Snapshot { nodes }).expect("encode snapshot");
        file.write_all(body.as_bytes()).expect("write snapshot");
        file
    }

    fn store() -> Arc<PublishedContentStore> {
        Arc::new(PublishedContentStore::new(
            ContentTree::new(vec![node(1, -1, "home", 1), node(2, 1, "about", 2)]).expect("tree"),
            true,
            NonZeroUsize::new(8).expect("non-zero"),
        ))
    }

    #[test]
    fn refresh_by_id_evicts_routes_to_that_node() {
        let store = store();
        store.get_by_route("/about", None).expect("lookup");
        let refresher = PublishedContentRefresher::new(store.clone(), None);

        refresher.refresh_int(1);
        assert_eq!(store.cached_routes(), 1);
        refresher.refresh_int(2);
        assert_eq!(store.cached_routes(), 0);
    }

    #[test]
    fn json_payload_names_nodes() {
        let store = store();
        store.get_by_route("/about", None).expect("lookup");
        let refresher = PublishedContentRefresher::new(store.clone(), None);

        refresher
            .refresh_json(r#"[{"id": 2, "removed": true}]"#)
            .expect("payload");
        assert_eq!(store.cached_routes(), 0);
        assert!(store.get_by_id(2).is_none());
        assert!(refresher.refresh_json("{").is_err());
    }

    #[test]
    fn removed_nodes_are_no_longer_published() {
        let mut about = node(2, 1, "about", 2);
        about.url_alias = Some("company".to_string());
        let store = Arc::new(PublishedContentStore::new(
            ContentTree::new(vec![node(1, -1, "home", 1), about, node(3, 2, "team", 3)])
                .expect("tree"),
            true,
            NonZeroUsize::new(8).expect("non-zero"),
        ));
        let refresher = PublishedContentRefresher::new(store.clone(), None);
        assert!(store.get_by_route("/about", None).expect("lookup").is_some());

        refresher.remove(2);

        assert!(store.get_by_id(2).is_none());
        assert!(store.get_by_id(3).is_none());
        assert!(store.get_by_route("/about", None).expect("lookup").is_none());
        assert!(store.get_by_url_alias(0, "company").expect("lookup").is_none());
        assert!(store.get_by_id(1).is_some());
    }

    #[test]
    fn refresh_by_id_reloads_that_node_from_the_snapshot() {
        let file = snapshot_file(vec![node(1, -1, "home", 1), node(2, 1, "about-us", 2)]);
        let store = store();
        store.get_by_route("/about", None).expect("lookup");
        let refresher = PublishedContentRefresher::new(store.clone(), Some(file.path().into()));

        refresher.refresh_int(2);

        assert!(store.get_by_route("/about", None).expect("lookup").is_none());
        let found = store.get_by_route("/about-us", None).expect("lookup");
        assert_eq!(found.map(|node| node.id), Some(2));
    }

    #[test]
    fn refresh_by_id_drops_nodes_missing_from_the_snapshot() {
        let file = snapshot_file(vec![node(1, -1, "home", 1)]);
        let store = store();
        let refresher = PublishedContentRefresher::new(store.clone(), Some(file.path().into()));

        refresher.refresh_int(2);

        assert!(store.get_by_id(2).is_none());
        assert!(store.get_by_id(1).is_some());
    }

    #[test]
    fn refresh_by_id_falls_back_to_a_full_reload() {
        // Node 4 moved under node 3, which this store has never seen.
        let file = snapshot_file(vec![
            node(1, -1, "home", 1),
            node(3, 1, "section", 2),
            node(4, 3, "page", 3),
        ]);
        let store = store();
        let refresher = PublishedContentRefresher::new(store.clone(), Some(file.path().into()));

        refresher.refresh_int(4);

        assert!(store.get_by_id(4).is_some());
        assert!(store.get_by_id(3).is_some());
        assert!(store.get_by_id(2).is_none());
    }

    #[test]
    fn refresh_all_reloads_the_snapshot() {
        let mut file = tempfile::NamedTempFile::new().expect("temp file");
        write!(
            file,
            r#"{{"nodes": [{{"id": 30, "parent_id": -1, "name": "New", "url_name": "new",
                "document_type_alias": "page", "path": "-1,30", "level": 1,
                "create_date": "2024-01-01T00:00:00Z", "update_date": "2024-01-01T00:00:00Z"}}]}}"#
        )
        .expect("write snapshot");

        let store = store();
        let refresher = PublishedContentRefresher::new(store.clone(), Some(file.path().into()));
        refresher.refresh_all();

        assert!(store.get_by_id(1).is_none());
        assert!(store.get_by_id(30).is_some());
    }

    #[test]
    fn failed_reload_keeps_the_current_tree() {
        let store = store();
        let refresher =
            PublishedContentRefresher::new(store.clone(), Some("/nonexistent/cairn.json".into()));
        refresher.refresh_all();
        assert!(store.get_by_id(1).is_some());
    }
}
