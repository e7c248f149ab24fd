//! Published-content lookup by id, route and URL alias.

use std::num::{NonZeroUsize, ParseIntError};
use std::sync::{Arc, Mutex, RwLock};

use lru::LruCache;
use metrics::counter;
use thiserror::Error;
use tracing::{debug, instrument};

use crate::domain::content::PublishedNode;
use crate::util::lock::{mutex_lock, rw_read, rw_write};

use super::tree::{ContentTree, TreeError};
use super::xpath::{route_query, url_alias_query};

const SOURCE: &str = "content::store";

#[derive(Debug, Error)]
pub enum LookupError {
    #[error("`{0}` must not be empty")]
    MissingArgument(&'static str),
    #[error("route start node `{segment}` is not numeric: {source}")]
    InvalidStartNode {
        segment: String,
        #[source]
        source: ParseIntError,
    },
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub(crate) struct RouteKey {
    route: String,
    hide_top_level_node: bool,
}

/// The current tree and the generation it was published under.
struct Published {
    tree: Arc<ContentTree>,
    generation: u64,
}

/// Memoized routes, valid only for the tree of `generation`.
struct RouteMemo {
    generation: u64,
    entries: LruCache<RouteKey, Option<i32>>,
}

/// Resolves published content against the current content tree.
///
/// Route lookups are memoized (including misses) until the tree changes or
/// a refresher evicts them. Every tree change bumps a generation; a lookup
/// only memoizes its result if the generation it resolved against is still
/// the memo's generation.
pub struct PublishedContentStore {
    published: RwLock<Published>,
    hide_top_level_node: bool,
    routes: Mutex<RouteMemo>,
}

impl PublishedContentStore {
    pub fn new(tree: ContentTree, hide_top_level_node: bool, route_cache_limit: NonZeroUsize) -> Self {
        Self {
            published: RwLock::new(Published {
                tree: Arc::new(tree),
                generation: 0,
            }),
            hide_top_level_node,
            routes: Mutex::new(RouteMemo {
                generation: 0,
                entries: LruCache::new(route_cache_limit),
            }),
        }
    }

    pub fn tree(&self) -> Arc<ContentTree> {
        self.current().0
    }

    pub fn hide_top_level_node(&self) -> bool {
        self.hide_top_level_node
    }

    pub fn get_by_id(&self, id: i32) -> Option<PublishedNode> {
        self.tree().get(id).cloned()
    }

    /// Resolve `route`: an optional numeric start node id followed by a path.
    ///
    /// A single-segment path that fails with the top level hidden is retried
    /// with it shown, so top-level nodes without a domain still resolve.
    #[instrument(skip(self), level = "debug")]
    pub fn get_by_route(
        &self,
        route: &str,
        hide_top_level_node: Option<bool>,
    ) -> Result<Option<PublishedNode>, LookupError> {
        if route.is_empty() {
            return Err(LookupError::MissingArgument("route"));
        }
        let hide = hide_top_level_node.unwrap_or(self.hide_top_level_node);
        let route = route.to_lowercase();
        let key = RouteKey {
            route: route.clone(),
            hide_top_level_node: hide,
        };

        let (tree, generation) = self.current();
        if let Some(cached) = self.memoized(generation, &key) {
            return Ok(cached.and_then(|id| tree.get(id).cloned()));
        }

        let (start_node_id, path) = split_route(&route)?;
        let mut query = route_query(start_node_id, path, hide);
        let mut found = query.evaluate(&tree);

        if found.is_none() && hide && path.matches('/').count() == 1 {
            query = route_query(start_node_id, path, false);
            found = query.evaluate(&tree);
        }

        let id = found.map(|index| tree.node(index).id);
        debug!(xpath = %query, found = ?id, "route resolved");
        if id.is_none() {
            counter!("cairn_content_lookup_miss_total").increment(1);
        }

        self.memoize(generation, key, id);
        Ok(id.and_then(|id| tree.get(id).cloned()))
    }

    /// First document whose URL aliases contain `alias`, under `root_id` when positive.
    pub fn get_by_url_alias(
        &self,
        root_id: i32,
        alias: &str,
    ) -> Result<Option<PublishedNode>, LookupError> {
        if alias.is_empty() {
            return Err(LookupError::MissingArgument("alias"));
        }
        let query = url_alias_query(root_id, alias);
        let tree = self.tree();
        let found = query.evaluate(&tree).map(|index| tree.node(index).clone());
        debug!(xpath = %query, found = ?found.as_ref().map(|node| node.id), "url alias resolved");
        Ok(found)
    }

    /// Swap in a freshly loaded tree, dropping every memoized route.
    pub fn replace_tree(&self, tree: ContentTree) {
        let generation = {
            let mut published = rw_write(&self.published, SOURCE, "replace_tree");
            published.publish(tree)
        };
        self.reset_routes(generation);
    }

    /// Drop node `id` and its descendants. Returns whether `id` was published.
    pub fn remove_node(&self, id: i32) -> Result<bool, TreeError> {
        let generation = {
            let mut published = rw_write(&self.published, SOURCE, "remove_node");
            let Some(tree) = published.tree.without(id)? else {
                return Ok(false);
            };
            published.publish(tree)
        };
        self.reset_routes(generation);
        Ok(true)
    }

    /// Publish `node`, replacing the node with the same id if there is one.
    pub fn upsert_node(&self, node: PublishedNode) -> Result<(), TreeError> {
        let generation = {
            let mut published = rw_write(&self.published, SOURCE, "upsert_node");
            let tree = published.tree.with_node(node)?;
            published.publish(tree)
        };
        self.reset_routes(generation);
        Ok(())
    }

    pub fn clear_routes(&self) {
        mutex_lock(&self.routes, SOURCE, "clear_routes").entries.clear();
    }

    /// Forget routes that resolved to `id`, and every memoized miss.
    pub fn evict_node(&self, id: i32) {
        let mut routes = mutex_lock(&self.routes, SOURCE, "evict_node");
        let stale: Vec<RouteKey> = routes
            .entries
            .iter()
            .filter(|(_, cached)| match **cached {
                Some(cached_id) => cached_id == id,
                None => true,
            })
            .map(|(key, _)| key.clone())
            .collect();
        for key in stale {
            routes.entries.pop(&key);
        }
    }

    pub fn cached_routes(&self) -> usize {
        mutex_lock(&self.routes, SOURCE, "cached_routes").entries.len()
    }

    pub(crate) fn current(&self) -> (Arc<ContentTree>, u64) {
        let published = rw_read(&self.published, SOURCE, "current");
        (published.tree.clone(), published.generation)
    }

    fn memoized(&self, generation: u64, key: &RouteKey) -> Option<Option<i32>> {
        let mut routes = mutex_lock(&self.routes, SOURCE, "memoized");
        if routes.generation != generation {
            return None;
        }
        routes.entries.get(key).copied()
    }

    /// Record a lookup made against `generation`. Returns false when the tree
    /// has changed since, in which case nothing is recorded.
    pub(crate) fn memoize(&self, generation: u64, key: RouteKey, id: Option<i32>) -> bool {
        let mut routes = mutex_lock(&self.routes, SOURCE, "memoize");
        if routes.generation != generation {
            return false;
        }
        routes.entries.put(key, id);
        true
    }

    fn reset_routes(&self, generation: u64) {
        let mut routes = mutex_lock(&self.routes, SOURCE, "reset_routes");
        routes.generation = routes.generation.max(generation);
        routes.entries.clear();
    }
}

impl Published {
    fn publish(&mut self, tree: ContentTree) -> u64 {
        self.tree = Arc::new(tree);
        self.generation += 1;
        self.generation
    }
}

/// Split a lower-cased route into its start node id (0 when absent) and path.
fn split_route(route: &str) -> Result<(i32, &str), LookupError> {
    let (start, path) = match route.find('/') {
        Some(0) => return Ok((0, route)),
        Some(pos) => route.split_at(pos),
        None => (route, ""),
    };
    let start_node_id = start
        .parse::<i32>()
        .map_err(|source| LookupError::InvalidStartNode {
            segment: start.to_string(),
            source,
        })?;
    Ok((start_node_id, path))
}
