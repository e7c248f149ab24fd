//! Published content: the indexed tree, its route queries, and the lookup store.

mod refresher;
pub mod snapshot;
mod store;
mod tree;
mod xpath;

pub use refresher::{PUBLISHED_CONTENT_REFRESHER_ID, PublishedContentRefresher};
pub use snapshot::SnapshotError;
pub use store::{LookupError, PublishedContentStore};
pub use tree::{ContentTree, ROOT_PARENT_ID, TreeError};
pub use xpath::{AliasQuery, RouteQuery, route_query, route_xpath, url_alias_query, url_alias_xpath};
