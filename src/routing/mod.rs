//! Separates document requests from reserved paths, registered routes and assets.

mod filter;
mod middleware;
mod reserved;
mod route_table;

pub use filter::{RequestKind, RoutableDocumentFilter};
pub use middleware::classify_requests;
pub use reserved::{ReservedPathRegistry, ReservedPaths};
pub use route_table::{RouteCheckCache, RouteError, RoutePattern, RouteRegistry, RouteTable};
