//! Decides which inbound paths may be served as content documents.

use std::sync::Arc;

use super::reserved::ReservedPaths;
use super::route_table::{RouteCheckCache, RouteTable};

/// How the content pipeline should treat a request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequestKind {
    /// May resolve to a published document.
    Document,
    /// Belongs to a reserved prefix or a registered route.
    Reserved,
    /// Carries a file extension other than the document extension.
    Asset,
}

pub struct RoutableDocumentFilter {
    reserved: ReservedPaths,
    document_extension: String,
    routes: Arc<dyn RouteTable>,
    route_checks: RouteCheckCache,
}

impl RoutableDocumentFilter {
    pub fn new(
        reserved: ReservedPaths,
        document_extension: &str,
        routes: Arc<dyn RouteTable>,
    ) -> Self {
        Self {
            reserved,
            document_extension: document_extension
                .trim()
                .trim_start_matches('.')
                .to_lowercase(),
            routes,
            route_checks: RouteCheckCache::new(),
        }
    }

    pub fn reserved(&self) -> &ReservedPaths {
        &self.reserved
    }

    pub fn route_checks(&self) -> &RouteCheckCache {
        &self.route_checks
    }

    pub fn classify(&self, path: &str) -> RequestKind {
        let path = strip_query(path).to_lowercase();
        if !self.has_document_extension(&path) {
            RequestKind::Asset
        } else if self.is_reserved_path_or_url(&path) {
            RequestKind::Reserved
        } else {
            RequestKind::Document
        }
    }

    /// Extensionless paths and the document extension are candidates unless reserved.
    pub fn is_document_request(&self, path: &str) -> bool {
        self.classify(path) == RequestKind::Document
    }

    pub fn is_reserved_path_or_url(&self, path: &str) -> bool {
        self.reserved.is_reserved(path) || self.is_reserved_route(path)
    }

    /// Whether a registered route claims `path`; an empty path never does.
    pub fn is_reserved_route(&self, path: &str) -> bool {
        let path = strip_query(path).trim().to_lowercase();
        if path.is_empty() {
            return false;
        }
        self.route_checks.check(self.routes.as_ref(), &path)
    }

    fn has_document_extension(&self, path: &str) -> bool {
        let last = path.rsplit('/').next().unwrap_or_default();
        match last.rsplit_once('.') {
            Some((_, extension)) if !extension.is_empty() => extension == self.document_extension,
            _ => true,
        }
    }
}

fn strip_query(path: &str) -> &str {
    path.split(['?', '#']).next().unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::routing::reserved::ReservedPathRegistry;
    use crate::routing::route_table::RouteRegistry;

    fn filter(routes: Arc<RouteRegistry>) -> RoutableDocumentFilter {
        let reserved = ReservedPaths::new(
            &[],
            &["/umbraco".to_string(), "/api".to_string()],
            "/",
            Arc::new(ReservedPathRegistry::new()),
        );
        RoutableDocumentFilter::new(reserved, "aspx", routes)
    }

    #[test]
    fn only_extensionless_and_document_paths_are_documents() {
        let filter = filter(Arc::new(RouteRegistry::new()));
        assert!(filter.is_document_request("/foo/bar"));
        assert!(filter.is_document_request("/foo/bar/"));
        assert!(filter.is_document_request("/foo/bar.aspx"));
        assert!(filter.is_document_request("/Foo/Bar.ASPX"));
        assert!(!filter.is_document_request("/foo/bar.css"));
        assert_eq!(filter.classify("/foo/bar.css"), RequestKind::Asset);
    }

    #[test]
    fn reserved_prefixes_are_not_documents() {
        let filter = filter(Arc::new(RouteRegistry::new()));
        assert_eq!(filter.classify("/umbraco/edit.aspx"), RequestKind::Reserved);
        assert_eq!(filter.classify("/Api/foo"), RequestKind::Reserved);
        assert_eq!(filter.classify("/umbracox"), RequestKind::Document);
    }

    #[test]
    fn registered_routes_are_reserved() {
        let routes = Arc::new(RouteRegistry::new());
        let filter = filter(routes.clone());
        assert!(filter.is_document_request("/feeds/latest"));

        routes.register("/feeds/{name}").expect("route");
        assert!(filter.is_reserved_route("/feeds/latest"));
        assert!(!filter.is_document_request("/feeds/latest"));
        assert!(!filter.is_reserved_route(""));
    }
}
