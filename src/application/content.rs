use std::sync::Arc;

use axum::http::StatusCode;
use tracing::debug;

use crate::application::error::HttpError;
use crate::config::ContentSettings;
use crate::content::{LookupError, PublishedContentStore};
use crate::domain::content::PublishedNode;

const SOURCE: &str = "application::content::DocumentService";

/// Resolves an inbound document request to published content.
#[derive(Clone)]
pub struct DocumentService {
    store: Arc<PublishedContentStore>,
    settings: ContentSettings,
    document_extension: String,
}

impl DocumentService {
    pub fn new(
        store: Arc<PublishedContentStore>,
        settings: ContentSettings,
        document_extension: &str,
    ) -> Self {
        Self {
            store,
            settings,
            document_extension: document_extension.to_lowercase(),
        }
    }

    pub fn store(&self) -> &Arc<PublishedContentStore> {
        &self.store
    }

    pub fn by_id(&self, id: i32) -> Option<PublishedNode> {
        self.store.get_by_id(id)
    }

    /// Route lookup under the host's domain root, then a URL alias lookup.
    pub fn resolve(&self, host: &str, path: &str) -> Result<Option<PublishedNode>, HttpError> {
        let root = self.settings.root_for_host(host);
        let path = self.document_path(path);
        let route = if root > 0 {
            format!("{root}{path}")
        } else {
            path.clone()
        };

        if let Some(node) = self
            .store
            .get_by_route(&route, None)
            .map_err(|err| lookup_failure("get_by_route", err))?
        {
            return Ok(Some(node));
        }

        let alias = path.trim_start_matches('/');
        if alias.is_empty() {
            return Ok(None);
        }
        let found = self
            .store
            .get_by_url_alias(root, alias)
            .map_err(|err| lookup_failure("get_by_url_alias", err))?;
        debug!(host, route = %route, found = found.is_some(), "Fell back to url alias");
        Ok(found)
    }

    /// Lower-case `path` without its document extension or trailing slash.
    fn document_path(&self, path: &str) -> String {
        let mut path = path.to_lowercase();
        let suffix = format!(".{}", self.document_extension);
        if let Some(stripped) = path.strip_suffix(&suffix) {
            path = stripped.to_string();
        }
        let trimmed = path.trim_end_matches('/');
        if trimmed.is_empty() {
            "/".to_string()
        } else if trimmed.starts_with('/') {
            trimmed.to_string()
        } else {
            format!("/{trimmed}")
        }
    }
}

fn lookup_failure(operation: &'static str, err: LookupError) -> HttpError {
    HttpError::new(
        SOURCE,
        StatusCode::BAD_REQUEST,
        "Invalid document route",
        format!("{operation} failed: {err}"),
    )
}
