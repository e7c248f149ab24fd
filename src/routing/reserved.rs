//! Configured and dynamically registered reserved URL prefixes.

use std::sync::Arc;

use dashmap::DashSet;
use tracing::debug;

/// Prefixes registered at runtime, e.g. by identity-provider callbacks.
#[derive(Debug, Default)]
pub struct ReservedPathRegistry {
    prefixes: DashSet<String>,
}

impl ReservedPathRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `path` as a reserved prefix; returns the normalized form.
    pub fn register(&self, path: &str, virtual_root: &str) -> Option<String> {
        let normalized = normalize_path(path, virtual_root)?;
        debug!(path = %normalized, "Registered reserved path");
        self.prefixes.insert(normalized.clone());
        Some(normalized)
    }

    pub fn unregister(&self, path: &str, virtual_root: &str) -> bool {
        normalize_path(path, virtual_root)
            .is_some_and(|normalized| self.prefixes.remove(&normalized).is_some())
    }

    fn matches(&self, candidate: &str) -> bool {
        self.prefixes
            .iter()
            .any(|prefix| candidate.starts_with(prefix.as_str()))
    }

    pub fn len(&self) -> usize {
        self.prefixes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.prefixes.is_empty()
    }
}

/// Reserved URLs and paths, normalized once at startup.
///
/// The dynamic registry is shared and consulted on every check, so
/// registrations made after startup take effect immediately.
#[derive(Debug)]
pub struct ReservedPaths {
    entries: Vec<String>,
    virtual_root: String,
    dynamic: Arc<ReservedPathRegistry>,
}

impl ReservedPaths {
    pub fn new(
        reserved_urls: &[String],
        reserved_paths: &[String],
        virtual_root: &str,
        dynamic: Arc<ReservedPathRegistry>,
    ) -> Self {
        let virtual_root = normalize_root(virtual_root);
        let mut entries: Vec<String> = reserved_urls
            .iter()
            .filter_map(|url| normalize_url(url, &virtual_root))
            .chain(
                reserved_paths
                    .iter()
                    .filter_map(|path| normalize_path(path, &virtual_root)),
            )
            .collect();
        entries.sort();
        entries.dedup();
        debug!(entries = ?entries, "Built reserved path set");
        Self {
            entries,
            virtual_root,
            dynamic,
        }
    }

    pub fn virtual_root(&self) -> &str {
        &self.virtual_root
    }

    pub fn entries(&self) -> &[String] {
        &self.entries
    }

    pub fn registry(&self) -> &Arc<ReservedPathRegistry> {
        &self.dynamic
    }

    /// Whether `path` falls under any reserved prefix.
    pub fn is_reserved(&self, path: &str) -> bool {
        let candidate = candidate_path(path);
        self.entries
            .iter()
            .any(|entry| candidate.starts_with(entry.as_str()))
            || self.dynamic.matches(&candidate)
    }
}

/// Lower-cased path without its query; extensionless paths get a trailing slash
/// so that prefixes only match on segment boundaries.
pub(crate) fn candidate_path(path: &str) -> String {
    let path = path.split(['?', '#']).next().unwrap_or_default();
    let mut candidate = path.trim().to_lowercase();
    if !candidate.contains('.') && !candidate.ends_with('/') {
        candidate.push('/');
    }
    candidate
}

fn normalize_root(virtual_root: &str) -> String {
    let mut root = virtual_root.trim().to_lowercase();
    if !root.starts_with('/') {
        root.insert(0, '/');
    }
    if !root.ends_with('/') {
        root.push('/');
    }
    root
}

fn resolve(entry: &str, virtual_root: &str) -> Option<String> {
    let entry = entry.trim().to_lowercase();
    if entry.is_empty() {
        return None;
    }
    let resolved = match entry.strip_prefix('~') {
        Some(rest) => format!("{virtual_root}{}", rest.trim_start_matches('/')),
        None if entry.starts_with('/') => entry,
        None => format!("/{entry}"),
    };
    Some(resolved)
}

/// Exact URLs keep their last segment open: only a leading slash is ensured.
fn normalize_url(url: &str, virtual_root: &str) -> Option<String> {
    resolve(url, &normalize_root(virtual_root))
}

fn normalize_path(path: &str, virtual_root: &str) -> Option<String> {
    let mut resolved = resolve(path, &normalize_root(virtual_root))?;
    if !resolved.ends_with('/') {
        resolved.push('/');
    }
    Some(resolved)
}
