//! Runtime route table consulted by the document filter.

use std::collections::HashMap;
use std::sync::RwLock;

use metrics::counter;
use thiserror::Error;
use tracing::debug;

use crate::util::lock::{rw_read, rw_write};

const SOURCE: &str = "routing::route_table";
const METRIC_INVALIDATIONS: &str = "cairn_route_cache_invalidations_total";
const ROUTE_CHECK_LIMIT: usize = 4096;

/// Registered URL patterns that take precedence over content routing.
pub trait RouteTable: Send + Sync {
    fn route_count(&self) -> usize;

    fn matches(&self, path: &str) -> bool;
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum RouteError {
    #[error("route pattern must start with `/`: `{0}`")]
    NotAbsolute(String),
    #[error("route pattern has an unterminated or empty parameter: `{0}`")]
    MalformedParameter(String),
    #[error("catch-all must be the last segment: `{0}`")]
    CatchAllNotLast(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Segment {
    Literal(String),
    Param,
    CatchAll,
}

/// A route pattern in axum syntax: `/literal`, `/{param}`, `/{*rest}`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RoutePattern {
    source: String,
    segments: Vec<Segment>,
}

impl RoutePattern {
    pub fn parse(pattern: &str) -> Result<Self, RouteError> {
        let trimmed = pattern.trim();
        if !trimmed.starts_with('/') {
            return Err(RouteError::NotAbsolute(pattern.to_string()));
        }

        let parts: Vec<&str> = trimmed.split('/').filter(|part| !part.is_empty()).collect();
        let mut segments = Vec::with_capacity(parts.len());
        for (position, part) in parts.iter().enumerate() {
            let segment = match part.strip_prefix('{') {
                Some(inner) => {
                    let name = inner
                        .strip_suffix('}')
                        .ok_or_else(|| RouteError::MalformedParameter(pattern.to_string()))?;
                    match name.strip_prefix('*') {
                        Some(_) if position + 1 != parts.len() => {
                            return Err(RouteError::CatchAllNotLast(pattern.to_string()));
                        }
                        Some(rest) if !rest.is_empty() => Segment::CatchAll,
                        None if !name.is_empty() => Segment::Param,
                        _ => return Err(RouteError::MalformedParameter(pattern.to_string())),
                    }
                }
                None => Segment::Literal(part.to_lowercase()),
            };
            segments.push(segment);
        }

        Ok(Self {
            source: trimmed.to_string(),
            segments,
        })
    }

    pub fn as_str(&self) -> &str {
        &self.source
    }

    /// Case-insensitive match of an absolute path, query excluded.
    pub fn matches(&self, path: &str) -> bool {
        let path = path.split(['?', '#']).next().unwrap_or_default();
        let mut parts = path.split('/').filter(|part| !part.is_empty());
        for segment in &self.segments {
            match segment {
                Segment::CatchAll => return parts.next().is_some(),
                Segment::Param => {
                    if parts.next().is_none() {
                        return false;
                    }
                }
                Segment::Literal(literal) => match parts.next() {
                    Some(part) if part.eq_ignore_ascii_case(literal) => {}
                    _ => return false,
                },
            }
        }
        parts.next().is_none()
    }
}

/// In-process route table that may gain or lose routes at runtime.
#[derive(Debug, Default)]
pub struct RouteRegistry {
    routes: RwLock<Vec<RoutePattern>>,
}

impl RouteRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_routes<'a>(patterns: impl IntoIterator<Item = &'a str>) -> Result<Self, RouteError> {
        let registry = Self::new();
        for pattern in patterns {
            registry.register(pattern)?;
        }
        Ok(registry)
    }

    /// Add a route; registering the same pattern twice is a no-op.
    pub fn register(&self, pattern: &str) -> Result<(), RouteError> {
        let pattern = RoutePattern::parse(pattern)?;
        let mut routes = rw_write(&self.routes, SOURCE, "register");
        if !routes.contains(&pattern) {
            debug!(route = pattern.as_str(), "Registered route");
            routes.push(pattern);
        }
        Ok(())
    }

    pub fn remove(&self, pattern: &str) -> bool {
        let mut routes = rw_write(&self.routes, SOURCE, "remove");
        let before = routes.len();
        routes.retain(|route| route.as_str() != pattern.trim());
        routes.len() != before
    }
}

impl RouteTable for RouteRegistry {
    fn route_count(&self) -> usize {
        rw_read(&self.routes, SOURCE, "route_count").len()
    }

    fn matches(&self, path: &str) -> bool {
        rw_read(&self.routes, SOURCE, "matches")
            .iter()
            .any(|route| route.matches(path))
    }
}

#[derive(Debug, Default)]
struct CheckState {
    route_count: Option<usize>,
    results: HashMap<String, bool>,
}

/// Per-path memo of route-table matches.
///
/// Dropped wholesale whenever the table's route count differs from the count
/// seen when the memo was filled. A replacement that keeps the count is not
/// noticed; callers that swap routes call [`RouteCheckCache::invalidate`].
#[derive(Debug, Default)]
pub struct RouteCheckCache {
    state: RwLock<CheckState>,
}

impl RouteCheckCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn check(&self, table: &dyn RouteTable, path: &str) -> bool {
        let route_count = table.route_count();
        {
            let state = rw_read(&self.state, SOURCE, "check");
            if state.route_count == Some(route_count)
                && let Some(matched) = state.results.get(path)
            {
                return *matched;
            }
        }

        let matched = table.matches(path);
        let mut state = rw_write(&self.state, SOURCE, "check");
        if state.route_count != Some(route_count) {
            if state.route_count.is_some() {
                counter!(METRIC_INVALIDATIONS).increment(1);
                debug!(
                    previous = ?state.route_count,
                    current = route_count,
                    "Route count changed; dropping route checks"
                );
            }
            state.results.clear();
            state.route_count = Some(route_count);
        }
        if state.results.len() >= ROUTE_CHECK_LIMIT {
            state.results.clear();
        }
        state.results.insert(path.to_string(), matched);
        matched
    }

    pub fn invalidate(&self) {
        let mut state = rw_write(&self.state, SOURCE, "invalidate");
        state.results.clear();
        state.route_count = None;
    }

    pub fn len(&self) -> usize {
        rw_read(&self.state, SOURCE, "len").results.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
