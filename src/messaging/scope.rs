//! Per-request buffer of raised refresh calls.

use std::sync::Mutex;

use crate::domain::refresh::RefreshMessage;
use crate::util::lock::mutex_lock;

const SOURCE: &str = "messaging::scope";

/// Refresh calls raised while one request is handled.
///
/// Installed as a request extension by
/// [`batch_refresh_requests`](super::batch_refresh_requests) and drained
/// exactly once when the request ends.
#[derive(Debug)]
pub struct RequestScope {
    buffer: Mutex<Option<Vec<RefreshMessage>>>,
}

impl RequestScope {
    pub fn new() -> Self {
        Self {
            buffer: Mutex::new(Some(Vec::new())),
        }
    }

    pub fn push(&self, message: RefreshMessage) {
        mutex_lock(&self.buffer, SOURCE, "push")
            .get_or_insert_with(Vec::new)
            .push(message);
    }

    /// Swap the buffer out, leaving nothing behind for a flush in progress.
    pub fn take(&self) -> Vec<RefreshMessage> {
        mutex_lock(&self.buffer, SOURCE, "take")
            .take()
            .unwrap_or_default()
    }

    pub fn len(&self) -> usize {
        mutex_lock(&self.buffer, SOURCE, "len")
            .as_ref()
            .map_or(0, Vec::len)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for RequestScope {
    fn default() -> Self {
        Self::new()
    }
}
