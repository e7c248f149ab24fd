//! Shared request and response types for server-to-server cache refreshes.
//!
//! A sending server turns the refresh calls raised during one request into
//! a deduplicated set of [`RefreshInstruction`]s and posts them, wrapped in a
//! [`BulkRefreshRequest`], to every configured peer.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Path, relative to a peer's base URL, that accepts bulk refreshes.
pub const BULK_REFRESH_PATH: &str = "_cairn/cache-refresh";

/// Path, relative to a server's base URL, of the local dispatch trigger.
pub const DISPATCH_PATH: &str = "_cairn/cache-dispatch";

/// How a receiver must apply one instruction to its refresher.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RefreshMethod {
    RefreshAll,
    /// Batched 32-bit integer ids, carried in `json_ids`.
    RefreshByIds,
    /// A single id, carried in `guid_id` or `int_id`.
    RefreshById,
    RefreshByJson,
    RemoveById,
}

/// The unit of cache-invalidation data sent to a remote server.
///
/// Exactly one of the optional fields is meaningful, selected by `method`.
/// `RefreshAll` carries none of them.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RefreshInstruction {
    pub refresher_id: Uuid,
    pub method: RefreshMethod,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub json_ids: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub guid_id: Option<Uuid>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub int_id: Option<i32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub json_payload: Option<String>,
}

impl RefreshInstruction {
    fn bare(refresher_id: Uuid, method: RefreshMethod) -> Self {
        Self {
            refresher_id,
            method,
            json_ids: None,
            guid_id: None,
            int_id: None,
            json_payload: None,
        }
    }

    pub fn refresh_all(refresher_id: Uuid) -> Self {
        Self::bare(refresher_id, RefreshMethod::RefreshAll)
    }

    pub fn refresh_by_ids(refresher_id: Uuid, json_ids: String) -> Self {
        Self {
            json_ids: Some(json_ids),
            ..Self::bare(refresher_id, RefreshMethod::RefreshByIds)
        }
    }

    pub fn refresh_by_guid(refresher_id: Uuid, id: Uuid) -> Self {
        Self {
            guid_id: Some(id),
            ..Self::bare(refresher_id, RefreshMethod::RefreshById)
        }
    }

    pub fn refresh_by_int(refresher_id: Uuid, id: i32) -> Self {
        Self {
            int_id: Some(id),
            ..Self::bare(refresher_id, RefreshMethod::RefreshById)
        }
    }

    pub fn refresh_by_json(refresher_id: Uuid, payload: String) -> Self {
        Self {
            json_payload: Some(payload),
            ..Self::bare(refresher_id, RefreshMethod::RefreshByJson)
        }
    }

    pub fn remove_by_id(refresher_id: Uuid, id: i32) -> Self {
        Self {
            int_id: Some(id),
            ..Self::bare(refresher_id, RefreshMethod::RemoveById)
        }
    }
}

/// Body of one outbound bulk-refresh call.
///
/// Credentials travel in the `Authorization` header, not in the body.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BulkRefreshRequest {
    pub instructions: Vec<RefreshInstruction>,
    /// Hash identifying the sending process, absent when it could not be computed.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub origin_identity: Option<String>,
}

/// Receiver's account of one bulk-refresh call.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BulkRefreshResponse {
    pub applied: usize,
    pub duplicates: usize,
    pub failed: usize,
    /// True when the batch originated from the receiving process itself.
    pub skipped_as_local: bool,
}

/// Untyped refresh call accepted by the local dispatch trigger.
///
/// `kind` is one of `refresh_all`, `refresh_by_id`, `refresh_by_json`,
/// `remove_by_id`; `id_type` is `int` or `guid` and is required whenever
/// `ids` is present.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DispatchRequest {
    pub refresher_id: Uuid,
    pub kind: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ids: Option<Vec<serde_json::Value>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub json: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn refresh_all_omits_payload_fields() {
        let instruction = RefreshInstruction::refresh_all(Uuid::nil());
        let json = serde_json::to_value(&instruction).expect("serialize instruction");

        assert_eq!(json["method"], "refresh_all");
        assert!(json.get("json_ids").is_none());
        assert!(json.get("int_id").is_none());
    }

    #[test]
    fn instructions_compare_by_value() {
        let id = Uuid::new_v4();
        assert_eq!(
            RefreshInstruction::refresh_by_int(id, 4),
            RefreshInstruction::refresh_by_int(id, 4)
        );
        assert_ne!(
            RefreshInstruction::refresh_by_int(id, 4),
            RefreshInstruction::remove_by_id(id, 4)
        );
    }

    #[test]
    fn bulk_request_accepts_missing_origin() {
        let body = r#"{"instructions":[{"refresher_id":"00000000-0000-0000-0000-000000000000","method":"remove_by_id","int_id":3}]}"#;
        let request: BulkRefreshRequest = serde_json::from_str(body).expect("parse request");

        assert!(request.origin_identity.is_none());
        assert_eq!(
            request.instructions,
            vec![RefreshInstruction::remove_by_id(Uuid::nil(), 3)]
        );
    }
}
