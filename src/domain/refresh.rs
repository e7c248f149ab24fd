//! Cache-refresh calls as they are raised and queued during a request.

use std::collections::BTreeSet;
use std::str::FromStr;

use serde_json::Value;
use uuid::Uuid;

use super::error::DomainError;
use super::server::ServerAddress;

/// Taxonomy of invalidation operations accepted from untyped callers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DispatchKind {
    RefreshAll,
    RefreshById,
    RefreshByJson,
    RemoveById,
}

impl FromStr for DispatchKind {
    type Err = DomainError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let normalized: String = value
            .chars()
            .filter(|c| *c != '_' && *c != '-')
            .flat_map(char::to_lowercase)
            .collect();
        match normalized.as_str() {
            "refreshall" => Ok(Self::RefreshAll),
            "refreshbyid" => Ok(Self::RefreshById),
            "refreshbyjson" => Ok(Self::RefreshByJson),
            "removebyid" => Ok(Self::RemoveById),
            // Live objects cannot cross a process boundary.
            "refreshbyinstance" | "removebyinstance" => Err(DomainError::out_of_range(
                "kind",
                format!("{value} cannot be dispatched to remote servers"),
            )),
            _ => Err(DomainError::out_of_range("kind", value)),
        }
    }
}

/// Element type of an id list, fixed when the call is raised.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IdKind {
    Int,
    Guid,
}

impl FromStr for IdKind {
    type Err = DomainError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "int" | "int32" | "i32" => Ok(Self::Int),
            "guid" | "uuid" => Ok(Self::Guid),
            _ => Err(DomainError::out_of_range("id_type", value)),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RefreshIds {
    Int(Vec<i32>),
    Guid(Vec<Uuid>),
}

impl RefreshIds {
    pub fn len(&self) -> usize {
        match self {
            Self::Int(ids) => ids.len(),
            Self::Guid(ids) => ids.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// What a refresher must do, with the data it needs to do it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RefreshPayload {
    All,
    ById(RefreshIds),
    ByJson(String),
    RemoveById(Vec<i32>),
}

impl RefreshPayload {
    /// Validate a call whose ids arrive untyped, as from the dispatch trigger.
    pub fn from_untyped(
        kind: DispatchKind,
        ids: Option<Vec<Value>>,
        id_kind: Option<IdKind>,
        json: Option<String>,
    ) -> Result<Self, DomainError> {
        match kind {
            DispatchKind::RefreshAll => Ok(Self::All),
            DispatchKind::RefreshById => {
                let ids = ids.ok_or_else(|| {
                    DomainError::invalid_state("cannot refresh by id without any ids")
                })?;
                let id_kind = id_kind.ok_or_else(|| {
                    DomainError::invalid_state("cannot refresh by id without knowing the id type")
                })?;
                match id_kind {
                    IdKind::Int => Ok(Self::ById(RefreshIds::Int(parse_int_ids(&ids)?))),
                    IdKind::Guid => Ok(Self::ById(RefreshIds::Guid(parse_guid_ids(&ids)?))),
                }
            }
            DispatchKind::RefreshByJson => json.map(Self::ByJson).ok_or_else(|| {
                DomainError::invalid_state("cannot refresh by json without a payload")
            }),
            DispatchKind::RemoveById => {
                if id_kind == Some(IdKind::Guid) {
                    return Err(DomainError::validation("remove by id requires integer ids"));
                }
                let ids = ids.ok_or_else(|| {
                    DomainError::invalid_state("cannot remove by id without any ids")
                })?;
                Ok(Self::RemoveById(parse_int_ids(&ids)?))
            }
        }
    }

    pub fn kind(&self) -> DispatchKind {
        match self {
            Self::All => DispatchKind::RefreshAll,
            Self::ById(_) => DispatchKind::RefreshById,
            Self::ByJson(_) => DispatchKind::RefreshByJson,
            Self::RemoveById(_) => DispatchKind::RemoveById,
        }
    }
}

fn parse_int_ids(ids: &[Value]) -> Result<Vec<i32>, DomainError> {
    ids.iter()
        .map(|value| {
            let parsed = match value {
                Value::Number(number) => number.as_i64().and_then(|n| i32::try_from(n).ok()),
                Value::String(text) => text.trim().parse::<i32>().ok(),
                _ => None,
            };
            parsed.ok_or_else(|| DomainError::validation(format!("`{value}` is not a 32-bit id")))
        })
        .collect()
}

fn parse_guid_ids(ids: &[Value]) -> Result<Vec<Uuid>, DomainError> {
    ids.iter()
        .map(|value| {
            value
                .as_str()
                .and_then(|text| Uuid::parse_str(text.trim()).ok())
                .ok_or_else(|| DomainError::validation(format!("`{value}` is not a guid")))
        })
        .collect()
}

/// One queued refresh call; immutable once created.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RefreshMessage {
    pub servers: BTreeSet<ServerAddress>,
    pub refresher_id: Uuid,
    pub payload: RefreshPayload,
}

impl RefreshMessage {
    pub fn new(
        servers: impl IntoIterator<Item = ServerAddress>,
        refresher_id: Uuid,
        payload: RefreshPayload,
    ) -> Self {
        Self {
            servers: servers.into_iter().collect(),
            refresher_id,
            payload,
        }
    }
}
