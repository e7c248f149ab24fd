//! Cache refreshers and the registry that routes instructions to them.

use std::collections::HashMap;
use std::sync::Arc;

use cairn_api_types::{RefreshInstruction, RefreshMethod};
use uuid::Uuid;

use crate::domain::refresh::{RefreshIds, RefreshPayload};

use super::error::MessengerError;

/// Invalidates or reloads one kind of cached entity.
///
/// Every operation must be idempotent: the originating server applies a
/// refresh locally and may receive it again from its own batch.
pub trait CacheRefresher: Send + Sync {
    fn id(&self) -> Uuid;

    fn name(&self) -> &str;

    fn refresh_all(&self);

    fn refresh_int(&self, id: i32);

    fn refresh_guid(&self, id: Uuid);

    fn remove(&self, id: i32);

    /// Refreshers that understand JSON payloads override this.
    fn refresh_json(&self, _payload: &str) -> Result<(), MessengerError> {
        Err(MessengerError::Payload(format!(
            "refresher `{}` does not accept json payloads",
            self.name()
        )))
    }
}

/// Apply a locally raised refresh.
pub fn apply_payload(
    refresher: &dyn CacheRefresher,
    payload: &RefreshPayload,
) -> Result<(), MessengerError> {
    match payload {
        RefreshPayload::All => refresher.refresh_all(),
        RefreshPayload::ById(RefreshIds::Int(ids)) => {
            ids.iter().for_each(|id| refresher.refresh_int(*id))
        }
        RefreshPayload::ById(RefreshIds::Guid(ids)) => {
            ids.iter().for_each(|id| refresher.refresh_guid(*id))
        }
        RefreshPayload::ByJson(json) => refresher.refresh_json(json)?,
        RefreshPayload::RemoveById(ids) => ids.iter().for_each(|id| refresher.remove(*id)),
    }
    Ok(())
}

/// Apply an instruction received from a peer.
pub fn apply_instruction(
    refresher: &dyn CacheRefresher,
    instruction: &RefreshInstruction,
) -> Result<(), MessengerError> {
    let missing = |field: &str| {
        MessengerError::Payload(format!(
            "{:?} instruction without `{field}`",
            instruction.method
        ))
    };

    match instruction.method {
        RefreshMethod::RefreshAll => refresher.refresh_all(),
        RefreshMethod::RefreshByIds => {
            let raw = instruction
                .json_ids
                .as_deref()
                .ok_or_else(|| missing("json_ids"))?;
            let ids: Vec<i32> = serde_json::from_str(raw)
                .map_err(|err| MessengerError::Payload(format!("malformed json_ids: {err}")))?;
            ids.into_iter().for_each(|id| refresher.refresh_int(id));
        }
        RefreshMethod::RefreshById => match (instruction.guid_id, instruction.int_id) {
            (Some(id), _) => refresher.refresh_guid(id),
            (None, Some(id)) => refresher.refresh_int(id),
            (None, None) => return Err(missing("guid_id")),
        },
        RefreshMethod::RefreshByJson => {
            let payload = instruction
                .json_payload
                .as_deref()
                .ok_or_else(|| missing("json_payload"))?;
            refresher.refresh_json(payload)?;
        }
        RefreshMethod::RemoveById => {
            let id = instruction.int_id.ok_or_else(|| missing("int_id"))?;
            refresher.remove(id);
        }
    }
    Ok(())
}

/// Refreshers known to this process, keyed by id.
#[derive(Default)]
pub struct RefresherRegistry {
    refreshers: HashMap<Uuid, Arc<dyn CacheRefresher>>,
}

impl RefresherRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, refresher: Arc<dyn CacheRefresher>) {
        self.refreshers.insert(refresher.id(), refresher);
    }

    pub fn with(mut self, refresher: Arc<dyn CacheRefresher>) -> Self {
        self.register(refresher);
        self
    }

    pub fn get(&self, id: Uuid) -> Result<Arc<dyn CacheRefresher>, MessengerError> {
        self.refreshers
            .get(&id)
            .cloned()
            .ok_or(MessengerError::UnknownRefresher(id))
    }

    pub fn len(&self) -> usize {
        self.refreshers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.refreshers.is_empty()
    }
}


#[cfg(test)]
mod tests {
    use super::recording::RecordingRefresher;
    use super::*;

    #[test]
    fn batched_ids_are_applied_one_by_one() {
        let refresher = RecordingRefresher::new(Uuid::nil());
        let instruction = RefreshInstruction::refresh_by_ids(Uuid::nil(), "[3,4]".to_string());

        apply_instruction(&refresher, &instruction).expect("apply");
        assert_eq!(refresher.calls(), vec!["int:3", "int:4"]);
    }

    #[test]
    fn malformed_instructions_are_payload_errors() {
        let refresher = RecordingRefresher::new(Uuid::nil());
        let mut instruction = RefreshInstruction::remove_by_id(Uuid::nil(), 1);
        instruction.int_id = None;
        assert!(matches!(
            apply_instruction(&refresher, &instruction),
            Err(MessengerError::Payload(_))
        ));

        let bad_ids = RefreshInstruction::refresh_by_ids(Uuid::nil(), "[\"x\"]".to_string());
        assert!(apply_instruction(&refresher, &bad_ids).is_err());
        assert!(refresher.calls().is_empty());
    }

    #[test]
    fn json_is_rejected_unless_supported() {
        let refresher = RecordingRefresher::new(Uuid::nil());
        let err = apply_payload(&refresher, &RefreshPayload::ByJson("{}".to_string())).unwrap_err();
        assert!(matches!(err, MessengerError::Payload(_)));
    }

    #[test]
    fn registry_reports_unknown_refreshers() {
        let known = Uuid::from_u128(1);
        let registry = RefresherRegistry::new().with(Arc::new(RecordingRefresher::new(known)));

        assert!(registry.get(known).is_ok());
        assert!(matches!(
            registry.get(Uuid::from_u128(2)),
            Err(MessengerError::UnknownRefresher(_))
        ));
    }
}
