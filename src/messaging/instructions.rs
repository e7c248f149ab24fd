//! Expansion of queued refresh calls into per-server instruction sets.

use std::collections::{BTreeMap, HashSet};

use cairn_api_types::RefreshInstruction;

use crate::domain::refresh::{RefreshIds, RefreshMessage, RefreshPayload};
use crate::domain::server::ServerAddress;

use super::error::MessengerError;

/// Deduplicated instructions bound for one peer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerBatch {
    pub server: ServerAddress,
    pub instructions: Vec<RefreshInstruction>,
}

/// Wire instructions for one message.
///
/// Integer ids travel together as one JSON array; GUID ids and removals
/// travel one instruction per id.
pub fn expand(message: &RefreshMessage) -> Result<Vec<RefreshInstruction>, MessengerError> {
    let refresher_id = message.refresher_id;
    let instructions = match &message.payload {
        RefreshPayload::All => vec![RefreshInstruction::refresh_all(refresher_id)],
        RefreshPayload::ById(RefreshIds::Int(ids)) if ids.is_empty() => Vec::new(),
        RefreshPayload::ById(RefreshIds::Int(ids)) => {
            let json_ids = serde_json::to_string(ids)
                .map_err(|err| MessengerError::Batch(format!("failed to encode ids: {err}")))?;
            vec![RefreshInstruction::refresh_by_ids(refresher_id, json_ids)]
        }
        RefreshPayload::ById(RefreshIds::Guid(ids)) => ids
            .iter()
            .map(|id| RefreshInstruction::refresh_by_guid(refresher_id, *id))
            .collect(),
        RefreshPayload::ByJson(payload) => {
            vec![RefreshInstruction::refresh_by_json(refresher_id, payload.clone())]
        }
        RefreshPayload::RemoveById(ids) => ids
            .iter()
            .map(|id| RefreshInstruction::remove_by_id(refresher_id, *id))
            .collect(),
    };
    Ok(instructions)
}

type Pending = (HashSet<RefreshInstruction>, Vec<RefreshInstruction>);

/// Group every message's instructions under each server it targets.
///
/// Within a server, duplicates are dropped and first-seen order is kept.
/// Servers come back in address order.
pub fn plan(messages: &[RefreshMessage]) -> Result<Vec<ServerBatch>, MessengerError> {
    let mut per_server: BTreeMap<&ServerAddress, Pending> = BTreeMap::new();

    for message in messages {
        if message.servers.is_empty() {
            continue;
        }
        let instructions = expand(message)?;
        for server in &message.servers {
            let (seen, ordered) = per_server.entry(server).or_default();
            for instruction in &instructions {
                if seen.insert(instruction.clone()) {
                    ordered.push(instruction.clone());
                }
            }
        }
    }

    Ok(per_server
        .into_iter()
        .filter(|(_, (_, ordered))| !ordered.is_empty())
        .map(|(server, (_, instructions))| ServerBatch {
            server: server.clone(),
            instructions,
        })
        .collect())
}
