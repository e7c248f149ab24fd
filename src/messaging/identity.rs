//! Origin identity of this process, so a peer's batch can be told from our own.

use std::env;
use std::fs;

use sha2::{Digest, Sha256};
use uuid::Uuid;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LocalIdentity {
    hash: Option<String>,
}

impl LocalIdentity {
    /// Identity for this process; absent when the machine name cannot be read.
    pub fn detect(application_id: &str) -> Self {
        Self::from_parts(machine_name(), application_id, Uuid::new_v4())
    }

    pub fn from_parts(machine: Option<String>, application_id: &str, instance: Uuid) -> Self {
        let hash = machine.map(|machine| {
            let mut hasher = Sha256::new();
            hasher.update(machine.as_bytes());
            hasher.update(b"/");
            hasher.update(application_id.as_bytes());
            hasher.update(b"/");
            hasher.update(instance.as_bytes());
            hex::encode(hasher.finalize())
        });
        Self { hash }
    }

    pub fn anonymous() -> Self {
        Self { hash: None }
    }

    pub fn hash(&self) -> Option<&str> {
        self.hash.as_deref()
    }

    /// True only when both sides carry an identity and they agree.
    pub fn is_local(&self, origin: Option<&str>) -> bool {
        matches!((self.hash(), origin), (Some(mine), Some(theirs)) if mine == theirs)
    }
}

fn machine_name() -> Option<String> {
    ["HOSTNAME", "COMPUTERNAME"]
        .iter()
        .filter_map(|key| env::var(key).ok())
        .chain(fs::read_to_string("/etc/hostname").ok())
        .map(|name| name.trim().to_string())
        .find(|name| !name.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn identity_depends_on_every_part() {
        let instance = Uuid::from_u128(7);
        let base = LocalIdentity::from_parts(Some("web-1".into()), "cairn", instance);

        assert_eq!(
            base,
            LocalIdentity::from_parts(Some("web-1".into()), "cairn", instance)
        );
        assert_ne!(
            base,
            LocalIdentity::from_parts(Some("web-2".into()), "cairn", instance)
        );
        assert_ne!(
            base,
            LocalIdentity::from_parts(Some("web-1".into()), "cairn", Uuid::from_u128(8))
        );
        assert_eq!(base.hash().map(str::len), Some(64));
    }

    #[test]
    fn anonymous_identity_never_matches() {
        let anonymous = LocalIdentity::from_parts(None, "cairn", Uuid::nil());
        assert!(anonymous.hash().is_none());
        assert!(!anonymous.is_local(None));
        assert!(!anonymous.is_local(Some("abc")));
    }

    #[test]
    fn matching_origin_is_local() {
        let identity = LocalIdentity::from_parts(Some("web-1".into()), "cairn", Uuid::nil());
        let origin = identity.hash().map(str::to_string);
        assert!(identity.is_local(origin.as_deref()));
        assert!(!identity.is_local(Some("someone-else")));
    }
}
