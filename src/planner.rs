use std::collections::BTreeSet;

/// What a pass has to do to make the remote folder mirror the local one.
///
/// Names present on both sides appear in neither set: identity is the base
/// name alone, so a matching name is never overwritten.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReconciliationPlan {
    pub to_delete: BTreeSet<String>,
    pub to_upload: BTreeSet<String>,
}

impl ReconciliationPlan {
    pub fn is_empty(&self) -> bool {
        self.to_delete.is_empty() && self.to_upload.is_empty()
    }
}

/// `to_delete = remote - local`, `to_upload = local - remote`.
pub fn plan(local_names: &BTreeSet<String>, remote_names: &BTreeSet<String>) -> ReconciliationPlan {
    ReconciliationPlan {
        to_delete: remote_names.difference(local_names).cloned().collect(),
        to_upload: local_names.difference(remote_names).cloned().collect(),
    }
}
