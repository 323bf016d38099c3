use serde::{Deserialize, Serialize};

use super::domain::MemberRef;

/// Entry of the read-only "referred by" selector.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MemberSummary {
    pub member_ref: MemberRef,
    pub display_name: String,
}

/// Lookup of existing members. The intake flow only ever reads from it.
pub trait MemberDirectory: Send + Sync {
    fn members(&self) -> Vec<MemberSummary>;
}

/// Directory backed by a fixed list, e.g. one fetched once when the page loads.
#[derive(Debug, Clone, Default)]
pub struct StaticDirectory {
    members: Vec<MemberSummary>,
}

impl StaticDirectory {
    pub fn new(members: Vec<MemberSummary>) -> Self {
        Self { members }
    }
}

impl MemberDirectory for StaticDirectory {
    fn members(&self) -> Vec<MemberSummary> {
        self.members.clone()
    }
}
