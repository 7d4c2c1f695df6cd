use std::collections::{HashMap, HashSet};

use uuid::Uuid;

/// Member and authorization lookup consumed by the engine.
///
/// The engine only asks the questions below; where the answers live
/// (HR system, LDAP, a seeded table) is the implementor's concern.
pub trait Directory: Send + Sync {
    fn is_member(&self, member_id: Uuid) -> bool;

    fn member_name(&self, member_id: Uuid) -> Option<String>;

    fn has_qualification(&self, member_id: Uuid, qualification_id: Uuid) -> bool;

    /// Manager capability gates assignment, awards, swap resolution and
    /// solver runs.
    fn has_manager_capability(&self, actor_id: Uuid) -> bool;

    fn manager_ids(&self) -> Vec<Uuid>;

    fn member_ids(&self) -> Vec<Uuid>;
}

#[derive(Debug, Clone)]
pub struct MemberRecord {
    pub id: Uuid,
    pub full_name: String,
    pub manager: bool,
    pub qualifications: HashSet<Uuid>,
}

/// Seeded in-memory directory used by the server binary and tests.
#[derive(Debug, Clone, Default)]
pub struct InMemoryDirectory {
    members: HashMap<Uuid, MemberRecord>,
}

impl InMemoryDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_member(
        mut self,
        id: Uuid,
        full_name: impl Into<String>,
        manager: bool,
        qualifications: impl IntoIterator<Item = Uuid>,
    ) -> Self {
        self.insert(MemberRecord {
            id,
            full_name: full_name.into(),
            manager,
            qualifications: qualifications.into_iter().collect(),
        });
        self
    }

    pub fn insert(&mut self, record: MemberRecord) {
        self.members.insert(record.id, record);
    }

    pub fn len(&self) -> usize {
        self.members.len()
    }

    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }
}

impl Directory for InMemoryDirectory {
    fn is_member(&self, member_id: Uuid) -> bool {
        self.members.contains_key(&member_id)
    }

    fn member_name(&self, member_id: Uuid) -> Option<String> {
        self.members.get(&member_id).map(|m| m.full_name.clone())
    }

    fn has_qualification(&self, member_id: Uuid, qualification_id: Uuid) -> bool {
        self.members
            .get(&member_id)
            .is_some_and(|m| m.qualifications.contains(&qualification_id))
    }

    fn has_manager_capability(&self, actor_id: Uuid) -> bool {
        self.members.get(&actor_id).is_some_and(|m| m.manager)
    }

    fn manager_ids(&self) -> Vec<Uuid> {
        self.members
            .values()
            .filter(|m| m.manager)
            .map(|m| m.id)
            .collect()
    }

    fn member_ids(&self) -> Vec<Uuid> {
        self.members.keys().copied().collect()
    }
}
