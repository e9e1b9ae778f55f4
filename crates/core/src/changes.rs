use serde::{Deserialize, Serialize};

use crate::field_value::FieldValue;
use crate::ids::EntityId;
use crate::path::{EntityRef, FieldPath};

/// Where an added id lands, relative to the ordering it was added to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Position {
    Beginning { subindex: usize },
    /// After the id found at `index` of the previous ordering.
    After { index: usize, subindex: usize },
}

impl Position {
    pub fn subindex(&self) -> usize {
        match self {
            Self::Beginning { subindex } | Self::After { subindex, .. } => *subindex,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum CollectionChange {
    Add { id: EntityId, position: Position },
    Remove { id: EntityId, index: usize },
    /// Reordering of the ids common to both snapshots. Both lists hold the
    /// same ids.
    Move {
        previous: Vec<EntityId>,
        new: Vec<EntityId>,
    },
}

impl CollectionChange {
    /// The id added or removed; moves have none.
    pub fn id(&self) -> Option<&EntityId> {
        match self {
            Self::Add { id, .. } | Self::Remove { id, .. } => Some(id),
            Self::Move { .. } => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ChangeKind {
    Value {
        previous: FieldValue,
        new: FieldValue,
    },
    Collection(CollectionChange),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldChange {
    pub path: FieldPath,
    pub change: ChangeKind,
}

impl FieldChange {
    pub fn value(path: FieldPath, previous: FieldValue, new: FieldValue) -> Self {
        Self {
            path,
            change: ChangeKind::Value { previous, new },
        }
    }

    pub fn collection(path: FieldPath, change: CollectionChange) -> Self {
        Self {
            path,
            change: ChangeKind::Collection(change),
        }
    }

    pub fn collection_change(&self) -> Option<&CollectionChange> {
        match &self.change {
            ChangeKind::Collection(change) => Some(change),
            ChangeKind::Value { .. } => None,
        }
    }

    pub fn is_move(&self) -> bool {
        matches!(
            self.change,
            ChangeKind::Collection(CollectionChange::Move { .. })
        )
    }

    /// The entity this change addresses: the path's entity, or for an
    /// add/remove on an id list, the id being added or removed.
    pub fn entity_ref(&self) -> Option<EntityRef> {
        match (&self.path, &self.change) {
            (FieldPath::Ids(collection), ChangeKind::Collection(change)) => {
                change.id().map(|id| collection.entity_ref(id))
            }
            (path, _) => path.entity_ref(),
        }
    }

    /// Values on either side of a value change that reference `id`.
    pub fn references(&self, id: &EntityId) -> bool {
        match &self.change {
            ChangeKind::Value { previous, new } => previous.references(id) || new.references(id),
            ChangeKind::Collection(_) => false,
        }
    }
}

/// Changes that are applied and reverted together, e.g. removing a machine
/// along with clearing every reference to it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GroupedFieldChanges {
    pub changes: Vec<FieldChange>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ChangeEntry {
    Single(FieldChange),
    Grouped(GroupedFieldChanges),
}

impl ChangeEntry {
    pub fn grouped(changes: Vec<FieldChange>) -> Self {
        Self::Grouped(GroupedFieldChanges { changes })
    }

    pub fn changes(&self) -> &[FieldChange] {
        match self {
            Self::Single(change) => std::slice::from_ref(change),
            Self::Grouped(group) => &group.changes,
        }
    }

    /// Structural entries: entity add/remove groups and whole-list moves.
    pub fn is_complex(&self) -> bool {
        match self {
            Self::Single(change) => change.is_move(),
            Self::Grouped(_) => true,
        }
    }
}

/// Flatten entries into the sequence of individual changes, keeping order.
pub fn flatten(entries: &[ChangeEntry]) -> Vec<FieldChange> {
    entries
        .iter()
        .flat_map(|entry| entry.changes().iter().cloned())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::path::{CollectionPath, ProcedureField};

    #[test]
    fn id_list_changes_address_the_item() {
        let change = FieldChange::collection(
            FieldPath::Ids(CollectionPath::Procedures {
                job_id: EntityId::from("j1"),
            }),
            CollectionChange::Remove {
                id: EntityId::from("p1"),
                index: 0,
            },
        );
        assert_eq!(
            change.entity_ref(),
            Some(EntityRef::Procedure {
                job_id: EntityId::from("j1"),
                procedure_id: EntityId::from("p1"),
            })
        );
    }

    #[test]
    fn flatten_keeps_group_order() {
        let j = EntityId::from("j1");
        let p = EntityId::from("p1");
        let m = EntityId::from("m1");
        let entries = vec![
            ChangeEntry::Single(FieldChange::value(
                FieldPath::Title,
                FieldValue::Text("a".into()),
                FieldValue::Text("b".into()),
            )),
            ChangeEntry::grouped(vec![
                FieldChange::collection(
                    FieldPath::Ids(CollectionPath::Machines),
                    CollectionChange::Remove {
                        id: m.clone(),
                        index: 0,
                    },
                ),
                FieldChange::value(
                    FieldPath::procedure(&j, &p, ProcedureField::MachineId),
                    FieldValue::EntityRef(m.clone()),
                    FieldValue::Null,
                ),
            ]),
        ];
        let flat = flatten(&entries);
        assert_eq!(flat.len(), 3);
        assert_eq!(flat[0].path, FieldPath::Title);
        assert!(flat[2].references(&m));
        assert!(entries[1].is_complex());
        assert!(!entries[0].is_complex());
    }
}
