//! Pure diff between an observed and a desired metadata set.

use std::collections::BTreeMap;
use std::convert::identity;

use either::Either;
use itertools::Itertools;

use crate::types::{MetadataEntry, MetadataSet, OperationKind};

/// Operations needed to move `observed` to `desired`.
///
/// Every key of `observed ∪ desired` lands in exactly one of `to_create`,
/// `to_update`, `to_delete`, or is unchanged. All three collections are
/// ordered by key.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MetadataDiff {
    pub to_create: Vec<MetadataEntry>,
    /// Desired entries for keys present on both sides but with different
    /// content. Remote identity is threaded in by the reconciler.
    pub to_update: BTreeMap<String, MetadataEntry>,
    pub to_delete: Vec<String>,
}

/// A single planned mutation, borrowed from a [`MetadataDiff`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum PlannedOperation<'a> {
    Delete(&'a str),
    Update(&'a MetadataEntry),
    Create(&'a MetadataEntry),
}

impl PlannedOperation<'_> {
    pub const fn kind(&self) -> OperationKind {
        match self {
            Self::Delete(_) => OperationKind::Delete,
            Self::Update(_) => OperationKind::Update,
            Self::Create(_) => OperationKind::Create,
        }
    }

    pub fn key(&self) -> &str {
        match *self {
            Self::Delete(key) => key,
            Self::Update(entry) | Self::Create(entry) => entry.key.as_str(),
        }
    }
}

impl MetadataDiff {
    /// Whether nothing needs to change.
    pub fn is_empty(&self) -> bool {
        self.to_create.is_empty() && self.to_update.is_empty() && self.to_delete.is_empty()
    }

    /// Total number of planned mutations.
    pub fn operation_count(&self) -> usize {
        self.to_create.len() + self.to_update.len() + self.to_delete.len()
    }

    /// Planned mutations in execution order: deletes, then updates, then
    /// creates.
    pub fn operations(&self) -> Vec<PlannedOperation<'_>> {
        self.to_delete
            .iter()
            .map(|key| PlannedOperation::Delete(key))
            .chain(self.to_update.values().map(PlannedOperation::Update))
            .chain(self.to_create.iter().map(PlannedOperation::Create))
            .collect_vec()
    }

    /// Keys planned for the given operation kind.
    pub fn keys_for(&self, kind: OperationKind) -> Vec<&str> {
        match kind {
            OperationKind::Delete => self.to_delete.iter().map(String::as_str).collect_vec(),
            OperationKind::Update => self.to_update.keys().map(String::as_str).collect_vec(),
            OperationKind::Create => self.to_create.iter().map(|e| e.key.as_str()).collect_vec(),
        }
    }
}

/// Compute the delete/update/create sets.
///
/// Entries are compared on every field except `id`. Keys are compared
/// case-sensitively.
pub fn diff(observed: &MetadataSet, desired: &MetadataSet) -> MetadataDiff {
    let to_delete = observed
        .keys()
        .filter(|key| !desired.contains_key(key))
        .cloned()
        .collect_vec();

    let (to_update, to_create): (BTreeMap<String, MetadataEntry>, Vec<MetadataEntry>) = desired
        .iter()
        .filter_map(|(key, wanted)| match observed.get(key) {
            Some(current) if current.same_content(wanted) => None,
            Some(_) => Some(Either::Left((key.clone(), wanted.clone()))),
            None => Some(Either::Right(wanted.clone())),
        })
        .partition_map(identity);

    MetadataDiff {
        to_create,
        to_update,
        to_delete,
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::expect_used)]

    use super::*;
    use crate::codec::TypedValue;
    use crate::types::Domain;

    fn set(entries: impl IntoIterator<Item = MetadataEntry>) -> MetadataSet {
        MetadataSet::from_entries(entries).expect("distinct keys")
    }

    #[test]
    fn test_new_key_is_created() {
        let observed = set([MetadataEntry::new("a", "1")]);
        let desired = set([MetadataEntry::new("a", "1"), MetadataEntry::new("b", 2.0)]);

        let plan = diff(&observed, &desired);

        assert_eq!(plan.to_create, vec![MetadataEntry::new("b", 2.0)]);
        assert!(plan.to_update.is_empty());
        assert!(plan.to_delete.is_empty());
    }

    #[test]
    fn test_changed_value_updates_and_missing_key_deletes() {
        let observed = set([MetadataEntry::new("a", "1"), MetadataEntry::new("b", "x")]);
        let desired = set([MetadataEntry::new("a", "2")]);

        let plan = diff(&observed, &desired);

        assert!(plan.to_create.is_empty());
        assert_eq!(
            plan.to_update.get("a").map(|e| &e.value),
            Some(&TypedValue::String("2".to_string()))
        );
        assert_eq!(plan.to_delete, vec!["b".to_string()]);
    }

    #[test]
    fn test_identical_sets_produce_nothing() {
        let observed = set([MetadataEntry::new("a", true).with_id(Some("urn:a".to_string()))]);
        let desired = set([MetadataEntry::new("a", true)]);

        assert!(diff(&observed, &desired).is_empty());
    }

    #[test]
    fn test_type_change_is_an_update() {
        let observed = set([MetadataEntry::new("count", "3")]);
        let desired = set([MetadataEntry::new("count", 3.0)]);

        let plan = diff(&observed, &desired);
        assert_eq!(plan.keys_for(OperationKind::Update), vec!["count"]);
    }

    #[test]
    fn test_flag_and_domain_changes_are_updates() {
        let observed = set([
            MetadataEntry::new("a", "v"),
            MetadataEntry::new("b", "v"),
        ]);
        let desired = set([
            MetadataEntry::new("a", "v").readonly(true),
            MetadataEntry::new("b", "v").with_domain(Domain::Provider),
        ]);

        assert_eq!(diff(&observed, &desired).to_update.len(), 2);
    }

    #[test]
    fn test_empty_desired_deletes_everything() {
        let observed = set([MetadataEntry::new("a", "1"), MetadataEntry::new("b", "2")]);
        let plan = diff(&observed, &MetadataSet::new());

        assert_eq!(plan.to_delete, vec!["a".to_string(), "b".to_string()]);
        assert!(plan.to_create.is_empty());
        assert!(plan.to_update.is_empty());
    }

    #[test]
    fn test_case_variants_are_distinct_keys() {
        let observed = set([MetadataEntry::new("Env", "prod")]);
        let desired = set([MetadataEntry::new("env", "prod")]);

        let plan = diff(&observed, &desired);
        assert_eq!(plan.keys_for(OperationKind::Delete), vec!["Env"]);
        assert_eq!(plan.keys_for(OperationKind::Create), vec!["env"]);
    }

    #[test]
    fn test_operations_are_ordered_delete_update_create() {
        let observed = set([MetadataEntry::new("old", "1"), MetadataEntry::new("kept", "1")]);
        let desired = set([MetadataEntry::new("kept", "2"), MetadataEntry::new("new", "1")]);

        let plan = diff(&observed, &desired);
        let kinds = plan.operations().iter().map(PlannedOperation::kind).collect_vec();

        assert_eq!(
            kinds,
            vec![OperationKind::Delete, OperationKind::Update, OperationKind::Create]
        );
        assert_eq!(plan.operation_count(), 3);
    }
}
