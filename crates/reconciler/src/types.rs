//! Core types for the reconciler.

use std::collections::btree_map::{self, BTreeMap};
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::codec::{Codec, TypedValue};
use crate::error::{Error, Result};

/// Visibility scope of a metadata entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Domain {
    #[default]
    Tenant,
    Provider,
}

impl Domain {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Tenant => "TENANT",
            Self::Provider => "PROVIDER",
        }
    }

    /// Parse a domain name, ignoring ASCII case.
    pub fn parse(name: &str) -> Option<Self> {
        [Self::Tenant, Self::Provider]
            .into_iter()
            .find(|d| d.as_str().eq_ignore_ascii_case(name))
    }
}

impl fmt::Display for Domain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One key/value pair attached to a remote object.
///
/// The declared type is carried by the [`TypedValue`] tag, so type and value
/// cannot disagree.
#[derive(Debug, Clone, PartialEq)]
pub struct MetadataEntry {
    /// Identifier assigned by the remote store; `None` until created.
    pub id: Option<String>,
    pub key: String,
    pub value: TypedValue,
    pub domain: Domain,
    pub namespace: Option<String>,
    pub readonly: bool,
    pub persistent: bool,
}

impl MetadataEntry {
    /// Create a TENANT entry with no namespace and both flags cleared.
    pub fn new(key: impl Into<String>, value: impl Into<TypedValue>) -> Self {
        Self {
            id: None,
            key: key.into(),
            value: value.into(),
            domain: Domain::default(),
            namespace: None,
            readonly: false,
            persistent: false,
        }
    }

    #[must_use]
    pub fn with_id(mut self, id: Option<String>) -> Self {
        self.id = id;
        self
    }

    #[must_use]
    pub const fn with_domain(mut self, domain: Domain) -> Self {
        self.domain = domain;
        self
    }

    #[must_use]
    pub fn with_namespace(mut self, namespace: impl Into<String>) -> Self {
        self.namespace = Some(namespace.into());
        self
    }

    #[must_use]
    pub const fn readonly(mut self, readonly: bool) -> Self {
        self.readonly = readonly;
        self
    }

    #[must_use]
    pub const fn persistent(mut self, persistent: bool) -> Self {
        self.persistent = persistent;
        self
    }

    /// The declared type of the value.
    pub const fn metadata_type(&self) -> crate::codec::MetadataType {
        self.value.metadata_type()
    }

    /// Equal in every field except `id`.
    pub fn same_content(&self, other: &Self) -> bool {
        self.key == other.key
            && self.value == other.value
            && self.domain == other.domain
            && self.namespace == other.namespace
            && self.readonly == other.readonly
            && self.persistent == other.persistent
    }
}

/// Metadata entries keyed by their (case-sensitive) key.
///
/// Backed by an ordered map so that iteration, and everything derived from
/// it, is independent of insertion order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MetadataSet {
    entries: BTreeMap<String, MetadataEntry>,
}

impl MetadataSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a set from entries, rejecting repeated keys.
    ///
    /// # Errors
    ///
    /// Returns `DuplicateKey` for the first key seen twice.
    pub fn from_entries(entries: impl IntoIterator<Item = MetadataEntry>) -> Result<Self> {
        entries.into_iter().try_fold(Self::new(), |mut set, entry| {
            set.insert(entry)?;
            Ok(set)
        })
    }

    /// Decode configuration records into a set.
    ///
    /// # Errors
    ///
    /// Returns the first validation failure: unsupported type or domain,
    /// unparseable value, or duplicate key.
    pub fn from_records<'a>(
        records: impl IntoIterator<Item = &'a MetadataRecord>,
        codec: &Codec,
    ) -> Result<Self> {
        records.into_iter().try_fold(Self::new(), |mut set, record| {
            set.insert(record.to_entry(codec)?)?;
            Ok(set)
        })
    }

    /// Decode persisted state records into a set.
    ///
    /// # Errors
    ///
    /// Same as [`MetadataSet::from_records`].
    pub fn from_state_records<'a>(
        records: impl IntoIterator<Item = &'a StateRecord>,
        codec: &Codec,
    ) -> Result<Self> {
        records.into_iter().try_fold(Self::new(), |mut set, record| {
            set.insert(record.to_entry(codec)?)?;
            Ok(set)
        })
    }

    /// Render the set in its persisted form.
    pub fn to_state_records(&self, codec: &Codec) -> Vec<StateRecord> {
        self.entries
            .values()
            .map(|entry| StateRecord::from_entry(entry, codec))
            .collect()
    }

    /// Insert an entry whose key is not yet present.
    ///
    /// # Errors
    ///
    /// Returns `DuplicateKey` if the key already exists.
    pub fn insert(&mut self, entry: MetadataEntry) -> Result<()> {
        match self.entries.entry(entry.key.clone()) {
            btree_map::Entry::Occupied(_) => Err(Error::duplicate_key(entry.key)),
            btree_map::Entry::Vacant(slot) => {
                slot.insert(entry);
                Ok(())
            }
        }
    }

    pub fn remove(&mut self, key: &str) -> Option<MetadataEntry> {
        self.entries.remove(key)
    }

    pub fn get(&self, key: &str) -> Option<&MetadataEntry> {
        self.entries.get(key)
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.entries.contains_key(key)
    }

    pub fn keys(&self) -> impl Iterator<Item = &String> {
        self.entries.keys()
    }

    pub fn values(&self) -> impl Iterator<Item = &MetadataEntry> {
        self.entries.values()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &MetadataEntry)> {
        self.entries.iter()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Same keys, and every entry has the same content ignoring `id`.
    pub fn same_content(&self, other: &Self) -> bool {
        self.len() == other.len()
            && self
                .iter()
                .all(|(key, entry)| other.get(key).is_some_and(|o| entry.same_content(o)))
    }
}

impl IntoIterator for MetadataSet {
    type Item = MetadataEntry;
    type IntoIter = btree_map::IntoValues<String, MetadataEntry>;

    fn into_iter(self) -> Self::IntoIter {
        self.entries.into_values()
    }
}

/// A metadata entry as written in configuration.
///
/// `type` defaults to STRING and `domain` to TENANT when omitted.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MetadataRecord {
    pub key: String,
    pub value: String,
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub type_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub domain: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub namespace: Option<String>,
    #[serde(default)]
    pub readonly: bool,
    #[serde(default)]
    pub persistent: bool,
}

impl MetadataRecord {
    pub fn new(key: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            value: value.into(),
            ..Self::default()
        }
    }

    #[must_use]
    pub fn with_type(mut self, type_name: impl Into<String>) -> Self {
        self.type_name = Some(type_name.into());
        self
    }

    #[must_use]
    pub fn with_domain(mut self, domain: impl Into<String>) -> Self {
        self.domain = Some(domain.into());
        self
    }

    /// Decode into a typed entry.
    ///
    /// # Errors
    ///
    /// Returns `UnsupportedType`, `UnsupportedDomain` or `ValueParse`.
    pub fn to_entry(&self, codec: &Codec) -> Result<MetadataEntry> {
        let value = codec
            .decode_named(self.type_name.as_deref(), &self.value)
            .map_err(|e| e.for_key(&self.key))?;

        let domain = match self.domain.as_deref() {
            None => Domain::default(),
            Some(name) => {
                Domain::parse(name).ok_or_else(|| Error::unsupported_domain(&self.key, name))?
            }
        };

        Ok(MetadataEntry {
            id: None,
            key: self.key.clone(),
            value,
            domain,
            namespace: self.namespace.clone().filter(|ns| !ns.is_empty()),
            readonly: self.readonly,
            persistent: self.persistent,
        })
    }

    /// Encode a typed entry back into configuration form.
    pub fn from_entry(entry: &MetadataEntry, codec: &Codec) -> Self {
        Self {
            key: entry.key.clone(),
            value: codec.encode(&entry.value),
            type_name: Some(entry.metadata_type().as_str().to_string()),
            domain: Some(entry.domain.as_str().to_string()),
            namespace: entry.namespace.clone(),
            readonly: entry.readonly,
            persistent: entry.persistent,
        }
    }
}

/// A metadata entry as persisted in local state: the configuration shape
/// plus the remote identifier.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StateRecord {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(flatten)]
    pub record: MetadataRecord,
}

impl StateRecord {
    /// Decode into a typed entry, keeping the remote identifier.
    ///
    /// # Errors
    ///
    /// Same as [`MetadataRecord::to_entry`].
    pub fn to_entry(&self, codec: &Codec) -> Result<MetadataEntry> {
        self.record
            .to_entry(codec)
            .map(|entry| entry.with_id(self.id.clone().filter(|id| !id.is_empty())))
    }

    pub fn from_entry(entry: &MetadataEntry, codec: &Codec) -> Self {
        Self {
            id: entry.id.clone(),
            record: MetadataRecord::from_entry(entry, codec),
        }
    }
}

/// The persisted local state document.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StateDocument {
    #[serde(default)]
    pub entries: Vec<StateRecord>,
}

impl StateDocument {
    pub fn from_set(set: &MetadataSet, codec: &Codec) -> Self {
        Self {
            entries: set.to_state_records(codec),
        }
    }

    /// Decode the document into a set.
    ///
    /// # Errors
    ///
    /// Same as [`MetadataSet::from_state_records`].
    pub fn to_set(&self, codec: &Codec) -> Result<MetadataSet> {
        MetadataSet::from_state_records(&self.entries, codec)
    }
}

/// Kind of remote mutation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OperationKind {
    Delete,
    Update,
    Create,
}

impl fmt::Display for OperationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Delete => write!(f, "delete"),
            Self::Update => write!(f, "update"),
            Self::Create => write!(f, "create"),
        }
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::expect_used)]

    use super::*;
    use crate::codec::{MetadataType, NumberFormat};

    const CODEC: Codec = Codec::new(NumberFormat::Integral);

    #[test]
    fn test_record_defaults_to_string_and_tenant() {
        let entry = MetadataRecord::new("owner", "ops").to_entry(&CODEC);
        let entry = entry.ok();
        assert_eq!(
            entry.as_ref().map(MetadataEntry::metadata_type),
            Some(MetadataType::String)
        );
        assert_eq!(entry.map(|e| e.domain), Some(Domain::Tenant));
    }

    #[test]
    fn test_record_rejects_unknown_domain() {
        let result = MetadataRecord::new("owner", "ops")
            .with_domain("GLOBAL")
            .to_entry(&CODEC);
        assert!(matches!(
            result,
            Err(Error::UnsupportedDomain { ref key, ref domain }) if key == "owner" && domain == "GLOBAL"
        ));
    }

    #[test]
    fn test_record_value_parse_error_names_key() {
        let result = MetadataRecord::new("replicas", "three")
            .with_type("NUMBER")
            .to_entry(&CODEC);
        assert!(matches!(
            result,
            Err(Error::ValueParse { ref key, target: MetadataType::Number, .. }) if key == "replicas"
        ));
    }

    #[test]
    fn test_set_rejects_duplicate_keys() {
        let result = MetadataSet::from_entries([
            MetadataEntry::new("a", "1"),
            MetadataEntry::new("a", "2"),
        ]);
        assert!(matches!(result, Err(Error::DuplicateKey { ref key }) if key == "a"));
    }

    #[test]
    fn test_keys_are_case_sensitive() {
        let set = MetadataSet::from_entries([
            MetadataEntry::new("Env", "prod"),
            MetadataEntry::new("env", "dev"),
        ]);
        assert_eq!(set.map(|s| s.len()).ok(), Some(2));
    }

    #[test]
    fn test_same_content_ignores_id() {
        let a = MetadataEntry::new("a", 1.0).with_id(Some("urn:1".to_string()));
        let b = MetadataEntry::new("a", 1.0);
        assert!(a.same_content(&b));
        assert!(!a.same_content(&b.clone().readonly(true)));
        assert!(!a.same_content(&b.with_domain(Domain::Provider)));
    }

    #[test]
    fn test_state_document_round_trip() {
        let set = MetadataSet::from_entries([
            MetadataEntry::new("flag", true).with_id(Some("urn:f".to_string())),
            MetadataEntry::new("size", 10.0)
                .with_namespace("billing")
                .persistent(true),
        ])
        .expect("distinct keys");

        let document = StateDocument::from_set(&set, &CODEC);
        let json = serde_json::to_string(&document).ok();
        let parsed: Option<StateDocument> = json.and_then(|j| serde_json::from_str(&j).ok());
        let restored = parsed.and_then(|d| d.to_set(&CODEC).ok());

        assert_eq!(restored, Some(set));
    }
}
