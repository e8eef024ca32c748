//! Ignore rules: remote metadata the reconciler must leave alone.
//!
//! Entries written by other actors (system keys, another tool's namespace)
//! can be excluded from reconciliation. A matching remote entry is neither
//! deleted nor reported as drift, unless the same key is also configured.

use regex::Regex;
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::codec::Codec;
use crate::error::{Error, Result};
use crate::types::{MetadataEntry, MetadataSet};

/// What to do when a configured entry matches an ignore rule.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConflictAction {
    /// Fail the pass before any remote call.
    #[default]
    Error,
    /// Log a warning and manage the entry anyway.
    Warn,
    /// Manage the entry silently.
    None,
}

/// Ignore rule as written in configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct IgnoreRuleConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub key_regex: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value_regex: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub namespace: Option<String>,
    #[serde(default)]
    pub conflict_action: ConflictAction,
}

impl IgnoreRuleConfig {
    pub fn key(pattern: impl Into<String>) -> Self {
        Self {
            key_regex: Some(pattern.into()),
            ..Self::default()
        }
    }

    pub fn value(pattern: impl Into<String>) -> Self {
        Self {
            value_regex: Some(pattern.into()),
            ..Self::default()
        }
    }

    #[must_use]
    pub const fn on_conflict(mut self, action: ConflictAction) -> Self {
        self.conflict_action = action;
        self
    }

    #[must_use]
    pub fn in_namespace(mut self, namespace: impl Into<String>) -> Self {
        self.namespace = Some(namespace.into());
        self
    }
}

/// A compiled ignore rule.
#[derive(Debug, Clone)]
pub struct IgnoreRule {
    key: Option<Regex>,
    value: Option<Regex>,
    namespace: Option<String>,
    conflict_action: ConflictAction,
}

impl IgnoreRule {
    /// Compile a configured rule.
    ///
    /// # Errors
    ///
    /// Returns `InvalidConfig` when neither regex is given or a regex does
    /// not compile.
    pub fn compile(config: &IgnoreRuleConfig) -> Result<Self> {
        if config.key_regex.is_none() && config.value_regex.is_none() {
            return Err(Error::invalid_config(
                "ignore rule needs at least one of key_regex or value_regex",
            ));
        }

        let compile = |pattern: &Option<String>| {
            pattern
                .as_deref()
                .map(Regex::new)
                .transpose()
                .map_err(|e| Error::invalid_config(format!("invalid ignore regex: {e}")))
        };

        Ok(Self {
            key: compile(&config.key_regex)?,
            value: compile(&config.value_regex)?,
            namespace: config.namespace.clone(),
            conflict_action: config.conflict_action,
        })
    }

    pub const fn conflict_action(&self) -> ConflictAction {
        self.conflict_action
    }

    /// Every present criterion must match. Values are matched on their
    /// canonical text.
    pub fn matches(&self, entry: &MetadataEntry, codec: &Codec) -> bool {
        self.key.as_ref().is_none_or(|re| re.is_match(&entry.key))
            && self
                .value
                .as_ref()
                .is_none_or(|re| re.is_match(&codec.encode(&entry.value)))
            && self
                .namespace
                .as_ref()
                .is_none_or(|ns| entry.namespace.as_ref() == Some(ns))
    }

    /// Human-readable description for error messages.
    pub fn describe(&self) -> String {
        let parts = [
            self.key.as_ref().map(|re| format!("key =~ /{}/", re.as_str())),
            self.value
                .as_ref()
                .map(|re| format!("value =~ /{}/", re.as_str())),
            self.namespace.as_ref().map(|ns| format!("namespace = {ns}")),
        ];
        format!("[{}]", parts.into_iter().flatten().collect::<Vec<_>>().join(", "))
    }
}

/// The set of ignore rules in effect for a reconciler.
#[derive(Debug, Clone, Default)]
pub struct IgnorePolicy {
    rules: Vec<IgnoreRule>,
}

impl IgnorePolicy {
    /// Compile every configured rule.
    ///
    /// # Errors
    ///
    /// Returns the first rule compilation failure.
    pub fn compile(configs: &[IgnoreRuleConfig]) -> Result<Self> {
        configs
            .iter()
            .map(IgnoreRule::compile)
            .collect::<Result<Vec<_>>>()
            .map(|rules| Self { rules })
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    /// First rule matching the entry.
    pub fn matching_rule(&self, entry: &MetadataEntry, codec: &Codec) -> Option<&IgnoreRule> {
        self.rules.iter().find(|rule| rule.matches(entry, codec))
    }

    /// Drop ignored entries, keeping any whose key is configured.
    pub fn retain_managed(
        &self,
        entries: impl IntoIterator<Item = MetadataEntry>,
        desired: &MetadataSet,
        codec: &Codec,
    ) -> Vec<MetadataEntry> {
        entries
            .into_iter()
            .filter(|entry| {
                desired.contains_key(&entry.key) || self.matching_rule(entry, codec).is_none()
            })
            .collect()
    }

    /// Apply each matching rule's conflict action to the configured entries.
    ///
    /// # Errors
    ///
    /// Returns `IgnoredKeyConflict` for the first configured entry matched by
    /// a rule whose action is [`ConflictAction::Error`].
    pub fn check_desired(&self, desired: &MetadataSet, codec: &Codec) -> Result<()> {
        if self.is_empty() {
            return Ok(());
        }

        desired.values().try_for_each(|entry| {
            match self.matching_rule(entry, codec) {
                Some(rule) => match rule.conflict_action() {
                    ConflictAction::Error => {
                        Err(Error::ignored_key_conflict(&entry.key, rule.describe()))
                    }
                    ConflictAction::Warn => {
                        warn!(
                            key = %entry.key,
                            rule = %rule.describe(),
                            "Configured metadata key matches an ignore rule; managing it anyway"
                        );
                        Ok(())
                    }
                    ConflictAction::None => Ok(()),
                },
                None => Ok(()),
            }
        })
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::expect_used)]

    use super::*;
    use crate::codec::NumberFormat;

    const CODEC: Codec = Codec::new(NumberFormat::Integral);

    fn policy(configs: &[IgnoreRuleConfig]) -> IgnorePolicy {
        IgnorePolicy::compile(configs).expect("valid rules")
    }

    #[test]
    fn test_compile_keeps_every_rule() {
        let empty = policy(&[]);
        assert!(empty.is_empty());
        assert_eq!(empty.len(), 0);

        let two = policy(&[IgnoreRuleConfig::key("^vcd\\."), IgnoreRuleConfig::value("^x$")]);
        assert!(!two.is_empty());
        assert_eq!(two.len(), 2);
    }

    #[test]
    fn test_rule_requires_a_regex() {
        let result = IgnoreRule::compile(&IgnoreRuleConfig::default());
        assert!(matches!(result, Err(Error::InvalidConfig { .. })));
    }

    #[test]
    fn test_invalid_regex_rejected() {
        let result = IgnoreRule::compile(&IgnoreRuleConfig::key("(unclosed"));
        assert!(matches!(result, Err(Error::InvalidConfig { .. })));
    }

    #[test]
    fn test_all_criteria_must_match() {
        let rule = IgnoreRule::compile(
            &IgnoreRuleConfig::key("^vcd\\.")
                .in_namespace("system"),
        )
        .expect("valid");

        let in_ns = MetadataEntry::new("vcd.owner", "x").with_namespace("system");
        let other_ns = MetadataEntry::new("vcd.owner", "x").with_namespace("user");
        let other_key = MetadataEntry::new("owner", "x").with_namespace("system");

        assert!(rule.matches(&in_ns, &CODEC));
        assert!(!rule.matches(&other_ns, &CODEC));
        assert!(!rule.matches(&other_key, &CODEC));
    }

    #[test]
    fn test_value_regex_matches_encoded_text() {
        let rule = IgnoreRule::compile(&IgnoreRuleConfig::value("^4[0-9]$")).expect("valid");
        assert!(rule.matches(&MetadataEntry::new("n", 42.0), &CODEC));
        assert!(!rule.matches(&MetadataEntry::new("n", 7.0), &CODEC));
    }

    #[test]
    fn test_retain_managed_keeps_configured_keys() {
        let policy = policy(&[IgnoreRuleConfig::key("^sys")]);
        let desired = MetadataSet::from_entries([MetadataEntry::new("sys.managed", "1")])
            .expect("distinct keys");

        let kept = policy.retain_managed(
            [
                MetadataEntry::new("sys.other", "1"),
                MetadataEntry::new("sys.managed", "1"),
                MetadataEntry::new("owner", "ops"),
            ],
            &desired,
            &CODEC,
        );

        let keys: Vec<&str> = kept.iter().map(|e| e.key.as_str()).collect();
        assert_eq!(keys, vec!["sys.managed", "owner"]);
    }

    #[test]
    fn test_conflict_actions() {
        let desired = MetadataSet::from_entries([MetadataEntry::new("sys.flag", true)])
            .expect("distinct keys");

        let failing = policy(&[IgnoreRuleConfig::key("^sys")]);
        assert!(matches!(
            failing.check_desired(&desired, &CODEC),
            Err(Error::IgnoredKeyConflict { ref key, .. }) if key == "sys.flag"
        ));

        let warning = policy(&[IgnoreRuleConfig::key("^sys").on_conflict(ConflictAction::Warn)]);
        assert!(warning.check_desired(&desired, &CODEC).is_ok());

        let silent = policy(&[IgnoreRuleConfig::key("^sys").on_conflict(ConflictAction::None)]);
        assert!(silent.check_desired(&desired, &CODEC).is_ok());
    }
}
