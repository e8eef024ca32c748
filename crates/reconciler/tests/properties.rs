//! Property-based tests for diffing, the value codec and convergence.
//!
//! Properties verified:
//! - The diff partitions every changed key into exactly one operation
//! - Entry order never changes the diff
//! - Canonical text decodes back to the value it came from
//! - A second pass after a full sync performs no operations

#![allow(clippy::panic)]

use std::collections::BTreeSet;
use std::sync::Arc;

use metasync_reconciler::{
    diff, Codec, Domain, InMemoryGateway, MetadataEntry, MetadataSet, NumberFormat,
    ReconcilerBuilder, TypedValue,
};
use proptest::prelude::*;

/// Test helper: Unwrap a Result or panic with context
fn unwrap_result<T, E: std::fmt::Display>(result: std::result::Result<T, E>, context: &str) -> T {
    match result {
        Ok(value) => value,
        Err(e) => panic!("{}: {}", context, e),
    }
}

fn value_strategy() -> impl Strategy<Value = TypedValue> {
    prop_oneof![
        "[a-z0-9 ]{0,6}".prop_map(TypedValue::String),
        (-10_000i32..10_000).prop_map(|n| TypedValue::Number(f64::from(n))),
        any::<bool>().prop_map(TypedValue::Boolean),
    ]
}

/// Values with up to three decimal places, for the shortest number format.
fn fractional_value_strategy() -> impl Strategy<Value = TypedValue> {
    prop_oneof![
        "[a-z0-9 ]{0,6}".prop_map(TypedValue::String),
        (-10_000i32..10_000, 1u32..=3)
            .prop_map(|(n, places)| TypedValue::Number(f64::from(n) / f64::from(10u32.pow(places)))),
        any::<bool>().prop_map(TypedValue::Boolean),
    ]
}

fn entry_strategy(
    values: impl Strategy<Value = TypedValue>,
) -> impl Strategy<Value = MetadataEntry> {
    // A small key alphabet so observed and desired overlap often.
    ("[a-e]{1,2}", values, any::<bool>(), any::<bool>()).prop_map(
        |(key, value, provider, readonly)| {
            let domain = if provider {
                Domain::Provider
            } else {
                Domain::Tenant
            };
            MetadataEntry::new(key, value)
                .with_domain(domain)
                .readonly(readonly)
        },
    )
}

fn set_strategy() -> impl Strategy<Value = MetadataSet> {
    set_strategy_of(value_strategy())
}

fn fractional_set_strategy() -> impl Strategy<Value = MetadataSet> {
    set_strategy_of(fractional_value_strategy())
}

fn set_strategy_of(
    values: impl Strategy<Value = TypedValue>,
) -> impl Strategy<Value = MetadataSet> {
    prop::collection::vec(entry_strategy(values), 0..10).prop_map(|entries| {
        let mut seen = BTreeSet::new();
        let distinct = entries
            .into_iter()
            .filter(|e| seen.insert(e.key.clone()))
            .collect::<Vec<_>>();
        unwrap_result(MetadataSet::from_entries(distinct), "keys are distinct")
    })
}

fn runtime() -> tokio::runtime::Runtime {
    unwrap_result(
        tokio::runtime::Runtime::new(),
        "runtime creation should succeed",
    )
}

/// Sync twice against a remote seeded with `remote`; the second pass,
/// started from the first pass's projection, must send nothing.
fn check_second_pass_is_noop(
    format: NumberFormat,
    remote: MetadataSet,
    desired: &MetadataSet,
) -> Result<(), TestCaseError> {
    let rt = runtime();
    let gateway = Arc::new(InMemoryGateway::with_entries(remote));
    let reconciler = unwrap_result(
        ReconcilerBuilder::new()
            .with_gateway(gateway.clone())
            .number_format(format)
            .build(),
        "reconciler should build",
    );

    let (first, second, mutations, snapshot) = rt.block_on(async {
        let observed = unwrap_result(
            MetadataSet::from_entries(gateway.snapshot().await),
            "remote keys are distinct",
        );
        let first = unwrap_result(reconciler.sync(&observed, desired).await, "first sync");
        gateway.clear_calls().await;

        let second = unwrap_result(
            reconciler.sync(&first.projection.observed, desired).await,
            "second sync",
        );
        (first, second, gateway.mutations().await, gateway.snapshot().await)
    });

    prop_assert!(first.projection.in_sync);
    prop_assert!(second.report.is_noop());
    prop_assert!(mutations.is_empty());

    let remote_after = unwrap_result(MetadataSet::from_entries(snapshot), "remote keys are distinct");
    prop_assert!(remote_after.same_content(desired));
    Ok(())
}

// ==========================================================================
// PROPERTY: Completeness
// ==========================================================================

proptest! {
    /// Property: every key of observed ∪ desired lands in at most one of
    /// delete/update/create, and the unlisted keys are exactly the no-ops.
    #[test]
    fn prop_diff_partitions_keys(observed in set_strategy(), desired in set_strategy()) {
        let plan = diff(&observed, &desired);

        let deletes: BTreeSet<&str> = plan.to_delete.iter().map(String::as_str).collect();
        let updates: BTreeSet<&str> = plan.to_update.keys().map(String::as_str).collect();
        let creates: BTreeSet<&str> = plan.to_create.iter().map(|e| e.key.as_str()).collect();

        prop_assert_eq!(deletes.len(), plan.to_delete.len());
        prop_assert_eq!(creates.len(), plan.to_create.len());
        prop_assert!(deletes.is_disjoint(&updates));
        prop_assert!(deletes.is_disjoint(&creates));
        prop_assert!(updates.is_disjoint(&creates));

        let all: BTreeSet<&str> = observed.keys().chain(desired.keys()).map(String::as_str).collect();
        for key in all {
            let expected_delete = observed.contains_key(key) && !desired.contains_key(key);
            let expected_create = desired.contains_key(key) && !observed.contains_key(key);
            let expected_update = match (observed.get(key), desired.get(key)) {
                (Some(have), Some(want)) => !have.same_content(want),
                _ => false,
            };

            prop_assert_eq!(deletes.contains(key), expected_delete, "delete {}", key);
            prop_assert_eq!(creates.contains(key), expected_create, "create {}", key);
            prop_assert_eq!(updates.contains(key), expected_update, "update {}", key);
        }
    }

    /// Property: updates carry the desired content.
    #[test]
    fn prop_updates_take_desired_content(observed in set_strategy(), desired in set_strategy()) {
        let plan = diff(&observed, &desired);
        for (key, entry) in &plan.to_update {
            prop_assert!(desired.get(key).is_some_and(|want| want.same_content(entry)));
        }
    }
}

// ==========================================================================
// PROPERTY: Order independence
// ==========================================================================

proptest! {
    /// Property: shuffling the input entries produces the same diff.
    #[test]
    fn prop_diff_ignores_entry_order(
        (observed, shuffled_observed) in set_strategy()
            .prop_flat_map(|set| {
                let entries: Vec<MetadataEntry> = set.values().cloned().collect();
                (Just(set), Just(entries).prop_shuffle())
            }),
        (desired, shuffled_desired) in set_strategy()
            .prop_flat_map(|set| {
                let entries: Vec<MetadataEntry> = set.values().cloned().collect();
                (Just(set), Just(entries).prop_shuffle())
            }),
    ) {
        let observed_again = unwrap_result(
            MetadataSet::from_entries(shuffled_observed),
            "shuffled keys are distinct",
        );
        let desired_again = unwrap_result(
            MetadataSet::from_entries(shuffled_desired),
            "shuffled keys are distinct",
        );

        prop_assert_eq!(diff(&observed, &desired), diff(&observed_again, &desired_again));
    }
}

// ==========================================================================
// PROPERTY: Codec round trip
// ==========================================================================

proptest! {
    #[test]
    fn prop_integral_numbers_round_trip(n in -1_000_000_000_000i64..1_000_000_000_000i64) {
        let codec = Codec::new(NumberFormat::Integral);
        #[allow(clippy::cast_precision_loss)]
        let value = TypedValue::Number(n as f64);

        let decoded = codec.decode(value.metadata_type(), &codec.encode(&value));
        prop_assert_eq!(decoded, Ok(value));
    }

    #[test]
    fn prop_shortest_numbers_round_trip(n in prop::num::f64::NORMAL | prop::num::f64::ZERO) {
        let codec = Codec::new(NumberFormat::Shortest);
        let value = TypedValue::Number(n);

        let decoded = codec.decode(value.metadata_type(), &codec.encode(&value));
        prop_assert_eq!(decoded, Ok(value));
    }

    #[test]
    fn prop_strings_and_booleans_round_trip(value in value_strategy()) {
        let codec = Codec::new(NumberFormat::Integral);
        let decoded = codec.decode(value.metadata_type(), &codec.encode(&value));
        prop_assert_eq!(decoded, Ok(value));
    }
}

// ==========================================================================
// PROPERTY: Idempotence
// ==========================================================================

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    /// Property: after a full sync, syncing again from the projected
    /// baseline performs zero remote mutations.
    #[test]
    fn prop_second_pass_is_noop(remote in set_strategy(), desired in set_strategy()) {
        check_second_pass_is_noop(NumberFormat::Integral, remote, &desired)?;
    }

    /// Property: the same holds with the shortest number format and
    /// fractional values on both sides.
    #[test]
    fn prop_second_pass_is_noop_with_fractions(
        remote in fractional_set_strategy(),
        desired in fractional_set_strategy(),
    ) {
        check_second_pass_is_noop(NumberFormat::Shortest, remote, &desired)?;
    }
}

// ==========================================================================
// BOUNDARIES
// ==========================================================================

proptest! {
    #[test]
    fn prop_empty_observed_creates_everything(desired in set_strategy()) {
        let plan = diff(&MetadataSet::new(), &desired);

        prop_assert!(plan.to_update.is_empty());
        prop_assert!(plan.to_delete.is_empty());
        let created = unwrap_result(
            MetadataSet::from_entries(plan.to_create),
            "created keys are distinct",
        );
        prop_assert!(created.same_content(&desired));
    }

    #[test]
    fn prop_empty_desired_deletes_everything(observed in set_strategy()) {
        let plan = diff(&observed, &MetadataSet::new());

        prop_assert!(plan.to_update.is_empty());
        prop_assert!(plan.to_create.is_empty());
        let observed_keys: Vec<&String> = observed.keys().collect();
        let deleted: Vec<&String> = plan.to_delete.iter().collect();
        prop_assert_eq!(deleted, observed_keys);
    }
}
