//! Projection of the authoritative remote listing into local state.

use std::collections::BTreeSet;

use itertools::Itertools;

use crate::codec::Codec;
use crate::error::Result;
use crate::ignore::IgnorePolicy;
use crate::types::{MetadataEntry, MetadataSet};

/// Local view of an object's metadata, derived from the remote listing.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Projection {
    /// The new observed baseline for the next pass.
    pub observed: MetadataSet,
    /// Whether `observed` matches the desired set.
    pub in_sync: bool,
    /// Keys whose remote content differs from the desired content, or that
    /// exist on one side only.
    pub drifted: Vec<String>,
}

/// Build the observed set from a remote listing and compare it with
/// `desired`.
///
/// Both sides are canonicalized through the codec before comparison, so a
/// store that reformats values (trailing zeros, boolean case) still counts
/// as in sync. Entries matched by an ignore rule are left out unless their
/// key is configured.
///
/// # Errors
///
/// Returns `DuplicateKey` if the listing repeats a key, or `ValueParse` if a
/// remote value cannot be canonicalized.
pub fn project(
    remote: Vec<MetadataEntry>,
    desired: &MetadataSet,
    codec: &Codec,
    ignore: &IgnorePolicy,
) -> Result<Projection> {
    let observed = MetadataSet::from_entries(
        ignore
            .retain_managed(remote, desired, codec)
            .into_iter()
            .map(|entry| canonical(entry, codec))
            .collect::<Result<Vec<_>>>()?,
    )?;

    let wanted = MetadataSet::from_entries(
        desired
            .values()
            .cloned()
            .map(|entry| canonical(entry, codec))
            .collect::<Result<Vec<_>>>()?,
    )?;

    let drifted = observed
        .keys()
        .chain(wanted.keys())
        .collect::<BTreeSet<_>>()
        .into_iter()
        .filter(|key| match (observed.get(key), wanted.get(key)) {
            (Some(have), Some(want)) => !have.same_content(want),
            _ => true,
        })
        .cloned()
        .collect_vec();

    Ok(Projection {
        in_sync: drifted.is_empty(),
        observed,
        drifted,
    })
}

fn canonical(mut entry: MetadataEntry, codec: &Codec) -> Result<MetadataEntry> {
    entry.value = codec
        .normalize(&entry.value)
        .map_err(|e| e.for_key(&entry.key))?;
    Ok(entry)
}
