//! Change resolution: turning a row-file rewrite into an UPDATE.
//!
//! Given the previously rendered payload and the newly written one, the
//! resolver computes which columns actually changed and reconstructs the
//! row's identity from the *old* payload. The primary key must come from
//! the old snapshot: it names the row being edited, and if the user edits
//! a primary-key column the UPDATE still has to target the original row
//! (the new key value travels in the SET clause like any other change).

use crate::codec;
use crate::error::{ResolveError, Result};
use crate::store::TableMeta;

/// A primary-key-qualified UPDATE computed from a file rewrite.
///
/// Consumed by [`crate::store::Gateway::execute_update`]. Bound-parameter
/// order is `set_pairs` first, then `where_pairs`, matching the pair
/// ordering here.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UpdateRequest {
    /// Table the row belongs to.
    pub table: String,
    /// Changed columns and their new values, in key order.
    pub set_pairs: Vec<(String, String)>,
    /// Primary-key columns and their *old* values, in declaration order.
    pub where_pairs: Vec<(String, String)>,
}

/// Resolves an (old payload, new payload) pair into an update.
///
/// Returns `Ok(None)` when the decoded payloads carry no effective change.
/// Keys added by the new payload are ignored (there is no column to update
/// that the old row did not render), as are keys the new payload dropped.
///
/// # Errors
///
/// Returns [`ResolveError::PrimaryKeyMissing`] if the old payload lacks a
/// value for any primary-key column of `meta`.
pub fn resolve(old: &[u8], new: &[u8], meta: &TableMeta) -> Result<Option<UpdateRequest>> {
    let old_map = codec::decode(old);
    let new_map = codec::decode(new);

    let set_pairs: Vec<(String, String)> = new_map
        .iter()
        .filter(|(key, new_val)| old_map.get(*key).is_some_and(|old_val| old_val != *new_val))
        .map(|(k, v)| (k.clone(), v.clone()))
        .collect();

    if set_pairs.is_empty() {
        return Ok(None);
    }

    let mut where_pairs = Vec::with_capacity(meta.primary_key.len());
    for pk in &meta.primary_key {
        let value = old_map
            .get(pk)
            .ok_or_else(|| ResolveError::PrimaryKeyMissing {
                table: meta.table.clone(),
                column: pk.clone(),
            })?;
        where_pairs.push((pk.clone(), value.clone()));
    }

    Ok(Some(UpdateRequest {
        table: meta.table.clone(),
        set_pairs,
        where_pairs,
    }))
}
