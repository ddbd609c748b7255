//! Snapshot encoding for warm restarts
//!
//! A snapshot is a versioned JSON document:
//!
//! ```text
//! { "version": 1, "kind": "ema", "groups": { "<group>": { ... } }, "meta": ... }
//! ```
//!
//! `kind` names the engine that produced it and `meta` carries engine-level
//! state that is not tied to a group (the batcher's period deadline).
//! Import decodes and validates everything before handing it back, so a
//! failed restore never leaves an engine half replaced.

use crate::error::{RestoreError, SnapshotError};
use crate::registry::GroupRegistry;
use crate::traits::GroupState;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

#[cfg(feature = "std")]
use std::{collections::BTreeMap, string::String, string::ToString, vec::Vec};

#[cfg(not(feature = "std"))]
extern crate alloc;
#[cfg(not(feature = "std"))]
use alloc::{collections::BTreeMap, string::String, string::ToString, vec::Vec};

/// Current snapshot schema version
pub const SNAPSHOT_VERSION: u32 = 1;

/// Decoded snapshot contents
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Snapshot<S, M = ()> {
    pub version: u32,
    pub kind: String,
    pub groups: BTreeMap<String, S>,
    #[serde(default)]
    pub meta: M,
}

#[derive(Serialize)]
struct SnapshotRef<'a, S, M> {
    version: u32,
    kind: &'static str,
    groups: &'a BTreeMap<String, S>,
    meta: &'a M,
}

#[derive(Deserialize)]
struct Header {
    version: u32,
    kind: String,
}

/// Encodes and decodes registry contents
pub struct SnapshotCodec;

impl SnapshotCodec {
    /// Serialize every group of `registry` together with `meta`
    pub fn export<S, M>(registry: &GroupRegistry<S>, meta: &M) -> Result<Vec<u8>, SnapshotError>
    where
        S: GroupState,
        M: Serialize,
    {
        let snapshot = SnapshotRef {
            version: SNAPSHOT_VERSION,
            kind: S::KIND,
            groups: registry.as_map(),
            meta,
        };
        serde_json::to_vec(&snapshot).map_err(|e| SnapshotError::Encode(e.to_string()))
    }

    /// Decode and validate a blob produced by [`export`](Self::export)
    ///
    /// Rejects unknown versions, snapshots of another engine kind and any
    /// group whose state fails [`GroupState::validate`].
    pub fn import<S, M>(blob: &[u8]) -> Result<Snapshot<S, M>, RestoreError>
    where
        S: GroupState,
        M: DeserializeOwned + Default,
    {
        let header: Header =
            serde_json::from_slice(blob).map_err(|e| RestoreError::Malformed(e.to_string()))?;

        if header.version != SNAPSHOT_VERSION {
            return Err(RestoreError::UnsupportedVersion {
                expected: SNAPSHOT_VERSION,
                found: header.version,
            });
        }
        if header.kind != S::KIND {
            return Err(RestoreError::KindMismatch {
                expected: String::from(S::KIND),
                found: header.kind,
            });
        }

        let snapshot: Snapshot<S, M> =
            serde_json::from_slice(blob).map_err(|e| RestoreError::Malformed(e.to_string()))?;

        for (group, state) in &snapshot.groups {
            state
                .validate(group)
                .map_err(|reason| RestoreError::InvalidGroup {
                    group: group.clone(),
                    reason,
                })?;
        }

        Ok(snapshot)
    }
}
