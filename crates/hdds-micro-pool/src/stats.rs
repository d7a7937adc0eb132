// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Pool occupancy statistics
//!
//! A [`PoolStats`] snapshot helps size the byte region and the fragment
//! table for a deployment: if `active_fragments` keeps hitting the table
//! capacity, splits start failing silently and callers receive buffers
//! larger than they asked for.

/// Snapshot of pool occupancy, taken by [`PacketPool::stats`](crate::PacketPool::stats)
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PoolStats {
    /// Total bytes in the aligned region
    pub capacity: usize,

    /// Bytes currently lent out to callers
    pub allocated_bytes: usize,

    /// Bytes available for new requests
    pub available_bytes: usize,

    /// Largest single available fragment
    ///
    /// The biggest request that can currently succeed without waiting
    /// for a release.
    pub largest_available: usize,

    /// Number of active (allocated or available) fragments
    pub active_fragments: usize,
}
