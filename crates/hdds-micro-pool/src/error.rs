// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Error types for the packet pool

use core::fmt;

/// Result type for pool operations
pub type Result<T> = core::result::Result<T, Error>;

/// Error type for pool operations
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Error {
    /// Invalid argument (zero size, `min > max`, bad alignment, table too small)
    InvalidParameter,

    /// No available fragment satisfies the requested minimum size
    ResourceExhausted,

    /// The handle does not resolve to an allocated fragment
    BufferNotFound,
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::InvalidParameter => write!(f, "Invalid parameter"),
            Error::ResourceExhausted => write!(f, "No fragment satisfies the request"),
            Error::BufferNotFound => write!(f, "Handle is not an allocated buffer"),
        }
    }
}

#[cfg(feature = "std")]
impl std::error::Error for Error {}

/// Integrity fault reported by [`PacketPool::validate`](crate::PacketPool::validate)
///
/// Each variant corresponds to one structural invariant of the fragment
/// table. Faults indicate an implementation bug, never a caller error;
/// normal operations maintain the invariants by construction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Fault {
    /// The aligned byte region is empty
    RegionEmpty,

    /// The pool alignment is not a nonzero power of two
    AlignmentInvalid,

    /// The fragment table has no slots
    NoFragmentSlots,

    /// An active fragment does not start where its predecessor ended
    FragmentWrongStart,

    /// A fragment start or length violates the pool alignment
    FragmentMisaligned,

    /// Two adjacent fragments are both available (should have been merged)
    AdjacentAvailable,

    /// An active fragment appears after an inactive slot
    ActiveAfterInactive,

    /// Active fragment lengths do not sum to the aligned region size
    LengthMismatch,
}

impl fmt::Display for Fault {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Fault::RegionEmpty => write!(f, "Aligned byte region is empty"),
            Fault::AlignmentInvalid => write!(f, "Alignment is not a nonzero power of two"),
            Fault::NoFragmentSlots => write!(f, "Fragment table has no slots"),
            Fault::FragmentWrongStart => write!(f, "Fragment does not start at predecessor end"),
            Fault::FragmentMisaligned => write!(f, "Fragment start or length is misaligned"),
            Fault::AdjacentAvailable => write!(f, "Adjacent available fragments left unmerged"),
            Fault::ActiveAfterInactive => write!(f, "Active fragment after inactive slot"),
            Fault::LengthMismatch => write!(f, "Fragment lengths do not cover the region"),
        }
    }
}

#[cfg(feature = "std")]
impl std::error::Error for Fault {}
