// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! # HDDS Micro Pool - Packet buffer pool for microcontrollers
//!
//! A fixed-capacity, heap-free memory pool that carves one caller-owned
//! byte region into a bounded number of variable-sized packet buffers.
//! It bridges stream-oriented inputs (UART, LoRa serial) to
//! packet-oriented consumers (HDLC framers, RTPS readers) on
//! resource-constrained targets: a receiver must allocate before the
//! final packet length is known, trim once the length is known, and
//! release once the packet is consumed -- with several packets in flight.
//!
//! ## Design Constraints
//!
//! - **No heap allocations** (const-generic fragment table, borrowed region)
//! - **Non-blocking**: every operation is `O(N)` over the small table
//! - **`no_std` compatible**
//! - **IRQ callable** under caller-provided mutual exclusion
//!
//! ## Architecture
//!
//! ```text
//! +-----------------------------------------+
//! |  Stream reader (UART ISR, LoRa radio)   |
//! +-----------------------------------------+
//!       | request(min, max)   | resize/release
//! +-----------------------------------------+
//! |  PacketPool<N>                          |
//! |    fragment table: [Fragment; N]        |
//! |    byte region:    &mut [u8]            |
//! +-----------------------------------------+
//!       | bytes()/bytes_mut()
//! +-----------------------------------------+
//! |  Packet consumer (framer, publisher)    |
//! +-----------------------------------------+
//! ```
//!
//! The fragment table partitions the aligned region into runs that are
//! allocated, available, or inactive. All bookkeeping happens on the
//! table; the byte region itself is only touched when [`PacketPool::reallocate`]
//! must move a packet's preserved prefix.
//!
//! ## Feature Flags
//!
//! - `std` -- host testing and the runnable examples
//! - `logging` -- trace pool transitions through the `log` facade
//!
//! ## Concurrency
//!
//! The pool is a plain value object with no interior locking: `Send` but
//! not shareable. Callers invoking it from interrupt context must mask
//! interrupts or take a critical section around each call.

#![cfg_attr(not(feature = "std"), no_std)]
#![deny(unsafe_code)]
#![warn(missing_docs)]

/// Error types for pool operations and the integrity validator
pub mod error;

/// Fragment table records (crate internal)
mod fragment;

/// The packet pool itself
pub mod pool;

/// Pool occupancy statistics
pub mod stats;

// Re-exports for convenience
pub use crate::error::{Error, Fault, Result};
pub use crate::pool::{BufferHandle, PacketPool};
pub use crate::stats::PoolStats;

/// Sentinel size disabling the upper clamp.
///
/// Passing this as `max` to [`PacketPool::request`] or
/// [`PacketPool::reallocate`] returns the whole selected fragment;
/// passing it as the new size to [`PacketPool::resize`] grows into the
/// entire following available fragment, if any. The sentinel is the one
/// size value exempt from alignment rounding.
pub const UNBOUNDED: usize = usize::MAX;

/// Version of HDDS Micro Pool
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

#[cfg(feature = "logging")]
macro_rules! pool_trace {
    ($($arg:tt)*) => { ::log::trace!($($arg)*) };
}
#[cfg(not(feature = "logging"))]
macro_rules! pool_trace {
    ($($arg:tt)*) => {{}};
}

#[cfg(feature = "logging")]
macro_rules! pool_debug {
    ($($arg:tt)*) => { ::log::debug!($($arg)*) };
}
#[cfg(not(feature = "logging"))]
macro_rules! pool_debug {
    ($($arg:tt)*) => {{}};
}

pub(crate) use pool_debug;
pub(crate) use pool_trace;
