// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! The packet pool
//!
//! [`PacketPool`] carves one caller-owned byte region into a bounded
//! number of variable-sized packet buffers. The fragment table is both
//! the free list and the allocation list: active fragments partition the
//! aligned region in physical order, inactive slots form a suffix, and
//! no two adjacent fragments are ever both available.
//!
//! All bookkeeping is table-only. Packet bytes move exactly once, when
//! [`PacketPool::reallocate`] has to relocate a preserved prefix.

use crate::error::{Error, Fault, Result};
use crate::fragment::{Fragment, FragmentState};
use crate::stats::PoolStats;
use crate::{pool_debug, pool_trace, UNBOUNDED};

/// Token for a buffer lent out by a [`PacketPool`].
///
/// The handle carries the buffer's start and end as offsets from the
/// base of the pool's byte region. Operations resolve a handle by its
/// start offset; `end` always reflects the true extent after the most
/// recent operation, which may exceed what was asked for when the
/// fragment table was too full to split.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BufferHandle {
    start: usize,
    end: usize,
}

impl BufferHandle {
    /// Start of the buffer as an offset into the pool region
    pub fn start(&self) -> usize {
        self.start
    }

    /// One past the last byte of the buffer
    pub fn end(&self) -> usize {
        self.end
    }

    /// Buffer length in bytes
    pub fn len(&self) -> usize {
        self.end - self.start
    }

    /// Whether the buffer is empty (never true for a live handle)
    pub fn is_empty(&self) -> bool {
        self.end == self.start
    }
}

/// Fixed-capacity packet buffer pool over a borrowed byte region.
///
/// `N` is the fragment table capacity: the maximum number of
/// simultaneous runs (allocated plus available) the pool can track.
/// At least two slots are required so an allocation can split off a
/// remainder.
///
/// The pool has no interior locking. It can be driven from interrupt
/// context if the caller guarantees mutual exclusion around each call.
pub struct PacketPool<'region, const N: usize> {
    region: &'region mut [u8],
    alignment: usize,
    aligned_begin: usize,
    aligned_end: usize,
    fragments: [Fragment; N],
}

impl<'region, const N: usize> PacketPool<'region, N> {
    /// Create a pool over `region` with the given fragment alignment.
    ///
    /// `alignment` must be a nonzero power of two and applies to the
    /// absolute addresses of the region, so a misaligned region is
    /// usable: allocation starts at the first aligned byte inside it.
    ///
    /// # Errors
    ///
    /// [`Error::InvalidParameter`] if the alignment is not a nonzero
    /// power of two, `N < 2`, or no aligned bytes fit in the region.
    pub fn new(region: &'region mut [u8], alignment: usize) -> Result<Self> {
        if !alignment.is_power_of_two() || N < 2 {
            return Err(Error::InvalidParameter);
        }
        let base = region.as_ptr() as usize;
        let begin = match base.checked_add(alignment - 1) {
            Some(v) => (v & !(alignment - 1)) - base,
            None => return Err(Error::InvalidParameter),
        };
        let end = ((base + region.len()) & !(alignment - 1)).saturating_sub(base);
        if begin >= end {
            return Err(Error::InvalidParameter);
        }

        let mut pool = Self {
            region,
            alignment,
            aligned_begin: begin,
            aligned_end: end,
            fragments: [Fragment::INACTIVE; N],
        };
        pool.reset();
        Ok(pool)
    }

    /// Reset the pool: the whole aligned region becomes one available
    /// fragment and every outstanding handle is invalidated.
    pub fn reset(&mut self) {
        self.fragments[0] = Fragment {
            start: self.aligned_begin,
            len: (self.aligned_end - self.aligned_begin) as isize,
        };
        for fragment in self.fragments[1..].iter_mut() {
            *fragment = Fragment::INACTIVE;
        }
        pool_trace!("reset: {} bytes available", self.aligned_end - self.aligned_begin);
    }

    /// Obtain a buffer of at least `min` and at most `max` bytes.
    ///
    /// Both sizes are rounded up to the pool alignment; pass
    /// [`UNBOUNDED`](crate::UNBOUNDED) as `max` to take the whole
    /// selected fragment. The best available fragment is the one whose
    /// length is closest to `max`: while every candidate undershoots
    /// `max` the longest wins, once candidates reach `max` the shortest
    /// of those wins. A fragment longer than `max` is trimmed, table
    /// space permitting; when the table is full the caller simply
    /// receives a larger buffer, visible through the handle's `end`.
    ///
    /// # Errors
    ///
    /// [`Error::InvalidParameter`] if `min` is zero or exceeds `max`;
    /// [`Error::ResourceExhausted`] if no available fragment has `min`
    /// aligned bytes.
    pub fn request(&mut self, min: usize, max: usize) -> Result<BufferHandle> {
        if min == 0 || min > max {
            pool_debug!("request rejected: min={} max={}", min, max);
            return Err(Error::InvalidParameter);
        }
        let amin = self.align_size(min).ok_or(Error::ResourceExhausted)?;
        let amax = self.align_target(max);

        let index = self.best_fit(amin, amax).ok_or(Error::ResourceExhausted)?;
        let size = self.fragments[index].size();
        self.fragments[index].len = -(size as isize);
        if size > amax {
            self.release_suffix(index, size - amax);
        }

        let fragment = self.fragments[index];
        pool_trace!(
            "request min={} max={} -> start={} len={}",
            min,
            max,
            fragment.start,
            fragment.size()
        );
        Ok(BufferHandle {
            start: fragment.start,
            end: fragment.end(),
        })
    }

    /// Resize a buffer in place; data never moves.
    ///
    /// Shrinking returns the tail bytes to the pool when a table slot
    /// is free for them. Growing succeeds only into an immediately
    /// following available fragment and may deliver less than asked:
    /// the returned handle's `end` reports the size actually reached.
    /// Growth against an allocated follower leaves the buffer unchanged.
    ///
    /// # Errors
    ///
    /// [`Error::InvalidParameter`] if `new_size` is zero;
    /// [`Error::BufferNotFound`] if the handle does not resolve to an
    /// allocated buffer.
    pub fn resize(&mut self, handle: BufferHandle, new_size: usize) -> Result<BufferHandle> {
        if new_size == 0 {
            pool_debug!("resize rejected: new_size=0");
            return Err(Error::InvalidParameter);
        }
        let index = self.resolve_allocated(handle.start())?;
        let current = self.fragments[index].size();
        let target = self.align_target(new_size);

        if target < current {
            self.release_suffix(index, current - target);
        } else if target > current && index + 1 < N && self.fragments[index + 1].is_available() {
            let lacking = target - current;
            let follower = self.fragments[index + 1].size();
            if follower > lacking {
                self.fragments[index + 1].start += lacking;
                self.fragments[index + 1].len -= lacking as isize;
                self.fragments[index].len -= lacking as isize;
            } else {
                self.absorb_following(index);
            }
        }

        let fragment = self.fragments[index];
        pool_trace!(
            "resize start={} new_size={} -> len={}",
            handle.start(),
            new_size,
            fragment.size()
        );
        Ok(BufferHandle {
            start: fragment.start,
            end: fragment.end(),
        })
    }

    /// Resize a buffer, moving it to the best location if necessary.
    ///
    /// Equivalent to releasing the buffer, requesting `(min, max)` and
    /// carrying over the old contents, but without external storage:
    /// placement considers the virtual free region formed by the buffer
    /// together with its available neighbors. When the buffer moves,
    /// its first `min(current_len, min)` bytes are preserved at the new
    /// start; `min` is taken unaligned for that purpose even though
    /// placement uses aligned sizes.
    ///
    /// On failure the pool is left untouched and the old handle remains
    /// valid.
    ///
    /// # Errors
    ///
    /// [`Error::InvalidParameter`] if `min` is zero or exceeds `max`;
    /// [`Error::BufferNotFound`] if the handle does not resolve to an
    /// allocated buffer; [`Error::ResourceExhausted`] if no placement
    /// satisfies `min`.
    pub fn reallocate(
        &mut self,
        handle: BufferHandle,
        min: usize,
        max: usize,
    ) -> Result<BufferHandle> {
        if min == 0 || min > max {
            pool_debug!("reallocate rejected: min={} max={}", min, max);
            return Err(Error::InvalidParameter);
        }
        let index = self.resolve_allocated(handle.start())?;
        let amin = self.align_size(min).ok_or(Error::ResourceExhausted)?;
        let amax = self.align_target(max);

        let current = self.fragments[index].size();

        // Placement pretends the buffer is already free: the virtual
        // region spans it plus any available immediate neighbors.
        let prev_available = index > 0 && self.fragments[index - 1].is_available();
        let next_available = index + 1 < N && self.fragments[index + 1].is_available();
        let virtual_index = if prev_available { index - 1 } else { index };
        let mut virtual_len = current;
        if prev_available {
            virtual_len += self.fragments[index - 1].size();
        }
        if next_available {
            virtual_len += self.fragments[index + 1].size();
        }

        let mut best: Option<(usize, usize)> = None;
        for candidate in 0..N {
            let len = if candidate == virtual_index {
                virtual_len
            } else if candidate == index || (next_available && candidate == index + 1) {
                // Absorbed into the virtual region.
                continue;
            } else {
                match self.fragments[candidate].state() {
                    FragmentState::Available { len } => len,
                    _ => continue,
                }
            };
            if len < amin {
                continue;
            }
            best = match best {
                Some((_, best_len)) if !Self::closer_to_max(len, best_len, amax) => best,
                _ => Some((candidate, len)),
            };
        }
        let (winner, _) = best.ok_or(Error::ResourceExhausted)?;

        let copy_len = current.min(min);

        if winner == index {
            // Best placement is the buffer's own fragment, possibly
            // widened in place into its follower.
            return self.resize(handle, max);
        }

        if winner == virtual_index {
            // The buffer shifts left into its absorbed predecessor.
            if next_available {
                self.absorb_following(index);
            }
            let src = self.fragments[index].start;
            let dst = self.fragments[virtual_index].start;
            self.region.copy_within(src..src + copy_len, dst);

            let combined = self.fragments[virtual_index].size() + self.fragments[index].size();
            let new_len = combined.min(amax);
            self.fragments[virtual_index].len = -(new_len as isize);
            if new_len == combined {
                self.close_slot(index);
            } else {
                self.fragments[index] = Fragment {
                    start: dst + new_len,
                    len: (combined - new_len) as isize,
                };
            }

            let fragment = self.fragments[virtual_index];
            pool_trace!(
                "reallocate start={} -> start={} len={} (shifted left)",
                handle.start(),
                fragment.start,
                fragment.size()
            );
            return Ok(BufferHandle {
                start: fragment.start,
                end: fragment.end(),
            });
        }

        // Unrelated placement: allocate it request-style, copy the
        // preserved prefix while the source still exists, then release
        // the source.
        let size = self.fragments[winner].size();
        self.fragments[winner].len = -(size as isize);
        if size > amax {
            self.release_suffix(winner, size - amax);
        }
        let destination = self.fragments[winner];
        let src = handle.start();
        self.region.copy_within(src..src + copy_len, destination.start);

        // The split may have shifted slots after the winner.
        let source_index = self.find(src).ok_or(Error::BufferNotFound)?;
        self.release_at(source_index);

        pool_trace!(
            "reallocate start={} -> start={} len={} (moved)",
            src,
            destination.start,
            destination.size()
        );
        Ok(BufferHandle {
            start: destination.start,
            end: destination.end(),
        })
    }

    /// Return a buffer to the pool.
    ///
    /// The freed fragment is merged with available neighbors on both
    /// sides, so releasing every outstanding buffer restores the
    /// single-fragment reset state.
    ///
    /// # Errors
    ///
    /// [`Error::BufferNotFound`] if the handle does not resolve to an
    /// allocated buffer (for example after a second release).
    pub fn release(&mut self, handle: BufferHandle) -> Result<()> {
        let index = self.resolve_allocated(handle.start())?;
        self.release_at(index);
        pool_trace!("release start={}", handle.start());
        Ok(())
    }

    /// Read access to a buffer's current bytes.
    ///
    /// # Errors
    ///
    /// [`Error::BufferNotFound`] if the handle does not resolve to an
    /// allocated buffer.
    pub fn bytes(&self, handle: &BufferHandle) -> Result<&[u8]> {
        let index = self.resolve_allocated(handle.start())?;
        let fragment = &self.fragments[index];
        Ok(&self.region[fragment.start..fragment.end()])
    }

    /// Write access to a buffer's current bytes.
    ///
    /// # Errors
    ///
    /// [`Error::BufferNotFound`] if the handle does not resolve to an
    /// allocated buffer.
    pub fn bytes_mut(&mut self, handle: &BufferHandle) -> Result<&mut [u8]> {
        let index = self.resolve_allocated(handle.start())?;
        let fragment = self.fragments[index];
        Ok(&mut self.region[fragment.start..fragment.end()])
    }

    /// Verify the integrity of the fragment table.
    ///
    /// Intended for tests and diagnostics; normal operations keep the
    /// invariants by construction and never raise these faults.
    pub fn validate(&self) -> core::result::Result<(), Fault> {
        if !self.alignment.is_power_of_two() {
            return Err(Fault::AlignmentInvalid);
        }
        if N == 0 {
            return Err(Fault::NoFragmentSlots);
        }
        if self.aligned_begin >= self.aligned_end {
            return Err(Fault::RegionEmpty);
        }

        let base = self.region.as_ptr() as usize;
        let mut expected = self.aligned_begin;
        let mut covered = 0usize;
        let mut previous_available = false;
        let mut active = 0;
        for fragment in &self.fragments {
            let available = match fragment.state() {
                FragmentState::Inactive => break,
                FragmentState::Available { .. } => true,
                FragmentState::Allocated { .. } => false,
            };
            if fragment.start != expected {
                return Err(Fault::FragmentWrongStart);
            }
            let size = fragment.size();
            if (base + fragment.start) % self.alignment != 0 || size % self.alignment != 0 {
                return Err(Fault::FragmentMisaligned);
            }
            if available && previous_available {
                return Err(Fault::AdjacentAvailable);
            }
            previous_available = available;
            expected += size;
            covered += size;
            active += 1;
        }
        for fragment in &self.fragments[active..] {
            if !fragment.is_inactive() {
                return Err(Fault::ActiveAfterInactive);
            }
        }
        if covered != self.aligned_end - self.aligned_begin {
            return Err(Fault::LengthMismatch);
        }
        Ok(())
    }

    /// Snapshot of the pool occupancy
    pub fn stats(&self) -> PoolStats {
        let mut stats = PoolStats {
            capacity: self.aligned_end - self.aligned_begin,
            ..PoolStats::default()
        };
        for fragment in &self.fragments {
            match fragment.state() {
                FragmentState::Allocated { len } => {
                    stats.allocated_bytes += len;
                    stats.active_fragments += 1;
                }
                FragmentState::Available { len } => {
                    stats.available_bytes += len;
                    stats.largest_available = stats.largest_available.max(len);
                    stats.active_fragments += 1;
                }
                FragmentState::Inactive => {}
            }
        }
        stats
    }

    /// Total bytes in the aligned region
    pub fn capacity(&self) -> usize {
        self.aligned_end - self.aligned_begin
    }

    /// Fragment alignment in bytes
    pub fn alignment(&self) -> usize {
        self.alignment
    }

    // -- table primitives ---------------------------------------------------

    /// Round a caller size up to the alignment; `None` on overflow.
    fn align_size(&self, size: usize) -> Option<usize> {
        size.checked_add(self.alignment - 1)
            .map(|v| v & !(self.alignment - 1))
    }

    /// Alignment for upper bounds: the sentinel stays unrounded and an
    /// overflowing bound degrades to the sentinel.
    fn align_target(&self, size: usize) -> usize {
        if size == UNBOUNDED {
            UNBOUNDED
        } else {
            self.align_size(size).unwrap_or(UNBOUNDED)
        }
    }

    /// Resolve a caller-held start offset to its table slot.
    fn find(&self, start: usize) -> Option<usize> {
        self.fragments
            .iter()
            .position(|f| !f.is_inactive() && f.start == start)
    }

    fn resolve_allocated(&self, start: usize) -> Result<usize> {
        match self.find(start) {
            Some(index) if self.fragments[index].is_allocated() => Ok(index),
            _ => Err(Error::BufferNotFound),
        }
    }

    /// Whether `candidate` beats `best` under the closest-to-`max`
    /// policy: upgrade while the best still undershoots `max`,
    /// downgrade toward the smallest fragment that reaches `max`.
    fn closer_to_max(candidate: usize, best: usize, max: usize) -> bool {
        (candidate > best && best < max) || (candidate < best && candidate >= max)
    }

    /// Best available fragment for a `(min, max)` request, or `None`.
    fn best_fit(&self, min: usize, max: usize) -> Option<usize> {
        let mut best: Option<usize> = None;
        for (index, fragment) in self.fragments.iter().enumerate() {
            let len = match fragment.state() {
                FragmentState::Available { len } if len >= min => len,
                _ => continue,
            };
            best = match best {
                Some(current) if !Self::closer_to_max(len, self.fragments[current].size(), max) => {
                    best
                }
                _ => Some(index),
            };
        }
        best
    }

    /// Make room for a new slot at `index + 1` by shifting the active
    /// run after `index` one position right into the first inactive
    /// slot. Returns `false` when the table is full.
    fn open_slot_after(&mut self, index: usize) -> bool {
        let mut inactive = None;
        for slot in (index + 1)..N {
            if self.fragments[slot].is_inactive() {
                inactive = Some(slot);
                break;
            }
        }
        let Some(inactive) = inactive else {
            return false;
        };
        for slot in ((index + 2)..=inactive).rev() {
            self.fragments[slot] = self.fragments[slot - 1];
        }
        true
    }

    /// Drop the slot at `index`, moving later slots one position left.
    fn close_slot(&mut self, index: usize) {
        for slot in index..N - 1 {
            self.fragments[slot] = self.fragments[slot + 1];
        }
        self.fragments[N - 1] = Fragment::INACTIVE;
    }

    /// Fold an available follower into the fragment at `index`,
    /// preserving that fragment's state.
    fn absorb_following(&mut self, index: usize) {
        let extra = self.fragments[index + 1].len;
        debug_assert!(extra > 0);
        if self.fragments[index].len < 0 {
            self.fragments[index].len -= extra;
        } else {
            self.fragments[index].len += extra;
        }
        self.close_slot(index + 1);
    }

    /// Return `excess` tail bytes of the allocated fragment at `index`
    /// to the pool. The bytes extend a following available fragment or
    /// become a new one; with no table slot left the fragment silently
    /// keeps its extra bytes.
    fn release_suffix(&mut self, index: usize, excess: usize) {
        let kept = self.fragments[index].size() - excess;
        let tail_start = self.fragments[index].start + kept;
        if index + 1 < N && self.fragments[index + 1].is_available() {
            self.fragments[index + 1].start = tail_start;
            self.fragments[index + 1].len += excess as isize;
        } else if index + 1 < N && self.open_slot_after(index) {
            self.fragments[index + 1] = Fragment {
                start: tail_start,
                len: excess as isize,
            };
        } else {
            pool_trace!("suffix of {} bytes kept: fragment table full", excess);
            return;
        }
        self.fragments[index].len = -(kept as isize);
    }

    /// Flip the fragment at `index` to available and merge it with
    /// available neighbors on both sides.
    fn release_at(&mut self, index: usize) {
        let mut index = index;
        self.fragments[index].len = self.fragments[index].size() as isize;
        if index > 0 && self.fragments[index - 1].is_available() {
            index -= 1;
            self.absorb_following(index);
        }
        if index + 1 < N && self.fragments[index + 1].is_available() {
            self.absorb_following(index);
        }
    }
}

#[cfg(test)]
impl<const N: usize> PacketPool<'_, N> {
    /// Force an arbitrary fragment layout. Lengths are signed the way
    /// the table stores them (negative = allocated); whatever region is
    /// left after `lens` becomes a tail fragment, allocated or not per
    /// `tail_allocated`. Layouts may deliberately violate invariants.
    fn force_layout(&mut self, lens: &[isize], tail_allocated: bool) {
        self.reset();
        let mut start = self.aligned_begin;
        let mut slot = 0;
        for &len in lens {
            self.fragments[slot] = Fragment { start, len };
            start += len.unsigned_abs();
            slot += 1;
        }
        let rest = self.aligned_end - start;
        if rest > 0 {
            self.fragments[slot] = Fragment {
                start,
                len: if tail_allocated {
                    -(rest as isize)
                } else {
                    rest as isize
                },
            };
            slot += 1;
        }
        for fragment in self.fragments[slot..].iter_mut() {
            *fragment = Fragment::INACTIVE;
        }
    }

    fn fragment(&self, index: usize) -> Fragment {
        self.fragments[index]
    }

    fn handle_for(&self, index: usize) -> BufferHandle {
        let fragment = &self.fragments[index];
        BufferHandle {
            start: fragment.start,
            end: fragment.end(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const POOL_SIZE: usize = 256;

    fn fragments<const N: usize>(pool: &PacketPool<'_, N>) -> [isize; N] {
        let mut lens = [0isize; N];
        for (slot, len) in lens.iter_mut().enumerate() {
            *len = pool.fragment(slot).len;
        }
        lens
    }

    #[test]
    fn test_new_rejects_bad_parameters() {
        let mut backing = [0u8; POOL_SIZE];
        assert!(matches!(
            PacketPool::<2>::new(&mut backing, 3),
            Err(Error::InvalidParameter)
        ));
        assert!(matches!(
            PacketPool::<2>::new(&mut backing, 0),
            Err(Error::InvalidParameter)
        ));
        assert!(matches!(
            PacketPool::<1>::new(&mut backing, 1),
            Err(Error::InvalidParameter)
        ));
        let mut tiny = [0u8; 1];
        // One byte can never hold an aligned 512-byte fragment.
        assert!(matches!(
            PacketPool::<2>::new(&mut tiny, 512),
            Err(Error::InvalidParameter)
        ));
    }

    #[test]
    fn test_reset_single_available_fragment() {
        let mut backing = [0u8; POOL_SIZE];
        let pool: PacketPool<'_, 4> = PacketPool::new(&mut backing, 1).unwrap();
        assert_eq!(pool.fragment(0).len, POOL_SIZE as isize);
        assert!(pool.fragment(1).is_inactive());
        assert_eq!(pool.validate(), Ok(()));
    }

    #[test]
    fn test_find_resolves_active_starts() {
        let mut backing = [0u8; POOL_SIZE];
        let mut pool: PacketPool<'_, 8> = PacketPool::new(&mut backing, 1).unwrap();
        pool.force_layout(&[4, 8, 6], false);

        let first = pool.fragment(0).start;
        assert_eq!(pool.find(first), Some(0));
        assert_eq!(pool.find(first + 4), Some(1));
        assert_eq!(pool.find(first + 12), Some(2));
        assert_eq!(pool.find(first + 1), None);
    }

    #[test]
    fn test_absorb_following_merges_runs() {
        let mut backing = [0u8; POOL_SIZE];
        let mut pool: PacketPool<'_, 8> = PacketPool::new(&mut backing, 1).unwrap();

        pool.force_layout(&[4, 8, 6], false);
        pool.absorb_following(0);
        assert_eq!(fragments(&pool)[..3], [12, 6, (POOL_SIZE - 18) as isize]);

        pool.force_layout(&[4, 8, 6], false);
        pool.absorb_following(1);
        assert_eq!(fragments(&pool)[..3], [4, 14, (POOL_SIZE - 18) as isize]);
    }

    #[test]
    fn test_absorb_following_preserves_allocated_state() {
        let mut backing = [0u8; POOL_SIZE];
        let mut pool: PacketPool<'_, 8> = PacketPool::new(&mut backing, 1).unwrap();
        pool.force_layout(&[-16, 8], true);
        pool.absorb_following(0);
        assert_eq!(fragments(&pool)[..2], [-24, -(POOL_SIZE as isize - 24)]);
    }

    #[test]
    fn test_best_fit_upgrades_while_below_max() {
        let mut backing = [0u8; POOL_SIZE];
        let mut pool: PacketPool<'_, 8> = PacketPool::new(&mut backing, 1).unwrap();
        // Available runs of 32, 64 and 48 bytes separated by allocations.
        pool.force_layout(&[32, -8, 64, -8, 48], true);

        // Nothing reaches max: the largest available wins.
        assert_eq!(pool.best_fit(8, UNBOUNDED), Some(2));
        assert_eq!(pool.best_fit(8, 128), Some(2));
    }

    #[test]
    fn test_best_fit_downgrades_to_smallest_reaching_max() {
        let mut backing = [0u8; POOL_SIZE];
        let mut pool: PacketPool<'_, 8> = PacketPool::new(&mut backing, 1).unwrap();
        pool.force_layout(&[32, -8, 64, -8, 48], true);

        // 48 reaches max and is smaller than 64.
        assert_eq!(pool.best_fit(8, 48), Some(4));
        assert_eq!(pool.best_fit(40, 44), Some(4));
        // min filters the short fragments out entirely.
        assert_eq!(pool.best_fit(49, 64), Some(2));
        assert_eq!(pool.best_fit(65, UNBOUNDED), None);
    }

    #[test]
    fn test_release_suffix_materializes_new_fragment() {
        let mut backing = [0u8; 64];
        let mut pool: PacketPool<'_, 4> = PacketPool::new(&mut backing, 1).unwrap();
        pool.force_layout(&[-64], false);

        pool.release_suffix(0, 16);
        assert_eq!(fragments(&pool), [-48, 16, 0, 0]);
        assert_eq!(pool.fragment(1).start, pool.fragment(0).start + 48);
        assert_eq!(pool.validate(), Ok(()));
    }

    #[test]
    fn test_release_suffix_extends_available_follower() {
        let mut backing = [0u8; 64];
        let mut pool: PacketPool<'_, 4> = PacketPool::new(&mut backing, 1).unwrap();
        pool.force_layout(&[-32, 16, -16], false);

        pool.release_suffix(0, 8);
        assert_eq!(fragments(&pool)[..3], [-24, 24, -16]);
        assert_eq!(pool.fragment(1).start, pool.fragment(0).start + 24);
        assert_eq!(pool.validate(), Ok(()));
    }

    #[test]
    fn test_release_suffix_shifts_past_allocated_follower() {
        let mut backing = [0u8; 64];
        let mut pool: PacketPool<'_, 4> = PacketPool::new(&mut backing, 1).unwrap();
        pool.force_layout(&[-32, -16], false);

        pool.release_suffix(0, 8);
        assert_eq!(fragments(&pool), [-24, 8, -16, 16]);
        assert_eq!(pool.validate(), Ok(()));
    }

    #[test]
    fn test_release_suffix_dropped_when_table_full() {
        let mut backing = [0u8; 64];
        let mut pool: PacketPool<'_, 2> = PacketPool::new(&mut backing, 1).unwrap();
        pool.force_layout(&[-32], true);

        pool.release_suffix(0, 8);
        assert_eq!(fragments(&pool), [-32, -32]);
        assert_eq!(pool.validate(), Ok(()));
    }

    #[test]
    fn test_release_merges_both_neighbors() {
        let mut backing = [0u8; POOL_SIZE];
        let mut pool: PacketPool<'_, 8> = PacketPool::new(&mut backing, 1).unwrap();
        pool.force_layout(&[-4, -8, -6, -9], false);
        assert_eq!(pool.validate(), Ok(()));

        pool.release(pool.handle_for(1)).unwrap();
        assert_eq!(pool.validate(), Ok(()));
        assert_eq!(fragments(&pool)[..5], [-4, 8, -6, -9, 229]);

        pool.release(pool.handle_for(0)).unwrap();
        assert_eq!(pool.validate(), Ok(()));
        assert_eq!(fragments(&pool)[..4], [12, -6, -9, 229]);

        pool.release(pool.handle_for(1)).unwrap();
        assert_eq!(pool.validate(), Ok(()));
        assert_eq!(fragments(&pool)[..3], [18, -9, 229]);

        pool.release(pool.handle_for(1)).unwrap();
        assert_eq!(pool.validate(), Ok(()));
        assert_eq!(fragments(&pool)[..2], [POOL_SIZE as isize, 0]);
    }

    #[test]
    fn test_release_without_available_neighbors() {
        let mut backing = [0u8; POOL_SIZE];
        let mut pool: PacketPool<'_, 8> = PacketPool::new(&mut backing, 1).unwrap();
        pool.force_layout(&[-4, -8], true);

        pool.release(pool.handle_for(1)).unwrap();
        assert_eq!(pool.validate(), Ok(()));
        assert_eq!(fragments(&pool)[..3], [-4, 8, -244]);

        pool.release(pool.handle_for(2)).unwrap();
        assert_eq!(pool.validate(), Ok(()));
        assert_eq!(fragments(&pool)[..3], [-4, 252, 0]);
    }

    #[test]
    fn test_release_rejects_unknown_and_available_starts() {
        let mut backing = [0u8; POOL_SIZE];
        let mut pool: PacketPool<'_, 8> = PacketPool::new(&mut backing, 1).unwrap();
        pool.force_layout(&[4, -8, 6], false);

        // Fragment 0 is available, not allocated.
        let available = pool.handle_for(0);
        assert_eq!(pool.release(available), Err(Error::BufferNotFound));

        // Offset into the middle of a fragment.
        let inside = BufferHandle { start: 1, end: 2 };
        assert_eq!(pool.release(inside), Err(Error::BufferNotFound));
        assert_eq!(pool.validate(), Ok(()));
    }

    #[test]
    fn test_validate_detects_corrupted_layouts() {
        let mut backing = [0u8; POOL_SIZE];
        let mut pool: PacketPool<'_, 8> = PacketPool::new(&mut backing, 1).unwrap();

        // Two adjacent available fragments.
        pool.force_layout(&[4, 8], false);
        assert_eq!(pool.validate(), Err(Fault::AdjacentAvailable));

        // Hole between fragments.
        pool.force_layout(&[-4, -8], false);
        pool.fragments[1].start += 2;
        assert_eq!(pool.validate(), Err(Fault::FragmentWrongStart));

        // Active fragment after an inactive slot.
        pool.force_layout(&[-4, -8], false);
        pool.fragments[4] = Fragment { start: 0, len: -4 };
        assert_eq!(pool.validate(), Err(Fault::ActiveAfterInactive));

        // Lengths no longer cover the region.
        pool.force_layout(&[-4, -8], false);
        pool.fragments[2] = Fragment::INACTIVE;
        assert_eq!(pool.validate(), Err(Fault::LengthMismatch));
    }

    #[test]
    fn test_validate_detects_misalignment() {
        let mut backing = [0u8; POOL_SIZE];
        let mut pool: PacketPool<'_, 8> = PacketPool::new(&mut backing, 4).unwrap();
        let begin = pool.aligned_begin;
        let end = pool.aligned_end;
        pool.fragments[0] = Fragment {
            start: begin,
            len: -6,
        };
        pool.fragments[1] = Fragment {
            start: begin + 6,
            len: (end - begin - 6) as isize,
        };
        assert_eq!(pool.validate(), Err(Fault::FragmentMisaligned));
    }

    #[test]
    fn test_request_splits_between_allocations() {
        let mut backing = [0u8; POOL_SIZE];
        let mut pool: PacketPool<'_, 8> = PacketPool::new(&mut backing, 1).unwrap();
        pool.force_layout(&[32, -32, 64, -64], true);

        let handle = pool.request(24, 48).unwrap();
        assert_eq!(handle.start(), pool.fragment(2).start);
        assert_eq!(handle.len(), 48);
        assert_eq!(fragments(&pool)[..6], [32, -32, -48, 16, -64, -64]);
        assert_eq!(pool.validate(), Ok(()));
    }

    #[test]
    fn test_reallocate_shifts_left_into_predecessor() {
        let mut backing = [0u8; POOL_SIZE];
        let mut pool: PacketPool<'_, 8> = PacketPool::new(&mut backing, 1).unwrap();
        pool.force_layout(&[-16, 24, -8], true);

        // Seed the source fragment so the preserved prefix is checkable.
        let source = pool.handle_for(2);
        pool.bytes_mut(&source).unwrap().copy_from_slice(&[0xAB; 8]);

        // Only the virtual region (24 + 8 = 32) satisfies min; the
        // buffer shifts left and widens toward max.
        let moved = pool.reallocate(source, 8, 32).unwrap();
        assert_eq!(moved.start(), pool.fragment(1).start);
        assert_eq!(moved.len(), 32);
        assert_eq!(fragments(&pool)[..3], [-16, -32, -(POOL_SIZE as isize - 48)]);
        assert_eq!(&pool.bytes(&moved).unwrap()[..8], &[0xAB; 8]);
        assert_eq!(pool.validate(), Ok(()));
    }

    #[test]
    fn test_reallocate_left_shift_leaves_tail_available() {
        let mut backing = [0u8; POOL_SIZE];
        let mut pool: PacketPool<'_, 8> = PacketPool::new(&mut backing, 1).unwrap();
        pool.force_layout(&[-16, 24, -8, 16], true);

        let source = pool.handle_for(2);
        pool.bytes_mut(&source).unwrap().copy_from_slice(&[0x5A; 8]);

        // Virtual region = 24 + 8 + 16 = 48, capped at max 16.
        let moved = pool.reallocate(source, 8, 16).unwrap();
        assert_eq!(moved.len(), 16);
        assert_eq!(fragments(&pool)[..4], [-16, -16, 32, -(POOL_SIZE as isize - 64)]);
        assert_eq!(&pool.bytes(&moved).unwrap()[..8], &[0x5A; 8]);
        assert_eq!(pool.validate(), Ok(()));
    }
}
