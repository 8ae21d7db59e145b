//! Retained log region.
//!
//! A physically contiguous block reserved once at init and never freed. If
//! the platform keeps RAM alive across a warm reset (or the block sits in
//! battery-backed SRAM), a record sealed here before the reset is still there
//! when the next kernel boots.
//!
//! The region is shared between the system fault module and the exception
//! reporter, which writes diagnostic text into the payload area through a
//! raw pointer while a panic is in progress. Header mutations go through a
//! [`RegionClaim`], a non-blocking exclusion flag that is safe to take from
//! a panic or exception context.

use core::ptr::{self, NonNull};
use core::sync::atomic::{fence, AtomicBool, Ordering};

use super::error::BboxError;
use super::record::{self, FaultLogHeader, HEADER_SIZE, TAG_LEN};
use crate::memory::{pages_for, ContiguousPageAllocator, PAGE_SIZE};

/// Upper bound on candidates held by the overlap heuristic at once.
pub const MAX_OVERLAP_COUNT: usize = 64;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum RegionOrigin {
    /// Pages from the contiguous page allocator
    Allocated,
    /// Platform carve-out (.noinit, backup SRAM); never returned
    Reserved,
}

pub struct RetainedLogRegion {
    base: NonNull<u8>,
    capacity: usize,
    pages: usize,
    origin: RegionOrigin,
    claimed: AtomicBool,
}

// SAFETY: the region is exclusively owned by the blackbox for the life of
// the kernel and every header mutation is serialized by `claimed`.
unsafe impl Send for RetainedLogRegion {}
unsafe impl Sync for RetainedLogRegion {}

impl RetainedLogRegion {
    /// Acquire a contiguous block of at least `capacity` bytes, rounded up
    /// to whole pages.
    ///
    /// Fails with `InvalidArgument` if `capacity` is smaller than the header
    /// or too large to describe in pages.
    ///
    /// An alignment-aware allocation is tried first. Allocators that cannot
    /// honour an alignment get the overlap heuristic instead: take
    /// `overlap_count` blocks back to back, keep the most recent one and give
    /// the rest back. On the allocator this was tuned for, the last of a long
    /// run of allocations lands on a well-aligned address, which the cache
    /// flush relies on. It is a heuristic; nothing guarantees the alignment.
    pub fn acquire(
        allocator: &dyn ContiguousPageAllocator,
        capacity: usize,
        overlap_count: usize,
    ) -> Result<Self, BboxError> {
        if capacity < HEADER_SIZE {
            return Err(BboxError::InvalidArgument);
        }
        let pages = pages_for(capacity).ok_or(BboxError::InvalidArgument)?;
        let align = pages
            .checked_next_power_of_two()
            .and_then(|p| p.checked_mul(PAGE_SIZE))
            .ok_or(BboxError::InvalidArgument)?;
        if let Some(base) = allocator.alloc_contiguous_aligned(pages, align) {
            log::debug!("blackbox: aligned log region at {:p} ({} pages)", base, pages);
            return Ok(Self::allocated(base, capacity, pages));
        }

        let attempts = overlap_count.clamp(1, MAX_OVERLAP_COUNT);
        if attempts != overlap_count {
            log::warn!(
                "blackbox: overlap count {} clamped to {}",
                overlap_count,
                attempts
            );
        }

        let mut candidates: [Option<NonNull<u8>>; MAX_OVERLAP_COUNT] = [None; MAX_OVERLAP_COUNT];
        for slot in candidates.iter_mut().take(attempts) {
            *slot = allocator.alloc_contiguous(pages);
        }

        let keep = candidates[..attempts].iter().rposition(Option::is_some);
        for (idx, candidate) in candidates[..attempts].iter().enumerate() {
            if Some(idx) == keep {
                continue;
            }
            if let Some(addr) = *candidate {
                // SAFETY: allocated above with the same page count and never
                // handed out.
                unsafe { allocator.free_contiguous(addr, pages) };
            }
        }

        match keep.and_then(|idx| candidates[idx]) {
            Some(base) => {
                log::debug!(
                    "blackbox: log region at {:p} after {} attempts (aligned: {})",
                    base,
                    attempts,
                    base.as_ptr() as usize % align == 0
                );
                Ok(Self::allocated(base, capacity, pages))
            }
            None => Err(BboxError::NoMemory),
        }
    }

    /// Adopt a platform-reserved block instead of allocating one.
    ///
    /// # Safety
    ///
    /// `base` must point to at least `capacity` bytes that nothing else uses
    /// for the rest of the kernel's life, and `capacity` must be at least
    /// `HEADER_SIZE`.
    pub unsafe fn from_reserved(base: NonNull<u8>, capacity: usize) -> Self {
        debug_assert!(capacity >= HEADER_SIZE);
        Self {
            base,
            capacity,
            // Only used to free allocated regions
            pages: pages_for(capacity).unwrap_or(0),
            origin: RegionOrigin::Reserved,
            claimed: AtomicBool::new(false),
        }
    }

    fn allocated(base: NonNull<u8>, capacity: usize, pages: usize) -> Self {
        Self {
            base,
            capacity,
            pages,
            origin: RegionOrigin::Allocated,
            claimed: AtomicBool::new(false),
        }
    }

    /// Give allocated pages back when initialization fails after the region
    /// was published. Reserved regions keep their memory.
    ///
    /// The claim is taken and never released, so every later mutation
    /// reports `Busy`. Fails with `Busy`, freeing nothing, if another
    /// context holds the claim.
    ///
    /// # Safety
    ///
    /// Nothing may read the header or payload after this returns, and the
    /// exception reporter must no longer hold a hook into the region.
    pub unsafe fn retire(&self, allocator: &dyn ContiguousPageAllocator) -> Result<(), BboxError> {
        let claim = self.try_claim()?;
        core::mem::forget(claim);
        if self.origin == RegionOrigin::Allocated {
            // SAFETY: the pages came from `allocator` in `acquire`; the caller
            // guarantees no access follows.
            unsafe { allocator.free_contiguous(self.base, self.pages) };
        }
        Ok(())
    }

    pub fn base(&self) -> NonNull<u8> {
        self.base
    }

    /// Usable bytes, header included.
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn pages(&self) -> usize {
        self.pages
    }

    /// `[start, end)` virtual address range of the region.
    pub fn address_range(&self) -> (usize, usize) {
        let start = self.base.as_ptr() as usize;
        (start, start + self.capacity)
    }

    /// Start of the diagnostic payload, just past the header.
    pub fn payload_ptr(&self) -> NonNull<u8> {
        // SAFETY: capacity >= HEADER_SIZE, so the offset stays in bounds.
        unsafe { NonNull::new_unchecked(self.base.as_ptr().add(HEADER_SIZE)) }
    }

    pub fn payload_capacity(&self) -> usize {
        record::max_payload(self.capacity)
    }

    /// Read and validate the header.
    pub fn read_header(&self) -> Option<FaultLogHeader> {
        let mut bytes = [0u8; HEADER_SIZE];
        // SAFETY: the region holds at least HEADER_SIZE bytes.
        unsafe { ptr::copy_nonoverlapping(self.base.as_ptr(), bytes.as_mut_ptr(), HEADER_SIZE) };
        FaultLogHeader::decode(&bytes)
    }

    /// The first `len` payload bytes, clamped to the payload capacity.
    ///
    /// The exception reporter may still be writing into the payload while a
    /// panic is in progress; callers only read it from ordinary contexts.
    pub fn payload(&self, len: usize) -> &[u8] {
        let len = record::clamp_payload_len(len, self.capacity);
        // SAFETY: in bounds by the clamp above; the region lives forever.
        unsafe { core::slice::from_raw_parts(self.payload_ptr().as_ptr(), len) }
    }

    /// Take exclusive write access to the header without blocking.
    pub fn try_claim(&self) -> Result<RegionClaim<'_>, BboxError> {
        if self.claimed.swap(true, Ordering::Acquire) {
            return Err(BboxError::Busy);
        }
        Ok(RegionClaim { region: self })
    }
}

/// Exclusive write access to the region, released on drop.
pub struct RegionClaim<'a> {
    region: &'a RetainedLogRegion,
}

impl RegionClaim<'_> {
    /// Zero the header so the region no longer reads as a valid record.
    /// The payload is left alone.
    pub fn clear_header(&mut self) {
        // SAFETY: header bytes are in bounds and we hold the claim.
        unsafe { ptr::write_bytes(self.region.base.as_ptr(), 0, HEADER_SIZE) };
        fence(Ordering::Release);
    }

    /// Write `header` so that the tag becomes visible last.
    ///
    /// The body (length and error info) is stored first, then a release
    /// fence, then the tag. A reader that sees the tag therefore sees the
    /// matching body.
    pub fn seal(&mut self, header: &FaultLogHeader) {
        let bytes = header.encode();
        let base = self.region.base.as_ptr();
        // SAFETY: both copies stay inside the header; we hold the claim.
        unsafe {
            ptr::write_bytes(base, 0, TAG_LEN);
            ptr::copy_nonoverlapping(bytes[TAG_LEN..].as_ptr(), base.add(TAG_LEN), HEADER_SIZE - TAG_LEN);
        }
        fence(Ordering::Release);
        // SAFETY: the tag lies at the start of the header; we hold the claim.
        unsafe { ptr::copy_nonoverlapping(bytes.as_ptr(), base, TAG_LEN) };
        fence(Ordering::Release);
    }

    /// Zero the whole region, header and payload.
    pub fn zero(&mut self) {
        // SAFETY: the whole region is ours while the claim is held.
        unsafe { ptr::write_bytes(self.region.base.as_ptr(), 0, self.region.capacity) };
        fence(Ordering::Release);
    }
}

impl Drop for RegionClaim<'_> {
    fn drop(&mut self) {
        self.region.claimed.store(false, Ordering::Release);
    }
}
