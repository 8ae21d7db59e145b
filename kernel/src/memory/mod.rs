//! Page granularity helpers and the physical page allocator contract.

pub mod frame_allocator;

pub use frame_allocator::ContiguousPageAllocator;

/// Page size used for all contiguous allocations (4 KiB).
pub const PAGE_SIZE: usize = 4096;

/// log2(PAGE_SIZE)
pub const PAGE_SHIFT: usize = 12;

const _: () = assert!(1 << PAGE_SHIFT == PAGE_SIZE, "PAGE_SHIFT does not match PAGE_SIZE");

/// Round `value` up to the next multiple of `align` (a power of two).
/// `None` if the result does not fit in a `usize`.
#[inline]
pub const fn round_up(value: usize, align: usize) -> Option<usize> {
    match value.checked_add(align - 1) {
        Some(v) => Some(v & !(align - 1)),
        None => None,
    }
}

/// Number of pages needed to hold `bytes`.
#[inline]
pub const fn pages_for(bytes: usize) -> Option<usize> {
    match round_up(bytes, PAGE_SIZE) {
        Some(v) => Some(v >> PAGE_SHIFT),
        None => None,
    }
}
