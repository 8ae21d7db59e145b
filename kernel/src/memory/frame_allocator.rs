use core::ptr::NonNull;

/// Contiguous physical page allocator.
///
/// Addresses handed out are kernel-virtual pointers into the direct map of
/// the allocated physical pages; the pages stay mapped and fixed in place
/// until they are freed.
pub trait ContiguousPageAllocator: Sync {
    /// Allocate `pages` physically contiguous pages.
    fn alloc_contiguous(&self, pages: usize) -> Option<NonNull<u8>>;

    /// Allocate `pages` physically contiguous pages starting on an `align`
    /// byte boundary.
    ///
    /// Allocators without alignment control keep the default, which reports
    /// that no such block is available.
    fn alloc_contiguous_aligned(&self, pages: usize, align: usize) -> Option<NonNull<u8>> {
        let _ = (pages, align);
        None
    }

    /// Return pages obtained from one of the allocation methods.
    ///
    /// # Safety
    ///
    /// `addr` must come from this allocator with the same `pages` count and
    /// must not be used after this call.
    unsafe fn free_contiguous(&self, addr: NonNull<u8>, pages: usize);
}
