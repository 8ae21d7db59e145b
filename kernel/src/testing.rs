//! Host-side stand-ins for the kernel services the blackbox depends on.

use std::alloc::{alloc, dealloc, Layout};
use std::collections::HashMap;
use std::ptr::NonNull;
use std::sync::atomic::{AtomicBool, AtomicU32, AtomicUsize, Ordering};
use std::sync::Mutex;

use crate::arch_impl::CacheMaintenance;
use crate::blackbox::{
    BboxError, EventUploader, ExcHook, ExcInfoReporter, LogStore, ModuleOps, ModuleRegistry,
    Platform,
};
use crate::memory::{ContiguousPageAllocator, PAGE_SIZE};

/// Bytes past the end of every block that must never be written.
pub const GUARD_LEN: usize = 256;
const GUARD_BYTE: u8 = 0xA5;
/// Fresh pages look like uninitialized RAM, not zeroes.
const FILL_BYTE: u8 = 0xCC;

struct Block {
    addr: usize,
    pages: usize,
    layout: Layout,
}

#[derive(Default)]
struct PoolState {
    live: Vec<Block>,
    successes: usize,
    last: Option<usize>,
    alloc_calls: usize,
    free_calls: usize,
}

/// Page allocator backed by the host heap, with a guard tail on every block.
pub struct PagePool {
    state: Mutex<PoolState>,
    limit: Option<usize>,
    aligned: bool,
}

impl PagePool {
    fn build(limit: Option<usize>, aligned: bool) -> Self {
        Self {
            state: Mutex::new(PoolState::default()),
            limit,
            aligned,
        }
    }

    pub fn new() -> Self {
        Self::build(None, false)
    }

    /// Only the first `n` allocations succeed.
    pub fn with_limit(n: usize) -> Self {
        Self::build(Some(n), false)
    }

    /// Supports `alloc_contiguous_aligned`.
    pub fn aligned() -> Self {
        Self::build(None, true)
    }

    fn allocate(&self, pages: usize, align: usize) -> Option<NonNull<u8>> {
        let mut state = self.state.lock().unwrap();
        state.alloc_calls += 1;
        if self.limit.is_some_and(|limit| state.successes >= limit) {
            return None;
        }

        let size = pages * PAGE_SIZE;
        let layout = Layout::from_size_align(size + GUARD_LEN, align).unwrap();
        let ptr = NonNull::new(unsafe { alloc(layout) })?;
        unsafe {
            std::ptr::write_bytes(ptr.as_ptr(), FILL_BYTE, size);
            std::ptr::write_bytes(ptr.as_ptr().add(size), GUARD_BYTE, GUARD_LEN);
        }

        let addr = ptr.as_ptr() as usize;
        state.live.push(Block { addr, pages, layout });
        state.successes += 1;
        state.last = Some(addr);
        Some(ptr)
    }

    pub fn alloc_calls(&self) -> usize {
        self.state.lock().unwrap().alloc_calls
    }

    pub fn free_calls(&self) -> usize {
        self.state.lock().unwrap().free_calls
    }

    /// Blocks currently allocated.
    pub fn live(&self) -> usize {
        self.state.lock().unwrap().live.len()
    }

    pub fn last_allocated(&self) -> Option<usize> {
        self.state.lock().unwrap().last
    }

    pub fn owns(&self, addr: usize) -> bool {
        self.state.lock().unwrap().live.iter().any(|b| b.addr == addr)
    }

    /// True if the guard tail of the live block at `addr` is untouched.
    pub fn guard_intact(&self, addr: usize) -> bool {
        let state = self.state.lock().unwrap();
        let block = state
            .live
            .iter()
            .find(|b| b.addr == addr)
            .expect("guard check on unknown block");
        let guard = unsafe {
            std::slice::from_raw_parts((addr + block.pages * PAGE_SIZE) as *const u8, GUARD_LEN)
        };
        guard.iter().all(|&b| b == GUARD_BYTE)
    }
}

impl ContiguousPageAllocator for PagePool {
    fn alloc_contiguous(&self, pages: usize) -> Option<NonNull<u8>> {
        self.allocate(pages, PAGE_SIZE)
    }

    fn alloc_contiguous_aligned(&self, pages: usize, align: usize) -> Option<NonNull<u8>> {
        if !self.aligned {
            return None;
        }
        self.allocate(pages, align)
    }

    unsafe fn free_contiguous(&self, addr: NonNull<u8>, pages: usize) {
        let mut state = self.state.lock().unwrap();
        state.free_calls += 1;
        let idx = state
            .live
            .iter()
            .position(|b| b.addr == addr.as_ptr() as usize)
            .expect("free of a block that is not live");
        let block = state.live.swap_remove(idx);
        assert_eq!(block.pages, pages, "freed with a different page count");
        dealloc(addr.as_ptr(), block.layout);
    }
}

impl Drop for PagePool {
    fn drop(&mut self) {
        let state = self.state.get_mut().unwrap();
        for block in state.live.drain(..) {
            unsafe { dealloc(block.addr as *mut u8, block.layout) };
        }
    }
}

/// Exception reporter that keeps the registered hook and writes into it on
/// demand.
pub struct FakeReporter {
    hook: Mutex<Option<ExcHook>>,
    captured: AtomicU32,
    registrations: AtomicUsize,
    unregistrations: AtomicUsize,
}

impl FakeReporter {
    pub fn new() -> Self {
        Self {
            hook: Mutex::new(None),
            captured: AtomicU32::new(0),
            registrations: AtomicUsize::new(0),
            unregistrations: AtomicUsize::new(0),
        }
    }

    pub fn hook(&self) -> Option<ExcHook> {
        *self.hook.lock().unwrap()
    }

    /// Report `len` captured bytes without writing any.
    pub fn set_captured(&self, len: u32) {
        self.captured.store(len, Ordering::SeqCst);
    }

    /// Capture `text` the way the reporter does during a panic: as much as
    /// fits goes into the hook's buffer, the full length is reported.
    pub fn emit(&self, text: &[u8]) {
        let hook = self.hook().expect("no hook registered");
        let n = text.len().min(hook.max_len as usize);
        unsafe {
            let dst = hook.buf.as_ptr().add(hook.offset as usize);
            std::ptr::copy_nonoverlapping(text.as_ptr(), dst, n);
        }
        self.set_captured(u32::try_from(text.len()).unwrap());
    }

    pub fn registrations(&self) -> usize {
        self.registrations.load(Ordering::SeqCst)
    }

    pub fn unregistrations(&self) -> usize {
        self.unregistrations.load(Ordering::SeqCst)
    }
}

impl ExcInfoReporter for FakeReporter {
    fn register_hook(&self, hook: ExcHook) {
        self.registrations.fetch_add(1, Ordering::SeqCst);
        *self.hook.lock().unwrap() = Some(hook);
    }

    fn unregister_hook(&self) {
        self.unregistrations.fetch_add(1, Ordering::SeqCst);
        *self.hook.lock().unwrap() = None;
    }

    fn captured_len(&self) -> u32 {
        self.captured.load(Ordering::SeqCst)
    }
}

/// In-memory filesystem.
pub struct MemStore {
    files: Mutex<HashMap<String, Vec<u8>>>,
    failing: AtomicBool,
    writes: AtomicUsize,
}

impl MemStore {
    pub fn new() -> Self {
        Self {
            files: Mutex::new(HashMap::new()),
            failing: AtomicBool::new(false),
            writes: AtomicUsize::new(0),
        }
    }

    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    /// Write attempts, failed ones included.
    pub fn writes(&self) -> usize {
        self.writes.load(Ordering::SeqCst)
    }

    pub fn file(&self, path: &str) -> Option<Vec<u8>> {
        self.files.lock().unwrap().get(path).cloned()
    }
}

impl LogStore for MemStore {
    fn full_write_file(&self, path: &str, data: &[u8], append: bool) -> Result<(), BboxError> {
        self.writes.fetch_add(1, Ordering::SeqCst);
        if self.failing.load(Ordering::SeqCst) {
            return Err(BboxError::Io);
        }
        let mut files = self.files.lock().unwrap();
        let file = files.entry(path.to_string()).or_default();
        if !append {
            file.clear();
        }
        file.extend_from_slice(data);
        Ok(())
    }
}

pub struct RecordingUploader {
    paths: Mutex<Vec<String>>,
    failing: AtomicBool,
}

impl RecordingUploader {
    pub fn new() -> Self {
        Self {
            paths: Mutex::new(Vec::new()),
            failing: AtomicBool::new(false),
        }
    }

    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    /// Upload attempts in order, failed ones included.
    pub fn paths(&self) -> Vec<String> {
        self.paths.lock().unwrap().clone()
    }
}

impl EventUploader for RecordingUploader {
    fn upload_event_by_file(&self, path: &str) -> Result<(), BboxError> {
        self.paths.lock().unwrap().push(path.to_string());
        if self.failing.load(Ordering::SeqCst) {
            return Err(BboxError::Upload);
        }
        Ok(())
    }
}

pub struct RecordingCache {
    ranges: Mutex<Vec<(usize, usize)>>,
}

impl RecordingCache {
    pub fn new() -> Self {
        Self {
            ranges: Mutex::new(Vec::new()),
        }
    }

    pub fn ranges(&self) -> Vec<(usize, usize)> {
        self.ranges.lock().unwrap().clone()
    }
}

impl CacheMaintenance for RecordingCache {
    fn flush_range(&self, start: usize, end: usize) {
        self.ranges.lock().unwrap().push((start, end));
    }
}

pub struct RecordingRegistry {
    modules: Mutex<Vec<&'static dyn ModuleOps>>,
    notifications: Mutex<Vec<(String, String, String, u32)>>,
    refusing: AtomicBool,
}

impl RecordingRegistry {
    pub fn new() -> Self {
        Self {
            modules: Mutex::new(Vec::new()),
            notifications: Mutex::new(Vec::new()),
            refusing: AtomicBool::new(false),
        }
    }

    pub fn set_refusing(&self, refusing: bool) {
        self.refusing.store(refusing, Ordering::SeqCst);
    }

    pub fn modules(&self) -> Vec<String> {
        self.modules
            .lock()
            .unwrap()
            .iter()
            .map(|ops| ops.module().to_string())
            .collect()
    }

    pub fn find(&self, name: &str) -> Option<&'static dyn ModuleOps> {
        self.modules
            .lock()
            .unwrap()
            .iter()
            .copied()
            .find(|ops| ops.module() == name)
    }

    pub fn notifications(&self) -> Vec<(String, String, String, u32)> {
        self.notifications.lock().unwrap().clone()
    }
}

impl ModuleRegistry for RecordingRegistry {
    fn register_module_ops(&self, ops: &'static dyn ModuleOps) -> Result<(), BboxError> {
        if self.refusing.load(Ordering::SeqCst) {
            return Err(BboxError::Registry);
        }
        self.modules.lock().unwrap().push(ops);
        Ok(())
    }

    fn notify_error(
        &self,
        event: &str,
        module: &str,
        error_desc: &str,
        need_sys_reset: u32,
    ) -> Result<(), BboxError> {
        if self.find(module).is_none() {
            return Err(BboxError::Registry);
        }
        self.notifications.lock().unwrap().push((
            event.to_string(),
            module.to_string(),
            error_desc.to_string(),
            need_sys_reset,
        ));
        Ok(())
    }
}

/// Every collaborator, wired together.
pub struct Rig {
    pub pool: PagePool,
    pub reporter: FakeReporter,
    pub store: MemStore,
    pub uploader: RecordingUploader,
    pub cache: RecordingCache,
}

impl Rig {
    pub fn new() -> Self {
        Self::with_pool(PagePool::new())
    }

    pub fn with_page_limit(n: usize) -> Self {
        Self::with_pool(PagePool::with_limit(n))
    }

    fn with_pool(pool: PagePool) -> Self {
        Self {
            pool,
            reporter: FakeReporter::new(),
            store: MemStore::new(),
            uploader: RecordingUploader::new(),
            cache: RecordingCache::new(),
        }
    }

    pub fn platform(&self) -> Platform<'_> {
        Platform {
            pages: &self.pool,
            exc: &self.reporter,
            store: &self.store,
            uploader: &self.uploader,
            cache: &self.cache,
        }
    }

    /// For tests that install into a `'static` module.
    pub fn leak(self) -> &'static Self {
        Box::leak(Box::new(self))
    }
}
