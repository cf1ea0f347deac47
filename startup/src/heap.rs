use core::mem::size_of;
use core::ops::Range;
use core::sync::atomic::{AtomicBool, Ordering};

use linked_list_allocator::LockedHeap;

use crate::layout::{LayoutError, MemoryLayout};

#[cfg_attr(target_os = "none", global_allocator)]
static ALLOC: LockedHeap = LockedHeap::empty();

static READY: AtomicBool = AtomicBool::new(false);

/// Smallest region `Heap::init` accepts wherever it starts: one free-list hole
/// (two words) after the start is rounded up to word alignment.
pub const MIN_HEAP: usize = 3 * size_of::<usize>();

/// Claim `[start_heap, start_heap + size)` for the allocator. One-shot.
pub fn init_with(layout: &MemoryLayout, size: usize) -> Result<Range<usize>, LayoutError> {
    let region = layout.heap_region(size)?;
    if region.len() < MIN_HEAP {
        return Err(LayoutError::HeapTooSmall);
    }
    if READY.swap(true, Ordering::AcqRel) {
        return Err(LayoutError::HeapAlreadyInitialised);
    }
    unsafe { ALLOC.lock().init(region.start as *mut u8, region.len()) };
    Ok(region)
}

/// Heap of `size` bytes above `.bss`, bounded by the linker's stack top.
#[cfg(target_os = "none")]
pub fn init(size: usize) -> Result<(), LayoutError> {
    let region = init_with(&MemoryLayout::from_linker(), size)?;
    crate::kdebug!("heap 0x{:08x}..0x{:08x}", region.start, region.end);
    Ok(())
}

pub fn free_bytes() -> usize {
    ALLOC.lock().free()
}

#[cfg(test)]
mod tests {
    use super::*;
    use core::alloc::Layout;

    #[test]
    fn test_heap_init_once() {
        // The allocator is process-wide, so its backing store must outlive the test.
        let arena: &'static mut [u64] = std::vec![0u64; 512].leak();
        let base = arena.as_mut_ptr() as usize;
        let layout = MemoryLayout {
            start_heap: base,
            end_stack: base + arena.len() * 8,
            ..MemoryLayout::default()
        };

        assert_eq!(init_with(&layout, usize::MAX), Err(LayoutError::HeapTooLarge));
        assert_eq!(init_with(&layout, 0), Err(LayoutError::HeapTooSmall));
        assert_eq!(init_with(&layout, 4), Err(LayoutError::HeapTooSmall));
        assert_eq!(init_with(&layout, MIN_HEAP - 1), Err(LayoutError::HeapTooSmall));
        // Rejected sizes leave the heap claimable
        assert_eq!(init_with(&layout, 2048), Ok(base..base + 2048));
        assert_eq!(init_with(&layout, 1024), Err(LayoutError::HeapAlreadyInitialised));
        let free = free_bytes();
        assert!(free > 0 && free <= 2048);

        let req = Layout::from_size_align(64, 8).unwrap();
        let p = ALLOC.lock().allocate_first_fit(req).unwrap();
        assert!((base..base + 2048).contains(&(p.as_ptr() as usize)));
        assert!(free_bytes() < free);
        unsafe { ALLOC.lock().deallocate(p, req) };
    }
}
