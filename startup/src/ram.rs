//! Pre-main RAM initialisation: copy `.data` out of flash, zero `.bss`.
//!
//! Runs before any Rust static is trusted, so everything here goes through
//! volatile word accesses and never touches a static of its own.

use core::ops::Range;
use core::ptr;

use crate::layout::{LayoutError, MemoryLayout};

/// Copy words from `src` into `[dst, end)`.
///
/// # Safety
///
/// `src` must be readable for as many words as `[dst, end)` spans, both
/// ranges must be word aligned, and the destination must be writable.
#[inline(always)]
pub unsafe fn copy_words(mut src: *const u32, mut dst: *mut u32, end: *mut u32) {
    while dst < end {
        unsafe {
            ptr::write_volatile(dst, ptr::read_volatile(src));
            src = src.add(1);
            dst = dst.add(1);
        }
    }
}

/// Zero the words in `[start, end)`.
///
/// # Safety
///
/// The range must be word aligned and writable.
#[inline(always)]
pub unsafe fn zero_words(mut start: *mut u32, end: *mut u32) {
    while start < end {
        unsafe {
            ptr::write_volatile(start, 0);
            start = start.add(1);
        }
    }
}

/// RAM work for one layout: where `.data` comes from and goes, and the
/// `.bss` range to clear.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Plan {
    /// Load address and destination. `None` when `.data` is empty or already
    /// runs from where it was loaded.
    pub copy: Option<(usize, Range<usize>)>,
    pub zero: Range<usize>,
}

/// Validate `layout` and work out what [`init`] has to do.
pub fn plan(layout: &MemoryLayout) -> Result<Plan, LayoutError> {
    layout.validate()?;
    Ok(Plan {
        copy: layout.needs_data_copy().then(|| (layout.stored_data, layout.data_range())),
        zero: layout.bss_range(),
    })
}

/// Carry out `plan`.
///
/// # Safety
///
/// Every address in `plan` must be valid for the access it gets, and
/// nothing may hold references into the destination ranges.
pub unsafe fn apply(plan: &Plan) {
    if let Some((from, to)) = &plan.copy {
        unsafe { copy_words(*from as *const u32, to.start as *mut u32, to.end as *mut u32) };
    }
    unsafe { zero_words(plan.zero.start as *mut u32, plan.zero.end as *mut u32) };
}

/// Equivalent of crt0's data/bss setup. An invalid layout is reported
/// without a single word of RAM written.
///
/// # Safety
///
/// - Must run once, from `_start`, before anything reads a static.
/// - Only a single hart may be running.
/// - `layout` must describe this image's real memory.
pub unsafe fn init(layout: &MemoryLayout) -> Result<(), LayoutError> {
    let plan = plan(layout)?;
    unsafe { apply(&plan) };
    Ok(())
}
