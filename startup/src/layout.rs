//! Memory layout handed over by the linker script.
//!
//! The firmware never computes these addresses itself. `from_linker` reads the
//! symbol addresses on target, and host tools rebuild the same struct from an
//! ELF symbol table, so both sides run the same `validate`.

use core::fmt;
use core::ops::Range;

use bootabi::{GP_REACH, STACK_ALIGN};

const WORD: usize = core::mem::size_of::<u32>();

#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum LayoutError {
    DataInverted,
    BssInverted,
    BssOverlapsData,
    HeapOverlapsBss,
    StackBelowHeap,
    StackMisaligned,
    WordMisaligned,
    GlobalPointerOutOfRange,
    HeapTooLarge,
    HeapTooSmall,
    HeapAlreadyInitialised,
}

impl fmt::Display for LayoutError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let msg = match self {
            LayoutError::DataInverted => ".data ends before it starts",
            LayoutError::BssInverted => ".bss ends before it starts",
            LayoutError::BssOverlapsData => ".bss overlaps .data",
            LayoutError::HeapOverlapsBss => "heap starts inside .bss",
            LayoutError::StackBelowHeap => "stack top is below heap start",
            LayoutError::StackMisaligned => "stack top is not 16-byte aligned",
            LayoutError::WordMisaligned => "data/bss bound is not word aligned",
            LayoutError::GlobalPointerOutOfRange => "global pointer cannot reach small data",
            LayoutError::HeapTooLarge => "heap would run past the stack top",
            LayoutError::HeapTooSmall => "heap too small for the allocator",
            LayoutError::HeapAlreadyInitialised => "heap already initialised",
        };
        f.write_str(msg)
    }
}

#[derive(Copy, Clone, Debug, Default, Eq, PartialEq)]
pub struct MemoryLayout {
    /// Load address of `.data` (flash image).
    pub stored_data: usize,
    pub start_data: usize,
    pub end_data: usize,
    pub start_bss: usize,
    pub end_bss: usize,
    pub start_heap: usize,
    pub end_stack: usize,
    pub global_pointer: usize,
}

impl MemoryLayout {
    /// Snapshot of the linker symbols this image was linked with.
    #[cfg(target_os = "none")]
    pub fn from_linker() -> Self {
        extern "C" {
            static _stored_data: u32;
            static _start_data: u32;
            static _end_data: u32;
            static _start_bss: u32;
            static _end_bss: u32;
            static _start_heap: u32;
            static _end_stack: u32;
            static _global_pointer: u32;
        }

        // Only the addresses are used; the symbols name no real objects.
        unsafe {
            MemoryLayout {
                stored_data: &raw const _stored_data as usize,
                start_data: &raw const _start_data as usize,
                end_data: &raw const _end_data as usize,
                start_bss: &raw const _start_bss as usize,
                end_bss: &raw const _end_bss as usize,
                start_heap: &raw const _start_heap as usize,
                end_stack: &raw const _end_stack as usize,
                global_pointer: &raw const _global_pointer as usize,
            }
        }
    }

    #[inline]
    pub fn data_range(&self) -> Range<usize> {
        self.start_data..self.end_data
    }

    #[inline]
    pub fn bss_range(&self) -> Range<usize> {
        self.start_bss..self.end_bss
    }

    #[inline]
    pub fn data_len(&self) -> usize {
        self.end_data.saturating_sub(self.start_data)
    }

    #[inline]
    pub fn bss_len(&self) -> usize {
        self.end_bss.saturating_sub(self.start_bss)
    }

    /// Value `sp` holds right after reset.
    #[inline]
    pub fn stack_top(&self) -> usize {
        self.end_stack
    }

    /// XIP images keep initialised data in flash; RAM-only images load it in place.
    #[inline]
    pub fn needs_data_copy(&self) -> bool {
        self.stored_data != self.start_data && self.data_len() != 0
    }

    pub fn validate(&self) -> Result<(), LayoutError> {
        if self.start_data > self.end_data {
            return Err(LayoutError::DataInverted);
        }
        if self.start_bss > self.end_bss {
            return Err(LayoutError::BssInverted);
        }
        if self.end_data > self.start_bss {
            return Err(LayoutError::BssOverlapsData);
        }
        if self.end_bss > self.start_heap {
            return Err(LayoutError::HeapOverlapsBss);
        }
        if self.start_heap > self.end_stack {
            return Err(LayoutError::StackBelowHeap);
        }
        if self.end_stack % STACK_ALIGN != 0 {
            return Err(LayoutError::StackMisaligned);
        }
        let words = [
            self.stored_data,
            self.start_data,
            self.end_data,
            self.start_bss,
            self.end_bss,
        ];
        if words.iter().any(|a| a % WORD != 0) {
            return Err(LayoutError::WordMisaligned);
        }
        let gp_hi = self.end_bss.saturating_add(GP_REACH);
        if self.global_pointer < self.start_data || self.global_pointer > gp_hi {
            return Err(LayoutError::GlobalPointerOutOfRange);
        }
        Ok(())
    }

    /// Heap of `size` bytes starting at `_start_heap`, bounded by the stack top.
    pub fn heap_region(&self, size: usize) -> Result<Range<usize>, LayoutError> {
        let end = self
            .start_heap
            .checked_add(size)
            .ok_or(LayoutError::HeapTooLarge)?;
        if end > self.end_stack {
            return Err(LayoutError::HeapTooLarge);
        }
        Ok(self.start_heap..end)
    }
}
