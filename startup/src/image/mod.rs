//! Structural checks on a linked firmware image, using `goblin`.
//!
//! Nothing here can watch the hart run, so the reset contract is checked
//! from what the linker produced instead:
//! - the ELF entry is `_reset`, and `_reset` sits inside `.init`
//! - `_start`, `main` and every layout symbol are defined
//! - the symbol values form a valid [`MemoryLayout`]
//! - decoded, `_reset` loads `_global_pointer` into `gp` and `_end_stack`
//!   into `sp`, then calls `_start`
//! - `main` is reachable from `_start` through direct calls

use core::fmt;
use core::ops::Range;

use bootabi::{section, sym};
use goblin::elf::section_header::{SectionHeader, SHN_UNDEF, SHT_PROGBITS};
use goblin::elf::{header, Elf};

use crate::layout::{LayoutError, MemoryLayout};

mod calls;
mod decode;
#[cfg(test)]
mod testelf;

pub use calls::{CodeMap, ResetTrace};
pub use decode::Jump;

/// Symbols `MemoryLayout` is built from, in field order.
pub const LAYOUT_SYMBOLS: [&str; 8] = [
    sym::STORED_DATA,
    sym::START_DATA,
    sym::END_DATA,
    sym::START_BSS,
    sym::END_BSS,
    sym::START_HEAP,
    sym::END_STACK,
    sym::GLOBAL_POINTER,
];

#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum ImageError {
    Short,
    BadMagic,
    NotRiscv,
    MissingSymbol(&'static str),
    MissingInitSection,
    EntryNotReset { entry: u64, reset: u64 },
    ResetOutsideInit { reset: u64 },
    /// A section's address or file range runs past the end of its space.
    BadSection { addr: u64, size: u64 },
    /// `_reset` has no code bytes in the file.
    ResetUndecodable,
    ResetRegister { reg: &'static str, expected: u64, found: Option<u64> },
    ResetCall { expected: u64, found: Option<u64> },
    MainUnreachable,
    Layout(LayoutError),
}

impl From<LayoutError> for ImageError {
    fn from(e: LayoutError) -> Self {
        ImageError::Layout(e)
    }
}

impl fmt::Display for ImageError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ImageError::Short => f.write_str("file too short for an ELF header"),
            ImageError::BadMagic => f.write_str("not an ELF image"),
            ImageError::NotRiscv => f.write_str("ELF machine is not RISC-V"),
            ImageError::MissingSymbol(name) => write!(f, "symbol `{name}` is not defined"),
            ImageError::MissingInitSection => write!(f, "no `{}` section", section::INIT),
            ImageError::EntryNotReset { entry, reset } => {
                write!(f, "entry 0x{entry:08x} is not `_reset` (0x{reset:08x})")
            }
            ImageError::ResetOutsideInit { reset } => {
                write!(f, "`_reset` at 0x{reset:08x} is outside `{}`", section::INIT)
            }
            ImageError::BadSection { addr, size } => {
                write!(f, "section at 0x{addr:08x} with size 0x{size:x} is out of bounds")
            }
            ImageError::ResetUndecodable => f.write_str("`_reset` has no code in the image"),
            ImageError::ResetRegister { reg, expected, found: Some(v) } => {
                write!(f, "`_reset` leaves {reg}=0x{v:08x}, expected 0x{expected:08x}")
            }
            ImageError::ResetRegister { reg, expected, found: None } => {
                write!(f, "`_reset` does not load {reg} (expected 0x{expected:08x})")
            }
            ImageError::ResetCall { expected, found: Some(t) } => {
                write!(f, "`_reset` calls 0x{t:08x}, expected `_start` at 0x{expected:08x}")
            }
            ImageError::ResetCall { expected, found: None } => {
                write!(f, "`_reset` never calls `_start` (0x{expected:08x})")
            }
            ImageError::MainUnreachable => f.write_str("`main` is not called from `_start`"),
            ImageError::Layout(e) => write!(f, "layout: {e}"),
        }
    }
}

/// What the checker could read out of an image.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct ImageFacts {
    pub entry: u64,
    pub init: Option<Range<u64>>,
    pub reset: Option<u64>,
    pub start: Option<u64>,
    pub main: Option<u64>,
    pub start_vector: Option<u64>,
    /// Values of [`LAYOUT_SYMBOLS`], same order.
    pub layout_syms: [Option<u64>; 8],
    /// `None` when `_reset` is undefined or has no bytes in the file.
    pub reset_trace: Option<ResetTrace>,
    pub main_reached: bool,
}

impl ImageFacts {
    fn record(&mut self, name: &str, value: u64) {
        let slot = match name {
            sym::RESET => &mut self.reset,
            sym::START => &mut self.start,
            sym::ENTRY => &mut self.main,
            sym::START_VECTOR => &mut self.start_vector,
            _ => match LAYOUT_SYMBOLS.iter().position(|s| *s == name) {
                Some(i) => &mut self.layout_syms[i],
                None => return,
            },
        };
        *slot = Some(value);
    }

    pub fn layout(&self) -> Result<MemoryLayout, ImageError> {
        let mut v = [0usize; 8];
        for (i, slot) in self.layout_syms.iter().enumerate() {
            v[i] = slot.ok_or(ImageError::MissingSymbol(LAYOUT_SYMBOLS[i]))? as usize;
        }
        Ok(MemoryLayout {
            stored_data: v[0],
            start_data: v[1],
            end_data: v[2],
            start_bss: v[3],
            end_bss: v[4],
            start_heap: v[5],
            end_stack: v[6],
            global_pointer: v[7],
        })
    }

    pub fn verify(&self) -> Result<MemoryLayout, ImageError> {
        let reset = self.reset.ok_or(ImageError::MissingSymbol(sym::RESET))?;
        let start = self.start.ok_or(ImageError::MissingSymbol(sym::START))?;
        self.main.ok_or(ImageError::MissingSymbol(sym::ENTRY))?;
        let layout = self.layout()?;

        let init = self.init.clone().ok_or(ImageError::MissingInitSection)?;
        if self.entry != reset {
            return Err(ImageError::EntryNotReset { entry: self.entry, reset });
        }
        if !init.contains(&reset) {
            return Err(ImageError::ResetOutsideInit { reset });
        }

        layout.validate()?;

        let trace = self.reset_trace.ok_or(ImageError::ResetUndecodable)?;
        let loads = [
            ("gp", trace.gp, layout.global_pointer as u64),
            ("sp", trace.sp, layout.stack_top() as u64),
        ];
        for (reg, found, expected) in loads {
            if found != Some(expected) {
                return Err(ImageError::ResetRegister { reg, expected, found });
            }
        }
        match trace.call {
            Some(Jump { target: Some(t), link: true }) if t == start => {}
            other => {
                return Err(ImageError::ResetCall {
                    expected: start,
                    found: other.and_then(|j| j.target),
                })
            }
        }

        if !self.main_reached {
            return Err(ImageError::MainUnreachable);
        }
        Ok(layout)
    }
}

/// `[sh_addr, sh_addr + sh_size)`, if it fits the image's address space.
fn span(sh: &SectionHeader, is_64: bool) -> Result<Range<u64>, ImageError> {
    let bad = ImageError::BadSection { addr: sh.sh_addr, size: sh.sh_size };
    let end = sh.sh_addr.checked_add(sh.sh_size).ok_or(bad)?;
    if !is_64 && end > 1 << 32 {
        return Err(bad);
    }
    Ok(sh.sh_addr..end)
}

/// File bytes behind a `PROGBITS` section.
fn contents<'a>(image: &'a [u8], sh: &SectionHeader) -> Result<&'a [u8], ImageError> {
    let bad = ImageError::BadSection { addr: sh.sh_addr, size: sh.sh_size };
    let start = usize::try_from(sh.sh_offset).map_err(|_| bad)?;
    let len = usize::try_from(sh.sh_size).map_err(|_| bad)?;
    let end = start.checked_add(len).ok_or(bad)?;
    image.get(start..end).ok_or(bad)
}

pub fn inspect(image: &[u8]) -> Result<ImageFacts, ImageError> {
    if image.len() < header::header32::SIZEOF_EHDR {
        return Err(ImageError::Short);
    }
    let elf = Elf::parse(image).map_err(|_| ImageError::BadMagic)?;
    if elf.header.e_machine != header::EM_RISCV {
        return Err(ImageError::NotRiscv);
    }

    let mut facts = ImageFacts { entry: elf.header.e_entry, ..ImageFacts::default() };

    facts.init = elf
        .section_headers
        .iter()
        .find(|sh| elf.shdr_strtab.get_at(sh.sh_name) == Some(section::INIT))
        .map(|sh| span(sh, elf.is_64))
        .transpose()?;

    let mut code = CodeMap::new(elf.is_64);
    for sh in elf.section_headers.iter() {
        if sh.sh_type == SHT_PROGBITS && sh.is_executable() {
            span(sh, elf.is_64)?;
            code.add_code(sh.sh_addr, contents(image, sh)?);
        }
    }

    for s in elf.syms.iter() {
        if s.st_shndx == SHN_UNDEF as usize {
            continue;
        }
        if s.is_function() && s.st_size > 0 {
            if let Some(end) = s.st_value.checked_add(s.st_size) {
                code.add_func(s.st_value..end);
            }
        }
        if let Some(name) = elf.strtab.get_at(s.st_name) {
            facts.record(name, s.st_value);
        }
    }

    facts.reset_trace = facts.reset.and_then(|r| code.trace_reset(r));
    if let (Some(start), Some(main)) = (facts.start, facts.main) {
        facts.main_reached = code.reaches(start, main);
    }

    Ok(facts)
}
