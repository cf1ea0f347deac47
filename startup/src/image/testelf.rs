//! Hand-assembled RV32 images for the checker tests.

use std::vec::Vec;

use bootabi::sym;

/// Instruction encoders, enough for the code `_reset` and `_start` contain.
pub mod enc {
    /// `(hi20, lo12)` such that `(hi20 << 12) + sext(lo12) == off`.
    fn hi_lo(off: i32) -> (u32, u32) {
        let lo = (off << 20) >> 20;
        let hi = off.wrapping_sub(lo) as u32 >> 12;
        (hi, lo as u32 & 0xfff)
    }

    fn pcrel(pc: u64, target: u64) -> i32 {
        (target as u32).wrapping_sub(pc as u32) as i32
    }

    pub fn auipc(rd: usize, hi: u32) -> u32 {
        (hi << 12) | ((rd as u32) << 7) | 0x17
    }

    pub fn addi(rd: usize, rs1: usize, lo: u32) -> u32 {
        ((lo & 0xfff) << 20) | ((rs1 as u32) << 15) | ((rd as u32) << 7) | 0x13
    }

    pub fn jalr(rd: usize, rs1: usize, lo: u32) -> u32 {
        ((lo & 0xfff) << 20) | ((rs1 as u32) << 15) | ((rd as u32) << 7) | 0x67
    }

    pub fn jal(rd: usize, off: i32) -> u32 {
        let o = off as u32;
        (((o >> 20) & 1) << 31)
            | (((o >> 1) & 0x3ff) << 21)
            | (((o >> 11) & 1) << 20)
            | (((o >> 12) & 0xff) << 12)
            | ((rd as u32) << 7)
            | 0x6f
    }

    pub const RET: u32 = 0x0000_8067;
    pub const WFI: u32 = 0x1050_0073;

    /// `la rd, target` placed at `pc`.
    pub fn la(rd: usize, pc: u64, target: u64) -> [u32; 2] {
        let (hi, lo) = hi_lo(pcrel(pc, target));
        [auipc(rd, hi), addi(rd, rd, lo)]
    }

    /// `call target` placed at `pc`.
    pub fn call(pc: u64, target: u64) -> [u32; 2] {
        let (hi, lo) = hi_lo(pcrel(pc, target));
        [auipc(1, hi), jalr(1, 1, lo)]
    }
}

pub const INIT_ADDR: u64 = 0x2040_0000;
pub const RESET_ADDR: u64 = INIT_ADDR;
pub const START_ADDR: u64 = INIT_ADDR + 0x20;
pub const MAIN_ADDR: u64 = INIT_ADDR + 0x40;

const SHF_ALLOC_EXEC: u32 = 0x2 | 0x4;
const SHN_ABS: u16 = 0xfff1;

#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum Kind {
    /// Function in `.init`.
    Func,
    Abs,
    Undef,
}

#[derive(Clone, Debug)]
pub struct Sym {
    pub name: &'static str,
    pub value: u64,
    pub size: u64,
    pub kind: Kind,
}

/// An ELF32 executable with one code section, `.init`.
#[derive(Clone, Debug)]
pub struct Image {
    pub machine: u16,
    pub entry: u64,
    pub init_addr: u64,
    /// Written to the `.init` header instead of the real length.
    pub init_size: Option<u64>,
    pub code: Vec<u8>,
    pub syms: Vec<Sym>,
}

fn words(out: &mut Vec<u8>, ws: &[u32]) {
    for w in ws {
        out.extend_from_slice(&w.to_le_bytes());
    }
}

fn u16le(out: &mut Vec<u8>, v: u16) {
    out.extend_from_slice(&v.to_le_bytes());
}

fn u32le(out: &mut Vec<u8>, v: u32) {
    out.extend_from_slice(&v.to_le_bytes());
}

fn pad4(out: &mut Vec<u8>) {
    while out.len() % 4 != 0 {
        out.push(0);
    }
}

/// Append `s` NUL-terminated and return its offset.
fn intern(table: &mut Vec<u8>, s: &str) -> u32 {
    let at = table.len() as u32;
    table.extend_from_slice(s.as_bytes());
    table.push(0);
    at
}

impl Image {
    /// The image the reset contract expects: `_reset` sets up gp and sp and
    /// calls `_start`, which calls `main`, with the sifive_e layout.
    pub fn linked() -> Image {
        let mut code = Vec::new();
        words(&mut code, &enc::la(3, RESET_ADDR, 0x8000_0800));
        words(&mut code, &enc::la(2, RESET_ADDR + 8, 0x8000_4000));
        words(&mut code, &enc::call(RESET_ADDR + 16, START_ADDR));
        words(&mut code, &[enc::WFI, enc::jal(0, -4)]);
        assert_eq!(code.len() as u64, START_ADDR - INIT_ADDR);

        words(&mut code, &enc::call(START_ADDR, MAIN_ADDR));
        words(&mut code, &[enc::WFI, enc::jal(0, -4)]);
        code.resize((MAIN_ADDR - INIT_ADDR) as usize, 0);

        words(&mut code, &[enc::RET]);

        let abs = |name, value| Sym { name, value, size: 0, kind: Kind::Abs };
        let func = |name, value, size| Sym { name, value, size, kind: Kind::Func };
        Image {
            machine: 243,
            entry: RESET_ADDR,
            init_addr: INIT_ADDR,
            init_size: None,
            code,
            syms: vec![
                func(sym::RESET, RESET_ADDR, 0x20),
                func(sym::START, START_ADDR, 0x10),
                func(sym::ENTRY, MAIN_ADDR, 4),
                abs(sym::STORED_DATA, 0x2040_1200),
                abs(sym::START_DATA, 0x8000_0000),
                abs(sym::END_DATA, 0x8000_0040),
                abs(sym::START_BSS, 0x8000_0040),
                abs(sym::END_BSS, 0x8000_0180),
                abs(sym::START_HEAP, 0x8000_0180),
                abs(sym::END_STACK, 0x8000_4000),
                abs(sym::GLOBAL_POINTER, 0x8000_0800),
            ],
        }
    }

    /// Overwrite code at `addr` (inside `.init`) with `ws`.
    pub fn patch(&mut self, addr: u64, ws: &[u32]) {
        let mut at = (addr - self.init_addr) as usize;
        for w in ws {
            self.code[at..at + 4].copy_from_slice(&w.to_le_bytes());
            at += 4;
        }
    }

    pub fn sym_mut(&mut self, name: &str) -> &mut Sym {
        self.syms.iter_mut().find(|s| s.name == name).unwrap()
    }

    pub fn build(&self) -> Vec<u8> {
        const EHDR: usize = 52;
        let mut out = vec![0u8; EHDR];

        let code_off = out.len();
        out.extend_from_slice(&self.code);
        pad4(&mut out);

        let mut strtab = vec![0u8];
        let symtab_off = out.len();
        out.extend_from_slice(&[0u8; 16]);
        for s in &self.syms {
            let (info, shndx) = match s.kind {
                Kind::Func => (0x12, 1),
                Kind::Abs => (0x10, SHN_ABS),
                Kind::Undef => (0x10, 0),
            };
            u32le(&mut out, intern(&mut strtab, s.name));
            u32le(&mut out, s.value as u32);
            u32le(&mut out, s.size as u32);
            out.push(info);
            out.push(0);
            u16le(&mut out, shndx);
        }
        let symtab_len = out.len() - symtab_off;

        let strtab_off = out.len();
        out.extend_from_slice(&strtab);

        let mut shstrtab = vec![0u8];
        let names = [".init", ".symtab", ".strtab", ".shstrtab"].map(|n| intern(&mut shstrtab, n));
        let shstrtab_off = out.len();
        out.extend_from_slice(&shstrtab);
        pad4(&mut out);

        let shoff = out.len();
        let init_size = self.init_size.unwrap_or(self.code.len() as u64) as u32;
        // name, type, flags, addr, offset, size, link, info, align, entsize
        let headers: [[u32; 10]; 5] = [
            [0; 10],
            [names[0], 1, SHF_ALLOC_EXEC, self.init_addr as u32, code_off as u32, init_size, 0, 0, 4, 0],
            [names[1], 2, 0, 0, symtab_off as u32, symtab_len as u32, 3, 1, 4, 16],
            [names[2], 3, 0, 0, strtab_off as u32, strtab.len() as u32, 0, 0, 1, 0],
            [names[3], 3, 0, 0, shstrtab_off as u32, shstrtab.len() as u32, 0, 0, 1, 0],
        ];
        for h in &headers {
            for f in h {
                u32le(&mut out, *f);
            }
        }

        let mut ehdr = Vec::with_capacity(EHDR);
        ehdr.extend_from_slice(&[0x7f, b'E', b'L', b'F', 1, 1, 1, 0]);
        ehdr.extend_from_slice(&[0; 8]);
        u16le(&mut ehdr, 2);
        u16le(&mut ehdr, self.machine);
        u32le(&mut ehdr, 1);
        u32le(&mut ehdr, self.entry as u32);
        u32le(&mut ehdr, 0);
        u32le(&mut ehdr, shoff as u32);
        u32le(&mut ehdr, 0);
        u16le(&mut ehdr, EHDR as u16);
        u16le(&mut ehdr, 32);
        u16le(&mut ehdr, 0);
        u16le(&mut ehdr, 40);
        u16le(&mut ehdr, headers.len() as u16);
        u16le(&mut ehdr, 4);
        out[..EHDR].copy_from_slice(&ehdr);
        out
    }
}
