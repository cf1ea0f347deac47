//! Just enough RISC-V decoding to follow address materialisation and calls.
//!
//! The tracker knows register values built by `lui`/`auipc`/`addi` and the
//! link value written by jumps. Any other instruction that writes a register
//! makes that register unknown. Nothing is executed; straight-line code is
//! walked in address order.

const LUI: u32 = 0x37;
const AUIPC: u32 = 0x17;
const JAL: u32 = 0x6f;
const JALR: u32 = 0x67;
const OP_IMM: u32 = 0x13;
const LOAD_FP: u32 = 0x07;
const STORE: u32 = 0x23;
const STORE_FP: u32 = 0x27;
const BRANCH: u32 = 0x63;
const MISC_MEM: u32 = 0x0f;

pub const RA: usize = 1;
pub const SP: usize = 2;
pub const GP: usize = 3;

#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct Jump {
    /// `None` when the base register was not tracked.
    pub target: Option<u64>,
    /// Writes a return address (`call`, not `tail`/`j`).
    pub link: bool,
}

#[derive(Clone, Debug)]
pub struct Tracker {
    xlen64: bool,
    regs: [Option<u64>; 32],
}

#[inline]
fn sext(v: u64, bits: u32) -> i64 {
    let shift = 64 - bits;
    ((v << shift) as i64) >> shift
}

impl Tracker {
    pub fn new(xlen64: bool) -> Self {
        let mut regs = [None; 32];
        regs[0] = Some(0);
        Tracker { xlen64, regs }
    }

    #[inline]
    pub fn reg(&self, r: usize) -> Option<u64> {
        self.regs[r]
    }

    fn wrap(&self, v: u64) -> u64 {
        if self.xlen64 { v } else { v & 0xffff_ffff }
    }

    fn set(&mut self, rd: usize, v: Option<u64>) {
        if rd != 0 {
            self.regs[rd] = v.map(|v| self.wrap(v));
        }
    }

    fn offset(&self, base: u64, imm: i64) -> u64 {
        self.wrap(base.wrapping_add(imm as u64))
    }

    /// Decode the instruction at the head of `code` (located at `pc`).
    /// Returns its length and the jump it makes, if any, or `None` when
    /// `code` ends mid-instruction.
    pub fn step(&mut self, pc: u64, code: &[u8]) -> Option<(u64, Option<Jump>)> {
        let half = u16::from_le_bytes([*code.first()?, *code.get(1)?]);
        if half & 0b11 != 0b11 {
            return Some((2, self.step_compressed(pc, half)));
        }
        let word = u32::from_le_bytes([half as u8, (half >> 8) as u8, *code.get(2)?, *code.get(3)?]);
        Some((4, self.step_full(pc, word)))
    }

    fn step_full(&mut self, pc: u64, w: u32) -> Option<Jump> {
        let opcode = w & 0x7f;
        let rd = ((w >> 7) & 0x1f) as usize;
        let funct3 = (w >> 12) & 0x7;
        let rs1 = ((w >> 15) & 0x1f) as usize;
        let imm_i = sext(u64::from(w >> 20), 12);
        let imm_u = sext(u64::from(w & 0xffff_f000), 32);

        match opcode {
            LUI => self.set(rd, Some(imm_u as u64)),
            AUIPC => self.set(rd, Some(self.offset(pc, imm_u))),
            OP_IMM if funct3 == 0 => {
                let v = self.regs[rs1].map(|b| self.offset(b, imm_i));
                self.set(rd, v);
            }
            JAL => {
                let raw = (u64::from((w >> 31) & 1) << 20)
                    | (u64::from((w >> 12) & 0xff) << 12)
                    | (u64::from((w >> 20) & 1) << 11)
                    | (u64::from((w >> 21) & 0x3ff) << 1);
                let target = self.offset(pc, sext(raw, 21));
                self.set(rd, Some(pc + 4));
                return Some(Jump { target: Some(target), link: rd != 0 });
            }
            JALR if funct3 == 0 => {
                let target = self.regs[rs1].map(|b| self.offset(b, imm_i) & !1);
                self.set(rd, Some(pc + 4));
                return Some(Jump { target, link: rd != 0 });
            }
            STORE | STORE_FP | BRANCH | MISC_MEM => {}
            // Loads into f-registers leave the x-registers alone
            LOAD_FP => {}
            _ => self.set(rd, None),
        }
        None
    }

    fn step_compressed(&mut self, pc: u64, h: u16) -> Option<Jump> {
        let h = u32::from(h);
        let quadrant = h & 0b11;
        let funct3 = h >> 13;
        let rd = ((h >> 7) & 0x1f) as usize;
        let rs2 = ((h >> 2) & 0x1f) as usize;
        let bit12 = (h >> 12) & 1;
        let imm6 = sext(u64::from((bit12 << 5) | ((h >> 2) & 0x1f)), 6);

        match (quadrant, funct3) {
            // C.J, and C.JAL which only exists on RV32 (C.ADDIW on RV64)
            (1, 0b101) | (1, 0b001) if funct3 == 0b101 || !self.xlen64 => {
                let raw = (u64::from((h >> 12) & 1) << 11)
                    | (u64::from((h >> 11) & 1) << 4)
                    | (u64::from((h >> 9) & 0b11) << 8)
                    | (u64::from((h >> 8) & 1) << 10)
                    | (u64::from((h >> 7) & 1) << 6)
                    | (u64::from((h >> 6) & 1) << 7)
                    | (u64::from((h >> 3) & 0b111) << 1)
                    | (u64::from((h >> 2) & 1) << 5);
                let target = self.offset(pc, sext(raw, 12));
                let link = funct3 == 0b001;
                if link {
                    self.set(RA, Some(pc + 2));
                }
                Some(Jump { target: Some(target), link })
            }
            // C.ADDI
            (1, 0b000) => {
                let v = self.regs[rd].map(|b| self.offset(b, imm6));
                self.set(rd, v);
                None
            }
            // C.LI
            (1, 0b010) => {
                self.set(rd, Some(imm6 as u64));
                None
            }
            // C.ADDI16SP
            (1, 0b011) if rd == SP => {
                let raw = (bit12 << 9)
                    | (((h >> 6) & 1) << 4)
                    | (((h >> 5) & 1) << 6)
                    | (((h >> 3) & 0b11) << 7)
                    | (((h >> 2) & 1) << 5);
                let v = self.regs[SP].map(|b| self.offset(b, sext(u64::from(raw), 10)));
                self.set(SP, v);
                None
            }
            // C.LUI
            (1, 0b011) => {
                self.set(rd, Some((imm6 << 12) as u64));
                None
            }
            // C.MV / C.ADD
            (2, 0b100) if rs2 != 0 => {
                let v = if bit12 == 0 {
                    self.regs[rs2]
                } else {
                    self.regs[rd].zip(self.regs[rs2]).map(|(a, b)| a.wrapping_add(b))
                };
                self.set(rd, v);
                None
            }
            // C.JR / C.JALR
            (2, 0b100) if rs2 == 0 && rd != 0 => {
                let target = self.regs[rd].map(|b| b & !1);
                let link = (h >> 12) & 1 == 1;
                if link {
                    self.set(RA, Some(pc + 2));
                }
                Some(Jump { target, link })
            }
            _ => {
                if let Some(r) = compressed_rd(h, self.xlen64) {
                    self.set(r, None);
                }
                None
            }
        }
    }
}

/// Integer register written by a non-jump compressed instruction.
fn compressed_rd(h: u32, xlen64: bool) -> Option<usize> {
    let quadrant = h & 0b11;
    let funct3 = h >> 13;
    let rd_full = ((h >> 7) & 0x1f) as usize;
    let rd_low = 8 + ((h >> 2) & 0b111) as usize;
    let rd_high = 8 + ((h >> 7) & 0b111) as usize;

    match (quadrant, funct3) {
        // C.ADDI4SPN, C.LW, C.LD (RV64)
        (0, 0b000) | (0, 0b010) => Some(rd_low),
        (0, 0b011) if xlen64 => Some(rd_low),
        // C.ADDIW (RV64)
        (1, 0b001) => Some(rd_full),
        // C.SRLI/C.SRAI/C.ANDI/C.SUB/...
        (1, 0b100) => Some(rd_high),
        // C.SLLI, C.LWSP
        (2, 0b000) | (2, 0b010) => Some(rd_full),
        (2, 0b011) if xlen64 => Some(rd_full),
        _ => None,
    }
}
