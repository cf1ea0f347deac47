//! Control flow through the linked code: what `_reset` leaves in `gp`/`sp`
//! when it jumps, and whether `main` can be reached from `_start`.
//!
//! Only direct jumps are followed (`jal`, and `jalr` through a register the
//! tracker knows, which covers `call`/`tail` pairs). Calls through function
//! pointers are invisible, so a "reached" answer is sound and an
//! "unreached" one may be a false alarm.

use alloc::collections::{BTreeSet, VecDeque};
use alloc::vec::Vec;
use core::ops::Range;

use super::decode::{Jump, Tracker, GP, SP};

/// Instructions walked from `_reset` before giving up on finding its call.
const RESET_WINDOW: usize = 64;

/// Bytes of one executable section, at its link address.
#[derive(Copy, Clone, Debug)]
pub struct Code<'a> {
    pub addr: u64,
    pub bytes: &'a [u8],
}

#[derive(Clone, Debug, Default)]
pub struct CodeMap<'a> {
    xlen64: bool,
    regions: Vec<Code<'a>>,
    /// Extents of sized function symbols.
    funcs: Vec<Range<u64>>,
}

/// Register state at the first jump `_reset` makes.
#[derive(Copy, Clone, Debug, Default, Eq, PartialEq)]
pub struct ResetTrace {
    pub gp: Option<u64>,
    pub sp: Option<u64>,
    /// `None` when `_reset` runs off its code without jumping.
    pub call: Option<Jump>,
}

impl<'a> CodeMap<'a> {
    pub fn new(xlen64: bool) -> Self {
        CodeMap { xlen64, ..CodeMap::default() }
    }

    pub fn add_code(&mut self, addr: u64, bytes: &'a [u8]) {
        self.regions.push(Code { addr, bytes });
    }

    pub fn add_func(&mut self, extent: Range<u64>) {
        self.funcs.push(extent);
    }

    /// Code from `addr` to the end of its section.
    fn bytes_at(&self, addr: u64) -> Option<&'a [u8]> {
        self.regions.iter().find_map(|c| {
            let off = usize::try_from(addr.checked_sub(c.addr)?).ok()?;
            c.bytes.get(off..).filter(|b| !b.is_empty())
        })
    }

    fn func_at(&self, addr: u64) -> Option<Range<u64>> {
        self.funcs.iter().find(|f| f.contains(&addr)).cloned()
    }

    /// Walk forward from `reset` to its first jump.
    pub fn trace_reset(&self, reset: u64) -> Option<ResetTrace> {
        let mut code = self.bytes_at(reset)?;
        let mut tracker = Tracker::new(self.xlen64);
        let mut pc = reset;

        for _ in 0..RESET_WINDOW {
            let Some((len, jump)) = tracker.step(pc, code) else { break };
            if jump.is_some() {
                return Some(ResetTrace { gp: tracker.reg(GP), sp: tracker.reg(SP), call: jump });
            }
            pc += len;
            code = &code[len as usize..];
        }
        Some(ResetTrace { gp: tracker.reg(GP), sp: tracker.reg(SP), call: None })
    }

    /// Jump targets made from inside `func`.
    fn targets(&self, func: &Range<u64>) -> Vec<u64> {
        let mut out = Vec::new();
        let Some(mut code) = self.bytes_at(func.start) else { return out };
        let mut tracker = Tracker::new(self.xlen64);
        let mut pc = func.start;

        while pc < func.end {
            let Some((len, jump)) = tracker.step(pc, code) else { break };
            if let Some(Jump { target: Some(t), .. }) = jump {
                out.push(t);
            }
            pc += len;
            code = &code[len as usize..];
        }
        out
    }

    /// Whether `to` is reachable from the function starting at `from`.
    pub fn reaches(&self, from: u64, to: u64) -> bool {
        let (Some(first), Some(goal)) = (self.func_at(from), self.func_at(to)) else {
            return false;
        };

        let mut seen = BTreeSet::new();
        let mut queue = VecDeque::new();
        seen.insert(first.start);
        queue.push_back(first);

        while let Some(func) = queue.pop_front() {
            if func == goal {
                return true;
            }
            for t in self.targets(&func) {
                if let Some(next) = self.func_at(t) {
                    if seen.insert(next.start) {
                        queue.push_back(next);
                    }
                }
            }
        }
        false
    }
}
