//! Boot stage tracking. The reset path only ever moves forward, and the
//! platform entry is entered at most once per reset.

use core::fmt;
use core::sync::atomic::{AtomicU8, Ordering};

use crate::kerror;

#[repr(u8)]
#[derive(Copy, Clone, Debug, Eq, PartialEq, Ord, PartialOrd)]
pub enum Stage {
    Reset = 0,
    RamReady = 1,
    TrapsReady = 2,
    Main = 3,
    Returned = 4,
}

impl Stage {
    const fn from_u8(v: u8) -> Stage {
        match v {
            0 => Stage::Reset,
            1 => Stage::RamReady,
            2 => Stage::TrapsReady,
            3 => Stage::Main,
            _ => Stage::Returned,
        }
    }
}

#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum BootError {
    OutOfOrder { from: Stage, to: Stage },
    AlreadyEntered,
}

impl fmt::Display for BootError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BootError::OutOfOrder { from, to } => {
                write!(f, "boot stage cannot go from {from:?} to {to:?}")
            }
            BootError::AlreadyEntered => f.write_str("entry point already entered"),
        }
    }
}

pub struct BootState {
    stage: AtomicU8,
}

impl BootState {
    pub const fn new() -> Self {
        BootState { stage: AtomicU8::new(Stage::Reset as u8) }
    }

    pub fn current(&self) -> Stage {
        Stage::from_u8(self.stage.load(Ordering::Acquire))
    }

    /// Move to `to`. Stages may be skipped but never repeated or undone.
    pub fn advance(&self, to: Stage) -> Result<(), BootError> {
        self.stage
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |cur| {
                (to as u8 > cur).then_some(to as u8)
            })
            .map(|_| ())
            .map_err(|cur| BootError::OutOfOrder { from: Stage::from_u8(cur), to })
    }

    /// [`advance`](Self::advance), logging a refused move.
    pub fn mark(&self, to: Stage) -> Result<(), BootError> {
        self.advance(to).inspect_err(|e| kerror!("{}", e))
    }

    /// Run `entry` once. A repeated call leaves `entry` uncalled.
    pub fn enter_main<F: FnOnce()>(&self, entry: F) -> Result<(), BootError> {
        self.advance(Stage::Main).map_err(|_| BootError::AlreadyEntered)?;
        entry();
        Ok(())
    }
}

impl Default for BootState {
    fn default() -> Self {
        Self::new()
    }
}

/// Boot progress of this hart since the last reset.
pub static BOOT: BootState = BootState::new();
