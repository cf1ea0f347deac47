#![no_std]

/// Names the linker script must define. Kept here so the firmware and the
/// host-side image checker agree on spelling.
pub mod sym {
    pub const RESET: &str = "_reset";
    pub const START: &str = "_start";
    pub const ENTRY: &str = "main";

    pub const START_VECTOR: &str = "_start_vector";
    pub const STORED_DATA: &str = "_stored_data";
    pub const START_DATA: &str = "_start_data";
    pub const END_DATA: &str = "_end_data";
    pub const START_BSS: &str = "_start_bss";
    pub const END_BSS: &str = "_end_bss";
    pub const END_STACK: &str = "_end_stack";
    pub const START_HEAP: &str = "_start_heap";
    pub const GLOBAL_POINTER: &str = "_global_pointer";
}

pub mod section {
    pub const INIT: &str = ".init";
}

/// Reach of a signed 12-bit `gp`-relative offset.
pub const GP_REACH: usize = 0x800;

/// Required `sp` alignment under the RISC-V psABI.
pub const STACK_ALIGN: usize = 16;

#[repr(u8)]
#[derive(Copy, Clone, Debug, Eq, PartialEq, Ord, PartialOrd)]
pub enum LogLevel {
    Trace = 0,
    Debug = 1,
    Info = 2,
    Warn = 3,
    Error = 4,
}

impl LogLevel {
    pub const fn from_u8(v: u8) -> LogLevel {
        match v {
            0 => LogLevel::Trace,
            1 => LogLevel::Debug,
            2 => LogLevel::Info,
            3 => LogLevel::Warn,
            _ => LogLevel::Error,
        }
    }

    pub const fn tag(self) -> &'static str {
        match self {
            LogLevel::Trace => "[TRACE] ",
            LogLevel::Debug => "[DEBUG] ",
            LogLevel::Info => "[INFO]  ",
            LogLevel::Warn => "[WARN]  ",
            LogLevel::Error => "[ERROR] ",
        }
    }
}
