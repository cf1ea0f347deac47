use core::arch::asm;

use riscv::register::mhartid;

use crate::boot::{Stage, BOOT};
use crate::layout::MemoryLayout;
use crate::{kdebug, kerror, ktrace, kwarn};

extern "C" {
    /// Platform entry, supplied by the application image.
    fn main();
}

fn park() -> ! {
    loop {
        unsafe { riscv::asm::wfi(); }
    }
}

/// First Rust code after `_reset`: prepare RAM, then hand over to `main`.
#[no_mangle]
#[link_section = ".init.rust"]
pub extern "C" fn _start() -> ! {
    let layout = MemoryLayout::from_linker();

    // The boot log and BOOT live in .bss, which is not cleared yet, so a bad
    // layout can only park.
    #[cfg(feature = "ram-init")]
    let ready = unsafe { crate::ram::init(&layout) };
    #[cfg(not(feature = "ram-init"))]
    let ready = layout.validate();
    if ready.is_err() {
        park();
    }

    if BOOT.mark(Stage::RamReady).is_err() {
        park();
    }
    ktrace!(
        "hart {} up: sp=0x{:08x} gp=0x{:08x}",
        mhartid::read(),
        layout.stack_top(),
        layout.global_pointer
    );

    #[cfg(feature = "vectored-traps")]
    {
        extern "C" {
            static _start_vector: u32;
        }
        let base = unsafe { &raw const _start_vector } as usize;
        // MODE=1 selects vectored dispatch
        unsafe { asm!("csrw mtvec, {0}", in(reg) base | 1) };
        if BOOT.mark(Stage::TrapsReady).is_err() {
            park();
        }
        kdebug!("mtvec=0x{:08x} vectored", base);
    }

    kdebug!(".data {} bytes, .bss {} bytes", layout.data_len(), layout.bss_len());

    // Must stay a direct call: imgcheck looks for it from `_start`.
    let entered = BOOT.enter_main(|| unsafe {
        asm!("call {entry}", entry = sym main, clobber_abi("C"));
    });
    match entered {
        Ok(()) => {
            // Refusal is already logged by mark
            let _ = BOOT.mark(Stage::Returned);
            kwarn!("main returned, parking hart");
        }
        Err(e) => kerror!("{}", e),
    }

    park()
}
