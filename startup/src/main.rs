#![no_std]
#![no_main]

use startup_lib::boot::BOOT;
use startup_lib::layout::MemoryLayout;
use startup_lib::{kerror, kinfo, logging};

/// Platform entry. `_start` calls this once and parks the hart if it returns.
#[no_mangle]
pub extern "C" fn main() {
    let layout = MemoryLayout::from_linker();
    kinfo!("sifive_e: main entered ({:?})", BOOT.current());
    kinfo!(
        "sp top 0x{:08x}, heap from 0x{:08x}",
        layout.stack_top(),
        layout.start_heap
    );

    #[cfg(feature = "heap")]
    {
        extern crate alloc;

        match startup_lib::heap::init(4096) {
            Ok(()) => {
                let v: alloc::vec::Vec<u32> = (0..16).collect();
                kinfo!("heap ok: sum={} free={}", v.iter().sum::<u32>(), startup_lib::heap::free_bytes());
            }
            Err(e) => kerror!("heap: {}", e),
        }
    }

    // Nothing to print on yet; leave the ring for a debugger
    kinfo!("{} records buffered, {} dropped", logging::len(), logging::dropped());
}

#[panic_handler]
fn panic(info: &core::panic::PanicInfo) -> ! {
    if let Some(loc) = info.location() {
        kerror!("PANIC at {}:{}:{}", loc.file(), loc.line(), loc.column());
    }
    kerror!("{}", info.message());

    loop {
        unsafe { riscv::asm::wfi(); }
    }
}
