// imgcheck/src/main.rs
//
// Usage: imgcheck <firmware.elf>
// Checks that the image resets through `_reset` in `.init`, that `_reset`
// sets gp/sp and calls `_start`, that `main` is called from `_start`, and
// that its linker symbols describe a usable memory layout.

use std::fmt::Write as _;
use std::path::Path;
use std::process::ExitCode;

use bootabi::section;
use startup_lib::image::{self, ImageError, ImageFacts, ResetTrace};
use startup_lib::layout::MemoryLayout;

fn report(facts: &ImageFacts, layout: &MemoryLayout) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "entry        0x{:08x}", facts.entry);
    if let Some(init) = &facts.init {
        let _ = writeln!(out, "{:<12} 0x{:08x}..0x{:08x}", section::INIT, init.start, init.end);
    }
    if let Some(ResetTrace { call: Some(call), .. }) = facts.reset_trace {
        if let Some(t) = call.target {
            let _ = writeln!(out, "reset        gp, sp, call 0x{t:08x}");
        }
    }
    if facts.main_reached {
        let _ = writeln!(out, "main         called from _start");
    }
    let _ = writeln!(out, "gp           0x{:08x}", layout.global_pointer);
    let _ = writeln!(out, "stack top    0x{:08x}", layout.stack_top());
    let _ = writeln!(
        out,
        ".data        {} bytes{}",
        layout.data_len(),
        if layout.needs_data_copy() { " (copied from flash)" } else { "" }
    );
    let _ = writeln!(out, ".bss         {} bytes", layout.bss_len());
    let _ = writeln!(out, "heap start   0x{:08x}", layout.start_heap);
    match facts.start_vector {
        Some(v) => {
            let _ = writeln!(out, "vectors      0x{v:08x}");
        }
        None => {
            let _ = writeln!(out, "vectors      none");
        }
    }
    out
}

fn check(path: &Path) -> Result<String, String> {
    let bytes = std::fs::read(path).map_err(|e| format!("{}: {e}", path.display()))?;
    let facts = image::inspect(&bytes).map_err(|e: ImageError| e.to_string())?;
    let layout = facts.verify().map_err(|e| e.to_string())?;
    Ok(report(&facts, &layout))
}

fn main() -> ExitCode {
    let args: Vec<String> = std::env::args().collect();
    let [_, path] = args.as_slice() else {
        eprintln!("usage: imgcheck <firmware.elf>");
        return ExitCode::from(2);
    };

    match check(Path::new(path)) {
        Ok(text) => {
            print!("{text}");
            ExitCode::SUCCESS
        }
        Err(e) => {
            eprintln!("imgcheck: {e}");
            ExitCode::from(1)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use startup_lib::image::Jump;

    fn facts() -> ImageFacts {
        ImageFacts {
            entry: 0x2040_0000,
            init: Some(0x2040_0000..0x2040_0100),
            reset: Some(0x2040_0000),
            start: Some(0x2040_0010),
            main: Some(0x2040_0300),
            start_vector: None,
            layout_syms: [
                Some(0x2040_1000),
                Some(0x8000_0000),
                Some(0x8000_0010),
                Some(0x8000_0010),
                Some(0x8000_0020),
                Some(0x8000_0020),
                Some(0x8000_4000),
                Some(0x8000_0800),
            ],
            reset_trace: Some(ResetTrace {
                gp: Some(0x8000_0800),
                sp: Some(0x8000_4000),
                call: Some(Jump { target: Some(0x2040_0010), link: true }),
            }),
            main_reached: true,
        }
    }

    #[test]
    fn test_report_lists_layout() {
        let f = facts();
        let layout = f.verify().unwrap();
        let text = report(&f, &layout);

        assert!(text.contains("entry        0x20400000"));
        assert!(text.contains(".init        0x20400000..0x20400100"));
        assert!(text.contains("stack top    0x80004000"));
        assert!(text.contains(".data        16 bytes (copied from flash)"));
        assert!(text.contains("vectors      none"));
        assert!(text.contains("reset        gp, sp, call 0x20400010"));
        assert!(text.contains("main         called from _start"));
    }

    #[test]
    fn test_unreached_main_fails() {
        let mut f = facts();
        f.main_reached = false;
        assert_eq!(f.verify().unwrap_err().to_string(), "`main` is not called from `_start`");
    }

    #[test]
    fn test_missing_file() {
        let err = check(Path::new("/nonexistent/firmware.elf")).unwrap_err();
        assert!(err.starts_with("/nonexistent/firmware.elf: "));
    }
}
