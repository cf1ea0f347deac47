use core::arch::global_asm;

global_asm!(
    r#"
    .section .init, "ax"
    .globl _reset
    .type _reset, @function
_reset:
    /* Relaxation would turn this la into a gp-relative load of gp itself */
    .option push
    .option norelax
    la   gp, _global_pointer
    .option pop

    la   sp, _end_stack

    call _start

    /* _start is noreturn; park if that is ever violated */
1:  wfi
    j    1b
    .size _reset, . - _reset
"#
);
