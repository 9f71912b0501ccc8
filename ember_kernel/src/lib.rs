#![no_std]
#![feature(abi_x86_interrupt)]

pub mod arch;
pub mod gdt;
pub mod gfx;
pub mod interrupts;
pub mod mem;
pub mod serial;
mod utils;

use bootloader_api::BootInfo;
use core::panic::PanicInfo;

/// Boot sequence. The order is load-bearing: console first so every later
/// failure is visible, the TSS before the vector table (gate descriptors
/// reference its stack slots), each hardware load only after its structure
/// is fully built, and interrupts unmasked exactly once at the end.
pub fn kernel_init(boot_info: &mut BootInfo) {
    serial::init();

    let fb = boot_info
        .framebuffer
        .take()
        .expect("booted without a framebuffer");
    gfx::init(fb);

    gdt::init();
    interrupts::init();

    interrupts::enable();
}

pub fn kernel_panic(info: &PanicInfo) -> ! {
    interrupts::disable();

    // a fault handler may have been holding the console when it panicked
    unsafe { gfx::force_unlock() };

    crate::serial_println!("kernel panic: {}", info);

    if let Some(mut fb) = gfx::get() {
        use core::fmt::Write;
        fb.set_color(&gfx::Color::RED);
        let _ = write!(fb, "\nkernel panic: {}\n", info);
        fb.set_color(&gfx::Color::WHITE);
    }

    loop {
        x86_64::instructions::hlt();
    }
}
