#![no_std]
#![no_main]

use bootloader_api::BootInfo;
use core::panic::PanicInfo;

use ember_kernel::{gfx, interrupts, kernel_init, kernel_panic, println};

fn kernel_main(boot_info: &'static mut BootInfo) -> ! {
    kernel_init(boot_info);

    show_welcome();

    // recoverable dispatch path: int3 traps, the handler logs and resumes
    interrupts::breakpoint();
    println!();

    // fatal dispatch path: nothing maps this address, so the read page
    // faults and the handler reports it before parking the CPU
    let _ = unsafe { core::ptr::read_volatile(0xffff_8000_0aa0_0000 as *const u32) };

    loop {
        x86_64::instructions::hlt();
    }
}
bootloader_api::entry_point!(kernel_main);

fn show_welcome() {
    let mut fb = gfx::framebuffer();
    fb.write_string("\n");
    fb.write_colored(
        "                        \n",
        gfx::Color::AMBER,
        gfx::Color::AMBER,
    );
    fb.write_colored(
        "  Welcome to emberOS !  \n",
        gfx::Color::BLACK,
        gfx::Color::AMBER,
    );
    fb.write_colored(
        "                        \n",
        gfx::Color::AMBER,
        gfx::Color::AMBER,
    );
    fb.write_string("\n");
}

#[panic_handler]
fn panic(info: &PanicInfo) -> ! {
    kernel_panic(info)
}
