#![no_std]
#![no_main]

use bootloader_api::BootInfo;

use ember_kernel::*;
use ember_test::*;

bootloader_api::entry_point!(test_kernel_main);

static mut CURRENT_TEST: Option<&'static TestDescription> = None;

fn test_kernel_main(boot_info: &'static mut BootInfo) -> ! {
    kernel_init(boot_info);

    serial_println!("running {} kernel tests...", KERNEL_TESTS.len());
    let mut failed = 0;
    for test in KERNEL_TESTS {
        unsafe {
            CURRENT_TEST = Some(test);
        }

        serial_println!("running {}...", test.name);
        let passed = (test.test_fn)(boot_info);
        serial_println!(
            "\t {}: [\x1b[{}m{}\x1b[0m]",
            test.name,
            if passed { "32" } else { "31" },
            if passed { "OK" } else { "FAILED" }
        );
        if !passed {
            failed += 1;
        }
    }
    if failed > 0 {
        serial_println!("\n{} test(s) failed!", failed);
    } else {
        serial_println!("all tests passed!");
    }

    loop {
        unsafe {
            core::arch::asm!("hlt", options(nomem, nostack, preserves_flags));
        }
    }
}

use core::panic::PanicInfo;
#[panic_handler]
fn panic(info: &PanicInfo) -> ! {
    if let Some(test) = unsafe { CURRENT_TEST } {
        serial_println!("\t {}: [\x1b[31mPANICKED\x1b[0m]", test.name);
        serial_println!(
            "test location: {}:{}:{}\n",
            test.location.file,
            test.location.line,
            test.location.column
        );
    }

    kernel_panic(info)
}
