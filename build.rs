use std::fs;
use std::path::PathBuf;

extern crate bootloader;

use bootloader::BootConfig;
use build_print::info;

fn main() {
    make_kernel("ember_kernel");
    make_kernel("test_kernel");
}

fn make_kernel(dependency: &str) {
    info!("building kernel {}", dependency);

    let mut config = BootConfig::default();
    config.frame_buffer_logging = false;
    config.serial_logging = false;
    config.frame_buffer.minimum_framebuffer_width = Some(1440);
    config.frame_buffer.minimum_framebuffer_height = Some(900);

    let out_dir = PathBuf::from(std::env::var_os("OUT_DIR").unwrap()).join(dependency);
    fs::create_dir_all(&out_dir).unwrap();

    let kernel = PathBuf::from(
        std::env::var_os(format!("CARGO_BIN_FILE_EMBER_KERNEL_{}", dependency)).unwrap(),
    );

    println!(
        "cargo:rustc-env=KERNEL_PATH_{}={}",
        dependency.to_uppercase(),
        kernel.display()
    );

    info!("  └> creating UEFI disk image");
    let uefi_path = out_dir.join(format!("{}_uefi.img", dependency));

    bootloader::UefiBoot::new(&kernel)
        .set_boot_config(&config)
        .create_disk_image(&uefi_path)
        .unwrap();

    // pass the disk image paths as env variables to the `main.rs`
    println!(
        "cargo:rustc-env=UEFI_PATH_{}={}",
        dependency.to_uppercase(),
        uefi_path.display()
    );

    info!("  └> done! path: '{}'", uefi_path.display());
}
