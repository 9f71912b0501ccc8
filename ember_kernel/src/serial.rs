use spin::{Mutex, Once};
use uart_16550::SerialPort;

pub static SERIAL1: Once<Mutex<SerialPort>> = Once::new();

pub fn init() {
    SERIAL1.call_once(|| {
        let mut serial_port = unsafe { SerialPort::new(0x3F8) };
        serial_port.init();
        Mutex::new(serial_port)
    });
}

#[macro_export]
macro_rules! serial_print {
    ($($arg:tt)*) => {{
        use core::fmt::Write;
        if let Some(serial) = $crate::serial::SERIAL1.get() {
            serial.lock().write_fmt(format_args!($($arg)*)).unwrap();
        }
    }};
}

#[macro_export]
macro_rules! serial_println {
    () => ($crate::serial_print!("\n"));
    ($($arg:tt)*) => ($crate::serial_print!("{}\n", format_args!($($arg)*)));
}

#[macro_export]
macro_rules! dbg {
    ($val:expr) => {{
        $crate::serial_print!("{} = {:#?}\n\n", stringify!($val), $val);

        $val
    }};
}
