use crate::mem::VirtualAddress;
use core::arch::asm;

pub struct CR2;

impl CR2 {
    /// The address whose translation caused the most recent page fault.
    #[inline]
    pub fn read() -> VirtualAddress {
        let value: u64;
        unsafe {
            asm!("mov {}, cr2", out(reg) value, options(nomem, nostack, preserves_flags));
        }
        VirtualAddress::new(value)
    }
}
