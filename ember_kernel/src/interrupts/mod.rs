mod handlers;
mod idt;
mod pic;

use crate::gdt::SegmentSelector;
use crate::mem::VirtualAddress;
use crate::utils::BitField;
use core::{arch::asm, fmt};

/// Install the vector table: defaults first, dedicated handlers second,
/// hardware load last. Call with interrupts masked, after `gdt::init`.
/// Also parks the legacy PICs so unmasking later cannot alias an IRQ onto
/// an exception vector.
pub fn init() {
    pic::disable();
    idt::init();
}

#[inline]
pub fn enable() {
    unsafe {
        asm!("sti", options(preserves_flags, nostack));
    }
}

#[inline]
pub fn disable() {
    unsafe {
        asm!("cli", options(preserves_flags, nostack));
    }
}

#[inline]
pub fn without_interrupts<F, R>(f: F) -> R
where
    F: FnOnce() -> R,
{
    let flags: u64;
    unsafe {
        asm!("pushfq; pop {}", out(reg) flags, options(nomem, preserves_flags));
    }
    let interrupts_enabled = flags.bit(9);

    if interrupts_enabled {
        disable();
    }

    let result = f();

    if interrupts_enabled {
        enable();
    }

    result
}

#[inline]
pub fn breakpoint() {
    // no `nomem`: the handler's side effects must stay visible here
    unsafe {
        asm!("int3", options(nostack));
    }
}

/// What the CPU pushes before transferring through a gate.
#[repr(C)]
pub struct InterruptStackFrame {
    instruction_pointer: VirtualAddress,
    code_segment: SegmentSelector,
    _padding1: [u8; 6],
    cpu_flags: u64,
    stack_pointer: VirtualAddress,
    stack_segment: SegmentSelector,
    _padding2: [u8; 6],
}

impl InterruptStackFrame {
    #[inline]
    pub fn instruction_pointer(&self) -> VirtualAddress {
        self.instruction_pointer
    }

    #[inline]
    #[allow(dead_code)]
    pub fn stack_pointer(&self) -> VirtualAddress {
        self.stack_pointer
    }
}

impl fmt::Debug for InterruptStackFrame {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("InterruptStackFrame")
            .field("instruction_pointer", &self.instruction_pointer)
            .field("code_segment", &self.code_segment)
            .field("cpu_flags", &format_args!("{:#x}", self.cpu_flags))
            .field("stack_pointer", &self.stack_pointer)
            .field("stack_segment", &self.stack_segment)
            .finish()
    }
}

mod tests {
    use super::handlers::{self, BREAKPOINT_COUNT, UNKNOWN_VECTOR_COUNT};
    use super::idt::{Handler, HandlerFn, HandlerWithErrCode, InterruptDescriptorTable};
    use core::arch::asm;
    use core::sync::atomic::Ordering;
    use ember_test::kernel_test;

    fn build_table() -> InterruptDescriptorTable {
        let mut idt = InterruptDescriptorTable::new();
        handlers::attach_default_handlers(&mut idt);
        handlers::attach_handlers(&mut idt);
        idt
    }

    #[kernel_test]
    fn default_fill_leaves_no_empty_slot(_: &bootloader_api::BootInfo) -> bool {
        let mut idt = InterruptDescriptorTable::new();
        handlers::attach_default_handlers(&mut idt);

        (0..=u8::MAX).all(|vector| idt.is_present(vector) && !idt.handler_address(vector).is_null())
    }

    #[kernel_test]
    fn dedicated_vectors_resolve_to_their_handlers(_: &bootloader_api::BootInfo) -> bool {
        let idt = build_table();

        let division = (handlers::division_error_handler as Handler).address();
        let page_fault = (handlers::page_fault_handler as HandlerWithErrCode).address();

        idt.handler_address(0) == division
            && idt.handler_address(14) == page_fault
            && division != page_fault
    }

    #[kernel_test]
    fn table_construction_is_deterministic(_: &bootloader_api::BootInfo) -> bool {
        fn bytes(idt: &InterruptDescriptorTable) -> &[u8] {
            unsafe {
                core::slice::from_raw_parts(
                    idt as *const _ as *const u8,
                    core::mem::size_of::<InterruptDescriptorTable>(),
                )
            }
        }

        let (first, second) = (build_table(), build_table());
        bytes(&first) == bytes(&second)
    }

    #[kernel_test]
    fn breakpoint_dispatches_exactly_once(_: &bootloader_api::BootInfo) -> bool {
        let before = BREAKPOINT_COUNT.load(Ordering::Relaxed);
        super::breakpoint();
        BREAKPOINT_COUNT.load(Ordering::Relaxed) == before + 1
    }

    #[kernel_test]
    fn unknown_vectors_warn_and_resume(_: &bootloader_api::BootInfo) -> bool {
        let breakpoints = BREAKPOINT_COUNT.load(Ordering::Relaxed);
        let before = UNKNOWN_VECTOR_COUNT.load(Ordering::Relaxed);

        // two different unclaimed vectors; reaching the checks below at all
        // means the fallback returned control both times
        unsafe {
            asm!("int 42", options(nostack));
            asm!("int 43", options(nostack));
        }

        UNKNOWN_VECTOR_COUNT.load(Ordering::Relaxed) == before + 2
            && BREAKPOINT_COUNT.load(Ordering::Relaxed) == breakpoints
    }
}
