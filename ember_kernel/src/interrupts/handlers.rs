use super::idt::{GateDescriptor, InterruptDescriptorTable, DEVICE_VECTOR_START};
use super::InterruptStackFrame;
use crate::arch::registers::CR2;
use crate::{eprintln, gdt, warnln};

use core::fmt;
use core::sync::atomic::{AtomicU64, Ordering};

// dispatch counters, observable from the kernel tests
pub static BREAKPOINT_COUNT: AtomicU64 = AtomicU64::new(0);
pub static UNKNOWN_VECTOR_COUNT: AtomicU64 = AtomicU64::new(0);

/// First pass: point every one of the 256 slots at a fallback matching its
/// stack contract. Must complete before any dedicated handler is attached,
/// so the table never holds an uninstalled gate.
pub fn attach_default_handlers(idt: &mut InterruptDescriptorTable) {
    idt.division_error = GateDescriptor::new(unknown_interrupt_handler);
    idt.debug = GateDescriptor::new(unknown_interrupt_handler);
    idt.non_maskable_interrupt = GateDescriptor::new(unknown_interrupt_handler);
    idt.breakpoint = GateDescriptor::new(unknown_interrupt_handler);
    idt.overflow = GateDescriptor::new(unknown_interrupt_handler);
    idt.bound_range_exceeded = GateDescriptor::new(unknown_interrupt_handler);
    idt.invalid_opcode = GateDescriptor::new(unknown_interrupt_handler);
    idt.device_not_available = GateDescriptor::new(unknown_interrupt_handler);
    idt.double_fault = GateDescriptor::new(unknown_fatal_handler);
    idt._coprocessor_segment_overrun = GateDescriptor::new(unknown_interrupt_handler);
    idt.invalid_tss = GateDescriptor::new(unknown_interrupt_err_handler);
    idt.segment_not_present = GateDescriptor::new(unknown_interrupt_err_handler);
    idt.stack_segment_fault = GateDescriptor::new(unknown_interrupt_err_handler);
    idt.general_protection_fault = GateDescriptor::new(unknown_interrupt_err_handler);
    idt.page_fault = GateDescriptor::new(unknown_interrupt_err_handler);
    idt._reserved = GateDescriptor::new(unknown_interrupt_handler);
    idt.x87_floating_point = GateDescriptor::new(unknown_interrupt_handler);
    idt.alignment_check = GateDescriptor::new(unknown_interrupt_err_handler);
    idt.machine_check = GateDescriptor::new(unknown_interrupt_handler);
    idt.simd_floating_point = GateDescriptor::new(unknown_interrupt_handler);
    idt.virtualization_exception = GateDescriptor::new(unknown_interrupt_handler);
    idt.control_protection_exception = GateDescriptor::new(unknown_interrupt_err_handler);
    idt._reserved2 = [GateDescriptor::new(unknown_interrupt_handler); 6];
    idt.hypervisor_injection_exception = GateDescriptor::new(unknown_interrupt_handler);
    idt.vmm_communication_exception = GateDescriptor::new(unknown_interrupt_err_handler);
    idt.security_exception = GateDescriptor::new(unknown_interrupt_err_handler);
    idt._reserved3 = GateDescriptor::new(unknown_interrupt_handler);

    for vector in DEVICE_VECTOR_START..=u8::MAX {
        idt[vector] = GateDescriptor::new(unknown_interrupt_handler);
    }
}

/// Second pass: dedicated handlers for the exceptions this boot stage cares
/// about. The double fault and page fault gates get their own stacks so
/// they survive a corrupt or overflowed kernel stack.
pub fn attach_handlers(idt: &mut InterruptDescriptorTable) {
    idt.division_error = GateDescriptor::new(division_error_handler);
    idt.breakpoint = GateDescriptor::new(breakpoint_handler);
    idt.invalid_opcode = GateDescriptor::new(invalid_opcode_handler);

    idt.double_fault = GateDescriptor::new(double_fault_handler);
    // safety: gdt::init put a dedicated stack in this slot
    unsafe {
        idt.double_fault.options.set_stack_index(gdt::DOUBLE_FAULT_IST_INDEX);
    }

    idt.invalid_tss = GateDescriptor::new(invalid_tss_handler);
    idt.segment_not_present = GateDescriptor::new(segment_not_present_handler);
    idt.stack_segment_fault = GateDescriptor::new(stack_segment_fault_handler);
    idt.general_protection_fault = GateDescriptor::new(general_protection_fault_handler);

    idt.page_fault = GateDescriptor::new(page_fault_handler);
    // safety: same as above
    unsafe {
        idt.page_fault.options.set_stack_index(gdt::PAGE_FAULT_IST_INDEX);
    }
}

/// Fallback for every vector without a dedicated handler. Warns and
/// resumes; an unclaimed device interrupt is noise, not a reason to die.
pub extern "x86-interrupt" fn unknown_interrupt_handler(stack_frame: InterruptStackFrame) {
    UNKNOWN_VECTOR_COUNT.fetch_add(1, Ordering::Relaxed);
    warnln!(
        "unknown interrupt or fault at {:?}",
        stack_frame.instruction_pointer()
    );
}

/// Same, for vector classes where the CPU pushes an error code.
pub extern "x86-interrupt" fn unknown_interrupt_err_handler(
    stack_frame: InterruptStackFrame,
    error_code: u64,
) {
    UNKNOWN_VECTOR_COUNT.fetch_add(1, Ordering::Relaxed);
    warnln!(
        "unknown fault (error code {:#x}) at {:?}",
        error_code,
        stack_frame.instruction_pointer()
    );
}

/// Default for the diverging double fault slot; overwritten by
/// `attach_handlers` before the table is ever loaded.
pub extern "x86-interrupt" fn unknown_fatal_handler(
    stack_frame: InterruptStackFrame,
    error_code: u64,
) -> ! {
    panic!(
        "unknown fatal exception (error code {:#x})\n{:#?}",
        error_code, stack_frame
    );
}

pub extern "x86-interrupt" fn division_error_handler(stack_frame: InterruptStackFrame) {
    panic!("kernel exception: division error\n{:#?}", stack_frame);
}

pub extern "x86-interrupt" fn breakpoint_handler(stack_frame: InterruptStackFrame) {
    BREAKPOINT_COUNT.fetch_add(1, Ordering::Relaxed);
    eprintln!("breakpoint trap!\n{:#?}", stack_frame);
}

pub extern "x86-interrupt" fn invalid_opcode_handler(stack_frame: InterruptStackFrame) {
    panic!("kernel exception: invalid opcode\n{:#?}", stack_frame);
}

pub extern "x86-interrupt" fn double_fault_handler(
    stack_frame: InterruptStackFrame,
    _error_code: u64,
) -> ! {
    // the pushed error code is always zero for double faults
    panic!("kernel exception: double fault\n{:#?}", stack_frame);
}

pub extern "x86-interrupt" fn invalid_tss_handler(
    stack_frame: InterruptStackFrame,
    error_code: u64,
) {
    panic!(
        "kernel exception: invalid TSS (selector {:#x})\n{:#?}",
        error_code, stack_frame
    );
}

pub extern "x86-interrupt" fn segment_not_present_handler(
    stack_frame: InterruptStackFrame,
    error_code: u64,
) {
    panic!(
        "kernel exception: segment not present (selector {:#x})\n{:#?}",
        error_code, stack_frame
    );
}

pub extern "x86-interrupt" fn stack_segment_fault_handler(
    stack_frame: InterruptStackFrame,
    error_code: u64,
) {
    panic!(
        "kernel exception: stack segment fault (selector {:#x})\n{:#?}",
        error_code, stack_frame
    );
}

pub extern "x86-interrupt" fn general_protection_fault_handler(
    stack_frame: InterruptStackFrame,
    error_code: u64,
) {
    panic!(
        "kernel exception: general protection fault (segment {:#x})\n{:#?}",
        error_code, stack_frame
    );
}

/// Unrecoverable at this boot stage: there is no paging layer that could
/// make the access good, so resuming would just fault again.
pub extern "x86-interrupt" fn page_fault_handler(
    stack_frame: InterruptStackFrame,
    error_code: u64,
) {
    panic!(
        "kernel exception: page fault accessing {:?} ({:?})\n{:#?}",
        CR2::read(),
        PageFaultErrorCode(error_code),
        stack_frame
    );
}

/// Decoded view of the error code the CPU pushes on a page fault.
#[derive(Clone, Copy)]
#[repr(transparent)]
pub struct PageFaultErrorCode(pub u64);

impl PageFaultErrorCode {
    const FLAGS: [(u64, &'static str); 5] = [
        (1 << 0, "protection-violation"),
        (1 << 1, "write"),
        (1 << 2, "user-mode"),
        (1 << 3, "malformed-table"),
        (1 << 4, "instruction-fetch"),
    ];
}

impl fmt::Debug for PageFaultErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut any = false;
        for (bit, name) in Self::FLAGS {
            if self.0 & bit != 0 {
                if any {
                    write!(f, " | ")?;
                }
                write!(f, "{}", name)?;
                any = true;
            }
        }
        if !any {
            write!(f, "not-present read")?;
        }
        Ok(())
    }
}
