use super::handlers;
use super::InterruptStackFrame;
use crate::gdt::SegmentSelector;
use crate::mem::{DTPointer, VirtualAddress};
use crate::utils::BitField;

use core::marker::PhantomData;
use core::mem::size_of;
use core::ops::{Index, IndexMut, Range};
use core::fmt;
use spin::Once;

static IDT: Once<InterruptDescriptorTable> = Once::new();

/// First vector of the open device-interrupt range; everything below is a
/// CPU exception with a fixed meaning.
pub const DEVICE_VECTOR_START: u8 = 32;

/// Build the vector table and make it live. Every slot is pointed at a
/// fallback before any dedicated handler is attached, so once the table is
/// loaded no vector can reach an uninstalled gate. Interrupts must still be
/// masked; `gdt::init` must have run (gates reference TSS stack slots).
pub fn init() {
    IDT.call_once(|| {
        let mut idt = InterruptDescriptorTable::new();
        handlers::attach_default_handlers(&mut idt);
        handlers::attach_handlers(&mut idt);
        idt
    })
    .load();
}

pub type Handler = extern "x86-interrupt" fn(InterruptStackFrame);
pub type HandlerWithErrCode = extern "x86-interrupt" fn(InterruptStackFrame, u64);
pub type DivergingHandlerWithErrCode = extern "x86-interrupt" fn(InterruptStackFrame, u64) -> !;

/// a trait for gate target functions.
///
/// safety: `address` must return the entry address of a real handler with
/// the matching stack contract.
pub unsafe trait HandlerFn: Copy {
    fn address(self) -> VirtualAddress;
}

macro_rules! impl_handler_fn {
    ($fn:ty) => {
        unsafe impl HandlerFn for $fn {
            fn address(self) -> VirtualAddress {
                VirtualAddress::new(self as u64)
            }
        }
    };
}

impl_handler_fn!(Handler);
impl_handler_fn!(HandlerWithErrCode);
impl_handler_fn!(DivergingHandlerWithErrCode);

// https://wiki.osdev.org/Exceptions
#[derive(Debug, Clone)]
#[repr(C, align(16))]
pub struct InterruptDescriptorTable {
    pub division_error: GateDescriptor<Handler>,
    pub debug: GateDescriptor<Handler>,
    pub non_maskable_interrupt: GateDescriptor<Handler>,
    pub breakpoint: GateDescriptor<Handler>,
    pub overflow: GateDescriptor<Handler>,
    pub bound_range_exceeded: GateDescriptor<Handler>,
    pub invalid_opcode: GateDescriptor<Handler>,
    pub device_not_available: GateDescriptor<Handler>,
    pub double_fault: GateDescriptor<DivergingHandlerWithErrCode>,
    pub(super) _coprocessor_segment_overrun: GateDescriptor<Handler>,
    pub invalid_tss: GateDescriptor<HandlerWithErrCode>,
    pub segment_not_present: GateDescriptor<HandlerWithErrCode>,
    pub stack_segment_fault: GateDescriptor<HandlerWithErrCode>,
    pub general_protection_fault: GateDescriptor<HandlerWithErrCode>,
    pub page_fault: GateDescriptor<HandlerWithErrCode>,
    pub(super) _reserved: GateDescriptor<Handler>,
    pub x87_floating_point: GateDescriptor<Handler>,
    pub alignment_check: GateDescriptor<HandlerWithErrCode>,
    pub machine_check: GateDescriptor<Handler>,
    pub simd_floating_point: GateDescriptor<Handler>,
    pub virtualization_exception: GateDescriptor<Handler>,
    pub control_protection_exception: GateDescriptor<HandlerWithErrCode>,
    pub(super) _reserved2: [GateDescriptor<Handler>; 6],
    pub hypervisor_injection_exception: GateDescriptor<Handler>,
    pub vmm_communication_exception: GateDescriptor<HandlerWithErrCode>,
    pub security_exception: GateDescriptor<HandlerWithErrCode>,
    pub(super) _reserved3: GateDescriptor<Handler>,
    device_interrupts: [GateDescriptor<Handler>; 224],
}

impl InterruptDescriptorTable {
    #[inline]
    pub const fn new() -> Self {
        Self {
            division_error: GateDescriptor::empty(),
            debug: GateDescriptor::empty(),
            non_maskable_interrupt: GateDescriptor::empty(),
            breakpoint: GateDescriptor::empty(),
            overflow: GateDescriptor::empty(),
            bound_range_exceeded: GateDescriptor::empty(),
            invalid_opcode: GateDescriptor::empty(),
            device_not_available: GateDescriptor::empty(),
            double_fault: GateDescriptor::empty(),
            _coprocessor_segment_overrun: GateDescriptor::empty(),
            invalid_tss: GateDescriptor::empty(),
            segment_not_present: GateDescriptor::empty(),
            stack_segment_fault: GateDescriptor::empty(),
            general_protection_fault: GateDescriptor::empty(),
            page_fault: GateDescriptor::empty(),
            _reserved: GateDescriptor::empty(),
            x87_floating_point: GateDescriptor::empty(),
            alignment_check: GateDescriptor::empty(),
            machine_check: GateDescriptor::empty(),
            simd_floating_point: GateDescriptor::empty(),
            virtualization_exception: GateDescriptor::empty(),
            control_protection_exception: GateDescriptor::empty(),
            _reserved2: [GateDescriptor::empty(); 6],
            hypervisor_injection_exception: GateDescriptor::empty(),
            vmm_communication_exception: GateDescriptor::empty(),
            security_exception: GateDescriptor::empty(),
            _reserved3: GateDescriptor::empty(),
            device_interrupts: [GateDescriptor::empty(); 224],
        }
    }

    pub fn load(&'static self) {
        let ptr = DTPointer {
            base: VirtualAddress::from_ptr(self),
            limit: (size_of::<Self>() - 1) as u16,
        };
        unsafe {
            ptr.load_idt();
        }
    }

    /// All 256 slots share one layout, only the handler signature marker
    /// differs.
    fn raw_slots(&self) -> &[GateDescriptor<Handler>; 256] {
        unsafe { &*(self as *const Self as *const [GateDescriptor<Handler>; 256]) }
    }

    pub fn handler_address(&self, vector: u8) -> VirtualAddress {
        let slot = &self.raw_slots()[vector as usize];
        VirtualAddress::new(
            slot.pointer_low as u64
                | (slot.pointer_mid as u64) << 16
                | (slot.pointer_high as u64) << 32,
        )
    }

    pub fn is_present(&self, vector: u8) -> bool {
        self.raw_slots()[vector as usize].options.present()
    }
}

impl Index<u8> for InterruptDescriptorTable {
    type Output = GateDescriptor<Handler>;

    /// Device vectors only; exceptions 0-31 go through their named fields.
    fn index(&self, vector: u8) -> &Self::Output {
        assert!(vector >= DEVICE_VECTOR_START);
        &self.device_interrupts[(vector - DEVICE_VECTOR_START) as usize]
    }
}

impl IndexMut<u8> for InterruptDescriptorTable {
    fn index_mut(&mut self, vector: u8) -> &mut Self::Output {
        assert!(vector >= DEVICE_VECTOR_START);
        &mut self.device_interrupts[(vector - DEVICE_VECTOR_START) as usize]
    }
}

#[derive(Debug, Clone, Copy)]
#[repr(C)]
pub struct GateDescriptor<F>
where
    F: HandlerFn,
{
    pointer_low: u16,
    selector: SegmentSelector,
    pub options: GateOptions,
    pointer_mid: u16,
    pointer_high: u32,
    _reserved: u32,

    _handler: PhantomData<F>,
}

impl<F: HandlerFn> GateDescriptor<F> {
    /// A present interrupt gate for `handler`, targeting the current code
    /// segment. Pure apart from reading CS: identical inputs give identical
    /// bytes.
    #[inline]
    pub fn new(handler: F) -> Self {
        let address = handler.address().as_u64();
        Self {
            pointer_low: address as u16,
            selector: SegmentSelector::current(),
            options: GateOptions::new(),
            pointer_mid: (address >> 16) as u16,
            pointer_high: (address >> 32) as u32,
            _reserved: 0,

            _handler: PhantomData,
        }
    }

    #[inline]
    pub const fn empty() -> Self {
        Self {
            pointer_low: 0,
            selector: SegmentSelector::zero(),
            options: GateOptions::empty(),
            pointer_mid: 0,
            pointer_high: 0,
            _reserved: 0,

            _handler: PhantomData,
        }
    }
}

///  Gate Options
///
/// ┌──┬───────────────┐
/// │ 0│   Interrupt   │
/// │ 1│  Stack Table  │
/// │ 2│     Index     │
/// ├──┼───────────────┤
/// │ 3│               │
/// │ 4│               │
/// │ 5│   Reserved    │
/// │ 6│               │
/// │ 7│               │
/// ├──┼───────────────┤
/// │ 8│Interrupt/Trap │
/// ├──┼───────────────┤
/// │ 9│               │
/// │10│   always 1    │
/// │11│               │
/// ├──┼───────────────┤
/// │12│   always 0    │
/// ├──┼───────────────┤
/// │13│  Descriptor   │
/// │14│Privilege Level│
/// ├──┼───────────────┤
/// │15│   Present     │
/// └──┴───────────────┘
#[derive(Clone, Copy, PartialEq, Eq)]
#[repr(transparent)]
pub struct GateOptions(u16);

impl GateOptions {
    const STACK_INDEX: Range<usize> = 0..3;
    const TRAP_GATE: usize = 8;
    const DPL: Range<usize> = 13..15;
    const PRESENT: usize = 15;

    /// present interrupt gate: interrupts stay masked while the handler runs
    #[inline]
    fn new() -> Self {
        let mut options = Self::empty();
        options.set_present(true);
        options
    }

    #[inline]
    const fn empty() -> Self {
        Self(0b1110_0000_0000)
    }

    /// Switch to the TSS stack at `index` on entry; hardware encodes "no
    /// switch" as 0, so the slot index is stored off by one.
    ///
    /// safety: the TSS slot at `index` must hold a valid stack top before
    /// the table is loaded.
    pub unsafe fn set_stack_index(&mut self, index: u16) -> &mut Self {
        self.0.set_bits(Self::STACK_INDEX, index + 1);
        self
    }

    /// Trap gates leave interrupts unmasked during the handler.
    #[allow(dead_code)]
    pub fn set_trap_gate(&mut self, trap: bool) -> &mut Self {
        self.0.set_bit(Self::TRAP_GATE, trap);
        self
    }

    #[allow(dead_code)]
    pub fn set_privilege_level(&mut self, dpl: u16) -> &mut Self {
        self.0.set_bits(Self::DPL, dpl);
        self
    }

    pub fn set_present(&mut self, present: bool) -> &mut Self {
        self.0.set_bit(Self::PRESENT, present);
        self
    }

    pub fn present(&self) -> bool {
        self.0.bit(Self::PRESENT)
    }

    pub fn stack_index(&self) -> u16 {
        self.0.bits(Self::STACK_INDEX)
    }
}

impl fmt::Debug for GateOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GateOptions")
            .field("stack_index", &self.stack_index())
            .field("trap_gate", &self.0.bit(Self::TRAP_GATE))
            .field("dpl", &self.0.bits(Self::DPL))
            .field("present", &self.present())
            .finish()
    }
}
