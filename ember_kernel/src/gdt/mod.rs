mod registers;

mod gdt;
use gdt::{GlobalDescriptorTable, SegmentDescriptor};

mod tss;
pub use tss::{TaskStateSegment, TssError};

use crate::mem::VirtualAddress;
use crate::utils::BitField;
use core::ptr::addr_of;
use spin::Lazy;

const IST_STACK_SIZE: usize = 4096 * 5;

pub const DOUBLE_FAULT_IST_INDEX: u16 = 0;
pub const PAGE_FAULT_IST_INDEX: u16 = 1;

/// IST slots that gate descriptors hand out, see `interrupts::handlers`.
const USED_IST: [u16; 2] = [DOUBLE_FAULT_IST_INDEX, PAGE_FAULT_IST_INDEX];

// stacks grow downward, so keeping the top 16 byte aligned is what matters
#[repr(align(16))]
struct IstStack([u8; IST_STACK_SIZE]);

macro_rules! ist_stack_top {
    () => {{
        static mut STACK: IstStack = IstStack([0; IST_STACK_SIZE]);
        VirtualAddress::from_ptr(unsafe { addr_of!(STACK) }) + IST_STACK_SIZE as u64
    }};
}

static TSS: Lazy<TaskStateSegment> = Lazy::new(|| {
    let mut tss = TaskStateSegment::new();

    // rsp0 is only consulted on a privilege change; nothing drops to ring 3
    // yet, but the slot should never be null once the TSS is live
    tss.privilege_stack_table[0] = ist_stack_top!();

    tss.set_interrupt_stack(DOUBLE_FAULT_IST_INDEX, ist_stack_top!());
    tss.set_interrupt_stack(PAGE_FAULT_IST_INDEX, ist_stack_top!());

    tss
});

static GDT: Lazy<(GlobalDescriptorTable, Segments)> = Lazy::new(|| {
    // a null or misaligned stack here is fatal once the first matching
    // vector fires, so refuse to build the descriptor at all
    if let Err(err) = TSS.validate(&USED_IST) {
        panic!("refusing to install TSS: {:?}", err);
    }

    let mut gdt = GlobalDescriptorTable::new();

    let code = gdt.add_descriptor(SegmentDescriptor::kernel_code());
    let data = gdt.add_descriptor(SegmentDescriptor::kernel_data());
    let tss = gdt.add_descriptor(SegmentDescriptor::tss(&TSS));

    (gdt, Segments { code, data, tss })
});

/// Build and load the GDT, reload the segment registers and activate the
/// TSS. Must run before the vector table is installed: gate descriptors
/// reference IST slots that mean nothing until the task register is loaded.
pub fn init() {
    GDT.0.load();

    unsafe {
        registers::set_cs(GDT.1.code);
        registers::set_ds(GDT.1.data);
        registers::set_es(GDT.1.data);
        registers::set_ss(GDT.1.data);

        registers::load_task_register(GDT.1.tss);
    }
}

#[derive(Debug, Clone, Copy)]
struct Segments {
    code: SegmentSelector,
    data: SegmentSelector,
    tss: SegmentSelector,
}

///   Segment Selector
/// ┌──┬───────────────┐
/// │ 0│   Privilege   │
/// │ 1│     Level     │
/// ├──┼───────────────┤
/// │ 2│    GDT/LDT    │
/// ├──┼───────────────┤
/// │ 3│               │
/// │ .│               │
/// │ .│     Index     │
/// │ .│               │
/// │15│               │
/// └──┴───────────────┘
#[derive(Clone, Copy, PartialEq, Eq)]
#[repr(transparent)]
pub struct SegmentSelector(u16);

impl SegmentSelector {
    #[inline]
    pub fn new(index: u16, privilege_level: PrivilegeLevel) -> Self {
        let mut selector = 0;
        selector.set_bits(0..2, privilege_level as u16);
        selector.set_bits(3.., index);
        SegmentSelector(selector)
    }

    /// short hand for `SegmentSelector::new(0, PrivilegeLevel::Ring0)`, but const!
    #[inline]
    pub const fn zero() -> Self {
        SegmentSelector(0)
    }

    #[inline]
    pub fn as_u16(&self) -> u16 {
        self.0
    }

    pub fn index(&self) -> u16 {
        self.0.bits(3..)
    }

    pub fn privilege_level(&self) -> PrivilegeLevel {
        PrivilegeLevel::from_u16(self.0.bits(0..2))
    }

    /// The selector currently in CS.
    pub fn current() -> Self {
        let selector: u16;
        unsafe {
            core::arch::asm!("mov {0:x}, cs", out(reg) selector, options(nomem, nostack, preserves_flags));
        }
        SegmentSelector(selector)
    }
}

impl core::fmt::Debug for SegmentSelector {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("SegmentSelector")
            .field("index", &self.index())
            .field("privilege_level", &self.privilege_level())
            .finish()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PrivilegeLevel {
    Ring0 = 0,
    Ring1 = 1,
    Ring2 = 2,
    Ring3 = 3,
}

impl PrivilegeLevel {
    pub fn from_u16(value: u16) -> Self {
        match value {
            0 => PrivilegeLevel::Ring0,
            1 => PrivilegeLevel::Ring1,
            2 => PrivilegeLevel::Ring2,
            3 => PrivilegeLevel::Ring3,
            _ => panic!("invalid privilege level"),
        }
    }
}

mod tests {
    use super::*;
    use ember_test::kernel_test;

    #[kernel_test]
    fn tss_null_ist_slot_rejected(_: &bootloader_api::BootInfo) -> bool {
        let mut tss = TaskStateSegment::new();

        // a fresh TSS has no stacks, validation must refuse it
        if tss.validate(&[DOUBLE_FAULT_IST_INDEX]).is_ok() {
            return false;
        }

        tss.set_interrupt_stack(
            DOUBLE_FAULT_IST_INDEX,
            VirtualAddress::new(0xffff_8000_0010_0000),
        );
        if tss.validate(&[DOUBLE_FAULT_IST_INDEX]).is_err() {
            return false;
        }

        // slots nothing references stay out of the check
        tss.validate(&USED_IST) == Err(TssError::NullStack {
            ist_index: PAGE_FAULT_IST_INDEX,
        })
    }

    #[kernel_test]
    fn tss_misaligned_stack_rejected(_: &bootloader_api::BootInfo) -> bool {
        let mut tss = TaskStateSegment::new();
        tss.set_interrupt_stack(
            DOUBLE_FAULT_IST_INDEX,
            VirtualAddress::new(0xffff_8000_0010_0008),
        );

        tss.validate(&[DOUBLE_FAULT_IST_INDEX])
            == Err(TssError::UnalignedStack {
                ist_index: DOUBLE_FAULT_IST_INDEX,
            })
    }

    #[kernel_test]
    fn tss_construction_is_deterministic(_: &bootloader_api::BootInfo) -> bool {
        fn build() -> TaskStateSegment {
            let mut tss = TaskStateSegment::new();
            tss.set_interrupt_stack(0, VirtualAddress::new(0xffff_8000_0020_0000));
            tss.set_interrupt_stack(1, VirtualAddress::new(0xffff_8000_0030_0000));
            tss
        }

        fn bytes(tss: &TaskStateSegment) -> &[u8] {
            unsafe {
                core::slice::from_raw_parts(
                    tss as *const _ as *const u8,
                    core::mem::size_of::<TaskStateSegment>(),
                )
            }
        }

        let (first, second) = (build(), build());
        bytes(&first) == bytes(&second)
    }
}
