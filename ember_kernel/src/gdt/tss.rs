use crate::mem::VirtualAddress;
use core::mem::size_of;

/// On x86_64 the TSS no longer holds task context, only the privilege-level
/// stack pointers, the interrupt stack table and the I/O map base.
#[derive(Debug, Clone, Copy)]
#[repr(C, packed(4))]
pub struct TaskStateSegment {
    _reserved: u32,
    pub privilege_stack_table: [VirtualAddress; 3],
    _reserved2: u64,
    pub interrupt_stack_table: [VirtualAddress; 7],
    _reserved3: u64,
    _reserved4: u16,
    iomap_base: u16,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TssError {
    NullStack { ist_index: u16 },
    UnalignedStack { ist_index: u16 },
}

impl TaskStateSegment {
    #[inline]
    pub const fn new() -> Self {
        Self {
            privilege_stack_table: [VirtualAddress::zero(); 3],
            interrupt_stack_table: [VirtualAddress::zero(); 7],
            iomap_base: size_of::<Self>() as u16,

            _reserved: 0,
            _reserved2: 0,
            _reserved3: 0,
            _reserved4: 0,
        }
    }

    /// `stack_top` is the high end of the stack, the CPU pushes downward
    /// from there.
    #[inline]
    pub fn set_interrupt_stack(&mut self, index: u16, stack_top: VirtualAddress) {
        assert!((index as usize) < self.interrupt_stack_table.len());
        self.interrupt_stack_table[index as usize] = stack_top;
    }

    /// Reject a TSS that would hand the CPU a null or misaligned stack.
    /// `used_ist` lists the IST slots gate descriptors reference; the check
    /// must pass before the TSS descriptor is loaded, a bad slot is only
    /// discovered by hardware once the matching vector fires.
    pub fn validate(&self, used_ist: &[u16]) -> Result<(), TssError> {
        for &ist_index in used_ist {
            let stack = self.interrupt_stack_table[ist_index as usize];
            if stack.is_null() {
                return Err(TssError::NullStack { ist_index });
            }
            if !stack.is_aligned(16) {
                return Err(TssError::UnalignedStack { ist_index });
            }
        }
        Ok(())
    }
}
