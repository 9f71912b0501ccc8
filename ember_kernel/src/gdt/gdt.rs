use super::{PrivilegeLevel, SegmentSelector, TaskStateSegment};

use crate::mem::{DTPointer, VirtualAddress};
use crate::utils::BitField;

use core::mem::size_of;
use core::ops::Range;

#[derive(Clone, Copy)]
#[repr(transparent)]
struct GdtEntry(u64);

impl GdtEntry {
    const fn null() -> Self {
        Self(0)
    }
}

impl core::fmt::Debug for GdtEntry {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "{:#x}", self.0)
    }
}

#[derive(Debug, Clone)]
pub struct GlobalDescriptorTable {
    entries: [GdtEntry; 8],
    next: usize,
}

impl GlobalDescriptorTable {
    pub const fn new() -> Self {
        Self {
            entries: [GdtEntry::null(); 8],
            // entry 0 is the mandatory null descriptor
            next: 1,
        }
    }

    pub fn add_descriptor(&mut self, descriptor: SegmentDescriptor) -> SegmentSelector {
        let index = match descriptor {
            SegmentDescriptor::User(value) => self.push(value),
            SegmentDescriptor::System(lower, upper) => {
                let index = self.push(lower);
                self.push(upper);
                index
            }
        };

        SegmentSelector::new(index as u16, descriptor.privilege_level())
    }

    fn push(&mut self, value: u64) -> usize {
        assert!(self.next < self.entries.len(), "GDT is full");

        let index = self.next;
        self.entries[index] = GdtEntry(value);
        self.next += 1;

        index
    }

    pub fn load(&'static self) {
        let ptr = DTPointer {
            base: VirtualAddress::from_ptr(self.entries.as_ptr()),
            limit: (size_of::<[GdtEntry; 8]>() - 1) as u16,
        };

        unsafe {
            ptr.load_gdt();
        }
    }
}

/// ┌──┬───────────┐
/// │ 0│           │
/// │  │  Limit    │
/// │15│           │
/// ├──┼───────────┤
/// │16│           │
/// │  │   Base    │
/// │39│           │
/// ├──┼───────────┼─┬────────────────────┐
/// │40│           │0│      Accessed      │
/// │  │           ├─┼────────────────────┤
/// │  │           │1│  Readable/Writable │
/// │  │           ├─┼────────────────────┤
/// │  │           │2│Direction/Conforming│
/// │  │           ├─┼────────────────────┤
/// │  │Access Byte│3│     Executable     │
/// │  │           ├─┼────────────────────┤
/// │  │           │4│     System/User    │
/// │  │           ├─┼────────────────────┤
/// │  │           │5│      Privilege     │
/// │  │           │6│        Level       │
/// │  │           ├─┼────────────────────┤
/// │47│           │7│       Present      │
/// ├──┼───────────┼─┴────────────────────┘
/// │48│           │
/// │  │  Limit    │
/// │51│           │
/// ├──┼───────────┼─┬─────────────────┐
/// │52│           │0│Reserved         │
/// │  │           ├─┼─────────────────┤
/// │  │           │1│Long mode flag   │
/// │  │   Flags   ├─┼─────────────────┤
/// │  │           │2│Size flag        │
/// │  │           ├─┼─────────────────┤
/// │55│           │3│Granularity flag │
/// ├──┼───────────┼─┴─────────────────┘
/// │56│           │
/// │  │   Base    │
/// │63│           │
/// └──┴───────────┘
#[derive(Debug, Clone, Copy)]
pub enum SegmentDescriptor {
    /// code/data descriptor, one GDT entry
    User(u64),
    /// system descriptor (TSS), spans two consecutive GDT entries
    System(u64, u64),
}

impl SegmentDescriptor {
    const LIMIT_LOW: Range<usize> = 0..16;
    const LIMIT_HIGH: Range<usize> = 48..52;

    const BASE_LOW: Range<usize> = 16..40;
    const BASE_HIGH: Range<usize> = 56..64;

    const ACCESSED: usize = 40;
    const WRITABLE: usize = 41;
    const EXECUTABLE: usize = 43;
    const USER_SEGMENT: usize = 44;
    const DPL: Range<usize> = 45..47;
    const PRESENT: usize = 47;

    const LONG_MODE: usize = 53;
    const DEFAULT_SIZE: usize = 54;
    const GRANULARITY: usize = 55;

    fn common_bits() -> u64 {
        let mut bits: u64 = 0;

        // flat segment covering the full address space
        bits.set_bits(Self::LIMIT_LOW, 0xffff);
        bits.set_bits(Self::LIMIT_HIGH, 0xf);
        bits.set_bit(Self::GRANULARITY, true);

        bits.set_bit(Self::USER_SEGMENT, true);
        bits.set_bit(Self::PRESENT, true);
        bits.set_bit(Self::WRITABLE, true);
        bits.set_bit(Self::ACCESSED, true);

        bits
    }

    #[inline]
    pub fn kernel_code() -> Self {
        let mut bits = Self::common_bits();
        bits.set_bit(Self::EXECUTABLE, true);
        bits.set_bit(Self::LONG_MODE, true);

        Self::User(bits)
    }

    #[inline]
    pub fn kernel_data() -> Self {
        let mut bits = Self::common_bits();
        bits.set_bit(Self::DEFAULT_SIZE, true);

        Self::User(bits)
    }

    /// Encode the 16 byte system descriptor for an available 64 bit TSS.
    /// Pure: the same TSS address always encodes to the same bytes.
    #[inline]
    pub fn tss(tss: &'static TaskStateSegment) -> Self {
        let base = tss as *const _ as u64;

        let mut lower: u64 = 0;
        lower.set_bits(Self::BASE_LOW, base.bits(0..24));
        lower.set_bits(Self::BASE_HIGH, base.bits(24..32));
        lower.set_bits(Self::LIMIT_LOW, (size_of::<TaskStateSegment>() - 1) as u64);

        // type 0b1001: available 64 bit TSS
        lower.set_bit(Self::ACCESSED, true);
        lower.set_bit(Self::EXECUTABLE, true);
        lower.set_bit(Self::PRESENT, true);

        let mut upper: u64 = 0;
        upper.set_bits(0..32, base.bits(32..64));

        Self::System(lower, upper)
    }

    pub fn privilege_level(&self) -> PrivilegeLevel {
        let value = match self {
            Self::User(value) => value,
            Self::System(value, _) => value,
        };

        PrivilegeLevel::from_u16(value.bits(Self::DPL) as u16)
    }
}
