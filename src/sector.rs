use alloc::boxed::Box;
use alloc::vec::Vec;

/// ext2 images are always addressed in 512 byte sectors.
pub const BYTES_PER_SECTOR: usize = 512;

/// Index of a 512 byte sector from the start of the image.
#[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub struct SectorIndex(pub u64);

impl SectorIndex {
    pub const fn new(value: u64) -> Self {
        Self(value)
    }

    /// Byte offset of the start of this sector, or `None` on overflow.
    pub fn offset_bytes(self) -> Option<u64> {
        self.0.checked_mul(BYTES_PER_SECTOR as u64)
    }
}

/// Something that hands out read-only views of the sectors backing a
/// filesystem image.
///
/// Bounds are checked on every call. A successful call says nothing about
/// whether a later one with a different index will succeed.
pub trait SectorAccessor {
    /// `num_sectors` contiguous sectors starting at `start`, or `None` if any
    /// part of that range lies outside the image.
    fn sectors(&self, start: SectorIndex, num_sectors: u64) -> Option<&[u8]>;

    /// A single sector, or `None` if it lies outside the image.
    fn sector_at(&self, index: SectorIndex) -> Option<&[u8; BYTES_PER_SECTOR]> {
        self.sectors(index, 1)?.try_into().ok()
    }
}

impl SectorAccessor for [u8] {
    fn sectors(&self, start: SectorIndex, num_sectors: u64) -> Option<&[u8]> {
        let offset = usize::try_from(start.offset_bytes()?).ok()?;
        let len = usize::try_from(num_sectors.checked_mul(BYTES_PER_SECTOR as u64)?).ok()?;
        let end = offset.checked_add(len)?;
        self.get(offset..end)
    }
}

impl SectorAccessor for Vec<u8> {
    fn sectors(&self, start: SectorIndex, num_sectors: u64) -> Option<&[u8]> {
        self.as_slice().sectors(start, num_sectors)
    }
}

impl SectorAccessor for Box<[u8]> {
    fn sectors(&self, start: SectorIndex, num_sectors: u64) -> Option<&[u8]> {
        (**self).sectors(start, num_sectors)
    }
}

impl<T: SectorAccessor + ?Sized> SectorAccessor for &T {
    fn sectors(&self, start: SectorIndex, num_sectors: u64) -> Option<&[u8]> {
        (**self).sectors(start, num_sectors)
    }
}
