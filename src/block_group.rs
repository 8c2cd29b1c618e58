use zerocopy::{FromBytes, FromZeroes};

use crate::bytes::{read_record, Le16, Le32};
use crate::error::{Error, Result};
use crate::geometry::FilesystemGeometry;
use crate::sector::SectorAccessor;

/// Address of a cluster (ext2 block) in the filesystem, as stored on disk.
#[repr(transparent)]
#[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ClusterAddress(pub u32);

impl ClusterAddress {
    /// Pointers of 0 mark holes and unused slots.
    pub fn is_null(self) -> bool {
        self.0 == 0
    }
}

/// Index for a given block group.
#[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub struct BlockGroupIndex(pub u32);

/// See <https://www.nongnu.org/ext2-doc/ext2.html#block-group-descriptor-structure>
///
/// This is the 32 byte ext2/ext3 layout. 64-bit descriptors are not supported.
#[repr(C)]
#[derive(Debug, FromZeroes, FromBytes)]
#[allow(dead_code)]
pub(crate) struct RawGroupDescriptor {
    pub(crate) block_bitmap: Le32,
    pub(crate) inode_bitmap: Le32,
    pub(crate) inode_table: Le32,
    pub(crate) free_blocks_count: Le16,
    pub(crate) free_inodes_count: Le16,
    pub(crate) used_dirs_count: Le16,
    _pad: Le16,
    _reserved: [u8; 12],
}

impl RawGroupDescriptor {
    pub(crate) const SIZE: u32 = core::mem::size_of::<Self>() as u32;
}

/// Decoded block group descriptor.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct GroupDescriptor {
    pub block_bitmap: ClusterAddress,
    pub inode_bitmap: ClusterAddress,
    pub inode_table: ClusterAddress,
    /// The cluster right after this group's inode table.
    pub first_data_block: ClusterAddress,
}

/// The descriptor table starts in the block after the superblock. With 1KiB
/// clusters the superblock is block 1, so the table is at block 2; with larger
/// clusters the superblock lives inside block 0 and the table is at block 1.
pub fn descriptor_table_start(bytes_per_cluster: u32) -> u64 {
    if bytes_per_cluster == 1024 {
        2
    } else {
        1
    }
}

/// Reads one descriptor per block group and stores them in `geometry.groups`.
///
/// All or nothing: any unreadable sector fails the whole load with
/// `SuperblockInvalid`, and the geometry is consumed.
pub fn load_group_descriptors<S: SectorAccessor + ?Sized>(
    image: &S,
    mut geometry: FilesystemGeometry,
) -> Result<FilesystemGeometry> {
    let descriptors_per_cluster = geometry.bytes_per_cluster / RawGroupDescriptor::SIZE;
    let table_start = descriptor_table_start(geometry.bytes_per_cluster);
    let sectors_per_cluster = geometry.sectors_per_cluster();
    let inode_table_clusters = geometry.inode_table_clusters();

    geometry.groups.clear();
    for i in 0..geometry.group_count {
        let block = table_start + u64::from(i / descriptors_per_cluster);
        let sector = geometry
            .cluster_sector(block)
            .ok_or(Error::SuperblockInvalid)?;
        let cluster = image
            .sectors(sector, sectors_per_cluster)
            .ok_or(Error::SuperblockInvalid)?;

        let offset = ((i % descriptors_per_cluster) * RawGroupDescriptor::SIZE) as usize;
        let raw: RawGroupDescriptor =
            read_record(cluster, offset).ok_or(Error::SuperblockInvalid)?;

        let inode_table = raw.inode_table.get();
        let first_data_block = u64::from(inode_table) + inode_table_clusters;
        let descriptor = GroupDescriptor {
            block_bitmap: ClusterAddress(raw.block_bitmap.get()),
            inode_bitmap: ClusterAddress(raw.inode_bitmap.get()),
            inode_table: ClusterAddress(inode_table),
            // Truncation only matters for corrupt tables pointing at the very
            // end of the 32-bit address space.
            first_data_block: ClusterAddress(first_data_block as u32),
        };
        log::trace!("ext2: group {i}: {descriptor:?}");
        geometry.groups.push(descriptor);
    }

    Ok(geometry)
}
