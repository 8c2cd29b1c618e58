use alloc::string::ToString;
use alloc::vec::Vec;
use core::fmt;

use bitflags::bitflags;
use zerocopy::{FromBytes, FromZeroes};

use crate::bytes::{read_record, Le16, Le32};
use crate::error::{Error, Result};
use crate::geometry::FilesystemGeometry;
use crate::sector::{SectorAccessor, SectorIndex, BYTES_PER_SECTOR};
use crate::strings::CStringBytes;

/// See <https://www.nongnu.org/ext2-doc/ext2.html#superblock>
///
/// Only the first 264 bytes are described; everything past `first_meta_bg`
/// is ext3/ext4 territory and never read.
#[repr(C)]
#[derive(Debug, FromZeroes, FromBytes)]
#[allow(dead_code)]
pub(crate) struct Superblock {
    pub(crate) inodes_count: Le32,
    pub(crate) blocks_count: Le32,
    pub(crate) reserved_blocks_count: Le32,
    pub(crate) free_blocks_count: Le32,
    pub(crate) free_inodes_count: Le32,
    pub(crate) first_data_block: Le32,
    pub(crate) log_block_size: Le32,
    pub(crate) log_frag_size: Le32,
    pub(crate) blocks_per_group: Le32,
    pub(crate) frags_per_group: Le32,
    pub(crate) inodes_per_group: Le32,
    pub(crate) mount_time: Le32,
    pub(crate) write_time: Le32,
    pub(crate) mount_count: Le16,
    pub(crate) max_mount_count: Le16,
    pub(crate) magic: Le16,
    pub(crate) state: Le16,
    pub(crate) errors: Le16,
    pub(crate) minor_rev_level: Le16,
    pub(crate) lastcheck: Le32,
    pub(crate) checkinterval: Le32,
    pub(crate) creator_os: Le32,
    pub(crate) rev_level: Le32,
    pub(crate) def_resuid: Le16,
    pub(crate) def_resgid: Le16,

    // EXT2_DYNAMIC_REV Specific
    pub(crate) first_ino: Le32,
    pub(crate) inode_size: Le16,
    pub(crate) block_group_nr: Le16,
    pub(crate) feature_compat: Le32,
    pub(crate) feature_incompat: Le32,
    pub(crate) feature_ro_compat: Le32,
    pub(crate) uuid: Uuid,
    pub(crate) volume_name: CStringBytes<[u8; 16]>,
    pub(crate) last_mounted: CStringBytes<[u8; 64]>,
    pub(crate) algo_bitmap: Le32,

    // Performance Hints
    pub(crate) prealloc_blocks: u8,
    pub(crate) prealloc_dir_blocks: u8,
    pub(crate) reserved_gdt_blocks: Le16,

    // Journaling Support
    pub(crate) journal_uuid: Uuid,
    pub(crate) journal_inum: Le32,
    pub(crate) journal_dev: Le32,
    pub(crate) last_orphan: Le32,

    // Directory Indexing Support
    pub(crate) hash_seed: [Le32; 4],
    pub(crate) def_hash_version: u8,
    pub(crate) padding: [u8; 3],

    // Other options
    pub(crate) default_mount_options: Le32,
    pub(crate) first_meta_bg: Le32,
}

impl Superblock {
    /// The superblock is always located at byte offset 1024 from the beginning
    /// of the image, which is the third 512 byte sector.
    pub(crate) const SECTOR: SectorIndex = SectorIndex::new(2);

    /// 16bit value identifying the file system as Ext2. The value is currently
    /// fixed to EXT2_SUPER_MAGIC of value 0xEF53.
    /// <https://www.nongnu.org/ext2-doc/ext2.html#s-magic>
    pub(crate) const MAGIC: u16 = 0xEF53;

    /// Revision 0 filesystems have fixed 128 byte inodes and no `inode_size`
    /// field.
    pub(crate) const GOOD_OLD_INODE_SIZE: u32 = 128;

    pub(crate) fn magic_valid(&self) -> bool {
        self.magic.get() == Self::MAGIC
    }

    /// The block size is computed using this 32bit value as the number of bits
    /// to shift left the value 1024. This value may only be non-negative.
    ///
    /// ```text
    /// block size = 1024 << s_log_block_size;
    /// ```
    ///
    /// Common block sizes include 1KiB, 2KiB, 4KiB and 8Kib. Returns `None`
    /// if the shift doesn't fit in 32 bits.
    pub(crate) fn block_size(&self) -> Option<u32> {
        let shift = self.log_block_size.get();
        if shift >= 32 {
            return None;
        }
        u32::try_from(1024_u64 << shift).ok()
    }

    pub(crate) fn inode_size(&self) -> u32 {
        if self.rev_level.get() == 0 {
            return Self::GOOD_OLD_INODE_SIZE;
        }
        u32::from(self.inode_size.get())
    }
}

/// Reads the superblock sector and fills in the filesystem geometry. The group
/// descriptor table is not read here, so `groups` comes back empty.
pub fn decode_superblock<S: SectorAccessor + ?Sized>(image: &S) -> Result<FilesystemGeometry> {
    let sector = image
        .sector_at(Superblock::SECTOR)
        .ok_or(Error::SuperblockInvalid)?;
    let superblock: Superblock = read_record(sector, 0).ok_or(Error::SuperblockInvalid)?;
    if !superblock.magic_valid() {
        return Err(Error::SuperblockInvalid);
    }

    let bytes_per_cluster = superblock.block_size().ok_or(Error::SuperblockInvalid)?;
    let clusters_per_group = superblock.blocks_per_group.get();
    if clusters_per_group == 0 {
        return Err(Error::SuperblockInvalid);
    }
    let inodes_per_group = superblock.inodes_per_group.get();
    if inodes_per_group == 0 {
        return Err(Error::SuperblockInvalid);
    }

    let cluster_count = superblock.blocks_count.get();
    let feature_incompat =
        FeatureIncompatFlags::from_bits_retain(superblock.feature_incompat.get());
    let unsupported = feature_incompat.difference(FeatureIncompatFlags::EXT2_SUPPORTED);
    if !unsupported.is_empty() {
        log::warn!("ext2: ignoring unsupported incompatible features {unsupported:?}");
    }

    let geometry = FilesystemGeometry {
        bytes_per_sector: BYTES_PER_SECTOR as u32,
        bytes_per_cluster,
        cluster_count,
        inode_count: superblock.inodes_count.get(),
        inodes_per_group,
        bytes_per_inode: superblock.inode_size(),
        // Integer division on purpose: a partial trailing group is dropped.
        group_count: cluster_count / clusters_per_group,
        clusters_per_group,
        feature_compat: FeatureCompatFlags::from_bits_retain(superblock.feature_compat.get()),
        feature_incompat,
        feature_ro_compat: FeatureReadOnlyCompatFlags::from_bits_retain(
            superblock.feature_ro_compat.get(),
        ),
        reserved_gdt_clusters: superblock.reserved_gdt_blocks.get(),
        // FLEX_BG is not supported, so the period is never read from disk.
        flex_group_period: 0,
        revision: superblock.rev_level.get(),
        volume_name: superblock.volume_name.as_str().to_string(),
        uuid: superblock.uuid,
        groups: Vec::new(),
    };
    log::debug!(
        "ext2: {} clusters of {} bytes, {} groups, {} inodes of {} bytes",
        geometry.cluster_count,
        geometry.bytes_per_cluster,
        geometry.group_count,
        geometry.inode_count,
        geometry.bytes_per_inode,
    );

    Ok(geometry)
}

bitflags! {
    /// <https://www.nongnu.org/ext2-doc/ext2.html#s-feature-compat>
    #[derive(Debug, Copy, Clone, PartialEq, Eq)]
    pub struct FeatureCompatFlags: u32 {
        /// Block pre-allocation for new directories
        const DIR_PREALLOC = 0x0001;

        const IMAGIC_INODES = 0x0002;

        /// An Ext3 journal exists
        const HAS_JOURNAL = 0x0004;

        /// Extended inode attributes are present
        const EXT_ATTR = 0x0008;

        /// Non-standard inode size used
        const RESIZE_INODE = 0x0010;

        /// Directory indexing (HTree)
        const DIR_INDEX = 0x0020;
    }
}

bitflags! {
    /// <https://www.nongnu.org/ext2-doc/ext2.html#s-feature-incompat>
    #[derive(Debug, Copy, Clone, PartialEq, Eq)]
    pub struct FeatureIncompatFlags: u32 {
        /// Disk/File compression is used
        const COMPRESSION = 0x0001;
        const FILETYPE = 0x0002;
        const RECOVER = 0x0004;
        const JOURNAL_DEV = 0x0008;
        const META_BG = 0x0010;
        const EXTENTS = 0x0040;
        const SIXTY_FOUR_BIT = 0x0080;
        const FLEX_BG = 0x0200;

        /// Everything a plain ext2 reader can cope with.
        const EXT2_SUPPORTED = Self::FILETYPE.bits() | Self::META_BG.bits();
    }
}

bitflags! {
    /// <https://www.nongnu.org/ext2-doc/ext2.html#s-feature-ro-compat>
    #[derive(Debug, Copy, Clone, PartialEq, Eq)]
    pub struct FeatureReadOnlyCompatFlags: u32 {
        /// Sparse Superblock
        const SPARSE_SUPER = 0x0001;

        /// Filesystem uses a 64bit file size
        const LARGE_FILE = 0x0002;

        /// Binary tree sorted directory files
        const BTREE_DIR = 0x0004;
    }
}

#[derive(Copy, Clone, PartialEq, Eq, FromZeroes, FromBytes)]
#[repr(transparent)]
pub struct Uuid(pub [u8; 16]);

impl fmt::Debug for Uuid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "UUID({self})")
    }
}

impl fmt::Display for Uuid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, byte) in self.0.iter().enumerate() {
            if matches!(i, 4 | 6 | 8 | 10) {
                write!(f, "-")?;
            }
            write!(f, "{byte:02x}")?;
        }
        Ok(())
    }
}
