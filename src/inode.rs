use bitflags::bitflags;
use zerocopy::{FromBytes, FromZeroes};

use crate::block_group::ClusterAddress;
use crate::bytes::{Le16, Le32};

/// "Global" inode number within the filesystem. Inode numbers start at 1.
#[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[repr(transparent)]
pub struct InodeNumber(pub u32);

/// The root directory of the filesystem is always inode 2.
pub const ROOT_DIRECTORY: InodeNumber = InodeNumber(2);

/// A `LocalInodeIndex` is an inode's index within a block group.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct LocalInodeIndex(pub u32);

/// Number of direct block pointers in an inode.
pub const DIRECT_BLOCKS: usize = 12;

/// See <https://www.nongnu.org/ext2-doc/ext2.html#inode-table>
///
/// The first 128 bytes are the ext2 inode. The tail is the extended area that
/// larger inode records carry, which is where the creation time lives. Records
/// shorter than this struct leave the tail zeroed.
#[repr(C)]
#[derive(Debug, Clone, FromZeroes, FromBytes)]
#[allow(dead_code)]
pub struct Inode {
    pub(crate) mode: Le16,
    pub(crate) uid: Le16,
    pub(crate) size_low: Le32,
    pub(crate) atime: Le32,
    pub(crate) ctime: Le32,
    pub(crate) mtime: Le32,
    pub(crate) dtime: Le32,
    pub(crate) gid: Le16,
    pub(crate) links_count: Le16,
    pub(crate) blocks: Le32,
    pub(crate) flags: Le32,
    pub(crate) osd1: Le32,
    pub(crate) direct_blocks: [Le32; DIRECT_BLOCKS],
    pub(crate) singly_indirect_block: Le32,
    pub(crate) doubly_indirect_block: Le32,
    pub(crate) triply_indirect_block: Le32,
    pub(crate) generation: Le32,
    pub(crate) file_acl: Le32,
    /// High 32 bits of file size. This is dir_acl in revision 0.
    pub(crate) size_high: Le32,
    pub(crate) faddr: Le32,
    pub(crate) osd2: [u8; 12],

    // Extended area, only present when the on-disk record is large enough.
    pub(crate) extra_isize: Le16,
    pub(crate) checksum_high: Le16,
    pub(crate) ctime_extra: Le32,
    pub(crate) mtime_extra: Le32,
    pub(crate) atime_extra: Le32,
    pub(crate) crtime: Le32,
    pub(crate) crtime_extra: Le32,
    pub(crate) version_high: Le32,
    pub(crate) projid: Le32,
}

impl Inode {
    /// Size of the in-memory record. On-disk bytes past this are ignored.
    pub const SIZE: usize = core::mem::size_of::<Self>();

    pub fn mode(&self) -> InodeMode {
        InodeMode::from_bits_retain(self.mode.get())
    }

    pub fn is_dir(&self) -> bool {
        self.mode().format() == InodeMode::IFDIR
    }

    pub fn is_file(&self) -> bool {
        self.mode().format() == InodeMode::IFREG
    }

    pub fn is_symlink(&self) -> bool {
        self.mode().format() == InodeMode::IFLNK
    }

    /// The 64-bit size, combining the low and high halves.
    pub fn size(&self) -> u64 {
        (u64::from(self.size_high.get()) << 32) | u64::from(self.size_low.get())
    }

    pub fn links_count(&self) -> u16 {
        self.links_count.get()
    }

    pub fn access_time(&self) -> u32 {
        self.atime.get()
    }

    pub fn modification_time(&self) -> u32 {
        self.mtime.get()
    }

    /// Creation time from the extended inode area.
    ///
    /// Known to be unreliable: it is 0 for records too short to contain it
    /// (128 byte inodes), and on images written by tools that don't maintain
    /// it.
    pub fn creation_time(&self) -> u32 {
        self.crtime.get()
    }

    /// All 15 block pointers: 12 direct, then singly, doubly and triply
    /// indirect.
    pub fn block_pointer(&self, index: usize) -> Option<ClusterAddress> {
        let raw = match index {
            i if i < DIRECT_BLOCKS => self.direct_blocks[i],
            12 => self.singly_indirect_block,
            13 => self.doubly_indirect_block,
            14 => self.triply_indirect_block,
            _ => return None,
        };
        Some(ClusterAddress(raw.get()))
    }

    pub fn direct_blocks(&self) -> impl Iterator<Item = ClusterAddress> + '_ {
        self.direct_blocks.iter().map(|raw| ClusterAddress(raw.get()))
    }

    pub fn singly_indirect_block(&self) -> ClusterAddress {
        ClusterAddress(self.singly_indirect_block.get())
    }

    pub fn doubly_indirect_block(&self) -> ClusterAddress {
        ClusterAddress(self.doubly_indirect_block.get())
    }
}

bitflags! {
    /// <https://www.nongnu.org/ext2-doc/ext2.html#i-mode>
    #[derive(Debug, Copy, Clone, PartialEq, Eq)]
    pub struct InodeMode: u16 {
        // Access rights

        /// Others execute
        const IXOTH = 0x001;

        /// Others write
        const IWOTH = 0x002;

        /// Others read
        const IROTH = 0x004;

        /// Group execute
        const IXGRP = 0x008;

        /// Group write
        const IWGRP = 0x010;

        /// Group read
        const IRGRP = 0x020;

        /// User execute
        const IXUSR = 0x040;

        /// User write
        const IWUSR = 0x080;

        /// User read
        const IRUSR = 0x100;

        // Process execution user/group override

        /// Sticky bit
        const ISVTX = 0x200;

        /// Set process group id
        const ISGID = 0x400;

        /// Set process user id
        const ISUID = 0x800;

        // File format. These are values of the top four bits, not independent
        // flags, so compare with `format()` rather than `contains()`.

        /// FIFO
        const IFIFO = 0x1000;

        /// Character device
        const IFCHR = 0x2000;

        /// Directory
        const IFDIR = 0x4000;

        /// Block device
        const IFBLK = 0x6000;

        /// Regular file
        const IFREG = 0x8000;

        /// Symbolic link
        const IFLNK = 0xA000;

        /// Socket
        const IFSOCK = 0xC000;
    }
}

impl InodeMode {
    const FORMAT_MASK: u16 = 0xF000;

    /// Just the file format bits.
    pub fn format(self) -> Self {
        Self::from_bits_retain(self.bits() & Self::FORMAT_MASK)
    }
}
