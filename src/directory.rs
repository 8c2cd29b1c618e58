use alloc::string::String;

use crate::bytes::{read_u16_le, read_u32_le};
use crate::inode::InodeNumber;

/// See <https://www.nongnu.org/ext2-doc/ext2.html#linked-directories>
///
/// One cluster of directory data. Entries form a linked list where each
/// record's `rec_len` is the distance to the next one.
#[derive(Debug, Clone)]
pub struct DirectoryBlock<'a>(pub &'a [u8]);

impl<'a> DirectoryBlock<'a> {
    /// Iterates over the valid entries, in on-disk order.
    pub fn iter(&self) -> DirectoryBlockIterator<'a> {
        DirectoryBlockIterator {
            block: self.0,
            offset: 0,
        }
    }

    /// First valid entry whose name is exactly `name`, byte for byte.
    pub fn find(&self, name: &[u8]) -> Option<DirectoryEntryRecord<'a>> {
        self.iter().find(|entry| entry.name == name)
    }
}

/// Walks the entry records of a directory cluster.
///
/// Stops at the end of the cluster, at a record with `rec_len == 0`, or at a
/// record whose header or name would run past the end of the cluster. Deleted
/// slots (inode 0) and records with a bogus name length are skipped, but
/// their `rec_len` is still followed. Every step advances by at least one
/// byte, so a scan never takes more steps than the cluster has bytes.
pub struct DirectoryBlockIterator<'a> {
    block: &'a [u8],
    offset: usize,
}

impl<'a> Iterator for DirectoryBlockIterator<'a> {
    type Item = DirectoryEntryRecord<'a>;

    fn next(&mut self) -> Option<Self::Item> {
        while self.offset < self.block.len() {
            let offset = self.offset;
            let Some(header) = DirectoryEntryHeader::read(self.block, offset) else {
                self.offset = self.block.len();
                return None;
            };
            if header.rec_len == 0 {
                self.offset = self.block.len();
                return None;
            }
            self.offset += usize::from(header.rec_len);

            if !header.is_valid() {
                continue;
            }

            let name_start = offset + DirectoryEntryHeader::SIZE;
            let name_end = name_start + usize::from(header.name_len);
            let Some(name) = self.block.get(name_start..name_end) else {
                self.offset = self.block.len();
                return None;
            };

            return Some(DirectoryEntryRecord {
                offset,
                inode: InodeNumber(header.inode),
                file_type: DirectoryEntryFileType::from(header.raw_file_type),
                name,
            });
        }
        None
    }
}

/// See <https://www.nongnu.org/ext2-doc/ext2.html#linked-directory-entry-structure>
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
struct DirectoryEntryHeader {
    inode: u32,
    rec_len: u16,
    name_len: u8,
    raw_file_type: u8,
}

impl DirectoryEntryHeader {
    const SIZE: usize = 8;

    fn read(bytes: &[u8], offset: usize) -> Option<Self> {
        let header = bytes.get(offset..offset.checked_add(Self::SIZE)?)?;
        Some(Self {
            inode: read_u32_le(header, 0)?,
            rec_len: read_u16_le(header, 4)?,
            name_len: header[6],
            raw_file_type: header[7],
        })
    }

    fn is_valid(&self) -> bool {
        self.inode != 0 && self.name_len > 0 && u16::from(self.name_len) < self.rec_len
    }
}

/// A valid entry as it sits in a directory cluster.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DirectoryEntryRecord<'a> {
    /// Byte offset of the record within its cluster.
    pub offset: usize,
    pub inode: InodeNumber,
    /// Taken from the entry, not the inode. Only meaningful with the
    /// `FILETYPE` feature, so it is informational.
    pub file_type: DirectoryEntryFileType,
    pub name: &'a [u8],
}

impl DirectoryEntryRecord<'_> {
    pub fn name_lossy(&self) -> String {
        String::from_utf8_lossy(self.name).into_owned()
    }
}

#[repr(u8)]
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum DirectoryEntryFileType {
    Unknown = 0,
    RegularFile = 1,
    Directory = 2,
    CharacterDevice = 3,
    BlockDevice = 4,
    Fifo = 5,
    Socket = 6,
    SymbolicLink = 7,
}

impl From<u8> for DirectoryEntryFileType {
    fn from(raw: u8) -> Self {
        match raw {
            1 => Self::RegularFile,
            2 => Self::Directory,
            3 => Self::CharacterDevice,
            4 => Self::BlockDevice,
            5 => Self::Fifo,
            6 => Self::Socket,
            7 => Self::SymbolicLink,
            _ => Self::Unknown,
        }
    }
}

/// A directory entry as returned by a listing, with metadata pulled from the
/// entry's own inode.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DirectoryEntry {
    pub name: String,
    pub size: u64,
    /// Unix timestamps, in seconds. See [`crate::Inode::creation_time`] for
    /// why `created` is often 0.
    pub created: u32,
    pub accessed: u32,
    pub modified: u32,
    pub is_dir: bool,
    /// Hard link count of the entry's inode.
    pub links: u16,
    pub inode: InodeNumber,
}
