//! Classification of a file's logical blocks into the inode's addressing
//! tiers.
//!
//! See <https://www.nongnu.org/ext2-doc/ext2.html#i-block>

use crate::inode::DIRECT_BLOCKS;

/// Which block pointer (and which slots of which indirect blocks) hold the
/// physical address of a logical block.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum BlockMapping {
    /// `i_block[index]` is the data block.
    Direct { index: usize },

    /// `i_block[12]` points at a block of pointers; `index` selects one.
    SinglyIndirect { index: u64 },

    /// `i_block[13]` points at a block of pointers to pointer blocks.
    /// `first` selects the pointer block, `second` the data block within it.
    DoublyIndirect { first: u64, second: u64 },

    /// Would go through `i_block[14]`. Not supported; reads treat these
    /// blocks as holes.
    TriplyIndirect,
}

impl BlockMapping {
    /// Maps a logical block index for a filesystem with
    /// `pointers_per_block` 32-bit pointers per indirect block.
    pub fn for_logical_block(logical_block: u64, pointers_per_block: u64) -> Self {
        let direct = DIRECT_BLOCKS as u64;
        if logical_block < direct {
            return Self::Direct {
                index: logical_block as usize,
            };
        }

        let index = logical_block - direct;
        if index < pointers_per_block {
            return Self::SinglyIndirect { index };
        }

        let index = index - pointers_per_block;
        let doubly_span = pointers_per_block.saturating_mul(pointers_per_block);
        if index < doubly_span {
            return Self::DoublyIndirect {
                first: index / pointers_per_block,
                second: index % pointers_per_block,
            };
        }

        Self::TriplyIndirect
    }
}
