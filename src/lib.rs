//! Read-only interpretation of raw disk images as ext2 filesystems. Decodes the
//! superblock and block group descriptor table, resolves absolute paths to
//! inodes, lists directories and extracts file contents through the inode
//! block map.
//!
//! Only ext2 is interpreted. Images carrying the common ext2/3/4 superblock
//! magic are accepted, but journals, extent trees, extended attributes,
//! symbolic links, triply indirect blocks, `FLEX_BG` and 64-bit group
//! descriptors are not.
//!
//! # Resources
//!
//! - <https://wiki.osdev.org/Ext2>
//! - <https://www.nongnu.org/ext2-doc/ext2.html>
//! - <https://en.wikipedia.org/wiki/Ext2>
//! - <https://git.kernel.org/pub/scm/utils/util-linux/util-linux.git/tree/libblkid/src/superblocks/ext.c>

#![cfg_attr(not(any(test, feature = "std")), no_std)]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(
    clippy::cast_possible_truncation,
    clippy::cast_precision_loss,
    clippy::cargo_common_metadata,
    clippy::doc_markdown,
    clippy::implicit_hasher,
    clippy::implicit_return,
    clippy::missing_const_for_fn,
    clippy::missing_errors_doc,
    clippy::missing_panics_doc,
    clippy::module_name_repetitions,
    clippy::multiple_crate_versions,
    clippy::must_use_candidate,
    clippy::new_without_default,
    clippy::redundant_pub_crate,
    clippy::suboptimal_flops,
    clippy::wildcard_imports
)]

extern crate alloc;

pub mod block_group;
pub mod block_map;
mod bytes;
pub mod directory;
pub mod driver;
pub mod error;
pub mod geometry;
pub mod inode;
pub mod path;
pub mod sector;
mod strings;
pub mod superblock;

#[cfg(test)]
mod testing;

pub use block_group::*;
pub use block_map::*;
pub use directory::*;
pub use driver::*;
pub use error::*;
pub use geometry::*;
pub use inode::*;
pub use sector::*;
pub use superblock::*;
