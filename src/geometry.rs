use alloc::string::String;
use alloc::vec::Vec;

use crate::block_group::{BlockGroupIndex, GroupDescriptor};
use crate::inode::{InodeNumber, LocalInodeIndex};
use crate::sector::SectorIndex;
use crate::superblock::{
    FeatureCompatFlags, FeatureIncompatFlags, FeatureReadOnlyCompatFlags, Uuid,
};

/// Everything the driver knows about the layout of the filesystem. Built once
/// from the superblock, completed by the group descriptor table loader, and
/// never touched again.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FilesystemGeometry {
    pub bytes_per_sector: u32,
    pub bytes_per_cluster: u32,
    pub cluster_count: u32,

    pub inode_count: u32,
    pub inodes_per_group: u32,
    /// Size of an on-disk inode record. May be larger than the fields this
    /// crate decodes.
    pub bytes_per_inode: u32,
    /// `cluster_count / clusters_per_group`, truncated.
    pub group_count: u32,
    pub clusters_per_group: u32,
    pub feature_compat: FeatureCompatFlags,
    pub feature_incompat: FeatureIncompatFlags,
    pub feature_ro_compat: FeatureReadOnlyCompatFlags,
    pub reserved_gdt_clusters: u16,
    /// Always 0: flexible block groups are not supported.
    pub flex_group_period: u32,
    pub revision: u32,
    pub volume_name: String,
    pub uuid: Uuid,

    /// One entry per block group, `group_count` long once loaded.
    pub groups: Vec<GroupDescriptor>,
}

/// Where an inode record lives on disk.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct InodeLocation {
    pub group: BlockGroupIndex,
    pub local_index: LocalInodeIndex,
    /// Cluster holding the first byte of the record.
    pub cluster: u64,
    /// Byte offset of the record within `cluster`.
    pub offset_in_cluster: usize,
}

impl FilesystemGeometry {
    pub fn sectors_per_cluster(&self) -> u64 {
        u64::from(self.bytes_per_cluster / self.bytes_per_sector)
    }

    /// First sector of the given cluster, or `None` on overflow.
    pub fn cluster_sector(&self, cluster: u64) -> Option<SectorIndex> {
        cluster
            .checked_mul(self.sectors_per_cluster())
            .map(SectorIndex)
    }

    /// How many 32-bit block pointers fit in one cluster.
    pub fn pointers_per_cluster(&self) -> u64 {
        u64::from(self.bytes_per_cluster / 4)
    }

    /// Clusters occupied by one group's inode table, rounded up.
    pub fn inode_table_clusters(&self) -> u64 {
        let table_bytes = u64::from(self.inodes_per_group) * u64::from(self.bytes_per_inode);
        table_bytes.div_ceil(u64::from(self.bytes_per_cluster))
    }

    /// Index for the block group containing the inode, and the inode's index
    /// within that group. `None` for inode 0, inodes past `inode_count`, and
    /// inodes whose group doesn't exist.
    pub fn inode_group(&self, inode: InodeNumber) -> Option<(BlockGroupIndex, LocalInodeIndex)> {
        if inode.0 == 0 || inode.0 > self.inode_count || self.inodes_per_group == 0 {
            return None;
        }
        let inode_index = inode.0 - 1;
        let group = inode_index / self.inodes_per_group;
        if group >= self.group_count {
            return None;
        }
        Some((
            BlockGroupIndex(group),
            LocalInodeIndex(inode_index % self.inodes_per_group),
        ))
    }

    /// Locates an inode record: the cluster containing its first byte and the
    /// offset within that cluster. The record may run past the end of the
    /// cluster into the next one.
    ///
    /// See <https://www.nongnu.org/ext2-doc/ext2.html#inode-table>
    pub fn locate_inode(&self, inode: InodeNumber) -> Option<InodeLocation> {
        let (group, local_index) = self.inode_group(inode)?;
        let descriptor = self.groups.get(group.0 as usize)?;

        let byte_offset = u64::from(local_index.0) * u64::from(self.bytes_per_inode);
        let bytes_per_cluster = u64::from(self.bytes_per_cluster);
        let cluster_offset = byte_offset / bytes_per_cluster;
        let offset_in_cluster = (byte_offset % bytes_per_cluster) as usize;

        Some(InodeLocation {
            group,
            local_index,
            cluster: u64::from(descriptor.inode_table.0) + cluster_offset,
            offset_in_cluster,
        })
    }
}
