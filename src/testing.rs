//! Builds small ext2 images in memory for tests.
//!
//! Layout is computed here independently of the driver so tests check the
//! driver's arithmetic rather than repeat it.

use std::collections::HashMap;

use crate::block_group::descriptor_table_start;

#[derive(Debug, Clone)]
pub(crate) struct ImageBuilder {
    cluster_size: u32,
    groups: u32,
    clusters_per_group: u32,
    inodes_per_group: u32,
    inode_size: u32,
    volume_name: String,
    feature_incompat: u32,
}

/// Where a group's metadata lives.
#[derive(Debug, Copy, Clone)]
pub(crate) struct GroupLayout {
    pub(crate) block_bitmap: u32,
    pub(crate) inode_bitmap: u32,
    pub(crate) inode_table: u32,
    pub(crate) data_start: u32,
}

impl ImageBuilder {
    pub(crate) fn new(cluster_size: u32) -> Self {
        assert!(cluster_size.is_power_of_two() && cluster_size >= 1024);
        Self {
            cluster_size,
            groups: 1,
            clusters_per_group: 1024,
            inodes_per_group: 32,
            inode_size: 128,
            volume_name: String::new(),
            feature_incompat: 0x0002,
        }
    }

    pub(crate) fn groups(mut self, groups: u32) -> Self {
        self.groups = groups;
        self
    }

    pub(crate) fn clusters_per_group(mut self, clusters: u32) -> Self {
        self.clusters_per_group = clusters;
        self
    }

    pub(crate) fn inodes_per_group(mut self, inodes: u32) -> Self {
        self.inodes_per_group = inodes;
        self
    }

    pub(crate) fn inode_size(mut self, size: u32) -> Self {
        self.inode_size = size;
        self
    }

    pub(crate) fn volume_name(mut self, name: &str) -> Self {
        assert!(name.len() <= 16);
        self.volume_name = name.to_string();
        self
    }

    pub(crate) fn feature_incompat(mut self, bits: u32) -> Self {
        self.feature_incompat = bits;
        self
    }

    fn log_cluster_size(&self) -> u32 {
        self.cluster_size.trailing_zeros() - 10
    }

    fn inode_table_clusters(&self) -> u32 {
        (self.inodes_per_group * self.inode_size).div_ceil(self.cluster_size)
    }

    pub(crate) fn group_layout(&self, group: u32) -> GroupLayout {
        let start = if group == 0 {
            let gdt_start = descriptor_table_start(self.cluster_size) as u32;
            let gdt_clusters = (self.groups * 32).div_ceil(self.cluster_size);
            gdt_start + gdt_clusters
        } else {
            group * self.clusters_per_group
        };
        GroupLayout {
            block_bitmap: start,
            inode_bitmap: start + 1,
            inode_table: start + 2,
            data_start: start + 2 + self.inode_table_clusters(),
        }
    }

    pub(crate) fn put_u16(image: &mut [u8], offset: usize, value: u16) {
        image[offset..offset + 2].copy_from_slice(&value.to_le_bytes());
    }

    pub(crate) fn put_u32(image: &mut [u8], offset: usize, value: u32) {
        image[offset..offset + 4].copy_from_slice(&value.to_le_bytes());
    }

    /// An image with just the root directory.
    pub(crate) fn build(self) -> Vec<u8> {
        self.build_fs().into_image()
    }

    pub(crate) fn build_fs(self) -> TestFs {
        let cluster_size = self.cluster_size as usize;
        let cluster_count = self.groups * self.clusters_per_group;
        let mut image = vec![0u8; cluster_count as usize * cluster_size];

        let sb = 1024;
        Self::put_u32(&mut image, sb, self.groups * self.inodes_per_group);
        Self::put_u32(&mut image, sb + 0x04, cluster_count);
        Self::put_u32(&mut image, sb + 0x14, u32::from(self.cluster_size == 1024));
        Self::put_u32(&mut image, sb + 0x18, self.log_cluster_size());
        Self::put_u32(&mut image, sb + 0x20, self.clusters_per_group);
        Self::put_u32(&mut image, sb + 0x24, self.clusters_per_group);
        Self::put_u32(&mut image, sb + 0x28, self.inodes_per_group);
        Self::put_u16(&mut image, sb + 0x38, 0xEF53);
        Self::put_u32(&mut image, sb + 0x4C, 1);
        Self::put_u32(&mut image, sb + 0x54, 11);
        Self::put_u16(&mut image, sb + 0x58, self.inode_size as u16);
        Self::put_u32(&mut image, sb + 0x60, self.feature_incompat);
        image[sb + 0x78..sb + 0x78 + self.volume_name.len()]
            .copy_from_slice(self.volume_name.as_bytes());

        let gdt = descriptor_table_start(self.cluster_size) as usize * cluster_size;
        for group in 0..self.groups {
            let layout = self.group_layout(group);
            let offset = gdt + group as usize * 32;
            Self::put_u32(&mut image, offset, layout.block_bitmap);
            Self::put_u32(&mut image, offset + 4, layout.inode_bitmap);
            Self::put_u32(&mut image, offset + 8, layout.inode_table);
        }

        let next_cluster = self.group_layout(0).data_start;
        let mut fs = TestFs {
            image,
            config: self,
            next_cluster,
            next_inode: 11,
            dirs: HashMap::new(),
        };

        let root_cluster = fs.alloc_cluster();
        let mut root = InodeFields::dir();
        root.block[0] = root_cluster;
        root.size = u64::from(fs.config.cluster_size);
        root.links = 2;
        fs.write_inode(2, &root);
        fs.init_dir_block(2, root_cluster, 2, 0);

        fs
    }
}

/// The fields of an inode the tests care about.
#[derive(Debug, Clone)]
pub(crate) struct InodeFields {
    pub(crate) mode: u16,
    pub(crate) size: u64,
    pub(crate) atime: u32,
    pub(crate) mtime: u32,
    pub(crate) crtime: u32,
    pub(crate) links: u16,
    pub(crate) block: [u32; 15],
}

impl InodeFields {
    pub(crate) fn file() -> Self {
        Self {
            mode: 0x81A4,
            size: 0,
            atime: 1_600_000_000,
            mtime: 1_600_000_100,
            crtime: 1_600_000_200,
            links: 1,
            block: [0; 15],
        }
    }

    pub(crate) fn dir() -> Self {
        Self {
            mode: 0x41ED,
            ..Self::file()
        }
    }
}

#[derive(Debug)]
struct DirState {
    cluster: u32,
    /// Offset of the last entry in `cluster`, whose rec_len runs to the end.
    last_entry: usize,
}

/// An image under construction.
pub(crate) struct TestFs {
    pub(crate) image: Vec<u8>,
    config: ImageBuilder,
    next_cluster: u32,
    next_inode: u32,
    dirs: HashMap<u32, DirState>,
}

impl TestFs {
    pub(crate) fn into_image(self) -> Vec<u8> {
        self.image
    }

    pub(crate) fn cluster_size(&self) -> usize {
        self.config.cluster_size as usize
    }

    /// Hands out the next cluster not used by group metadata.
    pub(crate) fn alloc_cluster(&mut self) -> u32 {
        loop {
            let candidate = self.next_cluster;
            self.next_cluster += 1;
            assert!(
                candidate < self.config.groups * self.config.clusters_per_group,
                "test image out of clusters"
            );
            let group = candidate / self.config.clusters_per_group;
            let layout = self.config.group_layout(group);
            if group > 0 && candidate < layout.data_start {
                continue;
            }
            return candidate;
        }
    }

    pub(crate) fn cluster_mut(&mut self, cluster: u32) -> &mut [u8] {
        let size = self.cluster_size();
        let start = cluster as usize * size;
        &mut self.image[start..start + size]
    }

    pub(crate) fn alloc_inode(&mut self) -> u32 {
        let inode = self.next_inode;
        self.next_inode += 1;
        assert!(
            inode <= self.config.groups * self.config.inodes_per_group,
            "test image out of inodes"
        );
        inode
    }

    /// Byte offset of an inode record in the image.
    pub(crate) fn inode_offset(&self, inode: u32) -> usize {
        let index = inode - 1;
        let group = index / self.config.inodes_per_group;
        let local = index % self.config.inodes_per_group;
        let table = self.config.group_layout(group).inode_table as usize;
        table * self.cluster_size() + local as usize * self.config.inode_size as usize
    }

    pub(crate) fn write_inode(&mut self, inode: u32, fields: &InodeFields) {
        let mut record = vec![0u8; 160];
        ImageBuilder::put_u16(&mut record, 0, fields.mode);
        ImageBuilder::put_u32(&mut record, 0x04, fields.size as u32);
        ImageBuilder::put_u32(&mut record, 0x08, fields.atime);
        ImageBuilder::put_u32(&mut record, 0x0C, fields.mtime);
        ImageBuilder::put_u32(&mut record, 0x10, fields.mtime);
        ImageBuilder::put_u16(&mut record, 0x1A, fields.links);
        for (i, block) in fields.block.iter().enumerate() {
            ImageBuilder::put_u32(&mut record, 0x28 + 4 * i, *block);
        }
        ImageBuilder::put_u32(&mut record, 0x6C, (fields.size >> 32) as u32);
        ImageBuilder::put_u32(&mut record, 0x90, fields.crtime);

        let len = record.len().min(self.config.inode_size as usize);
        let offset = self.inode_offset(inode);
        self.image[offset..offset + len].copy_from_slice(&record[..len]);
    }

    fn init_dir_block(&mut self, dir: u32, cluster: u32, self_inode: u32, parent: u32) {
        let size = self.cluster_size();
        let data = self.cluster_mut(cluster);
        encode_dir_entry(data, 0, &RawDirEntry::new(self_inode, ".", 12).dir());
        let parent = if parent == 0 { self_inode } else { parent };
        encode_dir_entry(data, 12, &RawDirEntry::new(parent, "..", (size - 12) as u16).dir());
        self.dirs.insert(
            dir,
            DirState {
                cluster,
                last_entry: 12,
            },
        );
    }

    /// Appends an entry to the directory's current data cluster.
    pub(crate) fn add_entry(&mut self, dir: u32, name: &str, inode: u32, file_type: u8) {
        let size = self.cluster_size();
        let state = self.dirs.get_mut(&dir).expect("not a test directory");
        let cluster = state.cluster;
        let last = state.last_entry;

        let start = cluster as usize * size;
        let data = &mut self.image[start..start + size];
        let last_name_len = usize::from(data[last + 6]);
        let last_used = (8 + last_name_len).next_multiple_of(4);
        let new_offset = last + last_used;
        let needed = (8 + name.len()).next_multiple_of(4);
        assert!(new_offset + needed <= size, "directory cluster full");

        ImageBuilder::put_u16(data, last + 4, last_used as u16);
        let mut entry = RawDirEntry::new(inode, name, (size - new_offset) as u16);
        entry.file_type = file_type;
        encode_dir_entry(data, new_offset, &entry);
        state.last_entry = new_offset;
    }

    /// Gives the directory another data cluster at direct slot `slot`, and
    /// sends further entries there.
    pub(crate) fn add_dir_cluster(&mut self, dir: u32, slot: usize) -> u32 {
        let cluster = self.alloc_cluster();
        let size = self.cluster_size();
        let data = self.cluster_mut(cluster);
        // One deleted slot spanning the whole cluster.
        ImageBuilder::put_u16(data, 4, size as u16);
        let offset = self.inode_offset(dir);
        ImageBuilder::put_u32(&mut self.image, offset + 0x28 + 4 * slot, cluster);
        self.dirs.insert(
            dir,
            DirState {
                cluster,
                last_entry: 0,
            },
        );
        cluster
    }

    pub(crate) fn mkdir(&mut self, parent: u32, name: &str) -> u32 {
        let inode = self.alloc_inode();
        let cluster = self.alloc_cluster();
        let mut fields = InodeFields::dir();
        fields.block[0] = cluster;
        fields.size = self.cluster_size() as u64;
        fields.links = 2;
        self.write_inode(inode, &fields);
        self.init_dir_block(inode, cluster, inode, parent);
        self.add_entry(parent, name, inode, 2);
        inode
    }

    /// A file whose every block is allocated and holds `content`.
    pub(crate) fn add_file(&mut self, parent: u32, name: &str, content: &[u8]) -> u32 {
        let size = self.cluster_size();
        let blocks: Vec<(u64, Vec<u8>)> = content
            .chunks(size)
            .enumerate()
            .map(|(i, chunk)| (i as u64, chunk.to_vec()))
            .collect();
        self.add_sparse_file(parent, name, content.len() as u64, &blocks)
    }

    /// A file of `size` bytes where only the listed logical blocks are
    /// allocated. Everything else, including indirect blocks nobody needs,
    /// stays a hole.
    pub(crate) fn add_sparse_file(
        &mut self,
        parent: u32,
        name: &str,
        size: u64,
        blocks: &[(u64, Vec<u8>)],
    ) -> u32 {
        let inode = self.alloc_inode();
        let mut fields = InodeFields::file();
        fields.size = size;
        for (logical, data) in blocks {
            let cluster = self.alloc_cluster();
            self.cluster_mut(cluster)[..data.len()].copy_from_slice(data);
            self.map_logical(&mut fields, *logical, cluster);
        }
        self.write_inode(inode, &fields);
        self.add_entry(parent, name, inode, 1);
        inode
    }

    fn read_pointer(&self, block: u32, index: u64) -> u32 {
        let offset = block as usize * self.cluster_size() + index as usize * 4;
        u32::from_le_bytes(self.image[offset..offset + 4].try_into().unwrap())
    }

    fn write_pointer(&mut self, block: u32, index: u64, value: u32) {
        let offset = block as usize * self.cluster_size() + index as usize * 4;
        ImageBuilder::put_u32(&mut self.image, offset, value);
    }

    fn ensure_block(&mut self, pointer: &mut u32) -> u32 {
        if *pointer == 0 {
            *pointer = self.alloc_cluster();
        }
        *pointer
    }

    fn map_logical(&mut self, fields: &mut InodeFields, logical: u64, cluster: u32) {
        let p = (self.cluster_size() / 4) as u64;
        if logical < 12 {
            fields.block[logical as usize] = cluster;
        } else if logical < 12 + p {
            let indirect = self.ensure_block(&mut fields.block[12]);
            self.write_pointer(indirect, logical - 12, cluster);
        } else if logical < 12 + p + p * p {
            let rest = logical - 12 - p;
            let doubly = self.ensure_block(&mut fields.block[13]);
            let mut first = self.read_pointer(doubly, rest / p);
            if first == 0 {
                first = self.alloc_cluster();
                self.write_pointer(doubly, rest / p, first);
            }
            self.write_pointer(first, rest % p, cluster);
        } else {
            panic!("triply indirect blocks aren't supported by the test builder");
        }
    }
}

/// A directory entry record to encode, possibly malformed on purpose.
#[derive(Debug, Clone)]
pub(crate) struct RawDirEntry {
    pub(crate) inode: u32,
    pub(crate) name: Vec<u8>,
    pub(crate) name_len: u8,
    pub(crate) rec_len: u16,
    pub(crate) file_type: u8,
}

impl RawDirEntry {
    pub(crate) fn new(inode: u32, name: &str, rec_len: u16) -> Self {
        Self::with_name_len(inode, name, name.len() as u8, rec_len)
    }

    pub(crate) fn with_name_len(inode: u32, name: &str, name_len: u8, rec_len: u16) -> Self {
        Self {
            inode,
            name: name.as_bytes().to_vec(),
            name_len,
            rec_len,
            file_type: 1,
        }
    }

    pub(crate) fn dir(mut self) -> Self {
        self.file_type = 2;
        self
    }
}

/// Writes the entry header and as much of the name as fits.
pub(crate) fn encode_dir_entry(bytes: &mut [u8], offset: usize, entry: &RawDirEntry) {
    ImageBuilder::put_u32(bytes, offset, entry.inode);
    ImageBuilder::put_u16(bytes, offset + 4, entry.rec_len);
    bytes[offset + 6] = entry.name_len;
    bytes[offset + 7] = entry.file_type;
    let name_start = offset + 8;
    let name_end = (name_start + entry.name.len()).min(bytes.len());
    bytes[name_start..name_end].copy_from_slice(&entry.name[..name_end - name_start]);
}
