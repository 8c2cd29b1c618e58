use alloc::string::String;
use alloc::vec::Vec;

use crate::block_group::{load_group_descriptors, ClusterAddress};
use crate::block_map::BlockMapping;
use crate::bytes::{read_record, read_u32_le};
use crate::directory::{DirectoryBlock, DirectoryEntry};
use crate::error::{Error, LookupKind, Result};
use crate::geometry::FilesystemGeometry;
use crate::inode::{Inode, InodeNumber, ROOT_DIRECTORY};
use crate::path::FilePath;
use crate::sector::SectorAccessor;
use crate::superblock;

/// Operations every filesystem driver offers over a disk image.
pub trait FilesystemDriver {
    /// Decodes the on-disk metadata. Must succeed before anything else does.
    fn load(&mut self) -> Result<&FilesystemGeometry>;

    fn list_directory(&self, path: &str) -> Result<Vec<DirectoryEntry>>;

    fn read_file(&self, path: &str) -> Result<Vec<u8>>;

    fn volume_label(&self) -> Result<String> {
        Err(Error::NotImplemented)
    }
}

/// Read-only ext2 driver over an in-memory (or memory mapped) image.
///
/// The image is never written. Once [`Ext2Driver::decode_superblock`]
/// succeeds the driver holds no mutable state, so a shared reference can be
/// used from several threads at once.
#[derive(Debug)]
pub struct Ext2Driver<S> {
    image: S,
    geometry: Option<FilesystemGeometry>,
}

impl<S: SectorAccessor> Ext2Driver<S> {
    /// A driver with nothing loaded yet. Every operation but
    /// [`Ext2Driver::decode_superblock`] fails with `UnknownFilesystem`.
    pub fn new(image: S) -> Self {
        Self {
            image,
            geometry: None,
        }
    }

    /// Shorthand for [`Ext2Driver::new`] followed by
    /// [`Ext2Driver::decode_superblock`].
    pub fn open(image: S) -> Result<Self> {
        let mut driver = Self::new(image);
        driver.decode_superblock()?;
        Ok(driver)
    }

    /// Reads the superblock and the whole group descriptor table. On failure
    /// the driver is left unloaded, even if an earlier call had succeeded.
    pub fn decode_superblock(&mut self) -> Result<&FilesystemGeometry> {
        self.geometry = None;
        let geometry = superblock::decode_superblock(&self.image)?;
        let geometry = load_group_descriptors(&self.image, geometry)?;
        Ok(self.geometry.insert(geometry))
    }

    pub fn geometry(&self) -> Option<&FilesystemGeometry> {
        self.geometry.as_ref()
    }

    pub fn into_image(self) -> S {
        self.image
    }

    /// Maps an absolute path to its inode number. "/" is always the root
    /// inode, without touching the disk.
    pub fn resolve(&self, path: &str) -> Result<InodeNumber> {
        let path = FilePath::parse(path)?;
        let geometry = self.loaded()?;
        self.resolve_path(geometry, &path, LookupKind::File)
    }

    /// Reads an inode record. Numbers outside the filesystem are
    /// `FileNotFound`.
    pub fn read_inode(&self, inode: InodeNumber) -> Result<Inode> {
        let geometry = self.loaded()?;
        self.load_inode(geometry, inode, LookupKind::File)
    }

    /// Lists the valid entries of the directory at `path`, `.` and `..`
    /// included, in on-disk order.
    ///
    /// Only the 12 direct blocks of the directory are scanned. An entry whose
    /// inode can't be read is left out of the listing rather than failing it.
    pub fn list(&self, path: &str) -> Result<Vec<DirectoryEntry>> {
        let path = FilePath::parse(path)?;
        let geometry = self.loaded()?;
        let number = self.resolve_path(geometry, &path, LookupKind::Directory)?;
        let directory = self.load_inode(geometry, number, LookupKind::Directory)?;
        if !directory.is_dir() {
            return Err(Error::DirectoryNotFound);
        }

        let mut entries = Vec::new();
        for block in directory.direct_blocks() {
            if block.is_null() {
                continue;
            }
            let data = self.cluster(geometry, u64::from(block.0))?;
            for record in DirectoryBlock(data).iter() {
                let Ok(inode) = self.load_inode(geometry, record.inode, LookupKind::Directory)
                else {
                    // Not an error of the listing, so it is only noted here.
                    log::debug!(
                        "ext2: {path}: skipping {:?} (inode {}, {:?}): inode unreadable",
                        record.name_lossy(),
                        record.inode.0,
                        record.file_type,
                    );
                    continue;
                };
                entries.push(DirectoryEntry {
                    name: record.name_lossy(),
                    size: inode.size(),
                    created: inode.creation_time(),
                    accessed: inode.access_time(),
                    modified: inode.modification_time(),
                    is_dir: inode.is_dir(),
                    links: inode.links_count(),
                    inode: record.inode,
                });
            }
        }
        Ok(entries)
    }

    /// Reads the whole content of the file at `path`.
    ///
    /// Anything that isn't a directory is read through its block map, so
    /// symlinks and device nodes come back as whatever their blocks hold.
    /// Holes and triply indirect blocks read as zeroes.
    pub fn read(&self, path: &str) -> Result<Vec<u8>> {
        let path = FilePath::parse(path)?;
        let geometry = self.loaded()?;
        let number = self.resolve_path(geometry, &path, LookupKind::File)?;
        let inode = self.load_inode(geometry, number, LookupKind::File)?;
        if inode.is_dir() {
            return Err(Error::FileNotFound);
        }

        let size = inode.size();
        if size == 0 {
            return Ok(Vec::new());
        }
        let len = usize::try_from(size)
            .ok()
            .filter(|len| isize::try_from(*len).is_ok())
            .ok_or(Error::InvalidFile { size })?;

        let mut data = Vec::new();
        data.try_reserve_exact(len)
            .map_err(|_| Error::OutOfMemory { size })?;

        let cluster_size = geometry.bytes_per_cluster as usize;
        let mut logical_block = 0;
        while data.len() < len {
            let to_copy = cluster_size.min(len - data.len());
            let physical = self.physical_block(geometry, &inode, logical_block)?;
            if physical.is_null() {
                data.resize(data.len() + to_copy, 0);
            } else {
                let cluster = self.cluster(geometry, u64::from(physical.0))?;
                data.extend_from_slice(&cluster[..to_copy]);
            }
            logical_block += 1;
        }
        log::trace!("ext2: read {path}: {len} bytes in {logical_block} blocks");

        Ok(data)
    }

    fn loaded(&self) -> Result<&FilesystemGeometry> {
        self.geometry.as_ref().ok_or(Error::UnknownFilesystem)
    }

    /// One whole cluster of the image.
    fn cluster<'a>(&'a self, geometry: &FilesystemGeometry, cluster: u64) -> Result<&'a [u8]> {
        let sector = geometry.cluster_sector(cluster).ok_or(Error::DiskRead {
            sector: cluster.saturating_mul(geometry.sectors_per_cluster()),
        })?;
        self.image
            .sectors(sector, geometry.sectors_per_cluster())
            .ok_or(Error::DiskRead { sector: sector.0 })
    }

    /// Fills `out` with the bytes starting at `offset` in `cluster`,
    /// continuing into the following clusters as needed.
    fn read_span(
        &self,
        geometry: &FilesystemGeometry,
        mut cluster: u64,
        mut offset: usize,
        out: &mut [u8],
    ) -> Result<()> {
        let mut copied = 0;
        loop {
            let data = self.cluster(geometry, cluster)?;
            let available = data.get(offset..).unwrap_or_default();
            let n = available.len().min(out.len() - copied);
            out[copied..copied + n].copy_from_slice(&available[..n]);
            copied += n;
            if copied == out.len() {
                return Ok(());
            }
            cluster = cluster.checked_add(1).ok_or(Error::DiskRead { sector: u64::MAX })?;
            offset = 0;
        }
    }

    fn load_inode(
        &self,
        geometry: &FilesystemGeometry,
        inode: InodeNumber,
        kind: LookupKind,
    ) -> Result<Inode> {
        let location = geometry.locate_inode(inode).ok_or(kind.not_found())?;

        // Larger records are truncated, smaller ones leave the extended area
        // zeroed.
        let mut record = [0u8; Inode::SIZE];
        let len = Inode::SIZE.min(geometry.bytes_per_inode as usize);
        self.read_span(
            geometry,
            location.cluster,
            location.offset_in_cluster,
            &mut record[..len],
        )?;
        read_record(&record, 0).ok_or(Error::DiskRead {
            sector: location
                .cluster
                .saturating_mul(geometry.sectors_per_cluster()),
        })
    }

    fn resolve_path(
        &self,
        geometry: &FilesystemGeometry,
        path: &FilePath,
        kind: LookupKind,
    ) -> Result<InodeNumber> {
        let mut current = ROOT_DIRECTORY;
        for component in &path.components {
            let directory = self.load_inode(geometry, current, kind)?;
            if !directory.is_dir() {
                return Err(kind.not_found());
            }
            current = self
                .find_entry(geometry, &directory, component.as_bytes())?
                .ok_or(kind.not_found())?;
            log::trace!("ext2: {component} -> inode {}", current.0);
        }
        Ok(current)
    }

    /// Looks `name` up in the direct blocks of a directory.
    fn find_entry(
        &self,
        geometry: &FilesystemGeometry,
        directory: &Inode,
        name: &[u8],
    ) -> Result<Option<InodeNumber>> {
        for block in directory.direct_blocks() {
            if block.is_null() {
                continue;
            }
            let data = self.cluster(geometry, u64::from(block.0))?;
            if let Some(entry) = DirectoryBlock(data).find(name) {
                return Ok(Some(entry.inode));
            }
        }
        Ok(None)
    }

    /// Physical cluster holding `logical_block` of the file. A null address
    /// means a hole.
    fn physical_block(
        &self,
        geometry: &FilesystemGeometry,
        inode: &Inode,
        logical_block: u64,
    ) -> Result<ClusterAddress> {
        match BlockMapping::for_logical_block(logical_block, geometry.pointers_per_cluster()) {
            BlockMapping::Direct { index } => {
                Ok(inode.block_pointer(index).unwrap_or(ClusterAddress(0)))
            }
            BlockMapping::SinglyIndirect { index } => {
                self.read_pointer(geometry, inode.singly_indirect_block(), index)
            }
            BlockMapping::DoublyIndirect { first, second } => {
                let pointers = self.read_pointer(geometry, inode.doubly_indirect_block(), first)?;
                self.read_pointer(geometry, pointers, second)
            }
            BlockMapping::TriplyIndirect => Ok(ClusterAddress(0)),
        }
    }

    /// Entry `index` of the pointer block at `block`. A null pointer block
    /// makes every entry null.
    fn read_pointer(
        &self,
        geometry: &FilesystemGeometry,
        block: ClusterAddress,
        index: u64,
    ) -> Result<ClusterAddress> {
        if block.is_null() {
            return Ok(ClusterAddress(0));
        }
        let cluster = u64::from(block.0);
        let data = self.cluster(geometry, cluster)?;
        let offset = usize::try_from(index * 4).unwrap_or(usize::MAX);
        read_u32_le(data, offset)
            .map(ClusterAddress)
            .ok_or(Error::DiskRead {
                sector: cluster.saturating_mul(geometry.sectors_per_cluster()),
            })
    }
}

impl<S: SectorAccessor> FilesystemDriver for Ext2Driver<S> {
    fn load(&mut self) -> Result<&FilesystemGeometry> {
        self.decode_superblock()
    }

    fn list_directory(&self, path: &str) -> Result<Vec<DirectoryEntry>> {
        self.list(path)
    }

    fn read_file(&self, path: &str) -> Result<Vec<u8>> {
        self.read(path)
    }

    fn volume_label(&self) -> Result<String> {
        Ok(self.loaded()?.volume_name.clone())
    }
}
