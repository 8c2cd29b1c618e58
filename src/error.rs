use thiserror::Error;

/// Everything that can go wrong while interpreting an image. Nothing is
/// retried or logged inside the driver; the first failure is returned.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum Error {
    /// The path argument was absent (empty).
    #[error("invalid argument: no path given")]
    InvalidArgument,

    #[error("path is not absolute")]
    NotAbsolute,

    /// The superblock hasn't been loaded, or the image isn't ext2.
    #[error("unknown filesystem")]
    UnknownFilesystem,

    /// Bad magic, zero group size, or an unreadable superblock or group
    /// descriptor sector.
    #[error("invalid superblock")]
    SuperblockInvalid,

    #[error("directory not found")]
    DirectoryNotFound,

    #[error("file not found")]
    FileNotFound,

    /// A sector computed from otherwise valid geometry lies outside the image.
    #[error("disk read error at sector {sector}")]
    DiskRead { sector: u64 },

    /// The decoded file size can't be represented as an in-memory buffer.
    #[error("invalid file: size {size} is not representable")]
    InvalidFile { size: u64 },

    #[error("out of memory allocating {size} bytes")]
    OutOfMemory { size: u64 },

    /// Returned by driver operations that have no implementation for this
    /// filesystem type.
    #[error("not implemented")]
    NotImplemented,
}

pub type Result<T> = core::result::Result<T, Error>;

/// Which flavour of "not found" a path lookup reports. Directory listings and
/// file reads share the same walk but surface different error kinds.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub(crate) enum LookupKind {
    Directory,
    File,
}

impl LookupKind {
    pub(crate) fn not_found(self) -> Error {
        match self {
            Self::Directory => Error::DirectoryNotFound,
            Self::File => Error::FileNotFound,
        }
    }
}
