//! Contract with the host's native filesystem surface.
//!
//! The redirection engine never talks to the kernel directly. Everything it
//! needs from the native layer is expressed either as a per-call function
//! object (the underlying system call being wrapped) or as a method on
//! [`NativeFilesystem`], so test cases can substitute an in-memory
//! implementation.

use std::sync::atomic::{AtomicI32, AtomicU64, Ordering};

use bitflags::bitflags;
use num_derive::FromPrimitive;

use crate::fileinfo::FileInformationClass;
use crate::status::NtStatus;

/// Opaque handle to an open filesystem object, as issued by the native layer.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub struct Handle(pub u64);

bitflags! {
    /// Access rights requested for a filesystem object.
    #[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
    pub struct AccessMask: u32 {
        const FILE_READ_DATA = 0x0000_0001;
        const FILE_LIST_DIRECTORY = 0x0000_0001;
        const FILE_WRITE_DATA = 0x0000_0002;
        const FILE_APPEND_DATA = 0x0000_0004;
        const FILE_READ_EA = 0x0000_0008;
        const FILE_WRITE_EA = 0x0000_0010;
        const FILE_EXECUTE = 0x0000_0020;
        const FILE_TRAVERSE = 0x0000_0020;
        const FILE_DELETE_CHILD = 0x0000_0040;
        const FILE_READ_ATTRIBUTES = 0x0000_0080;
        const FILE_WRITE_ATTRIBUTES = 0x0000_0100;
        const DELETE = 0x0001_0000;
        const READ_CONTROL = 0x0002_0000;
        const WRITE_DAC = 0x0004_0000;
        const WRITE_OWNER = 0x0008_0000;
        const SYNCHRONIZE = 0x0010_0000;
        const GENERIC_ALL = 0x1000_0000;
        const GENERIC_EXECUTE = 0x2000_0000;
        const GENERIC_WRITE = 0x4000_0000;
        const GENERIC_READ = 0x8000_0000;
    }
}

impl AccessMask {
    /// Rights that imply the ability to read from the object.
    pub fn read_rights() -> AccessMask {
        AccessMask::GENERIC_READ
            | AccessMask::FILE_READ_DATA
            | AccessMask::FILE_READ_ATTRIBUTES
            | AccessMask::FILE_READ_EA
            | AccessMask::READ_CONTROL
            | AccessMask::FILE_EXECUTE
            | AccessMask::FILE_LIST_DIRECTORY
            | AccessMask::FILE_TRAVERSE
    }

    /// Rights that imply the ability to write to the object.
    pub fn write_rights() -> AccessMask {
        AccessMask::GENERIC_WRITE
            | AccessMask::FILE_WRITE_DATA
            | AccessMask::FILE_WRITE_ATTRIBUTES
            | AccessMask::FILE_WRITE_EA
            | AccessMask::FILE_APPEND_DATA
            | AccessMask::WRITE_DAC
            | AccessMask::WRITE_OWNER
            | AccessMask::FILE_DELETE_CHILD
    }

    /// Rights that imply the ability to delete the object.
    pub fn delete_rights() -> AccessMask {
        AccessMask::DELETE
    }
}

bitflags! {
    /// Flags controlling how a single directory enumeration query is
    /// processed.
    #[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
    pub struct QueryFlags: u32 {
        /// Restart the enumeration from the beginning.
        const RESTART_SCAN = 0x0000_0001;
        /// Return exactly one record per query.
        const RETURN_SINGLE_ENTRY = 0x0000_0002;
    }
}

/// Create disposition values in the native convention.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, FromPrimitive)]
pub enum NtCreateDisposition {
    /// Replace the file if it exists, create it otherwise.
    Supersede = 0,
    /// Open the file only if it exists.
    Open = 1,
    /// Create the file only if it does not exist.
    Create = 2,
    /// Open the file if it exists, create it otherwise.
    OpenIf = 3,
    /// Open and truncate the file only if it exists.
    Overwrite = 4,
    /// Open and truncate the file if it exists, create it otherwise.
    OverwriteIf = 5,
}

/// Synchronization behavior of an open handle.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum HandleIoMode {
    /// System calls return only after the requested operation completes.
    Synchronous,
    /// System calls return immediately, with completion signalled
    /// out-of-band.
    Asynchronous,
}

/// Identification of a filesystem entity as supplied by the application:
/// a name, optionally relative to an open root-directory handle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ObjectAttributes {
    pub root_directory: Option<Handle>,
    pub object_name: String,
}

impl ObjectAttributes {
    /// Attributes naming an absolute path with no root directory.
    pub fn from_path(object_name: impl Into<String>) -> Self {
        Self { root_directory: None, object_name: object_name.into() }
    }
}

/// Rename request payload: the desired new name, optionally relative to an
/// open directory handle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileRenameInformation {
    pub replace_if_exists: bool,
    pub root_directory: Option<Handle>,
    pub file_name: String,
}

/// Outcome block for an I/O request. Fields are atomic because asynchronous
/// completions write them from a worker thread while the submitting thread
/// may already be inspecting the block.
#[derive(Debug, Default)]
pub struct IoStatusBlock {
    status: AtomicI32,
    information: AtomicU64,
}

impl IoStatusBlock {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn status(&self) -> NtStatus {
        NtStatus(self.status.load(Ordering::Acquire))
    }

    pub fn set_status(&self, status: NtStatus) {
        self.status.store(status.0, Ordering::Release);
    }

    pub fn information(&self) -> u64 {
        self.information.load(Ordering::Acquire)
    }

    pub fn set_information(&self, information: u64) {
        self.information.store(information, Ordering::Release);
    }
}

/// Native filesystem operations the engine needs beyond the specific system
/// call each executor entry point wraps.
pub trait NativeFilesystem: Send + Sync {
    /// Determines if the entity identified by the absolute path exists.
    fn exists(&self, absolute_path: &str) -> bool;

    /// Determines if the absolute path exists and identifies a directory.
    fn is_directory(&self, absolute_path: &str) -> bool;

    /// Creates every missing directory along the supplied absolute path.
    fn create_directory_hierarchy(&self, absolute_path: &str) -> NtStatus;

    /// Deletes the entity identified by the absolute path. Directories are
    /// removed with their contents.
    fn delete(&self, absolute_path: &str) -> NtStatus;

    /// Opens a directory for reading its contents.
    fn open_directory_for_enumeration(&self, absolute_path: &str) -> Result<Handle, NtStatus>;

    /// Writes one batch of file information records for the directory into
    /// the buffer, chained by next-entry-offset with the final record's
    /// offset zero. Records are filtered by the query pattern when one is
    /// supplied. Returns [`NtStatus::NO_MORE_FILES`] once the enumeration is
    /// exhausted.
    fn partial_enumerate_directory(
        &self,
        directory_handle: Handle,
        information_class: FileInformationClass,
        buffer: &mut [u8],
        query_pattern: &str,
        restart: bool,
    ) -> NtStatus;

    /// Writes a single file information record describing one named entity
    /// inside a directory.
    fn query_single_file_directory_information(
        &self,
        containing_directory: &str,
        file_name: &str,
        information_class: FileInformationClass,
        buffer: &mut [u8],
    ) -> NtStatus;

    /// Retrieves the absolute path backing an open handle.
    fn query_absolute_path_by_handle(&self, handle: Handle) -> Result<String, NtStatus>;

    /// Retrieves the I/O mode with which a handle was opened.
    fn query_handle_io_mode(&self, handle: Handle) -> Result<HandleIoMode, NtStatus>;

    /// Closes an open handle.
    fn close_handle(&self, handle: Handle) -> NtStatus;
}
