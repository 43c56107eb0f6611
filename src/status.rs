//! Native kernel status codes surfaced by the redirection engine.

/// Status code in the native kernel convention. Zero and positive values are
/// informational successes, negative values are failures.
#[derive(Debug, Default, Copy, Clone, PartialEq, Eq, Hash)]
pub struct NtStatus(pub i32);

impl NtStatus {
    /// Operation completed.
    pub const SUCCESS: NtStatus = NtStatus(0x00000000);
    /// Operation was queued and will complete out-of-band.
    pub const PENDING: NtStatus = NtStatus(0x00000103);
    /// More entries are available than were returned.
    pub const MORE_ENTRIES: NtStatus = NtStatus(0x00000105);
    /// Output buffer could not hold everything that was available.
    pub const BUFFER_OVERFLOW: NtStatus = NtStatus(0x80000005_u32 as i32);
    /// A directory enumeration has been exhausted.
    pub const NO_MORE_FILES: NtStatus = NtStatus(0x80000006_u32 as i32);
    /// Supplied information length does not match the information class.
    pub const INFO_LENGTH_MISMATCH: NtStatus = NtStatus(0xC0000004_u32 as i32);
    /// No file matched the supplied query pattern.
    pub const NO_SUCH_FILE: NtStatus = NtStatus(0xC000000F_u32 as i32);
    /// A supplied parameter is not valid.
    pub const INVALID_PARAMETER: NtStatus = NtStatus(0xC000000D_u32 as i32);
    /// Object name is syntactically invalid.
    pub const OBJECT_NAME_INVALID: NtStatus = NtStatus(0xC0000033_u32 as i32);
    /// Object name does not exist.
    pub const OBJECT_NAME_NOT_FOUND: NtStatus = NtStatus(0xC0000034_u32 as i32);
    /// Object name already exists.
    pub const OBJECT_NAME_COLLISION: NtStatus = NtStatus(0xC0000035_u32 as i32);
    /// Object path component is syntactically invalid.
    pub const OBJECT_PATH_INVALID: NtStatus = NtStatus(0xC0000039_u32 as i32);
    /// Object path component does not exist.
    pub const OBJECT_PATH_NOT_FOUND: NtStatus = NtStatus(0xC000003A_u32 as i32);
    /// Access to the object was denied.
    pub const ACCESS_DENIED: NtStatus = NtStatus(0xC0000022_u32 as i32);
    /// An internal consistency check failed.
    pub const INTERNAL_ERROR: NtStatus = NtStatus(0xC00000E5_u32 as i32);

    /// Determines whether this status represents success, including
    /// informational codes such as [`NtStatus::MORE_ENTRIES`].
    pub const fn is_success(self) -> bool {
        self.0 >= 0
    }

    /// Determines whether a system call that produced this status exhausted
    /// the current candidate filename, meaning the next candidate in an
    /// instruction's try-order should be attempted. Any other code, including
    /// success, stops the try-loop.
    pub const fn should_try_next_filename(self) -> bool {
        matches!(
            self,
            NtStatus::OBJECT_NAME_INVALID
                | NtStatus::OBJECT_NAME_NOT_FOUND
                | NtStatus::OBJECT_PATH_INVALID
                | NtStatus::OBJECT_PATH_NOT_FOUND
        )
    }
}

impl std::fmt::Display for NtStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "0x{:08X}", self.0 as u32)
    }
}
