//! Lazy, pull-based producers of directory file information records.
//!
//! Three queue variants share one contract: an enumeration queue wrapping a
//! native directory enumeration, a name-insertion queue synthesizing records
//! from rule data, and a merged queue order-merging several children. The
//! executor drives whichever variant an instruction called for through the
//! [`DirectoryOperationQueue`] trait, and tests can inject their own variant
//! satisfying the same contract.

mod enumeration;
mod merged;
mod name_insertion;

#[cfg(test)]
pub(crate) mod tests;

pub use enumeration::EnumerationQueue;
pub use merged::MergedFileInformationQueue;
pub use name_insertion::NameInsertionQueue;

use crate::status::NtStatus;

/// Number of bytes requested from the native layer per enumeration batch.
pub(crate) const ENUMERATION_BATCH_CAPACITY: usize = 4096;

/// Contract shared by all directory operation queue variants.
///
/// While the status reports [`NtStatus::MORE_ENTRIES`] the queue has a front
/// record; the front accessors must not be invoked otherwise.
pub trait DirectoryOperationQueue: Send {
    /// Current enumeration status: [`NtStatus::MORE_ENTRIES`] while records
    /// remain, [`NtStatus::NO_MORE_FILES`] once exhausted, or an error.
    fn enumeration_status(&self) -> NtStatus;

    /// Byte size of the record at the head of the queue.
    fn size_of_front(&self) -> usize;

    /// Filename of the record at the head of the queue.
    fn file_name_of_front(&self) -> String;

    /// Copies the head record into the destination, truncating if the
    /// destination cannot hold it all. Returns the number of bytes copied.
    fn copy_front(&self, destination: &mut [u8]) -> usize;

    /// Removes the head record.
    fn pop_front(&mut self);

    /// Rewinds the queue to the beginning. A non-empty query file pattern
    /// replaces the pattern in force; an empty one leaves it unchanged.
    fn restart(&mut self, query_file_pattern: &str);
}
