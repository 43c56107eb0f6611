//! Queue over the contents of one real directory.

use std::sync::Arc;

use crate::fileinfo::FileInformationStructLayout;
use crate::instruction::DirectoryFilterScope;
use crate::native::{Handle, NativeFilesystem};
use crate::status::NtStatus;

use super::{DirectoryOperationQueue, ENUMERATION_BATCH_CAPACITY};

/// Wraps a native enumeration of a freshly-opened directory handle. Records
/// arrive from the native layer in batches and are surfaced one at a time,
/// filtered by the composition of the rule-scope filter this queue was
/// constructed with and the application-supplied query file pattern (which
/// the native layer applies).
pub struct EnumerationQueue {
    native: Arc<dyn NativeFilesystem>,
    directory_handle: Option<Handle>,
    layout: FileInformationStructLayout,
    scope: DirectoryFilterScope,
    query_file_pattern: String,
    batch: Vec<u8>,
    read_offset: usize,
    status: NtStatus,
}

impl EnumerationQueue {
    /// Opens the directory and primes the first batch. A failure to open
    /// leaves the queue in the corresponding error status.
    pub fn new(
        native: Arc<dyn NativeFilesystem>,
        scope: DirectoryFilterScope,
        absolute_directory_path: &str,
        layout: FileInformationStructLayout,
        query_file_pattern: &str,
    ) -> Self {
        let mut queue = Self {
            directory_handle: None,
            layout,
            scope,
            query_file_pattern: query_file_pattern.to_string(),
            batch: vec![0u8; ENUMERATION_BATCH_CAPACITY],
            read_offset: 0,
            status: NtStatus::NO_MORE_FILES,
            native: native.clone(),
        };

        match native.open_directory_for_enumeration(absolute_directory_path) {
            Ok(handle) => {
                queue.directory_handle = Some(handle);
                queue.refill(true);
            }
            Err(open_error) => queue.status = open_error,
        }

        queue
    }

    fn front_record(&self) -> &[u8] {
        &self.batch[self.read_offset..]
    }

    /// Requests the next batch from the native layer.
    fn refill(&mut self, restart: bool) {
        let Some(handle) = self.directory_handle else {
            self.status = NtStatus::INTERNAL_ERROR;
            return;
        };

        let refill_status = self.native.partial_enumerate_directory(
            handle,
            self.layout.information_class(),
            &mut self.batch,
            &self.query_file_pattern,
            restart,
        );
        if refill_status == NtStatus::SUCCESS {
            self.read_offset = 0;
            self.status = NtStatus::MORE_ENTRIES;
            self.skip_records_outside_scope();
        } else {
            self.status = refill_status;
        }
    }

    /// Removes one record regardless of the scope filter.
    fn pop_one(&mut self) {
        let next_entry_offset = self.layout.read_next_entry_offset(self.front_record());
        if next_entry_offset == 0 {
            self.refill(false);
        } else {
            self.read_offset += next_entry_offset;
        }
    }

    /// Maintains the invariant that the front record, when one exists,
    /// passes the scope filter.
    fn skip_records_outside_scope(&mut self) {
        while self.status == NtStatus::MORE_ENTRIES
            && !self.scope.includes(&self.file_name_of_front())
        {
            self.pop_one();
        }
    }
}

impl DirectoryOperationQueue for EnumerationQueue {
    fn enumeration_status(&self) -> NtStatus {
        self.status
    }

    fn size_of_front(&self) -> usize {
        self.layout.size_of_record(self.front_record())
    }

    fn file_name_of_front(&self) -> String {
        self.layout.read_file_name(self.front_record())
    }

    fn copy_front(&self, destination: &mut [u8]) -> usize {
        let record = self.front_record();
        let bytes_to_copy = self.size_of_front().min(destination.len()).min(record.len());
        destination[..bytes_to_copy].copy_from_slice(&record[..bytes_to_copy]);
        bytes_to_copy
    }

    fn pop_front(&mut self) {
        self.pop_one();
        self.skip_records_outside_scope();
    }

    fn restart(&mut self, query_file_pattern: &str) {
        if !query_file_pattern.is_empty() {
            self.query_file_pattern = query_file_pattern.to_string();
        }
        self.refill(true);
    }
}

impl Drop for EnumerationQueue {
    fn drop(&mut self) {
        if let Some(handle) = self.directory_handle.take() {
            self.native.close_handle(handle);
        }
    }
}
