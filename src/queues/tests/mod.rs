#![cfg(test)]

mod enumeration;
mod merged;

use crate::fileinfo::{self, FileInformationClass, FileInformationStructLayout};
use crate::status::NtStatus;

use super::DirectoryOperationQueue;

pub(crate) fn names_layout() -> FileInformationStructLayout {
    FileInformationStructLayout::for_information_class(FileInformationClass::FileNamesInformation)
        .expect("supported class")
}

/// Builds a standalone record for the given filename.
pub(crate) fn record_for(layout: FileInformationStructLayout, file_name: &str) -> Vec<u8> {
    let mut record =
        vec![0u8; layout.size_for_file_name_length(fileinfo::encode_file_name(file_name).len())];
    layout.write_file_name(&mut record, file_name);
    record
}

/// Scripted queue used to drive the merged queue and the executor from
/// tests. Satisfies the same contract as the production variants.
pub(crate) struct MockQueue {
    layout: FileInformationStructLayout,
    records: Vec<Vec<u8>>,
    index: usize,
    forced_status: Option<NtStatus>,
}

impl MockQueue {
    pub(crate) fn with_names(file_names: &[&str]) -> Self {
        let layout = names_layout();
        Self {
            layout,
            records: file_names.iter().map(|name| record_for(layout, name)).collect(),
            index: 0,
            forced_status: None,
        }
    }

    pub(crate) fn with_forced_status(status: NtStatus) -> Self {
        Self { layout: names_layout(), records: Vec::new(), index: 0, forced_status: Some(status) }
    }
}

impl DirectoryOperationQueue for MockQueue {
    fn enumeration_status(&self) -> NtStatus {
        if let Some(forced) = self.forced_status {
            return forced;
        }
        if self.index < self.records.len() {
            NtStatus::MORE_ENTRIES
        } else {
            NtStatus::NO_MORE_FILES
        }
    }

    fn size_of_front(&self) -> usize {
        self.records[self.index].len()
    }

    fn file_name_of_front(&self) -> String {
        self.layout.read_file_name(&self.records[self.index])
    }

    fn copy_front(&self, destination: &mut [u8]) -> usize {
        let record = &self.records[self.index];
        let bytes_to_copy = record.len().min(destination.len());
        destination[..bytes_to_copy].copy_from_slice(&record[..bytes_to_copy]);
        bytes_to_copy
    }

    fn pop_front(&mut self) {
        self.index += 1;
    }

    fn restart(&mut self, _query_file_pattern: &str) {
        self.index = 0;
    }
}

/// Drains a queue into the list of filenames it yields, in order.
pub(crate) fn drain(queue: &mut dyn DirectoryOperationQueue) -> Vec<String> {
    let mut names = Vec::new();
    while queue.enumeration_status() == NtStatus::MORE_ENTRIES {
        names.push(queue.file_name_of_front());
        queue.pop_front();
    }
    names
}
