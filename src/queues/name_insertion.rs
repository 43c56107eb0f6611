//! Queue synthesizing directory records from rule-derived name insertions.

use std::sync::Arc;

use crate::fileinfo::FileInformationStructLayout;
use crate::instruction::DirectoryNameInsertion;
use crate::native::NativeFilesystem;
use crate::status::NtStatus;
use crate::strings;

use super::DirectoryOperationQueue;

/// Produces exactly one record per insertion entry, in order, each carrying
/// the filename the entry asks to insert. The fixed part of the record is
/// sourced from the entry's information-source location so that attributes
/// and timestamps look real; if that query fails the fixed part stays
/// zeroed. Entries not matching the application's query file pattern are
/// skipped.
pub struct NameInsertionQueue {
    native: Arc<dyn NativeFilesystem>,
    insertions: Vec<DirectoryNameInsertion>,
    layout: FileInformationStructLayout,
    /// Uppercased, as the pattern matcher requires.
    query_file_pattern: String,
    next_index: usize,
    front: Option<Vec<u8>>,
    status: NtStatus,
}

impl NameInsertionQueue {
    pub fn new(
        native: Arc<dyn NativeFilesystem>,
        insertions: Vec<DirectoryNameInsertion>,
        layout: FileInformationStructLayout,
        query_file_pattern: &str,
    ) -> Self {
        let mut queue = Self {
            native,
            insertions,
            layout,
            query_file_pattern: strings::fold_case(query_file_pattern),
            next_index: 0,
            front: None,
            status: NtStatus::NO_MORE_FILES,
        };
        queue.advance();
        queue
    }

    /// Moves to the next insertion entry matching the query file pattern and
    /// synthesizes its record.
    fn advance(&mut self) {
        while self.next_index < self.insertions.len() {
            let insertion = self.insertions[self.next_index].clone();
            self.next_index += 1;

            if !strings::file_name_matches_pattern(
                &insertion.file_name_to_insert,
                &self.query_file_pattern,
            ) {
                continue;
            }

            self.front = Some(self.synthesize_record(&insertion));
            self.status = NtStatus::MORE_ENTRIES;
            return;
        }

        self.front = None;
        self.status = NtStatus::NO_MORE_FILES;
    }

    fn synthesize_record(&self, insertion: &DirectoryNameInsertion) -> Vec<u8> {
        let inserted_length_bytes =
            crate::fileinfo::encode_file_name(&insertion.file_name_to_insert).len();
        let source_length_bytes =
            crate::fileinfo::encode_file_name(&insertion.information_source_name).len();

        // Sized for whichever name is longer so the source query has room,
        // then trimmed back down to the inserted name.
        let mut record = vec![
            0u8;
            self.layout
                .size_for_file_name_length(inserted_length_bytes.max(source_length_bytes))
        ];

        // Result deliberately unchecked: a failed query leaves the fixed
        // part zeroed, and the record is still produced.
        let _ = self.native.query_single_file_directory_information(
            &insertion.information_source_directory,
            &insertion.information_source_name,
            self.layout.information_class(),
            &mut record,
        );

        self.layout.write_file_name(&mut record, &insertion.file_name_to_insert);
        record.truncate(self.layout.size_for_file_name_length(inserted_length_bytes));
        self.layout.clear_next_entry_offset(&mut record);
        record
    }

    fn front_record(&self) -> &[u8] {
        self.front.as_deref().unwrap_or(&[])
    }
}

impl DirectoryOperationQueue for NameInsertionQueue {
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
        self.advance();
    }

    fn restart(&mut self, query_file_pattern: &str) {
        if !query_file_pattern.is_empty() {
            self.query_file_pattern = strings::fold_case(query_file_pattern);
        }
        self.next_index = 0;
        self.advance();
    }
}
