//! Queue that order-merges several child queues.

use crate::status::NtStatus;
use crate::strings;

use super::DirectoryOperationQueue;

/// Owns several heterogeneous child queues. The head of the merged queue is
/// always the head of the child whose front filename sorts first in
/// case-insensitive order, ties broken by the lowest child index, which
/// keeps the merged order stable.
pub struct MergedFileInformationQueue {
    queues: Vec<Box<dyn DirectoryOperationQueue>>,
}

impl MergedFileInformationQueue {
    pub fn new(queues: Vec<Box<dyn DirectoryOperationQueue>>) -> Self {
        Self { queues }
    }

    /// Index of the child currently supplying the front record, if any child
    /// has one.
    fn front_queue_index(&self) -> Option<usize> {
        let mut selected: Option<(usize, String)> = None;
        for (index, queue) in self.queues.iter().enumerate() {
            if queue.enumeration_status() != NtStatus::MORE_ENTRIES {
                continue;
            }
            let front_name = strings::fold_case(&queue.file_name_of_front());
            match &selected {
                Some((_, selected_name)) if *selected_name <= front_name => {}
                _ => selected = Some((index, front_name)),
            }
        }
        selected.map(|(index, _)| index)
    }

    fn front_queue(&self) -> Option<&dyn DirectoryOperationQueue> {
        self.front_queue_index().map(|index| self.queues[index].as_ref())
    }
}

impl DirectoryOperationQueue for MergedFileInformationQueue {
    fn enumeration_status(&self) -> NtStatus {
        let mut any_entries = false;
        for queue in &self.queues {
            match queue.enumeration_status() {
                NtStatus::MORE_ENTRIES => any_entries = true,
                NtStatus::NO_MORE_FILES => {}
                error => return error,
            }
        }
        if any_entries {
            NtStatus::MORE_ENTRIES
        } else {
            NtStatus::NO_MORE_FILES
        }
    }

    fn size_of_front(&self) -> usize {
        self.front_queue().map_or(0, |queue| queue.size_of_front())
    }

    fn file_name_of_front(&self) -> String {
        self.front_queue().map_or_else(String::new, |queue| queue.file_name_of_front())
    }

    fn copy_front(&self, destination: &mut [u8]) -> usize {
        self.front_queue().map_or(0, |queue| queue.copy_front(destination))
    }

    fn pop_front(&mut self) {
        if let Some(index) = self.front_queue_index() {
            self.queues[index].pop_front();
        }
    }

    fn restart(&mut self, query_file_pattern: &str) {
        for queue in &mut self.queues {
            queue.restart(query_file_pattern);
        }
    }
}
