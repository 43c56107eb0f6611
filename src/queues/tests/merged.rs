use crate::queues::{DirectoryOperationQueue, MergedFileInformationQueue};
use crate::status::NtStatus;

use super::{drain, names_layout, MockQueue};

fn merged(children: Vec<MockQueue>) -> MergedFileInformationQueue {
    MergedFileInformationQueue::new(
        children
            .into_iter()
            .map(|queue| Box::new(queue) as Box<dyn DirectoryOperationQueue>)
            .collect(),
    )
}

#[test]
fn merges_children_in_case_insensitive_order() {
    let mut queue = merged(vec![
        MockQueue::with_names(&["banana", "Date"]),
        MockQueue::with_names(&["Apple", "cherry"]),
    ]);

    assert_eq!(drain(&mut queue), vec!["Apple", "banana", "cherry", "Date"]);
    assert_eq!(queue.enumeration_status(), NtStatus::NO_MORE_FILES);
}

#[test]
fn output_is_the_union_of_children() {
    let mut queue = merged(vec![
        MockQueue::with_names(&["core.dat"]),
        MockQueue::with_names(&["pack.mod"]),
    ]);

    let mut names = drain(&mut queue);
    names.sort();
    assert_eq!(names, vec!["core.dat", "pack.mod"]);
}

#[test]
fn equal_names_prefer_the_lowest_child_index() {
    let layout = names_layout();
    let mut queue = merged(vec![
        MockQueue::with_names(&["Shared"]),
        MockQueue::with_names(&["shared"]),
    ]);

    // Both children surface the same name; the merged queue yields the first
    // child's record first, and the duplicate remains for the caller's
    // deduplication layer.
    assert_eq!(queue.enumeration_status(), NtStatus::MORE_ENTRIES);
    let mut record = vec![0u8; queue.size_of_front()];
    queue.copy_front(&mut record);
    assert_eq!(layout.read_file_name(&record), "Shared");
    queue.pop_front();
    assert_eq!(queue.file_name_of_front(), "shared");
    queue.pop_front();
    assert_eq!(queue.enumeration_status(), NtStatus::NO_MORE_FILES);
}

#[test]
fn child_error_takes_precedence() {
    let queue = merged(vec![
        MockQueue::with_names(&["a"]),
        MockQueue::with_forced_status(NtStatus::ACCESS_DENIED),
    ]);
    assert_eq!(queue.enumeration_status(), NtStatus::ACCESS_DENIED);
}

#[test]
fn empty_merge_reports_no_more_files() {
    let queue = merged(vec![MockQueue::with_names(&[]), MockQueue::with_names(&[])]);
    assert_eq!(queue.enumeration_status(), NtStatus::NO_MORE_FILES);
}

#[test]
fn restart_restarts_every_child() {
    let mut queue = merged(vec![
        MockQueue::with_names(&["a"]),
        MockQueue::with_names(&["b"]),
    ]);

    assert_eq!(drain(&mut queue), vec!["a", "b"]);
    queue.restart("");
    assert_eq!(drain(&mut queue), vec!["a", "b"]);
}
