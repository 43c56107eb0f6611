use std::sync::Arc;

use crate::instruction::DirectoryFilterScope;
use crate::mock_filesystem::MockFilesystem;
use crate::queues::{DirectoryOperationQueue, EnumerationQueue};
use crate::rule::{FilesystemRule, RedirectMode};
use crate::status::NtStatus;

use super::{drain, names_layout};

fn rule_matching(patterns: &[&str]) -> Arc<FilesystemRule> {
    Arc::new(FilesystemRule::new(
        "R",
        "C:\\Origin",
        "D:\\Target",
        patterns.iter().map(|p| p.to_string()).collect(),
        RedirectMode::Simple,
    ))
}

fn filesystem_with_contents(file_names: &[&str]) -> Arc<MockFilesystem> {
    let filesystem = Arc::new(MockFilesystem::new());
    for name in file_names {
        filesystem.add_file(&format!("C:\\Dir\\{name}"));
    }
    filesystem
}

#[test]
fn yields_directory_contents_in_order() {
    let filesystem = filesystem_with_contents(&["beta.txt", "Alpha.txt", "gamma.txt"]);
    let mut queue = EnumerationQueue::new(
        filesystem,
        DirectoryFilterScope::IncludeAll,
        "C:\\Dir",
        names_layout(),
        "",
    );

    assert_eq!(drain(&mut queue), vec!["Alpha.txt", "beta.txt", "gamma.txt"]);
    assert_eq!(queue.enumeration_status(), NtStatus::NO_MORE_FILES);
}

#[test]
fn open_failure_is_reported_as_status() {
    let filesystem = Arc::new(MockFilesystem::new());
    filesystem.add_directory("C:\\Dir");
    let queue = EnumerationQueue::new(
        filesystem,
        DirectoryFilterScope::IncludeAll,
        "C:\\Dir\\Missing",
        names_layout(),
        "",
    );
    assert_eq!(queue.enumeration_status(), NtStatus::OBJECT_NAME_NOT_FOUND);
}

#[test]
fn scope_filter_composes_with_query_pattern() {
    let filesystem =
        filesystem_with_contents(&["one.sav", "two.sav", "one.txt", "readme.md"]);

    // Scope admits only *.sav, application pattern narrows to one*.
    let mut queue = EnumerationQueue::new(
        filesystem,
        DirectoryFilterScope::IncludeOnlyMatching(rule_matching(&["*.sav"])),
        "C:\\Dir",
        names_layout(),
        "one*",
    );
    assert_eq!(drain(&mut queue), vec!["one.sav"]);
}

#[test]
fn exclusion_scope_hides_rule_governed_names() {
    let filesystem = filesystem_with_contents(&["core.dat", "pack.mod"]);
    let mut queue = EnumerationQueue::new(
        filesystem,
        DirectoryFilterScope::IncludeAllExceptMatching(rule_matching(&["*.mod"])),
        "C:\\Dir",
        names_layout(),
        "",
    );
    assert_eq!(drain(&mut queue), vec!["core.dat"]);
}

#[test]
fn refills_across_batches() {
    let names: Vec<String> = (0..300).map(|i| format!("file_{i:04}.dat")).collect();
    let filesystem = filesystem_with_contents(
        &names.iter().map(String::as_str).collect::<Vec<&str>>(),
    );

    let mut queue = EnumerationQueue::new(
        filesystem,
        DirectoryFilterScope::IncludeAll,
        "C:\\Dir",
        names_layout(),
        "",
    );

    let drained = drain(&mut queue);
    assert_eq!(drained.len(), 300);
    assert_eq!(drained.first().map(String::as_str), Some("file_0000.dat"));
    assert_eq!(drained.last().map(String::as_str), Some("file_0299.dat"));
}

#[test]
fn restart_rewinds_and_applies_new_pattern() {
    let filesystem = filesystem_with_contents(&["a.sav", "b.txt"]);
    let mut queue = EnumerationQueue::new(
        filesystem,
        DirectoryFilterScope::IncludeAll,
        "C:\\Dir",
        names_layout(),
        "",
    );

    assert_eq!(drain(&mut queue), vec!["a.sav", "b.txt"]);

    queue.restart("*.txt");
    assert_eq!(drain(&mut queue), vec!["b.txt"]);

    // An empty pattern on restart keeps the previous one in force.
    queue.restart("");
    assert_eq!(drain(&mut queue), vec!["b.txt"]);
}

#[test]
fn drop_closes_the_directory_handle() {
    let filesystem = filesystem_with_contents(&["a.txt"]);
    {
        let _queue = EnumerationQueue::new(
            filesystem.clone(),
            DirectoryFilterScope::IncludeAll,
            "C:\\Dir",
            names_layout(),
            "",
        );
        assert!(filesystem.closed_handles().is_empty());
    }
    assert_eq!(filesystem.closed_handles().len(), 1);
}

#[test]
fn copy_front_truncates_to_destination() {
    let filesystem = filesystem_with_contents(&["abcdef.txt"]);
    let queue = EnumerationQueue::new(
        filesystem,
        DirectoryFilterScope::IncludeAll,
        "C:\\Dir",
        names_layout(),
        "",
    );

    let full_size = queue.size_of_front();
    let mut small = vec![0u8; full_size - 8];
    assert_eq!(queue.copy_front(&mut small), full_size - 8);

    let mut exact = vec![0u8; full_size];
    assert_eq!(queue.copy_front(&mut exact), full_size);
    assert_eq!(names_layout().read_file_name(&exact), "abcdef.txt");
}
