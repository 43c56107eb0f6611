use std::cell::RefCell;

use crate::executor::rename_by_handle;
use crate::handle_store::OpenHandleStore;
use crate::instruction::{FileOperationInstruction, NameAssociation, TryFiles};
use crate::native::{FileRenameInformation, Handle};
use crate::status::NtStatus;

use super::{native_pair, redirect_instruction, tag};

const SOURCE_HANDLE: Handle = Handle(0x44);

fn rename_to(file_name: &str) -> FileRenameInformation {
    FileRenameInformation {
        replace_if_exists: false,
        root_directory: None,
        file_name: file_name.to_string(),
    }
}

#[test]
fn absolute_target_is_redirected_and_cache_updated() {
    let (_, native) = native_pair();
    let store = OpenHandleStore::new();
    store.insert(SOURCE_HANDLE, "C:\\Game\\Saves\\old.sav", "D:\\Mods\\Saves\\old.sav");

    let attempted = RefCell::new(Vec::new());
    let queried = RefCell::new(String::new());

    let result = rename_by_handle(
        tag(),
        &store,
        &native,
        SOURCE_HANDLE,
        &rename_to("C:\\Game\\Saves\\new.sav"),
        |path, access, disposition| {
            *queried.borrow_mut() = path.to_string();
            // Renames query for delete access with create-new semantics.
            assert!(access.allows_delete());
            assert!(disposition.allows_create_new_file());
            assert!(!disposition.allows_open_existing_file());
            redirect_instruction(
                "D:\\Mods\\Saves\\new.sav",
                TryFiles::RedirectedOnly,
                NameAssociation::Unredirected,
            )
        },
        |handle, information| {
            assert_eq!(handle, SOURCE_HANDLE);
            attempted.borrow_mut().push(information.file_name.clone());
            NtStatus::SUCCESS
        },
    );

    assert_eq!(result, NtStatus::SUCCESS);
    assert_eq!(&*queried.borrow(), "C:\\Game\\Saves\\new.sav");
    assert_eq!(*attempted.borrow(), vec!["D:\\Mods\\Saves\\new.sav".to_string()]);

    let view = store.get(SOURCE_HANDLE).expect("handle stays cached");
    assert_eq!(view.associated_path, "C:\\Game\\Saves\\new.sav");
    assert_eq!(view.real_opened_path, "D:\\Mods\\Saves\\new.sav");
}

#[test]
fn relative_target_resolves_against_the_cached_associated_path() {
    let (_, native) = native_pair();
    let store = OpenHandleStore::new();
    store.insert(SOURCE_HANDLE, "C:\\Game\\Saves\\old.sav", "D:\\Mods\\Saves\\old.sav");

    let queried = RefCell::new(String::new());

    rename_by_handle(
        tag(),
        &store,
        &native,
        SOURCE_HANDLE,
        &rename_to("new.sav"),
        |path, _, _| {
            *queried.borrow_mut() = path.to_string();
            FileOperationInstruction::no_redirection_or_interception()
        },
        |_, _| NtStatus::SUCCESS,
    );

    assert_eq!(&*queried.borrow(), "C:\\Game\\Saves\\new.sav");
}

#[test]
fn relative_target_for_an_uncached_handle_asks_the_system() {
    let (mock, native) = native_pair();
    let store = OpenHandleStore::new();
    mock.set_absolute_path(SOURCE_HANDLE, "E:\\Work\\data\\report.txt");

    let queried = RefCell::new(String::new());

    rename_by_handle(
        tag(),
        &store,
        &native,
        SOURCE_HANDLE,
        &rename_to("report-final.txt"),
        |path, _, _| {
            *queried.borrow_mut() = path.to_string();
            FileOperationInstruction::no_redirection_or_interception()
        },
        |_, _| NtStatus::SUCCESS,
    );

    assert_eq!(&*queried.borrow(), "E:\\Work\\data\\report-final.txt");
}

#[test]
fn association_none_erases_the_cache_entry() {
    let (_, native) = native_pair();
    let store = OpenHandleStore::new();
    store.insert(SOURCE_HANDLE, "C:\\Game\\Saves\\old.sav", "D:\\Mods\\Saves\\old.sav");

    rename_by_handle(
        tag(),
        &store,
        &native,
        SOURCE_HANDLE,
        &rename_to("C:\\Other\\new.sav"),
        |_, _, _| {
            redirect_instruction("D:\\X\\new.sav", TryFiles::RedirectedOnly, NameAssociation::None)
        },
        |_, _| NtStatus::SUCCESS,
    );

    assert!(store.is_empty());
}

#[test]
fn try_next_codes_walk_the_candidates_in_order() {
    let (_, native) = native_pair();
    let store = OpenHandleStore::new();
    let attempted = RefCell::new(Vec::new());

    let result = rename_by_handle(
        tag(),
        &store,
        &native,
        SOURCE_HANDLE,
        &rename_to("C:\\Game\\Saves\\new.sav"),
        |_, _, _| {
            redirect_instruction(
                "D:\\Mods\\Saves\\new.sav",
                TryFiles::RedirectedFirst,
                NameAssociation::None,
            )
        },
        |_, information| {
            attempted.borrow_mut().push(information.file_name.clone());
            if information.file_name.starts_with("D:") {
                NtStatus::OBJECT_PATH_NOT_FOUND
            } else {
                NtStatus::SUCCESS
            }
        },
    );

    assert_eq!(result, NtStatus::SUCCESS);
    assert_eq!(
        *attempted.borrow(),
        vec!["D:\\Mods\\Saves\\new.sav".to_string(), "C:\\Game\\Saves\\new.sav".to_string()]
    );
}

#[test]
fn without_a_redirected_name_the_original_request_is_submitted() {
    let (_, native) = native_pair();
    let store = OpenHandleStore::new();
    let attempted = RefCell::new(Vec::new());

    let information = rename_to("C:\\Plain\\new.txt");
    let result = rename_by_handle(
        tag(),
        &store,
        &native,
        SOURCE_HANDLE,
        &information,
        |_, _, _| FileOperationInstruction::no_redirection_or_interception(),
        |_, submitted| {
            attempted.borrow_mut().push(submitted.clone());
            NtStatus::SUCCESS
        },
    );

    assert_eq!(result, NtStatus::SUCCESS);
    assert_eq!(*attempted.borrow(), vec![information]);
    assert!(store.is_empty());
}

#[test]
fn rename_failure_leaves_the_cache_untouched() {
    let (_, native) = native_pair();
    let store = OpenHandleStore::new();
    store.insert(SOURCE_HANDLE, "C:\\Game\\Saves\\old.sav", "D:\\Mods\\Saves\\old.sav");

    let result = rename_by_handle(
        tag(),
        &store,
        &native,
        SOURCE_HANDLE,
        &rename_to("C:\\Game\\Saves\\new.sav"),
        |_, _, _| {
            redirect_instruction(
                "D:\\Mods\\Saves\\new.sav",
                TryFiles::RedirectedOnly,
                NameAssociation::Unredirected,
            )
        },
        |_, _| NtStatus::ACCESS_DENIED,
    );

    assert_eq!(result, NtStatus::ACCESS_DENIED);
    let view = store.get(SOURCE_HANDLE).expect("handle stays cached");
    assert_eq!(view.associated_path, "C:\\Game\\Saves\\old.sav");
}
