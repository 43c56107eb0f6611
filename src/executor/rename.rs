//! Interception of renames of already-open files and directories.

use std::sync::Arc;

use crate::director::{CreateDisposition, FileAccessMode};
use crate::handle_store::OpenHandleStore;
use crate::instruction::FileOperationInstruction;
use crate::native::{FileRenameInformation, Handle, NativeFilesystem};
use crate::status::NtStatus;
use crate::strings;

use super::{
    create_file_operation_context, execute_extra_pre_operations,
    select_filename_and_update_handle, select_path_candidates_to_try, FileOperationContext,
    PathCandidate, RequestTag,
};

/// Renames the file behind an open handle under instruction control.
///
/// The rename target inside the request is a path, sometimes relative. A
/// relative target with no root directory is resolved against the directory
/// currently containing the file: the cached associated path's parent when
/// the source handle is stored, the system's own idea of the handle's path
/// otherwise. On success the handle's cache entry follows the instruction's
/// name-association policy.
pub fn rename_by_handle(
    tag: RequestTag,
    store: &OpenHandleStore,
    native: &Arc<dyn NativeFilesystem>,
    file_handle: Handle,
    rename_information: &FileRenameInformation,
    instruction_source: impl FnOnce(&str, FileAccessMode, CreateDisposition) -> FileOperationInstruction,
    mut invoke_system_call: impl FnMut(Handle, &FileRenameInformation) -> NtStatus,
) -> NtStatus {
    let mut unredirected_path = rename_information.file_name.clone();

    if rename_information.root_directory.is_none()
        && !strings::begins_with_drive_letter(&unredirected_path)
    {
        let containing_directory = match store.get(file_handle) {
            Some(handle_data) => {
                Some(strings::parent_directory(&handle_data.associated_path).to_string())
            }
            None => native
                .query_absolute_path_by_handle(file_handle)
                .ok()
                .map(|absolute| strings::parent_directory(&absolute).to_string()),
        };
        if let Some(containing_directory) = containing_directory {
            unredirected_path =
                format!("{containing_directory}\\{}", rename_information.file_name);
            tracing::debug!(
                function = tag.function_name,
                request = tag.request_id,
                handle = file_handle.0,
                resolved = %unredirected_path,
                "relative rename target resolved"
            );
        }
    }

    let context = create_file_operation_context(
        tag,
        store,
        rename_information.root_directory,
        &unredirected_path,
        FileAccessMode::delete(),
        CreateDisposition::create_new_file(),
        instruction_source,
    );
    let FileOperationContext { instruction, composed_input_path } = &context;
    let unredirected_path =
        composed_input_path.as_deref().unwrap_or(&unredirected_path).to_string();

    let pre_operation_result = execute_extra_pre_operations(tag, native, instruction);
    if !pre_operation_result.is_success() {
        return pre_operation_result;
    }

    let mut system_call_result = NtStatus::OBJECT_PATH_NOT_FOUND;
    let mut last_attempted_path: Option<String> = None;

    // Without a redirected filename there is exactly one way to submit the
    // rename, so the candidate walk is skipped altogether.
    if let Some(redirected_file_name) = instruction.redirected_file_name() {
        let redirected_information = FileRenameInformation {
            replace_if_exists: rename_information.replace_if_exists,
            root_directory: None,
            file_name: redirected_file_name.to_string(),
        };
        let unredirected_information = FileRenameInformation {
            replace_if_exists: rename_information.replace_if_exists,
            root_directory: rename_information.root_directory,
            file_name: unredirected_path.clone(),
        };

        let candidates = match select_path_candidates_to_try(tag, instruction) {
            Ok(candidates) => candidates,
            Err(forced_result) => return forced_result,
        };
        for candidate in candidates {
            let information_to_try = match candidate {
                PathCandidate::Unredirected => &unredirected_information,
                PathCandidate::Redirected => &redirected_information,
            };

            last_attempted_path = Some(information_to_try.file_name.clone());
            system_call_result = invoke_system_call(file_handle, information_to_try);
            tracing::trace!(
                function = tag.function_name,
                request = tag.request_id,
                status = %system_call_result,
                object_name = %information_to_try.file_name,
                "attempted"
            );

            if !system_call_result.should_try_next_filename() {
                break;
            }
        }
    }

    if last_attempted_path.is_none() {
        system_call_result = invoke_system_call(file_handle, rename_information);
    }

    if system_call_result.is_success() {
        select_filename_and_update_handle(
            tag,
            store,
            file_handle,
            instruction,
            last_attempted_path.as_deref().unwrap_or_default(),
            &unredirected_path,
        );
    }

    system_call_result
}
