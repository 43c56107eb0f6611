//! Interception of file information queries, by name and by handle.

use std::sync::Arc;

use crate::director::{CreateDisposition, FileAccessMode};
use crate::fileinfo::{
    self, FileInformationClass, FILE_ALL_INFORMATION_NAME_PART_OFFSET,
    FILE_NAME_INFORMATION_NAME_OFFSET,
};
use crate::handle_store::OpenHandleStore;
use crate::instruction::FileOperationInstruction;
use crate::native::{AccessMask, Handle, IoStatusBlock, NativeFilesystem, ObjectAttributes};
use crate::status::NtStatus;

use super::{
    create_file_operation_context, execute_extra_pre_operations,
    file_access_mode_from_access_mask, select_path_candidates_to_try, FileOperationContext,
    PathCandidate, RequestTag,
};

/// Queries file information by name. Mirrors the new-handle flow minus the
/// create-disposition logic: the file of interest must already exist, so the
/// internal disposition is open-existing and only the filename candidates
/// are walked.
pub fn query_by_object_attributes(
    tag: RequestTag,
    store: &OpenHandleStore,
    native: &Arc<dyn NativeFilesystem>,
    object_attributes: &ObjectAttributes,
    desired_access: AccessMask,
    instruction_source: impl FnOnce(&str, FileAccessMode, CreateDisposition) -> FileOperationInstruction,
    mut invoke_system_call: impl FnMut(&ObjectAttributes) -> NtStatus,
) -> NtStatus {
    let context = create_file_operation_context(
        tag,
        store,
        object_attributes.root_directory,
        &object_attributes.object_name,
        file_access_mode_from_access_mask(desired_access),
        CreateDisposition::open_existing_file(),
        instruction_source,
    );
    let FileOperationContext { instruction, composed_input_path } = &context;

    if *instruction == FileOperationInstruction::no_redirection_or_interception() {
        let unredirected = match composed_input_path {
            Some(composed) => ObjectAttributes::from_path(composed.clone()),
            None => object_attributes.clone(),
        };
        return invoke_system_call(&unredirected);
    }

    let pre_operation_result = execute_extra_pre_operations(tag, native, instruction);
    if !pre_operation_result.is_success() {
        return pre_operation_result;
    }

    let redirected_attributes =
        instruction.redirected_file_name().map(ObjectAttributes::from_path);
    let unredirected_attributes = match composed_input_path {
        Some(composed) => ObjectAttributes::from_path(composed.clone()),
        None => object_attributes.clone(),
    };

    let mut system_call_result = NtStatus::OBJECT_PATH_NOT_FOUND;
    let mut last_attempted_path: Option<String> = None;

    let candidates = match select_path_candidates_to_try(tag, instruction) {
        Ok(candidates) => candidates,
        Err(forced_result) => return forced_result,
    };
    for candidate in candidates {
        let attributes_to_try = match candidate {
            PathCandidate::Unredirected => &unredirected_attributes,
            PathCandidate::Redirected => redirected_attributes
                .as_ref()
                .expect("candidate selection verified the redirected name"),
        };

        last_attempted_path = Some(attributes_to_try.object_name.clone());
        system_call_result = invoke_system_call(attributes_to_try);
        tracing::trace!(
            function = tag.function_name,
            request = tag.request_id,
            status = %system_call_result,
            object_name = %attributes_to_try.object_name,
            "attempted"
        );

        if !system_call_result.should_try_next_filename() {
            break;
        }
    }

    if last_attempted_path.is_none() {
        return invoke_system_call(object_attributes);
    }

    system_call_result
}

/// Queries file information by open handle, replacing any filename the
/// system returns with the handle's associated path.
///
/// The optional transform gives the caller an opportunity to reshape the
/// proposed replacement (strip the drive letter, add a namespace prefix)
/// before it lands in the output buffer.
#[allow(clippy::too_many_arguments)]
pub fn query_by_handle(
    tag: RequestTag,
    store: &OpenHandleStore,
    file_handle: Handle,
    io_status: &IoStatusBlock,
    buffer: &mut [u8],
    information_class: FileInformationClass,
    mut invoke_system_call: impl FnMut(Handle, &IoStatusBlock, &mut [u8], FileInformationClass) -> NtStatus,
    replacement_file_name_transform: impl FnOnce(&str) -> String,
) -> NtStatus {
    let system_call_result =
        invoke_system_call(file_handle, io_status, buffer, information_class);
    match system_call_result {
        // A buffer overflow is allowed through: if a filename part is
        // present it is about to be overwritten, and a true overflow
        // condition is detected at that time.
        NtStatus::BUFFER_OVERFLOW => {}
        failed if !failed.is_success() => return failed,
        _ => {}
    }

    // Only three information classes carry a filename back to the
    // application; everything else passes through untouched.
    let name_part_offset = match information_class {
        FileInformationClass::FileNameInformation
        | FileInformationClass::FileNormalizedNameInformation => 0,
        FileInformationClass::FileAllInformation => FILE_ALL_INFORMATION_NAME_PART_OFFSET,
        _ => return system_call_result,
    };

    if buffer.len() < name_part_offset + FILE_NAME_INFORMATION_NAME_OFFSET + 4 {
        return system_call_result;
    }
    let name_part = &mut buffer[name_part_offset..];
    let file_name_capacity_bytes = name_part.len() - FILE_NAME_INFORMATION_NAME_OFFSET;

    // Handles the engine never stored cannot be the product of redirection,
    // so whatever the system returned stands.
    let Some(handle_data) = store.get(file_handle) else {
        tracing::trace!(
            function = tag.function_name,
            request = tag.request_id,
            handle = file_handle.0,
            "uncached handle, system-returned path not replaced"
        );
        return system_call_result;
    };

    let replacement_file_name =
        replacement_file_name_transform(&handle_data.associated_path);
    let old_file_name_length_bytes = fileinfo::read_name_information_length(name_part);

    fileinfo::write_name_information_file_name(name_part, &replacement_file_name);
    let new_file_name_length_bytes = fileinfo::encode_file_name(&replacement_file_name).len();

    tracing::debug!(
        function = tag.function_name,
        request = tag.request_id,
        handle = file_handle.0,
        replacement = %replacement_file_name,
        "replaced system-returned path"
    );

    // The I/O status block must reflect the rewritten buffer: the total
    // number of bytes in the Information field and the final status code.
    if new_file_name_length_bytes > file_name_capacity_bytes {
        // The new filename does not fit, regardless of how long the old one
        // was.
        io_status.set_information(buffer.len() as u64);
        io_status.set_status(NtStatus::BUFFER_OVERFLOW);
        NtStatus::BUFFER_OVERFLOW
    } else if old_file_name_length_bytes > file_name_capacity_bytes {
        // The old filename overflowed but the new one fits, clearing the
        // previous overflow condition.
        io_status.set_information(
            io_status.information()
                - (file_name_capacity_bytes - new_file_name_length_bytes) as u64,
        );
        io_status.set_status(NtStatus::SUCCESS);
        NtStatus::SUCCESS
    } else {
        // Neither filename overflows; only the byte count changes.
        let information = io_status.information() as i64
            + (new_file_name_length_bytes as i64 - old_file_name_length_bytes as i64);
        io_status.set_information(information.max(0) as u64);
        io_status.set_status(NtStatus::SUCCESS);
        NtStatus::SUCCESS
    }
}
