//! Interception of attempts to create or open files, resulting in a new
//! file handle.

use std::sync::Arc;

use crate::director::{CreateDisposition, FileAccessMode};
use crate::handle_store::OpenHandleStore;
use crate::instruction::FileOperationInstruction;
use crate::native::{
    AccessMask, Handle, NativeFilesystem, NtCreateDisposition, ObjectAttributes,
};
use crate::status::NtStatus;
use crate::strings;

use super::{
    create_disposition_from_nt_parameter, create_file_operation_context,
    execute_extra_pre_operations, file_access_mode_from_access_mask,
    select_create_dispositions_to_try, select_filename_and_store_new_handle,
    select_path_candidates_to_try, FileOperationContext, PathCandidate, RequestTag, TryCondition,
};

/// Creates or opens a file under instruction control.
///
/// The underlying system call is a function object whose variable parameters
/// are the destination handle, the object attributes to attempt, and a
/// create disposition; everything else the caller knows is expected to be
/// captured inside it. The out-handle written by the system call propagates
/// to the application verbatim.
#[allow(clippy::too_many_arguments)]
pub fn new_file_handle(
    tag: RequestTag,
    store: &OpenHandleStore,
    native: &Arc<dyn NativeFilesystem>,
    out_handle: &mut Option<Handle>,
    desired_access: AccessMask,
    object_attributes: &ObjectAttributes,
    share_access: u32,
    create_disposition: NtCreateDisposition,
    create_options: u32,
    instruction_source: impl FnOnce(&str, FileAccessMode, CreateDisposition) -> FileOperationInstruction,
    mut invoke_system_call: impl FnMut(&mut Option<Handle>, &ObjectAttributes, NtCreateDisposition) -> NtStatus,
) -> NtStatus {
    tracing::trace!(
        function = tag.function_name,
        request = tag.request_id,
        object_name = %object_attributes.object_name,
        root = ?object_attributes.root_directory,
        access = desired_access.bits(),
        share = share_access,
        disposition = ?create_disposition,
        options = create_options,
        "invoked"
    );

    let context = create_file_operation_context(
        tag,
        store,
        object_attributes.root_directory,
        &object_attributes.object_name,
        file_access_mode_from_access_mask(desired_access),
        create_disposition_from_nt_parameter(create_disposition),
        instruction_source,
    );
    let FileOperationContext { instruction, composed_input_path } = &context;

    if *instruction == FileOperationInstruction::no_redirection_or_interception() {
        let unredirected = unredirected_object_attributes(&context, object_attributes);
        return invoke_system_call(out_handle, &unredirected, create_disposition);
    }

    let pre_operation_result = execute_extra_pre_operations(tag, native, instruction);
    if !pre_operation_result.is_success() {
        return pre_operation_result;
    }

    let redirected_attributes =
        instruction.redirected_file_name().map(ObjectAttributes::from_path);
    let unredirected_attributes = unredirected_object_attributes(&context, object_attributes);
    let unredirected_path = composed_input_path
        .as_deref()
        .unwrap_or(&object_attributes.object_name);

    let mut newly_opened_handle = None;
    let mut system_call_result = NtStatus::OBJECT_PATH_NOT_FOUND;
    let mut last_attempted_path: Option<String> = None;

    'dispositions: for disposition_to_try in
        select_create_dispositions_to_try(instruction, create_disposition)
    {
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

            let absolute_path_to_try = if attributes_to_try.root_directory.is_some() {
                composed_input_path
                    .as_deref()
                    .unwrap_or(attributes_to_try.object_name.as_str())
            } else {
                attributes_to_try.object_name.as_str()
            };

            let should_try_this_file = match disposition_to_try.condition {
                TryCondition::Unconditional => true,
                TryCondition::FileMustExist => {
                    native.exists(strings::without_namespace_prefix(absolute_path_to_try))
                }
                TryCondition::FileMustNotExist => {
                    !native.exists(strings::without_namespace_prefix(absolute_path_to_try))
                }
            };
            if !should_try_this_file {
                continue;
            }

            last_attempted_path = Some(absolute_path_to_try.to_string());
            system_call_result = invoke_system_call(
                &mut newly_opened_handle,
                attributes_to_try,
                disposition_to_try.nt_create_disposition,
            );
            tracing::trace!(
                function = tag.function_name,
                request = tag.request_id,
                status = %system_call_result,
                disposition = ?disposition_to_try.nt_create_disposition,
                object_name = absolute_path_to_try,
                "attempted"
            );

            if !system_call_result.should_try_next_filename() {
                break 'dispositions;
            }
        }
    }

    // Every candidate was gated away: the whole operation reverts to an
    // unmodified pass-through of the original request.
    let Some(last_attempted_path) = last_attempted_path else {
        return invoke_system_call(out_handle, object_attributes, create_disposition);
    };

    if system_call_result.is_success() {
        if let Some(handle) = newly_opened_handle {
            select_filename_and_store_new_handle(
                tag,
                store,
                handle,
                instruction,
                &last_attempted_path,
                unredirected_path,
            );
        }
    }

    *out_handle = newly_opened_handle;
    system_call_result
}

/// Object attributes identifying the unredirected file: the composed full
/// path when a cached root directory was involved, the application's own
/// attributes otherwise.
fn unredirected_object_attributes(
    context: &FileOperationContext,
    object_attributes: &ObjectAttributes,
) -> ObjectAttributes {
    match &context.composed_input_path {
        Some(composed) => ObjectAttributes::from_path(composed.clone()),
        None => object_attributes.clone(),
    }
}
