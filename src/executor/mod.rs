//! Execution of filesystem operations under control of instructions.
//!
//! Each entry point mediates one intercepted system call: it consults an
//! instruction source to learn how the request should be satisfied, runs any
//! required pre-operations, drives the underlying system call through the
//! candidate filenames in instruction order, and keeps the open-handle store
//! consistent with the outcome. The instruction source and the underlying
//! system call are both function objects so that tests can script them.

mod close_handle;
mod enumeration;
mod new_handle;
mod query;
mod rename;

#[cfg(test)]
mod tests;

pub use close_handle::close_handle;
pub use enumeration::{
    directory_enumeration_advance, directory_enumeration_prepare, EnumerationOutputBuffer,
};
pub use new_handle::new_file_handle;
pub use query::{query_by_handle, query_by_object_attributes};
pub use rename::rename_by_handle;

use std::sync::Arc;

use crate::director::{CreateDisposition, FileAccessMode};
use crate::handle_store::OpenHandleStore;
use crate::instruction::{
    FileOperationInstruction, NameAssociation, PreOperations, TryFiles,
};
use crate::native::{AccessMask, Handle, NativeFilesystem, NtCreateDisposition};
use crate::status::NtStatus;
use crate::strings;

/// Identifies the intercepted call for logging: the name of the hooked
/// function and a request identifier correlating all messages of one
/// invocation.
#[derive(Debug, Copy, Clone)]
pub struct RequestTag<'name> {
    pub function_name: &'name str,
    pub request_id: u64,
}

impl<'name> RequestTag<'name> {
    pub fn new(function_name: &'name str, request_id: u64) -> Self {
        Self { function_name, request_id }
    }
}

/// Converts a native access mask into the internal file access mode: any
/// read-implying right, any write-implying right, any delete right.
pub(crate) fn file_access_mode_from_access_mask(desired_access: AccessMask) -> FileAccessMode {
    FileAccessMode::new(
        desired_access.intersects(AccessMask::read_rights()),
        desired_access.intersects(AccessMask::write_rights()),
        desired_access.intersects(AccessMask::delete_rights()),
    )
}

/// Converts a native create disposition into the internal tri-state.
pub(crate) fn create_disposition_from_nt_parameter(
    nt_create_disposition: NtCreateDisposition,
) -> CreateDisposition {
    match nt_create_disposition {
        NtCreateDisposition::Create => CreateDisposition::create_new_file(),
        NtCreateDisposition::Supersede
        | NtCreateDisposition::OpenIf
        | NtCreateDisposition::OverwriteIf => CreateDisposition::create_new_or_open_existing_file(),
        NtCreateDisposition::Open | NtCreateDisposition::Overwrite => {
            CreateDisposition::open_existing_file()
        }
    }
}

/// Condition gating one create-disposition attempt.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub(crate) enum TryCondition {
    Unconditional,
    FileMustExist,
    FileMustNotExist,
}

/// One create disposition to attempt, with its gating condition.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub(crate) struct CreateDispositionToTry {
    pub condition: TryCondition,
    pub nt_create_disposition: NtCreateDisposition,
}

impl CreateDispositionToTry {
    fn unconditional(nt_create_disposition: NtCreateDisposition) -> Self {
        Self { condition: TryCondition::Unconditional, nt_create_disposition }
    }
}

/// Expands the application's create disposition into the ordered list of
/// concrete dispositions to attempt, honoring the instruction's preference.
pub(crate) fn select_create_dispositions_to_try(
    instruction: &FileOperationInstruction,
    nt_create_disposition: NtCreateDisposition,
) -> Vec<CreateDispositionToTry> {
    use crate::instruction::CreateDispositionPreference as Preference;
    use NtCreateDisposition as Nt;

    match instruction.create_disposition_preference() {
        Preference::NoPreference => vec![CreateDispositionToTry::unconditional(nt_create_disposition)],
        Preference::PreferCreateNewFile => match nt_create_disposition {
            Nt::OpenIf => vec![
                CreateDispositionToTry::unconditional(Nt::Create),
                CreateDispositionToTry::unconditional(Nt::Open),
            ],
            Nt::OverwriteIf => vec![
                CreateDispositionToTry::unconditional(Nt::Create),
                CreateDispositionToTry::unconditional(Nt::Overwrite),
            ],
            Nt::Supersede => vec![
                CreateDispositionToTry::unconditional(Nt::Create),
                CreateDispositionToTry::unconditional(Nt::Supersede),
            ],
            other => vec![CreateDispositionToTry::unconditional(other)],
        },
        Preference::PreferOpenExistingFile => match nt_create_disposition {
            Nt::OpenIf => vec![
                CreateDispositionToTry::unconditional(Nt::Open),
                CreateDispositionToTry::unconditional(Nt::Create),
            ],
            Nt::OverwriteIf => vec![
                CreateDispositionToTry::unconditional(Nt::Overwrite),
                CreateDispositionToTry::unconditional(Nt::Create),
            ],
            // Two supersede entries, one gated and one not: for each create
            // disposition every file is tried in sequence, so this ordering
            // supersedes whichever file already exists before letting
            // non-existent files be opened for supersede.
            Nt::Supersede => vec![
                CreateDispositionToTry {
                    condition: TryCondition::FileMustExist,
                    nt_create_disposition: Nt::Supersede,
                },
                CreateDispositionToTry::unconditional(Nt::Supersede),
            ],
            other => vec![CreateDispositionToTry::unconditional(other)],
        },
    }
}

/// Which of the two candidate paths one attempt uses.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub(crate) enum PathCandidate {
    Unredirected,
    Redirected,
}

/// Orders the candidate paths per the instruction. Fails with an internal
/// error if the order requires a redirected path the instruction lacks.
pub(crate) fn select_path_candidates_to_try(
    tag: RequestTag,
    instruction: &FileOperationInstruction,
) -> Result<Vec<PathCandidate>, NtStatus> {
    let candidates = match instruction.try_files() {
        TryFiles::UnredirectedOnly => vec![PathCandidate::Unredirected],
        TryFiles::UnredirectedFirst => vec![PathCandidate::Unredirected, PathCandidate::Redirected],
        TryFiles::RedirectedFirst => vec![PathCandidate::Redirected, PathCandidate::Unredirected],
        TryFiles::RedirectedOnly => vec![PathCandidate::Redirected],
    };

    if candidates.contains(&PathCandidate::Redirected) && !instruction.has_redirected_file_name() {
        tracing::error!(
            function = tag.function_name,
            request = tag.request_id,
            "instruction requires a redirected filename but provides none"
        );
        return Err(NtStatus::INTERNAL_ERROR);
    }

    Ok(candidates)
}

/// Runs the pre-operations an instruction carries, stopping at the first
/// failure.
pub(crate) fn execute_extra_pre_operations(
    tag: RequestTag,
    native: &Arc<dyn NativeFilesystem>,
    instruction: &FileOperationInstruction,
) -> NtStatus {
    let mut result = NtStatus::SUCCESS;

    if instruction.pre_operations().contains(PreOperations::ENSURE_PATH_HIERARCHY_EXISTS)
        && result.is_success()
    {
        let operand = instruction.pre_operation_operand().unwrap_or_default();
        tracing::debug!(
            function = tag.function_name,
            request = tag.request_id,
            operand,
            "ensuring directory hierarchy exists"
        );
        result = native.create_directory_hierarchy(strings::without_namespace_prefix(operand));
    }

    if !result.is_success() {
        tracing::error!(
            function = tag.function_name,
            request = tag.request_id,
            status = %result,
            "a required pre-operation failed"
        );
    }

    result
}

/// Context assembled for one file operation: the instruction plus any input
/// path composed from a cached root-directory handle.
pub(crate) struct FileOperationContext {
    pub instruction: FileOperationInstruction,
    pub composed_input_path: Option<String>,
}

/// Determines how to redirect an individual file operation whose input is a
/// filename plus an optional root-directory handle.
pub(crate) fn create_file_operation_context(
    tag: RequestTag,
    store: &OpenHandleStore,
    root_directory: Option<Handle>,
    input_filename: &str,
    file_access_mode: FileAccessMode,
    create_disposition: CreateDisposition,
    instruction_source: impl FnOnce(&str, FileAccessMode, CreateDisposition) -> FileOperationInstruction,
) -> FileOperationContext {
    let cached_root = root_directory.and_then(|root| store.get(root));

    match (root_directory, cached_root) {
        (Some(_), Some(root_data)) => {
            // A cached root directory handle: the full filename has to be
            // assembled before redirection can be queried.
            let composed =
                format!("{}\\{input_filename}", root_data.associated_path);
            let instruction = instruction_source(&composed, file_access_mode, create_disposition);
            tracing::debug!(
                function = tag.function_name,
                request = tag.request_id,
                root = %root_data.associated_path,
                relative = input_filename,
                redirected = instruction.redirected_file_name().unwrap_or(""),
                "composed path from root directory handle"
            );
            FileOperationContext { instruction, composed_input_path: Some(composed) }
        }
        (None, _) => {
            let instruction =
                instruction_source(input_filename, file_access_mode, create_disposition);
            if let Some(redirected) = instruction.redirected_file_name() {
                tracing::debug!(
                    function = tag.function_name,
                    request = tag.request_id,
                    path = input_filename,
                    redirected,
                    "path redirected"
                );
            } else {
                tracing::trace!(
                    function = tag.function_name,
                    request = tag.request_id,
                    path = input_filename,
                    "path not redirected"
                );
            }
            FileOperationContext { instruction, composed_input_path: None }
        }
        (Some(root), None) => {
            // An uncached root was, by construction, uninteresting when it
            // was opened, so relative paths beneath it cannot match a rule.
            tracing::trace!(
                function = tag.function_name,
                request = tag.request_id,
                root = root.0,
                relative = input_filename,
                "uncached root directory, no redirection attempted"
            );
            FileOperationContext {
                instruction: FileOperationInstruction::no_redirection_or_interception(),
                composed_input_path: None,
            }
        }
    }
}

/// Stores a newly-opened handle with the path the instruction's association
/// policy selects. Trailing delimiters are trimmed from both paths.
pub(crate) fn select_filename_and_store_new_handle(
    tag: RequestTag,
    store: &OpenHandleStore,
    newly_opened_handle: Handle,
    instruction: &FileOperationInstruction,
    successful_path: &str,
    unredirected_path: &str,
) {
    let selected_path = match instruction.name_association() {
        NameAssociation::None => return,
        NameAssociation::WhicheverSucceeded => successful_path,
        NameAssociation::Unredirected => unredirected_path,
        NameAssociation::Redirected => instruction.redirected_file_name().unwrap_or_default(),
    };
    if selected_path.is_empty() {
        return;
    }

    let successful_path = strings::remove_trailing(successful_path, strings::PATH_DELIMITER);
    let selected_path = strings::remove_trailing(selected_path, strings::PATH_DELIMITER);
    if store.insert(newly_opened_handle, selected_path, successful_path) {
        tracing::debug!(
            function = tag.function_name,
            request = tag.request_id,
            handle = newly_opened_handle.0,
            opened = successful_path,
            associated = selected_path,
            "handle stored"
        );
    } else {
        tracing::error!(
            function = tag.function_name,
            request = tag.request_id,
            handle = newly_opened_handle.0,
            "handle is unexpectedly already stored"
        );
    }
}

/// Updates or erases a possibly-stored handle per the association policy,
/// after an operation that changed the path behind it.
pub(crate) fn select_filename_and_update_handle(
    tag: RequestTag,
    store: &OpenHandleStore,
    handle: Handle,
    instruction: &FileOperationInstruction,
    successful_path: &str,
    unredirected_path: &str,
) {
    let selected_path = match instruction.name_association() {
        NameAssociation::None => {
            if let Some((associated, _)) = store.remove(handle) {
                tracing::debug!(
                    function = tag.function_name,
                    request = tag.request_id,
                    handle = handle.0,
                    associated = %associated,
                    "handle erased from storage"
                );
            }
            return;
        }
        NameAssociation::WhicheverSucceeded => successful_path,
        NameAssociation::Unredirected => unredirected_path,
        NameAssociation::Redirected => instruction.redirected_file_name().unwrap_or_default(),
    };
    if selected_path.is_empty() {
        return;
    }

    let successful_path = strings::remove_trailing(successful_path, strings::PATH_DELIMITER);
    let selected_path = strings::remove_trailing(selected_path, strings::PATH_DELIMITER);
    store.insert_or_update(handle, selected_path, successful_path);
    tracing::debug!(
        function = tag.function_name,
        request = tag.request_id,
        handle = handle.0,
        opened = successful_path,
        associated = selected_path,
        "handle updated in storage"
    );
}
