//! Interception of directory enumeration: preparation and advancement.

use std::sync::Arc;

use crate::fileinfo::{self, FileInformationClass, FileInformationStructLayout};
use crate::handle_store::{EnumerationState, OpenHandleStore};
use crate::instruction::DirectoryEnumerationInstruction;
use crate::native::{Handle, HandleIoMode, IoStatusBlock, NativeFilesystem, QueryFlags};
use crate::pool::{CompletionSignal, ThreadPool};
use crate::queues::{
    DirectoryOperationQueue, EnumerationQueue, MergedFileInformationQueue, NameInsertionQueue,
};
use crate::status::NtStatus;
use crate::strings;

use super::RequestTag;

/// Caller-owned output region for a directory enumeration. Asynchronous
/// advances write into it from a worker thread, so the region is identified
/// by raw pointer rather than borrowed.
pub struct EnumerationOutputBuffer {
    data: *mut u8,
    length: usize,
}

// The construction contract guarantees exclusive access until completion,
// making a cross-thread move of the pointer sound.
unsafe impl Send for EnumerationOutputBuffer {}

impl EnumerationOutputBuffer {
    /// Wraps a caller-owned region.
    ///
    /// # Safety
    ///
    /// The memory must remain valid, and must not be read or written by
    /// anyone else, until the enumeration operation completes: immediately
    /// for a synchronous advance, or once the completion signal fires for an
    /// asynchronous one. This is the same contract the native system call
    /// places on application buffers.
    pub unsafe fn from_slice(buffer: &mut [u8]) -> Self {
        Self { data: buffer.as_mut_ptr(), length: buffer.len() }
    }

    pub fn len(&self) -> usize {
        self.length
    }

    pub fn is_empty(&self) -> bool {
        self.length == 0
    }

    fn as_mut_slice(&mut self) -> &mut [u8] {
        // Exclusive access is guaranteed by the construction contract.
        unsafe { std::slice::from_raw_parts_mut(self.data, self.length) }
    }
}

/// Builds the directory operation queue an enumeration instruction calls
/// for, or nothing when the instruction is a pass-through.
fn create_directory_operation_queue(
    native: &Arc<dyn NativeFilesystem>,
    mut instruction: DirectoryEnumerationInstruction,
    layout: FileInformationStructLayout,
    query_file_pattern: &str,
    associated_path: &str,
    real_opened_path: &str,
) -> Option<Box<dyn DirectoryOperationQueue>> {
    if instruction.is_pass_through() {
        return None;
    }

    let associated_trimmed = strings::remove_trailing(
        strings::without_namespace_prefix(associated_path),
        strings::PATH_DELIMITER,
    );
    let real_trimmed = strings::remove_trailing(
        strings::without_namespace_prefix(real_opened_path),
        strings::PATH_DELIMITER,
    );

    let mut queues: Vec<Box<dyn DirectoryOperationQueue>> = Vec::new();
    for single_enumeration in instruction.directories_to_enumerate() {
        let enumeration_path = single_enumeration.select_path(associated_trimmed, real_trimmed);
        queues.push(Box::new(EnumerationQueue::new(
            native.clone(),
            single_enumeration.scope.clone(),
            enumeration_path,
            layout,
            query_file_pattern,
        )));
    }

    if instruction.has_directory_names_to_insert() {
        queues.push(Box::new(NameInsertionQueue::new(
            native.clone(),
            instruction.take_directory_names_to_insert(),
            layout,
            query_file_pattern,
        )));
    }

    match queues.len() {
        0 => None,
        1 => queues.pop(),
        _ => Some(Box::new(MergedFileInformationQueue::new(queues))),
    }
}

/// Prepares a directory enumeration on an open handle: resolves the record
/// layout, validates the buffer length, and attaches the queue the
/// instruction calls for if none is attached yet. Idempotent.
///
/// Returns nothing when the request should pass to the underlying system
/// call unmodified, a failure status to return immediately, or success to
/// indicate the enumeration is ready to be advanced.
pub fn directory_enumeration_prepare(
    tag: RequestTag,
    store: &OpenHandleStore,
    native: &Arc<dyn NativeFilesystem>,
    file_handle: Handle,
    buffer_length: usize,
    information_class: FileInformationClass,
    query_file_pattern: &str,
    instruction_source: impl FnOnce(&str, &str) -> DirectoryEnumerationInstruction,
) -> Option<NtStatus> {
    let layout = FileInformationStructLayout::for_information_class(information_class)?;

    // A buffer that cannot hold even the fixed part of one record is an
    // application error regardless of anything else.
    if buffer_length < layout.base_structure_size() {
        return Some(NtStatus::INFO_LENGTH_MISMATCH);
    }

    let handle_data = store.get(file_handle)?;
    tracing::debug!(
        function = tag.function_name,
        request = tag.request_id,
        handle = file_handle.0,
        pattern = query_file_pattern,
        associated = %handle_data.associated_path,
        opened = %handle_data.real_opened_path,
        "preparing directory enumeration"
    );

    if handle_data.enumeration.is_none() {
        let instruction = instruction_source(
            &handle_data.associated_path,
            &handle_data.real_opened_path,
        );
        let queue = create_directory_operation_queue(
            native,
            instruction,
            layout,
            query_file_pattern,
            &handle_data.associated_path,
            &handle_data.real_opened_path,
        );
        store.attach_enumeration(file_handle, queue, layout);
    }

    // A missing queue, whether just attached or already present, means the
    // enumeration passes through to the system.
    let enumeration = store.get(file_handle)?.enumeration?;
    let intercepted = enumeration
        .lock()
        .expect("enumeration state lock poisoned")
        .queue
        .is_some();
    if intercepted {
        Some(NtStatus::SUCCESS)
    } else {
        None
    }
}

/// Advances an in-progress directory enumeration, either inline for
/// synchronous handles or through the thread pool for asynchronous ones.
/// This function may only be invoked for handles that are stored and carry
/// prepared enumeration state; anything else is an internal error.
#[allow(clippy::too_many_arguments)]
pub fn directory_enumeration_advance(
    tag: RequestTag,
    store: &OpenHandleStore,
    native: &Arc<dyn NativeFilesystem>,
    pool: &ThreadPool,
    file_handle: Handle,
    completion_signal: CompletionSignal,
    io_status: Arc<IoStatusBlock>,
    mut output_buffer: EnumerationOutputBuffer,
    query_flags: QueryFlags,
    query_file_pattern: &str,
) -> NtStatus {
    let Some(enumeration) = store.get(file_handle).and_then(|data| data.enumeration) else {
        tracing::error!(
            function = tag.function_name,
            request = tag.request_id,
            handle = file_handle.0,
            "advancing enumeration on a handle without enumeration state"
        );
        return NtStatus::INTERNAL_ERROR;
    };

    {
        let mut state = enumeration.lock().expect("enumeration state lock poisoned");
        let Some(queue) = state.queue.as_mut() else {
            tracing::error!(
                function = tag.function_name,
                request = tag.request_id,
                handle = file_handle.0,
                "advancing enumeration without an operation queue"
            );
            return NtStatus::INTERNAL_ERROR;
        };

        if query_flags.contains(QueryFlags::RESTART_SCAN) {
            queue.restart(query_file_pattern);
            state.emitted_file_names.clear();
            state.is_first_invocation = true;
        }
    }

    match native.query_handle_io_mode(file_handle) {
        Ok(HandleIoMode::Synchronous) => {
            let mut state = enumeration.lock().expect("enumeration state lock poisoned");
            let advance_status = advance_enumeration(
                &mut state,
                output_buffer.as_mut_slice(),
                &io_status,
                query_flags,
            );
            io_status.set_status(advance_status);
            advance_status
        }
        Ok(HandleIoMode::Asynchronous) => {
            pool.submit(move || {
                let mut state =
                    enumeration.lock().expect("enumeration state lock poisoned");
                let advance_status = advance_enumeration(
                    &mut state,
                    output_buffer.as_mut_slice(),
                    &io_status,
                    query_flags,
                );
                io_status.set_status(advance_status);
                completion_signal.signal(advance_status);
            });
            tracing::trace!(
                function = tag.function_name,
                request = tag.request_id,
                handle = file_handle.0,
                "asynchronous enumeration advance enqueued"
            );
            NtStatus::PENDING
        }
        Err(query_error) => {
            tracing::error!(
                function = tag.function_name,
                request = tag.request_id,
                handle = file_handle.0,
                status = %query_error,
                "failed to determine handle I/O mode"
            );
            NtStatus::INVALID_PARAMETER
        }
    }
}

/// The advance itself: copies as many records as fit, deduplicating
/// filenames already emitted across merged sources.
fn advance_enumeration(
    state: &mut EnumerationState,
    output: &mut [u8],
    io_status: &IoStatusBlock,
    query_flags: QueryFlags,
) -> NtStatus {
    let was_first_invocation = state.is_first_invocation;
    state.is_first_invocation = false;

    let EnumerationState { queue, layout, emitted_file_names, .. } = state;
    let queue = queue.as_mut().expect("queue presence verified by the caller");

    if output.len() < layout.base_structure_size() {
        io_status.set_information(0);
        return NtStatus::INFO_LENGTH_MISMATCH;
    }

    let mut enumeration_status = queue.enumeration_status();
    if !enumeration_status.is_success() {
        // A first advance that finds nothing at all means the query pattern
        // matched no files, which the application expects reported as "no
        // such file" rather than "enumeration exhausted".
        if was_first_invocation && enumeration_status == NtStatus::NO_MORE_FILES {
            enumeration_status = NtStatus::NO_SUCH_FILE;
        }
        io_status.set_information(0);
        return enumeration_status;
    }

    // The buffer cannot hold even one complete record: hand the application
    // the truncated filename prefix and the full required length, leaving
    // the record at the head for a retry with a bigger buffer.
    if output.len() < queue.size_of_front() {
        let bytes_copied = queue.copy_front(output);
        io_status.set_information(bytes_copied as u64);

        let full_name_length =
            fileinfo::encode_file_name(&queue.file_name_of_front()).len();
        layout.clear_next_entry_offset(output);
        layout.write_file_name_length(output, full_name_length);
        return NtStatus::BUFFER_OVERFLOW;
    }

    let max_records_to_write = if query_flags.contains(QueryFlags::RETURN_SINGLE_ENTRY) {
        1
    } else {
        usize::MAX
    };
    let mut records_written = 0;
    let mut bytes_written = 0;
    let mut last_record_offset: Option<usize> = None;

    // From here only full records are written, and at least one record is
    // known to be available.
    while enumeration_status.is_success() && records_written < max_records_to_write {
        let remaining = &mut output[bytes_written..];
        if remaining.len() < queue.size_of_front() {
            break;
        }

        // Fresh or freshly-restarted enumerations have seen no filenames,
        // and otherwise the queue was pre-advanced past duplicates, so
        // copying before advancing is correct.
        let bytes_copied = queue.copy_front(remaining);
        records_written += 1;

        // The next-entry-offset arriving from the system reflects its own
        // batching, not this output buffer; rewrite it and remember the
        // record so the final one can be terminated after the loop.
        layout.update_next_entry_offset(remaining);
        last_record_offset = Some(bytes_written);
        bytes_written += bytes_copied;

        emitted_file_names.mark(&queue.file_name_of_front());
        queue.pop_front();

        // Status must be checked before touching the front: an empty queue
        // has no front filename to inspect.
        while queue.enumeration_status() == NtStatus::MORE_ENTRIES
            && emitted_file_names.contains(&queue.file_name_of_front())
        {
            queue.pop_front();
        }

        enumeration_status = queue.enumeration_status();
    }

    if let Some(last_record_offset) = last_record_offset {
        layout.clear_next_entry_offset(&mut output[last_record_offset..]);
    }

    // At least one record was available coming in, so even a zero-byte copy
    // counts as success as far as the application is concerned.
    let final_status = match enumeration_status {
        NtStatus::MORE_ENTRIES | NtStatus::NO_MORE_FILES => NtStatus::SUCCESS,
        other => other,
    };

    io_status.set_information(bytes_written as u64);
    final_status
}
