//! Interception of attempts to close an existing file handle.

use crate::handle_store::OpenHandleStore;
use crate::native::Handle;
use crate::status::NtStatus;

use super::RequestTag;

/// Closes a handle. A handle the engine knows about is removed and closed
/// atomically under the store's lock; any other handle goes straight to the
/// underlying system call.
pub fn close_handle(
    tag: RequestTag,
    store: &OpenHandleStore,
    handle: Handle,
    invoke_system_call: impl FnOnce(Handle) -> NtStatus,
) -> NtStatus {
    if store.get(handle).is_none() {
        return invoke_system_call(handle);
    }

    let (close_status, removed) = store.remove_and_close(handle, invoke_system_call);
    if close_status.is_success() {
        if let Some((associated_path, _)) = removed {
            tracing::debug!(
                function = tag.function_name,
                request = tag.request_id,
                handle = handle.0,
                path = %associated_path,
                "handle closed and erased from storage"
            );
        }
    }
    close_status
}
