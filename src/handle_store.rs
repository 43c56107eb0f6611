//! Storage for open filesystem handles known to the redirection engine.
//!
//! Each stored handle tracks the path the application believes it opened,
//! the path actually submitted to the system, and the state of any
//! in-progress directory enumeration. A single readers-writer lock guards
//! the map; the close path removes the handle and invokes the close
//! primitive under the exclusive lock so a concurrent lookup can never
//! observe a closed handle as cached.

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex, RwLock};

use crate::fileinfo::FileInformationStructLayout;
use crate::native::Handle;
use crate::queues::DirectoryOperationQueue;
use crate::status::NtStatus;
use crate::strings;

/// Case-insensitive set of the filenames an enumeration has already
/// returned, deduplicating entries that surface from several merged sources.
#[derive(Default)]
pub struct EmittedFileNames {
    names: HashSet<String>,
}

impl EmittedFileNames {
    pub fn new() -> Self {
        Self::default()
    }

    /// Records a filename as emitted. Returns `false` if it was already
    /// present.
    pub fn mark(&mut self, file_name: &str) -> bool {
        self.names.insert(strings::fold_case(file_name))
    }

    pub fn contains(&self, file_name: &str) -> bool {
        self.names.contains(&strings::fold_case(file_name))
    }

    pub fn clear(&mut self) {
        self.names.clear();
    }
}

/// State of an in-progress directory enumeration attached to a handle.
pub struct EnumerationState {
    /// Queue implementing the enumeration, or nothing when the enumeration
    /// passes through to the system without interception.
    pub queue: Option<Box<dyn DirectoryOperationQueue>>,
    /// Record layout in force for this enumeration.
    pub layout: FileInformationStructLayout,
    /// Filenames already returned, for deduplication across merged sources.
    pub emitted_file_names: EmittedFileNames,
    /// Cleared after the first advance.
    pub is_first_invocation: bool,
}

impl EnumerationState {
    pub fn new(queue: Option<Box<dyn DirectoryOperationQueue>>, layout: FileInformationStructLayout) -> Self {
        Self { queue, layout, emitted_file_names: EmittedFileNames::new(), is_first_invocation: true }
    }
}

/// Data associated with one stored handle.
struct HandleRecord {
    associated_path: String,
    real_opened_path: String,
    /// Shared with in-flight enumeration advances. The inner mutex asserts
    /// the host precondition that only one thread advances a given handle's
    /// enumeration at a time.
    enumeration: Option<Arc<Mutex<EnumerationState>>>,
}

/// Cloned snapshot of a stored handle's paths and enumeration state.
#[derive(Clone)]
pub struct HandleDataView {
    pub associated_path: String,
    pub real_opened_path: String,
    pub enumeration: Option<Arc<Mutex<EnumerationState>>>,
}

/// Concurrent map from handle to its record.
#[derive(Default)]
pub struct OpenHandleStore {
    handles: RwLock<HashMap<Handle, HandleRecord>>,
}

impl OpenHandleStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.handles.read().expect("handle store lock poisoned").len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Stores a newly-opened handle. Fails without modification if the
    /// handle is already stored.
    pub fn insert(
        &self,
        handle: Handle,
        associated_path: impl Into<String>,
        real_opened_path: impl Into<String>,
    ) -> bool {
        let mut handles = self.handles.write().expect("handle store lock poisoned");
        match handles.entry(handle) {
            std::collections::hash_map::Entry::Occupied(_) => false,
            std::collections::hash_map::Entry::Vacant(slot) => {
                slot.insert(HandleRecord {
                    associated_path: associated_path.into(),
                    real_opened_path: real_opened_path.into(),
                    enumeration: None,
                });
                true
            }
        }
    }

    /// Stores a handle, replacing the paths of an existing record. An
    /// attached enumeration, if any, is retained.
    pub fn insert_or_update(
        &self,
        handle: Handle,
        associated_path: impl Into<String>,
        real_opened_path: impl Into<String>,
    ) {
        let mut handles = self.handles.write().expect("handle store lock poisoned");
        let associated_path = associated_path.into();
        let real_opened_path = real_opened_path.into();
        handles
            .entry(handle)
            .and_modify(|record| {
                record.associated_path = associated_path.clone();
                record.real_opened_path = real_opened_path.clone();
            })
            .or_insert_with(|| HandleRecord {
                associated_path,
                real_opened_path,
                enumeration: None,
            });
    }

    /// Retrieves a snapshot of the data for a stored handle.
    pub fn get(&self, handle: Handle) -> Option<HandleDataView> {
        let handles = self.handles.read().expect("handle store lock poisoned");
        handles.get(&handle).map(|record| HandleDataView {
            associated_path: record.associated_path.clone(),
            real_opened_path: record.real_opened_path.clone(),
            enumeration: record.enumeration.clone(),
        })
    }

    /// Removes a stored handle, returning its paths if it was present.
    pub fn remove(&self, handle: Handle) -> Option<(String, String)> {
        let mut handles = self.handles.write().expect("handle store lock poisoned");
        handles
            .remove(&handle)
            .map(|record| (record.associated_path, record.real_opened_path))
    }

    /// Removes a stored handle and invokes the close primitive while still
    /// holding the exclusive lock, keeping close and lookup atomic with
    /// respect to each other.
    pub fn remove_and_close(
        &self,
        handle: Handle,
        close: impl FnOnce(Handle) -> NtStatus,
    ) -> (NtStatus, Option<(String, String)>) {
        let mut handles = self.handles.write().expect("handle store lock poisoned");
        let removed = handles
            .remove(&handle)
            .map(|record| (record.associated_path, record.real_opened_path));
        let status = close(handle);
        (status, removed)
    }

    /// Attaches directory enumeration state to a stored handle. A handle
    /// that already carries enumeration state keeps it untouched. Returns
    /// `false` if the handle is not stored.
    pub fn attach_enumeration(
        &self,
        handle: Handle,
        queue: Option<Box<dyn DirectoryOperationQueue>>,
        layout: FileInformationStructLayout,
    ) -> bool {
        let mut handles = self.handles.write().expect("handle store lock poisoned");
        let Some(record) = handles.get_mut(&handle) else {
            return false;
        };
        if record.enumeration.is_none() {
            record.enumeration = Some(Arc::new(Mutex::new(EnumerationState::new(queue, layout))));
        }
        true
    }
}
