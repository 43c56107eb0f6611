//! In-memory filesystem used by tests in place of the real native surface.
//!
//! Holds a Windows-shaped tree of directories and files, hands out
//! enumeration handles over sorted directory listings, and records the
//! side effects test cases need to assert on (hierarchy creations, closed
//! handles).

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::sync::Mutex;

use byteorder::{ByteOrder, LittleEndian};

use crate::fileinfo::{self, FileInformationClass, FileInformationStructLayout};
use crate::native::{Handle, HandleIoMode, NativeFilesystem};
use crate::status::NtStatus;
use crate::strings;

/// Marker written into the file-index field of generated records so tests
/// can recognize records whose fixed part came from this mock.
pub const RECORD_SOURCE_MARKER: u32 = 0x1234_ABCD;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum NodeKind {
    Directory,
    File,
}

struct OpenDirectory {
    directory_path: String,
    cursor: usize,
}

#[derive(Default)]
struct State {
    /// Folded full path of every node.
    nodes: BTreeMap<String, NodeKind>,
    /// Folded directory path to child names in original case.
    children: BTreeMap<String, BTreeSet<String>>,
    open_directories: HashMap<Handle, OpenDirectory>,
    io_modes: HashMap<Handle, HandleIoMode>,
    absolute_paths: HashMap<Handle, String>,
    created_hierarchies: Vec<String>,
    closed_handles: Vec<Handle>,
    hierarchy_creation_failure: Option<NtStatus>,
    next_handle: u64,
}

/// Test double for [`NativeFilesystem`].
pub struct MockFilesystem {
    state: Mutex<State>,
}

impl Default for MockFilesystem {
    fn default() -> Self {
        Self::new()
    }
}

impl MockFilesystem {
    pub fn new() -> Self {
        Self { state: Mutex::new(State { next_handle: 0x1000, ..State::default() }) }
    }

    /// Adds a directory, creating missing ancestors.
    pub fn add_directory(&self, absolute_path: &str) {
        let mut state = self.state.lock().unwrap();
        Self::add_directory_internal(&mut state, absolute_path);
    }

    /// Adds a file, creating missing ancestor directories.
    pub fn add_file(&self, absolute_path: &str) {
        let mut state = self.state.lock().unwrap();
        let (directory, file_name) = strings::split_directory_and_file(absolute_path);
        Self::add_directory_internal(&mut state, directory);
        state.nodes.insert(strings::fold_case(absolute_path), NodeKind::File);
        state
            .children
            .entry(strings::fold_case(directory))
            .or_default()
            .insert(file_name.to_string());
    }

    fn add_directory_internal(state: &mut State, absolute_path: &str) {
        let mut assembled = String::new();
        for component in strings::path_components(absolute_path) {
            let parent_folded = strings::fold_case(&assembled);
            if !assembled.is_empty() {
                state.children.entry(parent_folded).or_default().insert(component.to_string());
                assembled.push(strings::PATH_DELIMITER);
            }
            assembled.push_str(component);
            let folded = strings::fold_case(&assembled);
            state.nodes.entry(folded.clone()).or_insert(NodeKind::Directory);
            state.children.entry(folded).or_default();
        }
    }

    /// Makes every subsequent hierarchy creation fail with the given status.
    pub fn fail_hierarchy_creation(&self, status: NtStatus) {
        self.state.lock().unwrap().hierarchy_creation_failure = Some(status);
    }

    /// Declares the I/O mode reported for a handle.
    pub fn set_io_mode(&self, handle: Handle, io_mode: HandleIoMode) {
        self.state.lock().unwrap().io_modes.insert(handle, io_mode);
    }

    /// Declares the absolute path reported for a handle.
    pub fn set_absolute_path(&self, handle: Handle, absolute_path: &str) {
        self.state.lock().unwrap().absolute_paths.insert(handle, absolute_path.to_string());
    }

    /// Paths for which a hierarchy creation was requested, in order.
    pub fn created_hierarchies(&self) -> Vec<String> {
        self.state.lock().unwrap().created_hierarchies.clone()
    }

    /// Handles closed through this mock, in order.
    pub fn closed_handles(&self) -> Vec<Handle> {
        self.state.lock().unwrap().closed_handles.clone()
    }

    fn sorted_children(state: &State, directory_folded: &str, pattern: &str) -> Vec<String> {
        let folded_pattern = strings::fold_case(pattern);
        let mut names: Vec<String> = state
            .children
            .get(directory_folded)
            .map(|children| {
                children
                    .iter()
                    .filter(|name| strings::file_name_matches_pattern(name, &folded_pattern))
                    .cloned()
                    .collect()
            })
            .unwrap_or_default();
        names.sort_by_key(|name| strings::fold_case(name));
        names
    }

    fn write_record(
        layout: FileInformationStructLayout,
        buffer: &mut [u8],
        file_name: &str,
    ) -> usize {
        let record_size =
            layout.size_for_file_name_length(fileinfo::encode_file_name(file_name).len());
        let record = &mut buffer[..record_size];
        record.fill(0);
        if record.len() >= 8 {
            LittleEndian::write_u32(&mut record[4..], RECORD_SOURCE_MARKER);
        }
        layout.write_file_name(record, file_name);
        record_size
    }
}

impl NativeFilesystem for MockFilesystem {
    fn exists(&self, absolute_path: &str) -> bool {
        let state = self.state.lock().unwrap();
        state.nodes.contains_key(&strings::fold_case(absolute_path))
    }

    fn is_directory(&self, absolute_path: &str) -> bool {
        let state = self.state.lock().unwrap();
        state.nodes.get(&strings::fold_case(absolute_path)) == Some(&NodeKind::Directory)
    }

    fn create_directory_hierarchy(&self, absolute_path: &str) -> NtStatus {
        let mut state = self.state.lock().unwrap();
        if let Some(failure) = state.hierarchy_creation_failure {
            return failure;
        }
        Self::add_directory_internal(&mut state, absolute_path);
        state.created_hierarchies.push(absolute_path.to_string());
        NtStatus::SUCCESS
    }

    fn delete(&self, absolute_path: &str) -> NtStatus {
        let mut state = self.state.lock().unwrap();
        let folded = strings::fold_case(absolute_path);
        if state.nodes.remove(&folded).is_none() {
            return NtStatus::OBJECT_NAME_NOT_FOUND;
        }
        state.children.remove(&folded);
        let (directory, file_name) = strings::split_directory_and_file(absolute_path);
        if let Some(siblings) = state.children.get_mut(&strings::fold_case(directory)) {
            siblings.retain(|name| !strings::eq_ignore_case(name, file_name));
        }
        NtStatus::SUCCESS
    }

    fn open_directory_for_enumeration(&self, absolute_path: &str) -> Result<Handle, NtStatus> {
        let mut state = self.state.lock().unwrap();
        let folded = strings::fold_case(absolute_path);
        match state.nodes.get(&folded) {
            Some(NodeKind::Directory) => {
                let handle = Handle(state.next_handle);
                state.next_handle += 1;
                state
                    .open_directories
                    .insert(handle, OpenDirectory { directory_path: folded, cursor: 0 });
                Ok(handle)
            }
            Some(NodeKind::File) => Err(NtStatus::OBJECT_NAME_INVALID),
            None => {
                let parent = strings::parent_directory(absolute_path);
                if state.nodes.contains_key(&strings::fold_case(parent)) {
                    Err(NtStatus::OBJECT_NAME_NOT_FOUND)
                } else {
                    Err(NtStatus::OBJECT_PATH_NOT_FOUND)
                }
            }
        }
    }

    fn partial_enumerate_directory(
        &self,
        directory_handle: Handle,
        information_class: FileInformationClass,
        buffer: &mut [u8],
        query_pattern: &str,
        restart: bool,
    ) -> NtStatus {
        let Some(layout) = FileInformationStructLayout::for_information_class(information_class)
        else {
            return NtStatus::INVALID_PARAMETER;
        };

        let mut state = self.state.lock().unwrap();
        let Some(open_directory) = state.open_directories.get(&directory_handle) else {
            return NtStatus::INVALID_PARAMETER;
        };
        let directory_path = open_directory.directory_path.clone();
        let mut cursor = if restart { 0 } else { open_directory.cursor };

        let names = Self::sorted_children(&state, &directory_path, query_pattern);
        if cursor >= names.len() {
            state.open_directories.get_mut(&directory_handle).unwrap().cursor = cursor;
            return NtStatus::NO_MORE_FILES;
        }

        let mut write_offset = 0;
        let mut previous_record_offset: Option<usize> = None;
        while cursor < names.len() {
            let name = &names[cursor];
            let record_size =
                layout.size_for_file_name_length(fileinfo::encode_file_name(name).len());
            if write_offset + record_size > buffer.len() {
                break;
            }

            Self::write_record(layout, &mut buffer[write_offset..], name);
            if let Some(previous) = previous_record_offset {
                layout.write_next_entry_offset(&mut buffer[previous..], write_offset - previous);
            }
            previous_record_offset = Some(write_offset);
            write_offset += record_size;
            cursor += 1;
        }

        if previous_record_offset.is_none() {
            return NtStatus::BUFFER_OVERFLOW;
        }

        state.open_directories.get_mut(&directory_handle).unwrap().cursor = cursor;
        NtStatus::SUCCESS
    }

    fn query_single_file_directory_information(
        &self,
        containing_directory: &str,
        file_name: &str,
        information_class: FileInformationClass,
        buffer: &mut [u8],
    ) -> NtStatus {
        let Some(layout) = FileInformationStructLayout::for_information_class(information_class)
        else {
            return NtStatus::INVALID_PARAMETER;
        };

        let state = self.state.lock().unwrap();
        let contains = state
            .children
            .get(&strings::fold_case(containing_directory))
            .is_some_and(|children| {
                children.iter().any(|child| strings::eq_ignore_case(child, file_name))
            });
        if !contains {
            return NtStatus::OBJECT_NAME_NOT_FOUND;
        }

        let record_size =
            layout.size_for_file_name_length(fileinfo::encode_file_name(file_name).len());
        if buffer.len() < record_size {
            return NtStatus::BUFFER_OVERFLOW;
        }
        Self::write_record(layout, buffer, file_name);
        NtStatus::SUCCESS
    }

    fn query_absolute_path_by_handle(&self, handle: Handle) -> Result<String, NtStatus> {
        let state = self.state.lock().unwrap();
        state.absolute_paths.get(&handle).cloned().ok_or(NtStatus::INVALID_PARAMETER)
    }

    fn query_handle_io_mode(&self, handle: Handle) -> Result<HandleIoMode, NtStatus> {
        let state = self.state.lock().unwrap();
        Ok(state.io_modes.get(&handle).copied().unwrap_or(HandleIoMode::Synchronous))
    }

    fn close_handle(&self, handle: Handle) -> NtStatus {
        let mut state = self.state.lock().unwrap();
        state.open_directories.remove(&handle);
        state.closed_handles.push(handle);
        NtStatus::SUCCESS
    }
}
