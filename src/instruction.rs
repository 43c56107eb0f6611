//! Instructions produced by the director and consumed by the executor.
//!
//! An instruction is an immutable plan for satisfying one application
//! request: which filenames to try and in what order, what to associate with
//! a resulting handle, which preparatory side effects must run first, and how
//! to shape a directory enumeration. Instructions are plain records with
//! structural equality so the executor's fast-path check is a comparison
//! against the distinguished no-op value.

use std::sync::Arc;

use bitflags::bitflags;

use crate::rule::FilesystemRule;

bitflags! {
    /// Auxiliary actions that must complete before the main system call is
    /// attempted.
    #[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
    pub struct PreOperations: u8 {
        /// Ensure the directory chain named by the operand exists.
        const ENSURE_PATH_HIERARCHY_EXISTS = 0x01;
    }
}

impl Default for PreOperations {
    fn default() -> Self {
        PreOperations::empty()
    }
}

/// Which filenames the executor should submit to the system, in order.
#[derive(Debug, Default, Copy, Clone, PartialEq, Eq, Hash)]
pub enum TryFiles {
    #[default]
    UnredirectedOnly,
    UnredirectedFirst,
    RedirectedFirst,
    RedirectedOnly,
}

/// Preference for expanding an application's create disposition into one or
/// more concrete attempts.
#[derive(Debug, Default, Copy, Clone, PartialEq, Eq, Hash)]
pub enum CreateDispositionPreference {
    #[default]
    NoPreference,
    PreferCreateNewFile,
    PreferOpenExistingFile,
}

/// Which path to associate with a handle once an attempt succeeds.
#[derive(Debug, Default, Copy, Clone, PartialEq, Eq, Hash)]
pub enum NameAssociation {
    /// Do not store the handle at all.
    #[default]
    None,
    /// Associate whichever candidate path succeeded.
    WhicheverSucceeded,
    /// Associate the path the application supplied.
    Unredirected,
    /// Associate the instruction's redirected path.
    Redirected,
}

/// Plan for a single file operation.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct FileOperationInstruction {
    redirected_file_name: Option<String>,
    try_files: TryFiles,
    create_disposition_preference: CreateDispositionPreference,
    name_association: NameAssociation,
    pre_operations: PreOperations,
    pre_operation_operand: Option<String>,
}

impl FileOperationInstruction {
    pub fn new(
        redirected_file_name: Option<String>,
        try_files: TryFiles,
        create_disposition_preference: CreateDispositionPreference,
        name_association: NameAssociation,
        pre_operations: PreOperations,
        pre_operation_operand: Option<String>,
    ) -> Self {
        Self {
            redirected_file_name,
            try_files,
            create_disposition_preference,
            name_association,
            pre_operations,
            pre_operation_operand,
        }
    }

    /// The distinguished no-op plan: pass the request through untouched.
    pub fn no_redirection_or_interception() -> Self {
        Self::default()
    }

    /// Plan that submits only the unredirected path but still associates it
    /// with the resulting handle, keeping the handle visible to the engine.
    pub fn intercept_without_redirection(
        name_association: NameAssociation,
        pre_operations: PreOperations,
        pre_operation_operand: Option<String>,
    ) -> Self {
        Self {
            redirected_file_name: None,
            try_files: TryFiles::UnredirectedOnly,
            create_disposition_preference: CreateDispositionPreference::NoPreference,
            name_association,
            pre_operations,
            pre_operation_operand,
        }
    }

    pub fn redirected_file_name(&self) -> Option<&str> {
        self.redirected_file_name.as_deref()
    }

    pub fn has_redirected_file_name(&self) -> bool {
        self.redirected_file_name.is_some()
    }

    pub fn try_files(&self) -> TryFiles {
        self.try_files
    }

    pub fn create_disposition_preference(&self) -> CreateDispositionPreference {
        self.create_disposition_preference
    }

    pub fn name_association(&self) -> NameAssociation {
        self.name_association
    }

    pub fn pre_operations(&self) -> PreOperations {
        self.pre_operations
    }

    pub fn pre_operation_operand(&self) -> Option<&str> {
        self.pre_operation_operand.as_deref()
    }
}

/// Where a directory enumeration sub-queue takes its path from.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum EnumerationPathSource {
    /// The path associated internally with the open handle.
    AssociatedPath,
    /// The path actually submitted to the system when the handle was opened.
    RealOpenedPath,
}

/// Filter a sub-queue applies to filenames beyond the application's query
/// pattern.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DirectoryFilterScope {
    IncludeAll,
    /// Include only names matching the rule's file patterns.
    IncludeOnlyMatching(Arc<FilesystemRule>),
    /// Include every name except those matching the rule's file patterns.
    IncludeAllExceptMatching(Arc<FilesystemRule>),
}

impl DirectoryFilterScope {
    /// Applies the scope filter to one filename.
    pub fn includes(&self, file_name: &str) -> bool {
        match self {
            DirectoryFilterScope::IncludeAll => true,
            DirectoryFilterScope::IncludeOnlyMatching(rule) => {
                rule.file_name_matches_any_pattern(file_name)
            }
            DirectoryFilterScope::IncludeAllExceptMatching(rule) => {
                !rule.file_name_matches_any_pattern(file_name)
            }
        }
    }
}

/// One directory to enumerate as part of a directory enumeration plan.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SingleDirectoryEnumeration {
    pub path_source: EnumerationPathSource,
    pub scope: DirectoryFilterScope,
}

impl SingleDirectoryEnumeration {
    pub fn include_all(path_source: EnumerationPathSource) -> Self {
        Self { path_source, scope: DirectoryFilterScope::IncludeAll }
    }

    pub fn include_only_matching(
        path_source: EnumerationPathSource,
        rule: Arc<FilesystemRule>,
    ) -> Self {
        Self { path_source, scope: DirectoryFilterScope::IncludeOnlyMatching(rule) }
    }

    pub fn include_all_except_matching(
        path_source: EnumerationPathSource,
        rule: Arc<FilesystemRule>,
    ) -> Self {
        Self { path_source, scope: DirectoryFilterScope::IncludeAllExceptMatching(rule) }
    }

    /// Selects the concrete directory path for this sub-queue.
    pub fn select_path<'p>(&self, associated_path: &'p str, real_opened_path: &'p str) -> &'p str {
        match self.path_source {
            EnumerationPathSource::AssociatedPath => associated_path,
            EnumerationPathSource::RealOpenedPath => real_opened_path,
        }
    }
}

/// One synthetic directory name to insert into an enumeration, with the
/// location whose real information record stands in for the inserted name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DirectoryNameInsertion {
    pub file_name_to_insert: String,
    pub information_source_directory: String,
    pub information_source_name: String,
}

impl DirectoryNameInsertion {
    /// Insertion presenting a rule's origin directory name, with record data
    /// sourced from the rule's target directory.
    pub fn from_rule(rule: &FilesystemRule) -> Self {
        let (source_directory, source_name) =
            crate::strings::split_directory_and_file(rule.target_directory());
        Self {
            file_name_to_insert: rule.origin_directory_name().to_string(),
            information_source_directory: source_directory.to_string(),
            information_source_name: source_name.to_string(),
        }
    }
}

/// Plan for a directory enumeration: pass through, enumerate one or more
/// real directories, insert synthetic names, or both.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct DirectoryEnumerationInstruction {
    directories_to_enumerate: Option<Vec<SingleDirectoryEnumeration>>,
    directory_names_to_insert: Option<Vec<DirectoryNameInsertion>>,
}

impl DirectoryEnumerationInstruction {
    /// The enumeration should be forwarded to the system untouched.
    pub fn pass_through_unmodified_query() -> Self {
        Self::default()
    }

    pub fn enumerate_directories(directories: Vec<SingleDirectoryEnumeration>) -> Self {
        Self { directories_to_enumerate: Some(directories), directory_names_to_insert: None }
    }

    pub fn insert_directory_names(insertions: Vec<DirectoryNameInsertion>) -> Self {
        Self { directories_to_enumerate: None, directory_names_to_insert: Some(insertions) }
    }

    pub fn enumerate_directories_and_insert_names(
        directories: Vec<SingleDirectoryEnumeration>,
        insertions: Vec<DirectoryNameInsertion>,
    ) -> Self {
        Self {
            directories_to_enumerate: Some(directories),
            directory_names_to_insert: Some(insertions),
        }
    }

    pub fn is_pass_through(&self) -> bool {
        *self == Self::pass_through_unmodified_query()
    }

    pub fn directories_to_enumerate(&self) -> &[SingleDirectoryEnumeration] {
        self.directories_to_enumerate.as_deref().unwrap_or(&[])
    }

    pub fn has_directory_names_to_insert(&self) -> bool {
        self.directory_names_to_insert.is_some()
    }

    /// Extracts the insertions, leaving the instruction without any.
    pub fn take_directory_names_to_insert(&mut self) -> Vec<DirectoryNameInsertion> {
        self.directory_names_to_insert.take().unwrap_or_default()
    }
}
