//! The immutable query object over a compiled rule set.
//!
//! A director holds every filesystem rule and answers two questions: which
//! instruction implements a given file operation, and which instruction
//! implements a given directory enumeration. Directors are produced by the
//! builder and never change afterwards, so readers need no synchronization.

pub mod builder;

#[cfg(test)]
pub(crate) mod tests;

use std::collections::BTreeMap;
use std::sync::Arc;

use crate::instruction::{
    CreateDispositionPreference, DirectoryEnumerationInstruction, DirectoryNameInsertion,
    EnumerationPathSource, FileOperationInstruction, NameAssociation, PreOperations,
    SingleDirectoryEnumeration, TryFiles,
};
use crate::native::NativeFilesystem;
use crate::prefix_index::PrefixIndex;
use crate::rule::{FilesystemRule, RedirectMode};
use crate::strings;

/// Maximum number of rules that can share one origin directory. The higher
/// this bound, the more merge work directory enumerations must perform.
pub const MAX_RULES_PER_ORIGIN_DIRECTORY: usize = 3;

/// What types of file accesses an operation requests. Immutable once
/// constructed.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub struct FileAccessMode {
    read: bool,
    write: bool,
    delete: bool,
}

impl FileAccessMode {
    pub const fn new(read: bool, write: bool, delete: bool) -> Self {
        Self { read, write, delete }
    }

    pub const fn read_only() -> Self {
        Self::new(true, false, false)
    }

    pub const fn write_only() -> Self {
        Self::new(false, true, false)
    }

    pub const fn read_write() -> Self {
        Self::new(true, true, false)
    }

    pub const fn delete() -> Self {
        Self::new(false, false, true)
    }

    pub const fn allows_read(self) -> bool {
        self.read
    }

    pub const fn allows_write(self) -> bool {
        self.write
    }

    pub const fn allows_delete(self) -> bool {
        self.delete
    }
}

/// What a create disposition permits: creating a new file, opening an
/// existing one, or both. Immutable once constructed.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub struct CreateDisposition {
    can_create_new_file: bool,
    can_open_existing_file: bool,
}

impl CreateDisposition {
    pub const fn create_new_file() -> Self {
        Self { can_create_new_file: true, can_open_existing_file: false }
    }

    pub const fn create_new_or_open_existing_file() -> Self {
        Self { can_create_new_file: true, can_open_existing_file: true }
    }

    pub const fn open_existing_file() -> Self {
        Self { can_create_new_file: false, can_open_existing_file: true }
    }

    pub const fn allows_create_new_file(self) -> bool {
        self.can_create_new_file
    }

    pub const fn allows_open_existing_file(self) -> bool {
        self.can_open_existing_file
    }
}

/// Rules sharing one origin directory, bounded by
/// [`MAX_RULES_PER_ORIGIN_DIRECTORY`]. Rules carrying file patterns order
/// ahead of pattern-less rules so specific rules are consulted before
/// catch-alls; within a class, creation order is preserved.
#[derive(Debug, Default, Clone)]
pub struct RelatedRulesContainer {
    rules: Vec<Arc<FilesystemRule>>,
}

impl RelatedRulesContainer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a rule, maintaining ordering. Fails when the container is full.
    pub fn insert(&mut self, rule: Arc<FilesystemRule>) -> bool {
        if self.rules.len() >= MAX_RULES_PER_ORIGIN_DIRECTORY {
            return false;
        }
        let position = if rule.has_file_patterns() {
            self.rules.iter().position(|existing| !existing.has_file_patterns())
        } else {
            None
        };
        match position {
            Some(position) => self.rules.insert(position, rule),
            None => self.rules.push(rule),
        }
        true
    }

    pub fn first(&self) -> Option<&Arc<FilesystemRule>> {
        self.rules.first()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Arc<FilesystemRule>> {
        self.rules.iter()
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }
}

/// Holds multiple filesystem rules and applies them together to implement
/// path redirection.
pub struct FilesystemDirector {
    native: Arc<dyn NativeFilesystem>,
    /// Keyed by case-folded rule name.
    rules_by_name: BTreeMap<String, Arc<FilesystemRule>>,
    origin_index: PrefixIndex<RelatedRulesContainer>,
}

impl std::fmt::Debug for FilesystemDirector {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FilesystemDirector")
            .field("rules_by_name", &self.rules_by_name)
            .field("origin_index", &self.origin_index)
            .finish()
    }
}

impl FilesystemDirector {
    /// Assembles a director from already-validated parts. Intended to be
    /// invoked by the builder and by tests; performs no consistency checks.
    pub fn new(
        native: Arc<dyn NativeFilesystem>,
        rules_by_name: BTreeMap<String, Arc<FilesystemRule>>,
        origin_index: PrefixIndex<RelatedRulesContainer>,
    ) -> Self {
        Self { native, rules_by_name, origin_index }
    }

    /// Director holding no rules: every request passes through.
    pub fn empty(native: Arc<dyn NativeFilesystem>) -> Self {
        Self::new(native, BTreeMap::new(), PrefixIndex::new())
    }

    pub fn count_of_rules(&self) -> usize {
        self.rules_by_name.len()
    }

    /// Looks up a rule by its case-insensitive name.
    pub fn find_rule_by_name(&self, rule_name: &str) -> Option<&Arc<FilesystemRule>> {
        self.rules_by_name.get(&strings::fold_case(rule_name))
    }

    /// Looks up the first rule whose origin directory matches the path
    /// exactly.
    pub fn find_rule_by_origin(&self, origin_directory: &str) -> Option<&Arc<FilesystemRule>> {
        self.origin_index.find(origin_directory).and_then(RelatedRulesContainer::first)
    }

    pub fn rules(&self) -> impl Iterator<Item = &Arc<FilesystemRule>> {
        self.rules_by_name.values()
    }

    /// Determines whether any rule's origin sits at or below the given path.
    /// The input must be absolute, without namespace prefix or trailing
    /// delimiters.
    pub fn is_prefix_for_any_rule(&self, absolute_path_trimmed: &str) -> bool {
        self.origin_index.has_path_for_prefix(absolute_path_trimmed)
    }

    /// Selects the rule governing a path: the deepest origin prefix
    /// containing the path, then the first rule in that origin's container
    /// whose patterns match the component immediately below the origin. For
    /// a path equal to the origin the first rule wins outright.
    pub fn select_rule_for_path(&self, absolute_path: &str) -> Option<&Arc<FilesystemRule>> {
        let trimmed = Self::trim_for_query(absolute_path);
        let container = self.origin_index.longest_matching_prefix(trimmed)?;
        let origin = container.first()?.origin_directory();

        if trimmed.len() == origin.len() {
            return container.first();
        }

        let below_origin = &trimmed[origin.len() + 1..];
        let immediate_child = below_origin
            .split(strings::PATH_DELIMITER)
            .next()
            .expect("split yields at least one element");
        container.iter().find(|rule| rule.file_name_matches_any_pattern(immediate_child))
    }

    /// Generates an instruction for a file operation on the given absolute
    /// path, such as opening, creating, or querying an individual file.
    pub fn instruction_for_file_operation(
        &self,
        absolute_file_path: &str,
        file_access_mode: FileAccessMode,
        create_disposition: CreateDisposition,
    ) -> FileOperationInstruction {
        let namespace_prefix = strings::namespace_prefix(absolute_file_path);
        let unprefixed = &absolute_file_path[namespace_prefix.len()..];
        let trimmed = strings::remove_trailing(unprefixed, strings::PATH_DELIMITER);
        let extra_suffix = if trimmed.len() != unprefixed.len() { "\\" } else { "" };

        // Paths already under a target directory are the real locations;
        // they are used as-is and never re-redirected.
        if self.rules_by_name.values().any(|rule| {
            rule.directory_compare_with_target(trimmed).is_equal_or_below()
        }) {
            return FileOperationInstruction::intercept_without_redirection(
                NameAssociation::None,
                PreOperations::empty(),
                None,
            );
        }

        let Some(rule) = self.select_rule_for_path(trimmed) else {
            if self.is_prefix_for_any_rule(trimmed) {
                // No rule redirects this path, but origins live beneath it,
                // so the handle must stay visible for enumeration to insert
                // their names.
                return FileOperationInstruction::intercept_without_redirection(
                    NameAssociation::WhicheverSucceeded,
                    PreOperations::empty(),
                    None,
                );
            }
            return FileOperationInstruction::no_redirection_or_interception();
        };

        let (directory_part, file_part) =
            if rule.directory_compare_with_origin(trimmed) == crate::rule::DirectoryCompareResult::Equal
            {
                (trimmed, "")
            } else {
                strings::split_directory_and_file(trimmed)
            };

        let Some(redirected) = rule.redirect_path_origin_to_target(
            directory_part,
            file_part,
            namespace_prefix,
            extra_suffix,
        ) else {
            return FileOperationInstruction::intercept_without_redirection(
                NameAssociation::WhicheverSucceeded,
                PreOperations::empty(),
                None,
            );
        };

        let try_files = match rule.redirect_mode() {
            RedirectMode::Simple => TryFiles::RedirectedOnly,
            RedirectMode::Overlay => TryFiles::RedirectedFirst,
        };

        // Opening-or-creating through an overlay must not shadow an existing
        // origin-side file with a freshly created target-side one.
        let create_disposition_preference = if rule.redirect_mode() == RedirectMode::Overlay
            && create_disposition.allows_create_new_file()
            && create_disposition.allows_open_existing_file()
        {
            CreateDispositionPreference::PreferOpenExistingFile
        } else {
            CreateDispositionPreference::NoPreference
        };

        let mut pre_operations = PreOperations::empty();
        let mut pre_operation_operand = None;
        if create_disposition.allows_create_new_file() || file_access_mode.allows_write() {
            let redirected_parent =
                strings::parent_directory(strings::without_namespace_prefix(&redirected));
            if !redirected_parent.is_empty() && !self.native.is_directory(redirected_parent) {
                pre_operations |= PreOperations::ENSURE_PATH_HIERARCHY_EXISTS;
                pre_operation_operand = Some(redirected_parent.to_string());
            }
        }

        FileOperationInstruction::new(
            Some(redirected),
            try_files,
            create_disposition_preference,
            NameAssociation::Unredirected,
            pre_operations,
            pre_operation_operand,
        )
    }

    /// Generates an instruction for enumerating the contents of an open
    /// directory handle, given the path associated with the handle and the
    /// path actually opened.
    pub fn instruction_for_directory_enumeration(
        &self,
        associated_path: &str,
        real_opened_path: &str,
    ) -> DirectoryEnumerationInstruction {
        let associated = Self::trim_for_query(associated_path);
        let real = Self::trim_for_query(real_opened_path);

        let mut directories = Vec::new();
        if let Some(rule) = self.select_rule_for_path(associated) {
            if !strings::eq_ignore_case(associated, real) {
                // The handle was redirected. Contents governed by the rule
                // come from the real opened (target-side) directory; any
                // remaining origin-side contents fill in around them.
                directories.push(SingleDirectoryEnumeration::include_only_matching(
                    EnumerationPathSource::RealOpenedPath,
                    rule.clone(),
                ));
                if self.native.is_directory(associated) {
                    directories.push(SingleDirectoryEnumeration::include_all_except_matching(
                        EnumerationPathSource::AssociatedPath,
                        rule.clone(),
                    ));
                }
            }
        }

        let insertions = self.directory_name_insertions_for(associated);

        match (directories.is_empty(), insertions.is_empty()) {
            (true, true) => DirectoryEnumerationInstruction::pass_through_unmodified_query(),
            (false, true) => DirectoryEnumerationInstruction::enumerate_directories(directories),
            (true, false) => {
                // The directory itself is unredirected; keep its real
                // contents visible alongside the inserted names.
                if self.native.is_directory(real) {
                    DirectoryEnumerationInstruction::enumerate_directories_and_insert_names(
                        vec![SingleDirectoryEnumeration::include_all(
                            EnumerationPathSource::RealOpenedPath,
                        )],
                        insertions,
                    )
                } else {
                    DirectoryEnumerationInstruction::insert_directory_names(insertions)
                }
            }
            (false, false) => DirectoryEnumerationInstruction::enumerate_directories_and_insert_names(
                directories,
                insertions,
            ),
        }
    }

    /// Collects name insertions for rules whose origin directory's immediate
    /// parent is the enumerated directory and whose origin is not backed by
    /// a physical directory. Rules sharing an origin contribute one
    /// insertion.
    fn directory_name_insertions_for(&self, enumerated_directory: &str) -> Vec<DirectoryNameInsertion> {
        let mut seen_origins = Vec::new();
        let mut insertions = Vec::new();
        for rule in self.rules_by_name.values() {
            if !strings::eq_ignore_case(rule.origin_directory_parent(), enumerated_directory) {
                continue;
            }
            if self.native.is_directory(rule.origin_directory()) {
                continue;
            }
            let origin_folded = strings::fold_case(rule.origin_directory());
            if seen_origins.contains(&origin_folded) {
                continue;
            }
            seen_origins.push(origin_folded);
            insertions.push(DirectoryNameInsertion::from_rule(rule));
        }
        insertions
    }

    fn trim_for_query(path: &str) -> &str {
        strings::remove_trailing(
            strings::without_namespace_prefix(path),
            strings::PATH_DELIMITER,
        )
    }
}
