//! Piece-wise construction and validation of filesystem director objects.
//!
//! The builder ingests a configuration section map, resolves embedded
//! references, re-absolutizes relative components, validates per-rule and
//! cross-rule constraints, auto-generates parent rules where a rule's origin
//! would otherwise dangle, and finally emits an immutable director.
//! Compilation either succeeds completely or yields the full list of errors;
//! a director is never partially populated.

use std::collections::{BTreeMap, HashSet};
use std::sync::Arc;

use crate::config::{ConfigurationData, FilesystemRuleSection};
use crate::globals::TemporaryPathRegistry;
use crate::native::NativeFilesystem;
use crate::prefix_index::PrefixIndex;
use crate::resolver::{self, Resolver};
use crate::rule::{FilesystemRule, RedirectMode};
use crate::strings;

use super::{FilesystemDirector, RelatedRulesContainer, MAX_RULES_PER_ORIGIN_DIRECTORY};

/// Name prefix identifying rules generated during the build rather than
/// configured.
pub const AUTO_GENERATED_RULE_NAME_PREFIX: &str = "__AutoGenerated";

/// Characters that may not appear anywhere in a directory string. Wildcards
/// are disallowed; backslashes separate components and colons identify
/// drives, so both are permitted.
const DIRECTORY_DISALLOWED_CHARACTERS: &str = "/*?\"<>|";

/// Characters that may not appear anywhere in a file pattern. Patterns name
/// files within a directory, never subdirectories or drives.
const FILE_PATTERN_DISALLOWED_CHARACTERS: &str = "\\/:\"<>|";

/// Which directory of a rule an error refers to.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum DirectoryRole {
    Origin,
    Target,
}

impl DirectoryRole {
    fn as_str(self) -> &'static str {
        match self {
            DirectoryRole::Origin => "Origin directory",
            DirectoryRole::Target => "Target directory",
        }
    }
}

/// A single rule-set compilation failure.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuildError {
    pub rule_name: String,
    pub kind: BuildErrorKind,
}

impl BuildError {
    fn new(rule_name: impl Into<String>, kind: BuildErrorKind) -> Self {
        Self { rule_name: rule_name.into(), kind }
    }
}

/// The constraint a failed rule violated.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BuildErrorKind {
    DuplicateRuleName,
    InvalidFilePattern(String),
    MissingOriginDirectory,
    MissingTargetDirectory,
    InvalidRedirectMode(String),
    UnresolvedReference(DirectoryRole, resolver::Error),
    InvalidDirectoryString(DirectoryRole),
    DirectoryIsFilesystemRoot(DirectoryRole),
    OriginInUseAsTarget,
    TargetInUseAsOrigin,
    TargetInUseAsTarget,
    OriginBucketFull,
    OriginExistsAsNonDirectory,
    TargetIsDescendantOfRule(String),
}

impl std::fmt::Display for BuildError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let rule = &self.rule_name;
        match &self.kind {
            BuildErrorKind::DuplicateRuleName => write!(
                f,
                "Error while creating filesystem rule \"{rule}\": Constraint violation: Rule with the same name already exists."
            ),
            BuildErrorKind::InvalidFilePattern(pattern) => write!(
                f,
                "Error while creating filesystem rule \"{rule}\": File pattern: {pattern}: Either empty or contains disallowed characters."
            ),
            BuildErrorKind::MissingOriginDirectory => write!(
                f,
                "Error while creating filesystem rule \"{rule}\": Missing origin directory."
            ),
            BuildErrorKind::MissingTargetDirectory => write!(
                f,
                "Error while creating filesystem rule \"{rule}\": Missing target directory."
            ),
            BuildErrorKind::InvalidRedirectMode(mode) => write!(
                f,
                "Error while creating filesystem rule \"{rule}\": Invalid redirection mode: {mode}."
            ),
            BuildErrorKind::UnresolvedReference(role, error) => write!(
                f,
                "Error while creating filesystem rule \"{rule}\": {}: {error}.",
                role.as_str()
            ),
            BuildErrorKind::InvalidDirectoryString(role) => write!(
                f,
                "Error while creating filesystem rule \"{rule}\": {}: Either empty, relative, or contains disallowed characters.",
                role.as_str()
            ),
            BuildErrorKind::DirectoryIsFilesystemRoot(role) => write!(
                f,
                "Error while creating filesystem rule \"{rule}\": Constraint violation: {} cannot be a filesystem root.",
                role.as_str()
            ),
            BuildErrorKind::OriginInUseAsTarget => write!(
                f,
                "Error while creating filesystem rule \"{rule}\": Constraint violation: Origin directory is already in use as a target directory by another rule."
            ),
            BuildErrorKind::TargetInUseAsOrigin => write!(
                f,
                "Error while creating filesystem rule \"{rule}\": Constraint violation: Target directory is already in use as an origin directory by another rule."
            ),
            BuildErrorKind::TargetInUseAsTarget => write!(
                f,
                "Error while creating filesystem rule \"{rule}\": Constraint violation: Target directory is already in use as a target directory by another rule."
            ),
            BuildErrorKind::OriginBucketFull => write!(
                f,
                "Error while creating filesystem rule \"{rule}\": Exceeds the limit of {MAX_RULES_PER_ORIGIN_DIRECTORY} filesystem rules per origin directory."
            ),
            BuildErrorKind::OriginExistsAsNonDirectory => write!(
                f,
                "Filesystem rule \"{rule}\": Constraint violation: Origin directory must either not exist at all or exist as a real directory."
            ),
            BuildErrorKind::TargetIsDescendantOfRule(conflicting) => write!(
                f,
                "Filesystem rule \"{rule}\": Constraint violation: Target directory must not be a descendent of the origin or target directory of filesystem rule \"{conflicting}\"."
            ),
        }
    }
}

/// Outcome of one pre-build constraint verification pass.
enum ConstraintViolation {
    /// A rule's origin parent dangles; the named rule must be generated and
    /// verification re-run.
    AutoGenerateRule { rule_name: String, origin_directory: String, target_directory: String },
    /// Compilation must fail.
    Error(BuildError),
}

/// Determines if a candidate string is a syntactically valid absolute
/// directory: drive-letter prefixed, printable, free of wildcards and of
/// all-dots components, and free of empty components.
pub fn is_valid_directory_string(candidate: &str) -> bool {
    let mut chars = candidate.chars();
    match (chars.next(), chars.next()) {
        (Some(letter), Some(':')) if letter.is_ascii_alphabetic() => {}
        _ => return false,
    }

    if candidate.contains("\\\\") {
        return false;
    }

    for component in candidate[2..].split(strings::PATH_DELIMITER) {
        if component.is_empty() {
            continue;
        }
        if component.chars().all(|c| c == '.') {
            return false;
        }
        for c in component.chars() {
            if c.is_control() || DIRECTORY_DISALLOWED_CHARACTERS.contains(c) {
                return false;
            }
        }
    }

    true
}

/// Determines if a candidate string is a valid file pattern: non-empty,
/// printable, and free of separators and drive designators.
pub fn is_valid_file_pattern_string(candidate: &str) -> bool {
    !candidate.is_empty()
        && candidate
            .chars()
            .all(|c| !c.is_control() && !FILE_PATTERN_DISALLOWED_CHARACTERS.contains(c))
}

/// Turns a potentially relative path into an absolute one by folding `.`,
/// `..`, and empty components. A `..` may not escape past the drive root.
fn resolve_relative_to_absolute(path: &str) -> Option<String> {
    let had_trailing_delimiter = path.ends_with(strings::PATH_DELIMITER);

    let mut components: Vec<&str> = Vec::new();
    for component in path.split(strings::PATH_DELIMITER) {
        match component {
            "" | "." => continue,
            ".." => {
                // The drive designator always stays.
                if components.len() < 2 {
                    return None;
                }
                components.pop();
            }
            other => components.push(other),
        }
    }

    let mut resolved = components.join("\\");
    if had_trailing_delimiter && !resolved.is_empty() {
        resolved.push(strings::PATH_DELIMITER);
    }
    Some(resolved)
}

/// Builds filesystem director objects piece-wise. Rules are added one at a
/// time with per-rule validation; cross-rule constraints are enforced when
/// the final director is built.
pub struct FilesystemDirectorBuilder<'ctx> {
    native: Arc<dyn NativeFilesystem>,
    resolver: &'ctx Resolver,
    temporary_paths: &'ctx TemporaryPathRegistry,
    /// Keyed by case-folded rule name.
    rules_by_name: BTreeMap<String, Arc<FilesystemRule>>,
    /// Case-folded origin and target directory paths already in use.
    origin_directories: HashSet<String>,
    target_directories: HashSet<String>,
    origin_index: PrefixIndex<RelatedRulesContainer>,
}

impl<'ctx> FilesystemDirectorBuilder<'ctx> {
    pub fn new(
        native: Arc<dyn NativeFilesystem>,
        resolver: &'ctx Resolver,
        temporary_paths: &'ctx TemporaryPathRegistry,
    ) -> Self {
        Self {
            native,
            resolver,
            temporary_paths,
            rules_by_name: BTreeMap::new(),
            origin_directories: HashSet::new(),
            target_directories: HashSet::new(),
            origin_index: PrefixIndex::new(),
        }
    }

    /// Builds a director from an entire configuration section map. Either
    /// every rule compiles and the cross-rule constraints hold, or the full
    /// list of errors is returned and no director exists.
    pub fn build_from_configuration_data(
        configuration: &ConfigurationData,
        resolver: &'ctx Resolver,
        native: Arc<dyn NativeFilesystem>,
        temporary_paths: &'ctx TemporaryPathRegistry,
    ) -> Result<FilesystemDirector, Vec<BuildError>> {
        let mut builder = FilesystemDirectorBuilder::new(native.clone(), resolver, temporary_paths);

        let mut errors = Vec::new();
        for (rule_name, section) in configuration.filesystem_rule_sections() {
            match builder.add_rule_from_configuration_section(rule_name.clone(), section) {
                Ok(rule) => {
                    tracing::info!(
                        rule = rule.name(),
                        origin = rule.origin_directory(),
                        target = rule.target_directory(),
                        mode = ?rule.redirect_mode(),
                        "created filesystem rule"
                    );
                }
                Err(error) => {
                    tracing::error!(%error, "failed to create filesystem rule");
                    errors.push(error);
                }
            }
        }
        if !errors.is_empty() {
            return Err(errors);
        }

        if builder.count_of_rules() == 0 {
            // A configuration with no rules is not an error; the resulting
            // director simply does nothing.
            tracing::warn!("filesystem director configuration contains no filesystem rules");
            return Ok(FilesystemDirector::empty(native));
        }

        match builder.build() {
            Ok(director) => {
                tracing::info!(rules = director.count_of_rules(), "built filesystem director");
                Ok(director)
            }
            Err(error) => {
                tracing::error!(%error, "failed to build filesystem director");
                Err(vec![error])
            }
        }
    }

    pub fn count_of_rules(&self) -> usize {
        self.rules_by_name.len()
    }

    fn has_origin_directory(&self, directory: &str) -> bool {
        self.origin_directories.contains(&strings::fold_case(directory))
    }

    fn has_target_directory(&self, directory: &str) -> bool {
        self.target_directories.contains(&strings::fold_case(directory))
    }

    /// Adds one rule from its configuration section.
    pub fn add_rule_from_configuration_section(
        &mut self,
        rule_name: String,
        section: &FilesystemRuleSection,
    ) -> Result<Arc<FilesystemRule>, BuildError> {
        let Some(origin_directory) = section.origin_directory.as_deref() else {
            return Err(BuildError::new(rule_name, BuildErrorKind::MissingOriginDirectory));
        };
        let Some(target_directory) = section.target_directory.as_deref() else {
            return Err(BuildError::new(rule_name, BuildErrorKind::MissingTargetDirectory));
        };

        let redirect_mode = match section.redirect_mode.as_deref() {
            None => RedirectMode::Simple,
            Some(mode) if strings::eq_ignore_case(mode, "Simple") => RedirectMode::Simple,
            Some(mode) if strings::eq_ignore_case(mode, "Overlay") => RedirectMode::Overlay,
            Some(mode) => {
                return Err(BuildError::new(
                    rule_name,
                    BuildErrorKind::InvalidRedirectMode(mode.to_string()),
                ));
            }
        };

        self.add_rule(
            rule_name,
            origin_directory,
            target_directory,
            section.file_pattern.clone().into_patterns(),
            redirect_mode,
        )
    }

    /// Adds one rule with full per-rule validation.
    pub fn add_rule(
        &mut self,
        rule_name: String,
        origin_directory: &str,
        target_directory: &str,
        file_patterns: Vec<String>,
        redirect_mode: RedirectMode,
    ) -> Result<Arc<FilesystemRule>, BuildError> {
        let rule_name_folded = strings::fold_case(&rule_name);
        if self.rules_by_name.contains_key(&rule_name_folded) {
            return Err(BuildError::new(rule_name, BuildErrorKind::DuplicateRuleName));
        }

        for pattern in &file_patterns {
            if !is_valid_file_pattern_string(pattern) {
                return Err(BuildError::new(
                    rule_name,
                    BuildErrorKind::InvalidFilePattern(pattern.clone()),
                ));
            }
        }

        // For each of the origin and target directories: resolve embedded
        // references, re-absolutize relative components, check the string
        // for validity, then check the cross-rule uniqueness constraints.
        // Origin directories may be shared by a bounded number of rules but
        // may not be in use as a target; target directories must be unique.
        let origin_full_path =
            self.prepare_directory(&rule_name, origin_directory, DirectoryRole::Origin)?;
        if self.has_target_directory(&origin_full_path) {
            return Err(BuildError::new(rule_name, BuildErrorKind::OriginInUseAsTarget));
        }

        let target_full_path =
            self.prepare_directory(&rule_name, target_directory, DirectoryRole::Target)?;
        if self.has_origin_directory(&target_full_path) {
            return Err(BuildError::new(rule_name, BuildErrorKind::TargetInUseAsOrigin));
        }
        if self.has_target_directory(&target_full_path) {
            return Err(BuildError::new(rule_name, BuildErrorKind::TargetInUseAsTarget));
        }

        let rule = Arc::new(FilesystemRule::new(
            rule_name.clone(),
            origin_full_path.clone(),
            target_full_path.clone(),
            file_patterns,
            redirect_mode,
        ));

        let inserted_into_container = if self.origin_index.contains(&origin_full_path) {
            self.origin_index
                .find_mut(&origin_full_path)
                .expect("presence checked above")
                .insert(rule.clone())
        } else {
            let mut container = RelatedRulesContainer::new();
            container.insert(rule.clone());
            self.origin_index.insert(&origin_full_path, container)
        };
        if !inserted_into_container {
            return Err(BuildError::new(rule_name, BuildErrorKind::OriginBucketFull));
        }

        self.origin_directories.insert(strings::fold_case(&origin_full_path));
        self.target_directories.insert(strings::fold_case(&target_full_path));
        self.rules_by_name.insert(rule_name_folded, rule.clone());

        Ok(rule)
    }

    fn prepare_directory(
        &self,
        rule_name: &str,
        configured: &str,
        role: DirectoryRole,
    ) -> Result<String, BuildError> {
        let resolved = self.resolver.resolve_all_references(configured).map_err(|error| {
            BuildError::new(rule_name, BuildErrorKind::UnresolvedReference(role, error))
        })?;

        let absolute = resolve_relative_to_absolute(&resolved).ok_or_else(|| {
            BuildError::new(rule_name, BuildErrorKind::InvalidDirectoryString(role))
        })?;

        if !is_valid_directory_string(&absolute) {
            return Err(BuildError::new(rule_name, BuildErrorKind::InvalidDirectoryString(role)));
        }

        let full_path =
            strings::remove_trailing(&absolute, strings::PATH_DELIMITER).to_string();
        if !full_path.contains(strings::PATH_DELIMITER) {
            return Err(BuildError::new(
                rule_name,
                BuildErrorKind::DirectoryIsFilesystemRoot(role),
            ));
        }

        Ok(full_path)
    }

    /// Verifies cross-rule and filesystem-state constraints, auto-generating
    /// parent rules until a fixed point, then emits the director.
    pub fn build(mut self) -> Result<FilesystemDirector, BuildError> {
        loop {
            match self.verify_pre_build_constraints() {
                None => break,
                Some(ConstraintViolation::Error(error)) => return Err(error),
                Some(ConstraintViolation::AutoGenerateRule {
                    rule_name,
                    origin_directory,
                    target_directory,
                }) => {
                    let generated = self.add_rule(
                        rule_name,
                        &origin_directory,
                        &target_directory,
                        Vec::new(),
                        RedirectMode::Simple,
                    )?;
                    self.temporary_paths.register(generated.target_directory());
                    tracing::info!(
                        rule = generated.name(),
                        origin = generated.origin_directory(),
                        target = generated.target_directory(),
                        "auto-generated filesystem rule"
                    );
                }
            }
        }

        Ok(FilesystemDirector::new(self.native, self.rules_by_name, self.origin_index))
    }

    fn verify_pre_build_constraints(&self) -> Option<ConstraintViolation> {
        // Origins and targets all land in one index so that the descendant
        // constraint can be checked by a single ancestor probe per target.
        let mut all_directories: PrefixIndex<Arc<FilesystemRule>> = PrefixIndex::new();

        for rule in self.rules_by_name.values() {
            let origin_exists = self.native.exists(rule.origin_directory());
            let origin_is_directory = self.native.is_directory(rule.origin_directory());
            if origin_exists && !origin_is_directory {
                return Some(ConstraintViolation::Error(BuildError::new(
                    rule.name(),
                    BuildErrorKind::OriginExistsAsNonDirectory,
                )));
            }

            // An origin whose parent is neither a real directory nor another
            // rule's origin would dangle: nothing could ever enumerate it
            // into existence. Redirecting the parent to a temporary location
            // makes the whole chain consistently visible.
            let origin_parent = rule.origin_directory_parent();
            if !origin_parent.is_empty()
                && !self.native.is_directory(origin_parent)
                && !self.has_origin_directory(origin_parent)
            {
                return Some(ConstraintViolation::AutoGenerateRule {
                    rule_name: format!(
                        "{AUTO_GENERATED_RULE_NAME_PREFIX}:AddParentOfOriginDirectory:{}",
                        rule.origin_directory()
                    ),
                    origin_directory: origin_parent.to_string(),
                    target_directory: self.unique_temporary_directory(),
                });
            }

            all_directories.insert(rule.origin_directory(), rule.clone());
            all_directories.insert(rule.target_directory(), rule.clone());
        }

        for rule in self.rules_by_name.values() {
            if let Some(conflicting) = all_directories.closest_ancestor(rule.target_directory()) {
                return Some(ConstraintViolation::Error(BuildError::new(
                    rule.name(),
                    BuildErrorKind::TargetIsDescendantOfRule(conflicting.name().to_string()),
                )));
            }
        }

        None
    }

    fn unique_temporary_directory(&self) -> String {
        let temporary_area = self
            .resolver
            .resolve_all_references("%BUILTIN::TempDirectory%")
            .unwrap_or_else(|_| "C:\\Temp".to_string());
        strings::unique_temporary_directory(&temporary_area)
    }
}
