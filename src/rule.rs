//! Filesystem redirection rules.
//!
//! A rule pairs an origin directory with a target directory, optionally
//! scoped by file patterns. Rules know how to compare candidate directories
//! against their endpoints and how to rewrite paths across the origin↔target
//! boundary. Immutable once constructed.

use crate::strings;

/// How a rule's redirection interacts with the origin-side filesystem.
#[derive(Debug, Default, Copy, Clone, PartialEq, Eq, Hash)]
pub enum RedirectMode {
    /// Redirection is absolute. Only the redirected side is consulted.
    #[default]
    Simple,
    /// Redirection is preferred, with the origin side as a fallback.
    Overlay,
}

/// Relationship between a candidate directory and a comparison directory.
/// Parent/child are exactly one component away; ancestor/descendant are
/// further removed.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum DirectoryCompareResult {
    Equal,
    CandidateIsParent,
    CandidateIsAncestor,
    CandidateIsChild,
    CandidateIsDescendant,
    Unrelated,
}

impl DirectoryCompareResult {
    /// Candidate is the comparison directory or lies beneath it.
    pub fn is_equal_or_below(self) -> bool {
        matches!(
            self,
            DirectoryCompareResult::Equal
                | DirectoryCompareResult::CandidateIsChild
                | DirectoryCompareResult::CandidateIsDescendant
        )
    }
}

/// Compares a candidate directory with a comparison directory to determine
/// if and how they are related.
fn directory_compare(candidate: &str, comparison: &str) -> DirectoryCompareResult {
    if candidate.len() == comparison.len() {
        if strings::eq_ignore_case(candidate, comparison) {
            return DirectoryCompareResult::Equal;
        }
    } else if candidate.len() < comparison.len() {
        // The candidate could be an ancestor or the immediate parent. The two
        // cases differ by whether the non-matching suffix holds more than one
        // delimiter.
        if strings::starts_with_ignore_case(comparison, candidate)
            && comparison.as_bytes()[candidate.len()] == strings::PATH_DELIMITER as u8
        {
            let suffix = &comparison[candidate.len() + 1..];
            return if suffix.contains(strings::PATH_DELIMITER) {
                DirectoryCompareResult::CandidateIsAncestor
            } else {
                DirectoryCompareResult::CandidateIsParent
            };
        }
    } else if strings::starts_with_ignore_case(candidate, comparison)
        && candidate.as_bytes()[comparison.len()] == strings::PATH_DELIMITER as u8
    {
        let suffix = &candidate[comparison.len() + 1..];
        return if suffix.contains(strings::PATH_DELIMITER) {
            DirectoryCompareResult::CandidateIsDescendant
        } else {
            DirectoryCompareResult::CandidateIsChild
        };
    }

    DirectoryCompareResult::Unrelated
}

/// Determines if a filename matches any of the supplied patterns. An empty
/// pattern set matches everything. The filename must not contain delimiters.
fn file_name_matches_any_pattern(file_name: &str, patterns: &[String]) -> bool {
    if patterns.is_empty() {
        return true;
    }
    patterns.iter().any(|pattern| strings::file_name_matches_pattern(file_name, pattern))
}

/// Rewrites a candidate path from one directory to another. The candidate is
/// split into a directory part and a file part; redirection applies when the
/// directory part sits at or below `from` and the governing name (the file
/// part at the origin itself, or the immediate child beneath it) matches the
/// patterns.
fn redirect_path(
    candidate_directory: &str,
    candidate_file: &str,
    from: &str,
    to: &str,
    patterns: &[String],
    namespace_prefix: &str,
    extra_suffix: &str,
) -> Option<String> {
    match directory_compare(candidate_directory, from) {
        DirectoryCompareResult::Equal => {
            if !candidate_file.is_empty()
                && !file_name_matches_any_pattern(candidate_file, patterns)
            {
                return None;
            }
        }
        DirectoryCompareResult::CandidateIsChild
        | DirectoryCompareResult::CandidateIsDescendant => {
            let below_from = &candidate_directory[from.len() + 1..];
            let immediate_child = below_from
                .split(strings::PATH_DELIMITER)
                .next()
                .expect("split yields at least one element");
            if !file_name_matches_any_pattern(immediate_child, patterns) {
                return None;
            }
        }
        _ => return None,
    }

    let remainder = &candidate_directory[from.len()..];

    let mut redirected = String::with_capacity(
        namespace_prefix.len() + to.len() + remainder.len() + candidate_file.len() + 1 + extra_suffix.len(),
    );
    redirected.push_str(namespace_prefix);
    redirected.push_str(to);
    redirected.push_str(remainder);
    if !candidate_file.is_empty() {
        redirected.push(strings::PATH_DELIMITER);
        redirected.push_str(candidate_file);
    }
    redirected.push_str(extra_suffix);

    Some(redirected)
}

/// A single immutable redirection rule.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FilesystemRule {
    name: String,
    origin_directory: String,
    target_directory: String,
    /// Uppercased at construction, a requirement of the pattern matcher.
    file_patterns: Vec<String>,
    redirect_mode: RedirectMode,
}

impl FilesystemRule {
    /// Creates a rule. The origin and target must already be absolute,
    /// validated paths with no trailing delimiter; the rule compiler is
    /// responsible for that preparation.
    pub fn new(
        name: impl Into<String>,
        origin_directory: impl Into<String>,
        target_directory: impl Into<String>,
        file_patterns: Vec<String>,
        redirect_mode: RedirectMode,
    ) -> Self {
        let file_patterns =
            file_patterns.into_iter().map(|pattern| strings::fold_case(&pattern)).collect();
        Self {
            name: name.into(),
            origin_directory: origin_directory.into(),
            target_directory: target_directory.into(),
            file_patterns,
            redirect_mode,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn origin_directory(&self) -> &str {
        &self.origin_directory
    }

    pub fn target_directory(&self) -> &str {
        &self.target_directory
    }

    /// Parent of the origin directory, or the empty string at a root.
    pub fn origin_directory_parent(&self) -> &str {
        strings::parent_directory(&self.origin_directory)
    }

    /// Final component of the origin directory.
    pub fn origin_directory_name(&self) -> &str {
        strings::split_directory_and_file(&self.origin_directory).1
    }

    pub fn file_patterns(&self) -> &[String] {
        &self.file_patterns
    }

    pub fn has_file_patterns(&self) -> bool {
        !self.file_patterns.is_empty()
    }

    pub fn redirect_mode(&self) -> RedirectMode {
        self.redirect_mode
    }

    pub fn directory_compare_with_origin(&self, candidate: &str) -> DirectoryCompareResult {
        directory_compare(candidate, &self.origin_directory)
    }

    pub fn directory_compare_with_target(&self, candidate: &str) -> DirectoryCompareResult {
        directory_compare(candidate, &self.target_directory)
    }

    /// Determines if a filename matches any of this rule's patterns.
    pub fn file_name_matches_any_pattern(&self, file_name: &str) -> bool {
        file_name_matches_any_pattern(file_name, &self.file_patterns)
    }

    /// Redirects a candidate path from the origin side to the target side.
    /// Returns the redirected absolute path, or nothing if the candidate is
    /// outside this rule's scope.
    pub fn redirect_path_origin_to_target(
        &self,
        candidate_directory: &str,
        candidate_file: &str,
        namespace_prefix: &str,
        extra_suffix: &str,
    ) -> Option<String> {
        redirect_path(
            candidate_directory,
            candidate_file,
            &self.origin_directory,
            &self.target_directory,
            &self.file_patterns,
            namespace_prefix,
            extra_suffix,
        )
    }

    /// Redirects a candidate path from the target side back to the origin
    /// side.
    pub fn redirect_path_target_to_origin(
        &self,
        candidate_directory: &str,
        candidate_file: &str,
        namespace_prefix: &str,
        extra_suffix: &str,
    ) -> Option<String> {
        redirect_path(
            candidate_directory,
            candidate_file,
            &self.target_directory,
            &self.origin_directory,
            &self.file_patterns,
            namespace_prefix,
            extra_suffix,
        )
    }
}
