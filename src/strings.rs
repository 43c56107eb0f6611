//! Path and filename string utilities shared across the redirection engine.
//!
//! All comparisons of paths and filenames are case-insensitive. Paths use a
//! single backslash as the component delimiter and may carry one of the
//! recognized namespace prefixes.

use std::sync::atomic::{AtomicU64, Ordering};

/// Namespace prefixes recognized at the front of absolute paths.
pub const NAMESPACE_PREFIXES: [&str; 3] = ["\\??\\", "\\\\?\\", "\\\\.\\"];

/// Namespace prefix prepended when handing a bare path to the native layer.
pub const NAMESPACE_PREFIX_TO_PREPEND: &str = "\\??\\";

/// Path component delimiter.
pub const PATH_DELIMITER: char = '\\';

/// Length of a drive letter prefix: a letter, a colon, and a backslash.
const DRIVE_LETTER_PREFIX_LEN: usize = 3;

/// Compares two strings case-insensitively.
pub fn eq_ignore_case(lhs: &str, rhs: &str) -> bool {
    let mut lhs = lhs.chars().flat_map(char::to_uppercase);
    let mut rhs = rhs.chars().flat_map(char::to_uppercase);
    loop {
        match (lhs.next(), rhs.next()) {
            (None, None) => return true,
            (Some(l), Some(r)) if l == r => continue,
            _ => return false,
        }
    }
}

/// Determines whether `candidate` begins with `prefix`, case-insensitively.
/// The match is on raw characters and is unaware of component boundaries.
pub fn starts_with_ignore_case(candidate: &str, prefix: &str) -> bool {
    if candidate.len() < prefix.len() {
        return false;
    }
    // Both inputs are paths, so char boundaries line up only when the byte
    // lengths agree. Walk characters instead of slicing bytes.
    let mut candidate_chars = candidate.chars().flat_map(char::to_uppercase);
    for p in prefix.chars().flat_map(char::to_uppercase) {
        match candidate_chars.next() {
            Some(c) if c == p => continue,
            _ => return false,
        }
    }
    true
}

/// Produces the case-folded (uppercased) form of a string, suitable for use
/// as a key in case-insensitive maps and sets.
pub fn fold_case(text: &str) -> String {
    text.chars().flat_map(char::to_uppercase).collect()
}

/// Iterates the non-empty components of a backslash-delimited path.
/// Consecutive delimiters collapse into one.
pub fn path_components(path: &str) -> impl Iterator<Item = &str> {
    path.split(PATH_DELIMITER).filter(|component| !component.is_empty())
}

/// Returns the namespace prefix at the front of the path, or the empty string
/// if none of the recognized prefixes is present.
pub fn namespace_prefix(path: &str) -> &str {
    for prefix in NAMESPACE_PREFIXES {
        if path.starts_with(prefix) {
            return &path[..prefix.len()];
        }
    }
    ""
}

/// Determines whether the path carries a recognized namespace prefix.
pub fn has_namespace_prefix(path: &str) -> bool {
    !namespace_prefix(path).is_empty()
}

/// Returns the path without its namespace prefix, if one is present.
pub fn without_namespace_prefix(path: &str) -> &str {
    &path[namespace_prefix(path).len()..]
}

/// Prepends the default namespace prefix to an absolute path.
pub fn add_namespace_prefix(absolute_path: &str) -> String {
    let mut prefixed = String::with_capacity(NAMESPACE_PREFIX_TO_PREPEND.len() + absolute_path.len());
    prefixed.push_str(NAMESPACE_PREFIX_TO_PREPEND);
    prefixed.push_str(absolute_path);
    prefixed
}

/// Determines whether the path, after any namespace prefix, begins with a
/// drive letter, a colon, and a backslash.
pub fn begins_with_drive_letter(path: &str) -> bool {
    let trimmed = without_namespace_prefix(path);
    let mut chars = trimmed.chars();
    match (chars.next(), chars.next(), chars.next()) {
        (Some(letter), Some(':'), Some(PATH_DELIMITER)) => letter.is_alphabetic(),
        _ => false,
    }
}

/// Determines whether the path identifies a volume root, such as `C:\`.
pub fn is_volume_root(path: &str) -> bool {
    begins_with_drive_letter(path)
        && without_namespace_prefix(path).len() == DRIVE_LETTER_PREFIX_LEN
}

/// Returns the parent directory of the path, retaining any namespace prefix
/// and excluding the trailing delimiter. Returns the empty string when the
/// path has no parent.
pub fn parent_directory(path: &str) -> &str {
    let prefix_len = namespace_prefix(path).len();
    let trimmed = path[prefix_len..].trim_end_matches(PATH_DELIMITER);
    match trimmed.rfind(PATH_DELIMITER) {
        Some(last_delimiter) => &path[..prefix_len + last_delimiter],
        None => "",
    }
}

/// Splits a path into its directory part and file part at the final
/// delimiter. The file part carries no leading delimiter and may be empty if
/// the path ends with a delimiter.
pub fn split_directory_and_file(path: &str) -> (&str, &str) {
    match path.rfind(PATH_DELIMITER) {
        Some(last_delimiter) => (&path[..last_delimiter], &path[last_delimiter + 1..]),
        None => ("", path),
    }
}

/// Removes every trailing occurrence of the given character.
pub fn remove_trailing(text: &str, trailing: char) -> &str {
    text.trim_end_matches(trailing)
}

/// Determines whether a filename matches a file pattern under the host's
/// native wildcard semantics: `*` matches any run of characters and `?`
/// matches exactly one. The pattern must already be uppercased; the filename
/// is folded during the comparison. An empty pattern matches everything.
pub fn file_name_matches_pattern(file_name: &str, pattern_upper_case: &str) -> bool {
    if pattern_upper_case.is_empty() {
        return true;
    }

    let name: Vec<char> = file_name.chars().flat_map(char::to_uppercase).collect();
    let pattern: Vec<char> = pattern_upper_case.chars().collect();

    let mut name_pos = 0;
    let mut pattern_pos = 0;
    let mut star_pattern_pos = None;
    let mut star_name_pos = 0;

    while name_pos < name.len() {
        if pattern_pos < pattern.len()
            && (pattern[pattern_pos] == '?' || pattern[pattern_pos] == name[name_pos])
        {
            name_pos += 1;
            pattern_pos += 1;
        } else if pattern_pos < pattern.len() && pattern[pattern_pos] == '*' {
            star_pattern_pos = Some(pattern_pos);
            star_name_pos = name_pos;
            pattern_pos += 1;
        } else if let Some(star_pos) = star_pattern_pos {
            pattern_pos = star_pos + 1;
            star_name_pos += 1;
            name_pos = star_name_pos;
        } else {
            return false;
        }
    }

    while pattern_pos < pattern.len() && pattern[pattern_pos] == '*' {
        pattern_pos += 1;
    }

    pattern_pos == pattern.len()
}

/// Generates a process-unique directory path beneath the supplied temporary
/// area. The path is not created on the filesystem.
pub fn unique_temporary_directory(temporary_area: &str) -> String {
    static NEXT_SEQUENCE: AtomicU64 = AtomicU64::new(0);

    let sequence = NEXT_SEQUENCE.fetch_add(1, Ordering::Relaxed);
    format!(
        "{}\\pathveer_{:x}_{:x}",
        remove_trailing(temporary_area, PATH_DELIMITER),
        std::process::id(),
        sequence
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn case_insensitive_equality() {
        assert!(eq_ignore_case("C:\\Dir\\File.txt", "c:\\dir\\file.TXT"));
        assert!(!eq_ignore_case("C:\\Dir", "C:\\Dir\\Sub"));
        assert!(eq_ignore_case("", ""));
    }

    #[test]
    fn case_insensitive_prefix() {
        assert!(starts_with_ignore_case("C:\\Dir\\Sub", "c:\\DIR"));
        assert!(!starts_with_ignore_case("C:\\Di", "C:\\Dir"));
    }

    #[test]
    fn component_iteration_collapses_delimiters() {
        let components: Vec<&str> = path_components("C:\\\\Dir\\Sub\\").collect();
        assert_eq!(components, vec!["C:", "Dir", "Sub"]);
    }

    #[test]
    fn namespace_prefixes_recognized() {
        assert_eq!(namespace_prefix("\\??\\C:\\Dir"), "\\??\\");
        assert_eq!(namespace_prefix("\\\\?\\C:\\Dir"), "\\\\?\\");
        assert_eq!(namespace_prefix("\\\\.\\C:\\Dir"), "\\\\.\\");
        assert_eq!(namespace_prefix("C:\\Dir"), "");
        assert_eq!(without_namespace_prefix("\\??\\C:\\Dir"), "C:\\Dir");
        assert_eq!(add_namespace_prefix("C:\\Dir"), "\\??\\C:\\Dir");
    }

    #[test]
    fn drive_letter_detection() {
        assert!(begins_with_drive_letter("C:\\Dir"));
        assert!(begins_with_drive_letter("\\??\\x:\\"));
        assert!(!begins_with_drive_letter("Dir\\Sub"));
        assert!(!begins_with_drive_letter("C:"));
    }

    #[test]
    fn volume_root_detection() {
        assert!(is_volume_root("C:\\"));
        assert!(is_volume_root("\\??\\C:\\"));
        assert!(!is_volume_root("C:\\Dir"));
        assert!(!is_volume_root("C:"));
    }

    #[test]
    fn parent_directory_extraction() {
        assert_eq!(parent_directory("C:\\Dir\\Sub"), "C:\\Dir");
        assert_eq!(parent_directory("C:\\Dir\\Sub\\"), "C:\\Dir");
        assert_eq!(parent_directory("\\??\\C:\\Dir"), "\\??\\C:");
        assert_eq!(parent_directory("C:\\"), "");
        assert_eq!(parent_directory("Dir"), "");
    }

    #[test]
    fn directory_and_file_split() {
        assert_eq!(split_directory_and_file("C:\\Dir\\file.txt"), ("C:\\Dir", "file.txt"));
        assert_eq!(split_directory_and_file("C:\\Dir\\"), ("C:\\Dir", ""));
        assert_eq!(split_directory_and_file("file.txt"), ("", "file.txt"));
    }

    #[test]
    fn wildcard_matching() {
        assert!(file_name_matches_pattern("save.dat", "*.DAT"));
        assert!(file_name_matches_pattern("save.dat", "SAVE.DAT"));
        assert!(file_name_matches_pattern("save.dat", "S?VE.*"));
        assert!(file_name_matches_pattern("anything", ""));
        assert!(file_name_matches_pattern("abc", "*"));
        assert!(!file_name_matches_pattern("save.dat", "*.SAV"));
        assert!(!file_name_matches_pattern("save.dat", "S?VE"));
        assert!(!file_name_matches_pattern("", "?"));
    }

    #[test]
    fn unique_temporary_directories_differ() {
        let first = unique_temporary_directory("C:\\Temp\\");
        let second = unique_temporary_directory("C:\\Temp");
        assert!(first.starts_with("C:\\Temp\\pathveer_"));
        assert!(second.starts_with("C:\\Temp\\pathveer_"));
        assert_ne!(first, second);
    }
}
