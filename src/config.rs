//! The configuration section map consumed by the rule compiler.
//!
//! The engine does not own configuration lexing; it accepts a section map
//! shaped as one `FilesystemRule:<name>` section per rule, an optional
//! `Definitions` section feeding the `CONF` reference domain, and a global
//! `LogLevel`. TOML is the concrete carrier.

use std::collections::BTreeMap;
use std::path::Path;

use serde::Deserialize;

/// Result of configuration ingestion.
pub type Result<T> = std::result::Result<T, Error>;

/// Configuration ingestion errors.
#[derive(Debug)]
pub enum Error {
    /// The carrier document could not be parsed.
    Parse(toml::de::Error),
    /// The document could not be read from disk.
    Io(std::io::Error),
    /// A section name matches neither a known global section nor the
    /// filesystem rule prefix.
    UnrecognizedSection(String),
}

impl std::fmt::Display for Error {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Error::Parse(parse) => write!(f, "Configuration parse error: {parse}"),
            Error::Io(io) => write!(f, "Configuration read error: {io}"),
            Error::UnrecognizedSection(section) => {
                write!(f, "{section}: Unrecognized configuration section")
            }
        }
    }
}

/// Prefix of the section name that introduces a filesystem rule. The rest of
/// the name is the rule's name.
pub const FILESYSTEM_RULE_SECTION_PREFIX: &str = "FilesystemRule:";

/// One or many file pattern strings, as either form is accepted.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(untagged)]
pub enum FilePatternSetting {
    #[default]
    #[serde(skip)]
    Absent,
    One(String),
    Many(Vec<String>),
}

impl FilePatternSetting {
    /// Flattens the setting into a list of patterns.
    pub fn into_patterns(self) -> Vec<String> {
        match self {
            FilePatternSetting::Absent => Vec::new(),
            FilePatternSetting::One(pattern) => vec![pattern],
            FilePatternSetting::Many(patterns) => patterns,
        }
    }
}

/// Contents of one `FilesystemRule:<name>` section. Field presence is
/// validated by the rule compiler so that its error taxonomy, not the
/// deserializer, names the offending rule.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct FilesystemRuleSection {
    #[serde(rename = "OriginDirectory")]
    pub origin_directory: Option<String>,
    #[serde(rename = "TargetDirectory")]
    pub target_directory: Option<String>,
    #[serde(rename = "RedirectMode")]
    pub redirect_mode: Option<String>,
    #[serde(rename = "FilePattern", default)]
    pub file_pattern: FilePatternSetting,
}

/// Raw document shape before section names are interpreted.
#[derive(Debug, Deserialize)]
struct RawConfiguration {
    #[serde(rename = "LogLevel", default)]
    log_level: u32,
    #[serde(rename = "Definitions", default)]
    definitions: BTreeMap<String, String>,
    #[serde(flatten)]
    sections: BTreeMap<String, FilesystemRuleSection>,
}

/// The section map handed to the rule compiler.
#[derive(Debug, Default)]
pub struct ConfigurationData {
    log_level: u32,
    definitions: BTreeMap<String, String>,
    filesystem_rule_sections: BTreeMap<String, FilesystemRuleSection>,
}

impl ConfigurationData {
    /// Parses a configuration document from TOML text.
    pub fn from_toml_str(document: &str) -> Result<Self> {
        let raw: RawConfiguration = toml::from_str(document).map_err(Error::Parse)?;

        let mut filesystem_rule_sections = BTreeMap::new();
        for (section_name, section) in raw.sections {
            let Some(rule_name) = section_name.strip_prefix(FILESYSTEM_RULE_SECTION_PREFIX) else {
                return Err(Error::UnrecognizedSection(section_name));
            };
            filesystem_rule_sections.insert(rule_name.to_string(), section);
        }

        Ok(Self {
            log_level: raw.log_level,
            definitions: raw.definitions,
            filesystem_rule_sections,
        })
    }

    /// Parses a configuration document from a file on disk.
    pub fn from_toml_file(path: impl AsRef<Path>) -> Result<Self> {
        let document = std::fs::read_to_string(path).map_err(Error::Io)?;
        Self::from_toml_str(&document)
    }

    /// Configured logging verbosity, zero meaning errors only.
    pub fn log_level(&self) -> u32 {
        self.log_level
    }

    /// Definitions feeding the `CONF` reference domain.
    pub fn definitions(&self) -> &BTreeMap<String, String> {
        &self.definitions
    }

    /// Filesystem rule sections, keyed by rule name.
    pub fn filesystem_rule_sections(&self) -> &BTreeMap<String, FilesystemRuleSection> {
        &self.filesystem_rule_sections
    }
}
