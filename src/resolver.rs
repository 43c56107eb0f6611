//! Resolution of `%DOMAIN::NAME%` references embedded in rule path strings.
//!
//! Recognized domains: `BUILTIN` (engine-defined values), `CONF` (definitions
//! supplied by the configuration), `ENV` (process environment), and
//! `FOLDERID` (platform-defined known folders). Resolved values may
//! themselves contain references, which are resolved recursively with cycle
//! detection. Read-only after initial configuration.

use std::collections::{BTreeMap, HashSet};

use crate::strings;

/// Result of resolver operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Reference resolution errors.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Error {
    /// Reference uses a domain that is not recognized.
    UnknownDomain(String),
    /// Reference names a value the domain does not define.
    UnresolvedName(String),
    /// Reference is not of the form `DOMAIN::NAME`.
    Malformed(String),
    /// A chain of definitions refers back to itself.
    CircularReference(String),
    /// A string ends inside an unterminated reference.
    Unterminated(String),
}

impl std::fmt::Display for Error {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Error::UnknownDomain(reference) => {
                write!(f, "{reference}: Unrecognized reference domain")
            }
            Error::UnresolvedName(reference) => write!(f, "{reference}: Unresolved reference"),
            Error::Malformed(reference) => write!(f, "{reference}: Malformed reference"),
            Error::CircularReference(reference) => {
                write!(f, "{reference}: Circular reference chain")
            }
            Error::Unterminated(text) => write!(f, "{text}: Unterminated reference"),
        }
    }
}

const DOMAIN_BUILTIN: &str = "BUILTIN";
const DOMAIN_CONF: &str = "CONF";
const DOMAIN_ENV: &str = "ENV";
const DOMAIN_FOLDERID: &str = "FOLDERID";

/// Fallback temporary area used when the environment defines none. Keeps
/// generated paths in the native shape the rest of the engine expects.
const FALLBACK_TEMP_DIRECTORY: &str = "C:\\Temp";

/// Resolves embedded references against its configured definition domains.
pub struct Resolver {
    builtin: BTreeMap<String, String>,
    configured: BTreeMap<String, String>,
    known_folders: BTreeMap<String, String>,
}

impl Default for Resolver {
    fn default() -> Self {
        Self::new()
    }
}

impl Resolver {
    /// Creates a resolver with builtin and known-folder definitions derived
    /// from the process environment.
    pub fn new() -> Self {
        let mut resolver = Self {
            builtin: BTreeMap::new(),
            configured: BTreeMap::new(),
            known_folders: BTreeMap::new(),
        };

        let temp_directory = std::env::var("TEMP")
            .or_else(|_| std::env::var("TMP"))
            .unwrap_or_else(|_| FALLBACK_TEMP_DIRECTORY.to_string());
        resolver.define_builtin("TempDirectory", temp_directory);

        if let Ok(profile) = std::env::var("USERPROFILE") {
            resolver.define_known_folder("Profile", profile.clone());
            resolver.define_known_folder("Desktop", format!("{profile}\\Desktop"));
            resolver.define_known_folder("Documents", format!("{profile}\\Documents"));
            resolver.define_known_folder("SavedGames", format!("{profile}\\Saved Games"));
        }
        if let Ok(local) = std::env::var("LOCALAPPDATA") {
            resolver.define_known_folder("LocalAppData", local);
        }
        if let Ok(roaming) = std::env::var("APPDATA") {
            resolver.define_known_folder("RoamingAppData", roaming);
        }

        resolver
    }

    /// Overrides or adds a builtin definition. Intended for configuration at
    /// startup and for tests that need deterministic values.
    pub fn define_builtin(&mut self, name: &str, value: impl Into<String>) {
        self.builtin.insert(strings::fold_case(name), value.into());
    }

    /// Adds a configuration-supplied definition, feeding the `CONF` domain.
    pub fn define_configured(&mut self, name: &str, value: impl Into<String>) {
        self.configured.insert(strings::fold_case(name), value.into());
    }

    /// Overrides or adds a known-folder definition.
    pub fn define_known_folder(&mut self, name: &str, value: impl Into<String>) {
        self.known_folders.insert(strings::fold_case(name), value.into());
    }

    /// Resolves every `%DOMAIN::NAME%` reference in the input. `%%` escapes a
    /// literal percent sign.
    pub fn resolve_all_references(&self, input: &str) -> Result<String> {
        let mut in_progress = HashSet::new();
        self.resolve_internal(input, &mut in_progress)
    }

    fn resolve_internal(&self, input: &str, in_progress: &mut HashSet<String>) -> Result<String> {
        let mut resolved = String::with_capacity(input.len());
        let mut remainder = input;

        while let Some(start) = remainder.find('%') {
            resolved.push_str(&remainder[..start]);
            let after_start = &remainder[start + 1..];

            if let Some(stripped) = after_start.strip_prefix('%') {
                resolved.push('%');
                remainder = stripped;
                continue;
            }

            let Some(end) = after_start.find('%') else {
                return Err(Error::Unterminated(input.to_string()));
            };
            let reference = &after_start[..end];
            resolved.push_str(&self.resolve_single_reference(reference, in_progress)?);
            remainder = &after_start[end + 1..];
        }

        resolved.push_str(remainder);
        Ok(resolved)
    }

    fn resolve_single_reference(
        &self,
        reference: &str,
        in_progress: &mut HashSet<String>,
    ) -> Result<String> {
        let Some((domain, name)) = reference.split_once("::") else {
            return Err(Error::Malformed(reference.to_string()));
        };

        let folded_reference = strings::fold_case(reference);
        if !in_progress.insert(folded_reference.clone()) {
            return Err(Error::CircularReference(reference.to_string()));
        }

        let domain_folded = strings::fold_case(domain);
        let raw_value = match domain_folded.as_str() {
            DOMAIN_BUILTIN => self.builtin.get(&strings::fold_case(name)).cloned(),
            DOMAIN_CONF => self.configured.get(&strings::fold_case(name)).cloned(),
            DOMAIN_ENV => std::env::var(name).ok(),
            DOMAIN_FOLDERID => self.known_folders.get(&strings::fold_case(name)).cloned(),
            _ => {
                in_progress.remove(&folded_reference);
                return Err(Error::UnknownDomain(reference.to_string()));
            }
        };

        let Some(raw_value) = raw_value else {
            in_progress.remove(&folded_reference);
            return Err(Error::UnresolvedName(reference.to_string()));
        };

        // Definitions may refer to other definitions.
        let resolved = self.resolve_internal(&raw_value, in_progress)?;
        in_progress.remove(&folded_reference);
        Ok(resolved)
    }
}
