//! Process-wide resources with explicit initialization and teardown.
//!
//! The variable resolver and the set of temporary paths awaiting cleanup are
//! shared by the whole engine but are deliberately not implicit statics:
//! hosts construct them once, pass references down, and tests substitute
//! their own instances.

use std::collections::BTreeSet;
use std::sync::Mutex;

use crate::config::ConfigurationData;
use crate::native::NativeFilesystem;
use crate::resolver::Resolver;
use crate::status::NtStatus;
use crate::strings;

/// Temporary directory paths generated during director builds, to be removed
/// when the engine is torn down. Paths compare case-insensitively.
#[derive(Default)]
pub struct TemporaryPathRegistry {
    paths: Mutex<BTreeSet<String>>,
}

impl TemporaryPathRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a path for cleanup at teardown.
    pub fn register(&self, path: impl Into<String>) {
        self.paths.lock().expect("temporary path registry lock poisoned").insert(path.into());
    }

    pub fn contains(&self, path: &str) -> bool {
        self.paths
            .lock()
            .expect("temporary path registry lock poisoned")
            .iter()
            .any(|registered| strings::eq_ignore_case(registered, path))
    }

    pub fn len(&self) -> usize {
        self.paths.lock().expect("temporary path registry lock poisoned").len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Removes and returns every registered path.
    pub fn drain(&self) -> Vec<String> {
        let mut paths = self.paths.lock().expect("temporary path registry lock poisoned");
        std::mem::take(&mut *paths).into_iter().collect()
    }
}

/// Engine-wide state constructed once by the host.
pub struct EngineState {
    resolver: Resolver,
    temporary_paths: TemporaryPathRegistry,
}

impl EngineState {
    /// Initializes engine state, feeding configuration definitions into the
    /// resolver's `CONF` domain.
    pub fn initialize(configuration: &ConfigurationData) -> Self {
        let mut resolver = Resolver::new();
        for (name, value) in configuration.definitions() {
            resolver.define_configured(name, value.clone());
        }
        Self { resolver, temporary_paths: TemporaryPathRegistry::new() }
    }

    pub fn resolver(&self) -> &Resolver {
        &self.resolver
    }

    pub fn resolver_mut(&mut self) -> &mut Resolver {
        &mut self.resolver
    }

    pub fn temporary_paths(&self) -> &TemporaryPathRegistry {
        &self.temporary_paths
    }

    /// Drains the temporary path registry and deletes each path through the
    /// native layer. Failures are logged and do not stop the cleanup.
    pub fn teardown(&self, native: &dyn NativeFilesystem) {
        for path in self.temporary_paths.drain() {
            let delete_status = native.delete(&path);
            if delete_status != NtStatus::SUCCESS
                && delete_status != NtStatus::OBJECT_NAME_NOT_FOUND
            {
                tracing::warn!(path = %path, status = %delete_status, "failed to clean temporary path");
            }
        }
    }
}
