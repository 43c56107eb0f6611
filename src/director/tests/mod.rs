#![cfg(test)]

mod queries;

use std::sync::Arc;

use crate::director::builder::FilesystemDirectorBuilder;
use crate::director::FilesystemDirector;
use crate::globals::TemporaryPathRegistry;
use crate::mock_filesystem::MockFilesystem;
use crate::resolver::Resolver;
use crate::rule::RedirectMode;

/// One rule description for test director construction.
pub(crate) struct TestRule {
    pub name: &'static str,
    pub origin: &'static str,
    pub target: &'static str,
    pub patterns: &'static [&'static str],
    pub mode: RedirectMode,
}

impl TestRule {
    pub(crate) fn simple(name: &'static str, origin: &'static str, target: &'static str) -> Self {
        Self { name, origin, target, patterns: &[], mode: RedirectMode::Simple }
    }

    pub(crate) fn overlay(name: &'static str, origin: &'static str, target: &'static str) -> Self {
        Self { name, origin, target, patterns: &[], mode: RedirectMode::Overlay }
    }

    pub(crate) fn with_patterns(mut self, patterns: &'static [&'static str]) -> Self {
        self.patterns = patterns;
        self
    }
}

/// Builds a director over the supplied rules, with every origin and target
/// parent present in the mock filesystem so no auto-generation kicks in.
pub(crate) fn director_with_rules(
    filesystem: Arc<MockFilesystem>,
    rules: &[TestRule],
) -> FilesystemDirector {
    let resolver = Resolver::new();
    let registry = TemporaryPathRegistry::new();
    let mut builder = FilesystemDirectorBuilder::new(filesystem, &resolver, &registry);

    for rule in rules {
        builder
            .add_rule(
                rule.name.to_string(),
                rule.origin,
                rule.target,
                rule.patterns.iter().map(|p| p.to_string()).collect(),
                rule.mode,
            )
            .expect("test rule must be valid");
    }

    builder.build().expect("test rule set must build")
}

/// Mock filesystem pre-populated with the directories tests lean on.
pub(crate) fn filesystem_with_directories(directories: &[&str]) -> Arc<MockFilesystem> {
    let filesystem = Arc::new(MockFilesystem::new());
    for directory in directories {
        filesystem.add_directory(directory);
    }
    filesystem
}
