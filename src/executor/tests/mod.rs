#![cfg(test)]

mod rename;

use std::sync::Arc;

use crate::executor::RequestTag;
use crate::instruction::{
    CreateDispositionPreference, FileOperationInstruction, NameAssociation, PreOperations,
    TryFiles,
};
use crate::mock_filesystem::MockFilesystem;
use crate::native::NativeFilesystem;

pub(crate) fn tag() -> RequestTag<'static> {
    RequestTag::new("TestEntryPoint", 1)
}

/// Routes engine logs through the test harness when `RUST_LOG` asks for
/// them. Safe to call from every test; only the first call installs the
/// subscriber.
pub(crate) fn init_test_logging() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

pub(crate) fn native_pair() -> (Arc<MockFilesystem>, Arc<dyn NativeFilesystem>) {
    init_test_logging();
    let mock = Arc::new(MockFilesystem::new());
    let native: Arc<dyn NativeFilesystem> = mock.clone();
    (mock, native)
}

/// Instruction redirecting to one path with everything else configurable.
pub(crate) fn redirect_instruction(
    redirected: &str,
    try_files: TryFiles,
    name_association: NameAssociation,
) -> FileOperationInstruction {
    FileOperationInstruction::new(
        Some(redirected.to_string()),
        try_files,
        CreateDispositionPreference::NoPreference,
        name_association,
        PreOperations::empty(),
        None,
    )
}
