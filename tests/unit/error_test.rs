//! Tests for error types

use hearthkit::core::ToolkitError;

#[test]
fn test_illegal_state_error() {
    let err = ToolkitError::IllegalState("already started".to_string());
    assert_eq!(format!("{}", err), "illegal state: already started");
}

#[test]
fn test_duplicate_listener_error() {
    let err = ToolkitError::DuplicateListener;
    assert_eq!(format!("{}", err), "listener already registered");
}

#[test]
fn test_invalid_argument_error() {
    let err = ToolkitError::InvalidArgument("window must be positive".to_string());
    assert_eq!(format!("{}", err), "invalid argument: window must be positive");
}

#[test]
fn test_executor_not_running_error() {
    let err = ToolkitError::ExecutorNotRunning("plug-1".to_string());
    assert_eq!(format!("{}", err), "executor `plug-1` is not running");
}

#[test]
fn test_converts_into_anyhow() {
    let err: anyhow::Error = ToolkitError::DuplicateListener.into();
    assert_eq!(
        err.downcast_ref::<ToolkitError>(),
        Some(&ToolkitError::DuplicateListener)
    );
}
