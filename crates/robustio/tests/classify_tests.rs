use robustio::{Classifier, EphemeralTable, Error, Operation, PlatformErrorCode};
use rstest::rstest;
use std::io;

fn windows() -> Classifier {
    Classifier::new(EphemeralTable::windows())
}

#[rstest]
#[case::access_denied(5, true)]
#[case::file_not_found(2, true)]
#[case::sharing_violation(32, true)]
#[case::path_not_found(3, false)]
#[case::invalid_parameter(87, false)]
#[case::disk_full(112, false)]
fn generic_classification(#[case] code: i32, #[case] ephemeral: bool) {
    let err = io::Error::from_raw_os_error(code);
    assert_eq!(windows().is_ephemeral(&err), ephemeral);
}

#[rstest]
#[case::rename_not_found(Operation::Rename, 2, true)]
#[case::remove_not_found(Operation::RemoveAll, 2, true)]
#[case::read_not_found(Operation::ReadFile, 2, false)]
#[case::read_access_denied(Operation::ReadFile, 5, true)]
#[case::read_sharing_violation(Operation::ReadFile, 32, true)]
#[case::rename_sharing_violation(Operation::Rename, 32, true)]
#[case::remove_invalid_parameter(Operation::RemoveAll, 87, false)]
fn per_operation_retryability(#[case] op: Operation, #[case] code: i32, #[case] retryable: bool) {
    let err = Error::io("some/path", io::Error::from_raw_os_error(code));
    assert_eq!(windows().is_retryable(op, &err), retryable);
}

#[rstest]
#[case::path_wrapper(Error::io("a", io::Error::from_raw_os_error(32)))]
#[case::link_wrapper(Error::link("rename", "a", "b", io::Error::from_raw_os_error(32)))]
#[case::syscall_wrapper(Error::syscall("fsync", "a", io::Error::from_raw_os_error(32)))]
fn wrappers_are_looked_through(#[case] err: Error) {
    assert!(windows().is_ephemeral(&err));
}

#[test]
fn error_without_code_is_never_ephemeral() {
    let err = Error::io("a", io::Error::new(io::ErrorKind::PermissionDenied, "denied"));
    assert!(!windows().is_ephemeral(&err));
    assert!(!windows().is_retryable(Operation::Rename, &err));
}

#[test]
fn config_errors_are_never_ephemeral() {
    let err = Error::ConfigParse {
        path: "x.toml".into(),
        format: "TOML".into(),
        message: "bad".into(),
    };
    assert!(!windows().is_ephemeral(&err));
}

#[test]
fn only_one_wrapper_level_is_inspected() {
    // An io::Error that itself wraps a coded error hides the code
    let inner = io::Error::from_raw_os_error(32);
    let nested = io::Error::new(io::ErrorKind::Other, inner);
    let err = Error::io("a", nested);

    assert!(!windows().is_ephemeral(&err));
}

#[test]
fn custom_table_extends_allow_list() {
    let mut table = EphemeralTable::windows();
    table.set(PlatformErrorCode::new(33), true);
    let classifier = Classifier::new(table);

    assert!(classifier.is_ephemeral(&io::Error::from_raw_os_error(33)));
}
