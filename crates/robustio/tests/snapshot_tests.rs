use robustio::{EphemeralTable, Error, RetryPolicy, RobustnessConfig};
use std::io;

#[test]
fn snapshot_error_messages() {
    let errors = [
        Error::io("cache/index.bin", io::Error::new(io::ErrorKind::Other, "locked")),
        Error::link(
            "rename",
            "cache/.index.tmp",
            "cache/index.bin",
            io::Error::new(io::ErrorKind::Other, "sharing violation"),
        ),
        Error::syscall("fsync", "cache/.index.tmp", io::Error::new(io::ErrorKind::Other, "io")),
        Error::UnsupportedFormat {
            extension: "ini".into(),
        },
    ];

    let rendered = errors
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("\n")
        .replace('\\', "/");

    insta::assert_snapshot!(rendered, @r###"
    I/O error at cache/index.bin: locked
    rename cache/.index.tmp -> cache/index.bin: sharing violation
    fsync failed for cache/.index.tmp: io
    Unsupported config format: ini
    "###);
}

#[test]
fn snapshot_windows_config_json() {
    let config = RobustnessConfig {
        enable_fsync: true,
        ephemeral_codes: EphemeralTable::windows(),
        retry: RetryPolicy::default(),
        jitter_seed: None,
    };

    let json = serde_json::to_string(&config).unwrap();

    insta::assert_snapshot!(json, @r###"{"enable_fsync":true,"ephemeral_codes":[2,5,32],"retry":{"initial_sleep_ms":1,"budget_ms":500}}"###);
}
