#![allow(unused_crate_dependencies)]
//! Test utilities for CLI crate integration tests.
#![allow(missing_docs)]
#![allow(dead_code)]

use std::fs;
use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Run the given future with a timeout, failing the test if it elapses.
///
/// # Panics
///
/// Panics if the timeout elapses before the future completes.
pub async fn run_with_timeout<F, T>(duration: Duration, fut: F) -> T
where
    F: std::future::Future<Output = T>,
{
    tokio::time::timeout(duration, fut)
        .await
        .expect("test timed out")
}

/// A stand-in `systemctl` that records its arguments
///
/// Every invocation appends one line to `calls.log`. `show` prints the
/// contents of `state` (the unit's ActiveState). `fail` makes the named
/// subcommand exit with status 1.
pub struct FakeSystemctl {
    pub dir: PathBuf,
    pub binary: PathBuf,
}

impl FakeSystemctl {
    pub fn new(dir: &Path) -> Self {
        let binary = dir.join("systemctl");
        let script = format!(
            "#!/bin/sh\n\
             echo \"$*\" >> '{dir}/calls.log'\n\
             if [ -f '{dir}/fail' ] && [ \"$1\" = \"$(cat '{dir}/fail')\" ]; then\n\
               echo \"$1 refused\" >&2\n\
               exit 1\n\
             fi\n\
             if [ \"$1\" = show ]; then\n\
               cat '{dir}/state' 2>/dev/null || echo inactive\n\
             fi\n\
             exit 0\n",
            dir = dir.display()
        );
        fs::write(&binary, script).unwrap();
        fs::set_permissions(&binary, fs::Permissions::from_mode(0o755)).unwrap();
        Self {
            dir: dir.to_path_buf(),
            binary,
        }
    }

    pub fn set_state(&self, state: &str) {
        fs::write(self.dir.join("state"), format!("{}\n", state)).unwrap();
    }

    pub fn fail_on(&self, subcommand: &str) {
        fs::write(self.dir.join("fail"), subcommand).unwrap();
    }

    pub fn calls(&self) -> Vec<String> {
        fs::read_to_string(self.dir.join("calls.log"))
            .unwrap_or_default()
            .lines()
            .map(str::to_string)
            .collect()
    }
}
