//! Command execution against the host and the debug bridge
//!
//! Every invocation returns a [`CommandResult`]; failures are encoded in it
//! rather than raised, so callers can apply the same substring checks to
//! whatever came back.

mod dumpsys;
mod logcat;
mod runner;

pub use dumpsys::DUMPSYS_TIMEOUT_MESSAGE;
pub use logcat::{find_error_context, NO_CONTEXT_MESSAGE};
pub use runner::{
    decode_permissive, CommandResult, CommandRunner, ErrorKind, ERROR_PREFIX, TIMEOUT_MESSAGE,
};

#[cfg(all(test, unix))]
pub(crate) mod test_support {
    use std::path::Path;

    use super::CommandRunner;

    /// A runner whose bridge is `sh <script>`
    ///
    /// The script is read by `sh` rather than executed, which avoids ETXTBSY
    /// when tests in other threads fork while the file is being written.
    pub fn fake_bridge(dir: &Path, body: &str) -> CommandRunner {
        let script = dir.join("fake-adb.sh");
        std::fs::write(&script, format!("{}\n", body)).unwrap();
        CommandRunner::new("sh").with_bridge_args(vec![script.display().to_string()])
    }
}
