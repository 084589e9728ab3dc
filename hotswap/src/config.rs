// Invocation settings handed to the core by the command line

use std::path::PathBuf;

/// Where the target VM listens and where class files live
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HotSwapConfig {
    pub host: String,
    pub port: String,
    pub base_path: PathBuf,
    /// Attach timeout in milliseconds, passed to the connector's timeout slot
    pub timeout_ms: Option<u64>,
}

impl HotSwapConfig {
    pub fn new(host: impl Into<String>, port: impl Into<String>, base_path: impl Into<PathBuf>) -> Self {
        Self {
            host: host.into(),
            port: port.into(),
            base_path: base_path.into(),
            timeout_ms: None,
        }
    }

    pub fn with_timeout_ms(mut self, timeout_ms: u64) -> Self {
        self.timeout_ms = Some(timeout_ms);
        self
    }
}
