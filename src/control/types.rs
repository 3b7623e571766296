/*!
 * Process Control Types
 */

use serde::{Deserialize, Serialize};

/// Backend family a controller belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PlatformType {
    /// Linux pidfd + SIGSTOP/SIGCONT
    LinuxPidfd,
    /// Plain kill(2) with SIGSTOP/SIGCONT
    UnixSignal,
    /// In-memory simulation
    Simulation,
    /// No suspend primitive available
    Unsupported,
}

impl std::fmt::Display for PlatformType {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        let name = match self {
            PlatformType::LinuxPidfd => "Linux (pidfd)",
            PlatformType::UnixSignal => "Unix (signals)",
            PlatformType::Simulation => "Simulation",
            PlatformType::Unsupported => "Unsupported",
        };
        f.write_str(name)
    }
}
