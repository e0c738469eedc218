use serde::{Deserialize, Serialize};

use crate::types::ServerLifecycleState;

/// Network counters reported with each stats update.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct NetworkStats {
    #[serde(default)]
    pub rx_bytes: u64,
    #[serde(default)]
    pub tx_bytes: u64,
}

/// Resource usage of the managed process.
///
/// Replaced wholesale on every `stats` event, never patched in place.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResourceSnapshot {
    #[serde(default, alias = "cpu")]
    pub cpu_absolute: f64,
    #[serde(default)]
    pub memory_bytes: u64,
    #[serde(default)]
    pub memory_limit_bytes: u64,
    #[serde(default)]
    pub disk_bytes: u64,
    /// Milliseconds since the process started.
    #[serde(default)]
    pub uptime: u64,
    #[serde(default)]
    pub network: NetworkStats,
    /// Raw lifecycle string the snapshot was reported with.
    #[serde(default = "offline")]
    pub state: String,
}

fn offline() -> String {
    ServerLifecycleState::Offline.as_str().to_string()
}

impl Default for ResourceSnapshot {
    fn default() -> Self {
        Self {
            cpu_absolute: 0.0,
            memory_bytes: 0,
            memory_limit_bytes: 0,
            disk_bytes: 0,
            uptime: 0,
            network: NetworkStats::default(),
            state: offline(),
        }
    }
}

impl ResourceSnapshot {
    /// Lifecycle state derived from the embedded state string.
    pub fn lifecycle(&self) -> ServerLifecycleState {
        ServerLifecycleState::from_wire(&self.state)
    }
}
