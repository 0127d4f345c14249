use serde::{Deserialize, Serialize};

use crate::{
    api::modbus::{DEFAULT_BIND_HOST, DEFAULT_READ_BUFFER_SIZE},
    core::MemoryStore,
    protocol::types::{ConnectionId, ProtocolType},
};

/// Register segment as written in the configuration file
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegisterConfig {
    /// Logical address of the first word (e.g. 40001)
    pub start_addr: u32,
    /// Big-endian words as hex text, `0x` prefix and whitespace allowed
    pub hex_data: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SlaveConfig {
    pub slave_id: u8,
    #[serde(default)]
    pub registers: Vec<RegisterConfig>,
}

/// One listening port and the slaves it serves
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConnectionConfig {
    pub id: ConnectionId,
    pub port: u16,
    pub protocol_type: ProtocolType,
    #[serde(default)]
    pub slaves: Vec<SlaveConfig>,
}

/// Root configuration structure
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SimulatorConfig {
    /// Interface all listeners bind to
    #[serde(default = "default_bind_host")]
    pub bind_host: String,
    /// Bytes read from a socket per request
    #[serde(default = "default_read_buffer_size")]
    pub read_buffer_size: usize,
    pub connections: Vec<ConnectionConfig>,
}

fn default_bind_host() -> String {
    DEFAULT_BIND_HOST.to_string()
}

fn default_read_buffer_size() -> usize {
    DEFAULT_READ_BUFFER_SIZE
}

impl SimulatorConfig {
    /// Parse configuration from a JSON string
    pub fn from_json(json_str: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json_str)
    }

    /// Read configuration from a file
    pub fn from_file(file_path: &str) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(file_path)
            .map_err(|e| anyhow::anyhow!("Failed to read config '{file_path}': {e}"))?;
        Self::from_json(&content)
            .map_err(|e| anyhow::anyhow!("Failed to parse config '{file_path}': {e}"))
    }

    /// Convert to a JSON string
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }

    /// Load into a store, applying its validation. Register data comes back
    /// normalized when the result is dumped again.
    pub fn normalized(&self) -> anyhow::Result<Self> {
        MemoryStore::from_config(self)?;
        let mut config = self.clone();
        for slave in config
            .connections
            .iter_mut()
            .flat_map(|conn| conn.slaves.iter_mut())
        {
            for reg in &mut slave.registers {
                reg.hex_data = crate::utils::hex::normalize_hex(&reg.hex_data);
            }
        }
        Ok(config)
    }
}
