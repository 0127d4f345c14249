//! In-memory configuration backend
//!
//! Holds connections, their slaves and register segments, and serves them to
//! the protocol engine through [`RegisterLookup`] and [`ConnectionTree`].
//! Mutations apply the same uniqueness and range checks a persistent backend
//! would; the engine itself only ever reads.

use anyhow::Result;
use async_trait::async_trait;
use derive_more::{Display, Error};
use parking_lot::RwLock;
use std::collections::{BTreeMap, HashMap};

use crate::{
    api::modbus::traits::{ConnectionTree, RegisterLookup},
    cli::config::SimulatorConfig,
    protocol::types::{ConnectionId, ConnectionNode, ProtocolType, RegisterMode, RegisterSegment},
    utils::hex::{is_hex, normalize_hex, word_count},
};

/// Valid slave ids for a Modbus serial line
pub const SLAVE_ID_RANGE: std::ops::RangeInclusive<u8> = 1..=247;

#[derive(Debug, Clone, PartialEq, Eq, Display, Error)]
pub enum StoreError {
    #[display("connection {id} already exists")]
    DuplicateConnectionId { id: ConnectionId },
    #[display("port {port} is already bound to connection {id}")]
    DuplicatePort { port: u16, id: ConnectionId },
    #[display("connection {id} does not exist")]
    UnknownConnection { id: ConnectionId },
    #[display("slave {slave_id} is outside 1..=247")]
    SlaveIdOutOfRange { slave_id: u8 },
    #[display("slave {slave_id} already exists on connection {id}")]
    DuplicateSlave { id: ConnectionId, slave_id: u8 },
    #[display("slave {slave_id} does not exist on connection {id}")]
    UnknownSlave { id: ConnectionId, slave_id: u8 },
    #[display("register data is not a whole number of hex words: {hex_data:?}")]
    InvalidHex { hex_data: String },
    #[display("registers {start}..={end} do not fit in a single address range")]
    AddressOutOfRange { start: u32, end: u32 },
}

#[derive(Debug, Clone)]
struct ConnectionEntry {
    port: u16,
    protocol_type: ProtocolType,
    /// slave id -> start address -> normalized segment
    slaves: BTreeMap<u8, BTreeMap<u32, RegisterSegment>>,
}

#[derive(Debug, Default)]
struct StoreInner {
    connections: BTreeMap<ConnectionId, ConnectionEntry>,
}

impl StoreInner {
    fn connection_mut(&mut self, id: ConnectionId) -> Result<&mut ConnectionEntry, StoreError> {
        self.connections
            .get_mut(&id)
            .ok_or(StoreError::UnknownConnection { id })
    }
}

/// Thread-safe store backing the simulator
#[derive(Debug, Default)]
pub struct MemoryStore {
    inner: RwLock<StoreInner>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a store from a parsed configuration file
    pub fn from_config(config: &SimulatorConfig) -> Result<Self> {
        let store = Self::new();
        for conn in &config.connections {
            store.add_connection(conn.id, conn.port, conn.protocol_type)?;
            for slave in &conn.slaves {
                store.add_slave(conn.id, slave.slave_id)?;
                for reg in &slave.registers {
                    store.upsert_segment(conn.id, slave.slave_id, reg.start_addr, &reg.hex_data)?;
                }
            }
        }
        Ok(store)
    }

    pub fn add_connection(
        &self,
        id: ConnectionId,
        port: u16,
        protocol_type: ProtocolType,
    ) -> Result<(), StoreError> {
        let mut inner = self.inner.write();
        if inner.connections.contains_key(&id) {
            return Err(StoreError::DuplicateConnectionId { id });
        }
        if let Some((other, _)) = inner.connections.iter().find(|(_, c)| c.port == port) {
            return Err(StoreError::DuplicatePort { port, id: *other });
        }
        inner.connections.insert(
            id,
            ConnectionEntry {
                port,
                protocol_type,
                slaves: BTreeMap::new(),
            },
        );
        Ok(())
    }

    pub fn remove_connection(&self, id: ConnectionId) -> Result<(), StoreError> {
        self.inner
            .write()
            .connections
            .remove(&id)
            .map(|_| ())
            .ok_or(StoreError::UnknownConnection { id })
    }

    pub fn add_slave(&self, id: ConnectionId, slave_id: u8) -> Result<(), StoreError> {
        if !SLAVE_ID_RANGE.contains(&slave_id) {
            return Err(StoreError::SlaveIdOutOfRange { slave_id });
        }
        let mut inner = self.inner.write();
        let conn = inner.connection_mut(id)?;
        if conn.slaves.contains_key(&slave_id) {
            return Err(StoreError::DuplicateSlave { id, slave_id });
        }
        conn.slaves.insert(slave_id, BTreeMap::new());
        Ok(())
    }

    /// Insert a segment, replacing any segment with the same start address.
    ///
    /// The stored hex text is normalized. The whole segment must lie inside
    /// one logical address range.
    pub fn upsert_segment(
        &self,
        id: ConnectionId,
        slave_id: u8,
        start_addr: u32,
        hex_data: &str,
    ) -> Result<(), StoreError> {
        let hex = normalize_hex(hex_data);
        let words = word_count(&hex) as u32;
        if words == 0 || hex.len() % 4 != 0 || !is_hex(&hex) {
            return Err(StoreError::InvalidHex {
                hex_data: hex_data.to_string(),
            });
        }
        let end = start_addr.checked_add(words - 1);
        let fits = end.is_some_and(|end| {
            RegisterMode::for_logical_address(start_addr)
                .is_some_and(|mode| mode.logical_range().contains(end))
        });
        if !fits {
            let end = end.unwrap_or(u32::MAX);
            return Err(StoreError::AddressOutOfRange {
                start: start_addr,
                end,
            });
        }

        let mut inner = self.inner.write();
        let conn = inner.connection_mut(id)?;
        let slave = conn
            .slaves
            .get_mut(&slave_id)
            .ok_or(StoreError::UnknownSlave { id, slave_id })?;
        slave.insert(start_addr, RegisterSegment::new(slave_id, start_addr, hex));
        Ok(())
    }

    pub fn remove_segment(
        &self,
        id: ConnectionId,
        slave_id: u8,
        start_addr: u32,
    ) -> Result<bool, StoreError> {
        let mut inner = self.inner.write();
        let conn = inner.connection_mut(id)?;
        let slave = conn
            .slaves
            .get_mut(&slave_id)
            .ok_or(StoreError::UnknownSlave { id, slave_id })?;
        Ok(slave.remove(&start_addr).is_some())
    }

    /// `port -> connection id` for every configured connection
    pub fn port_map(&self) -> HashMap<u16, ConnectionId> {
        self.inner
            .read()
            .connections
            .iter()
            .map(|(id, conn)| (conn.port, *id))
            .collect()
    }
}

#[async_trait]
impl RegisterLookup for MemoryStore {
    async fn registers_by_slave(&self, port: u16, slave_id: u8) -> Result<Vec<RegisterSegment>> {
        let inner = self.inner.read();
        let segments = inner
            .connections
            .values()
            .find(|conn| conn.port == port)
            .and_then(|conn| conn.slaves.get(&slave_id))
            .map(|slave| slave.values().cloned().collect())
            .unwrap_or_default();
        Ok(segments)
    }
}

#[async_trait]
impl ConnectionTree for MemoryStore {
    async fn connections_tree(&self) -> Result<Vec<ConnectionNode>> {
        Ok(self
            .inner
            .read()
            .connections
            .iter()
            .map(|(id, conn)| ConnectionNode {
                id: *id,
                protocol_type: conn.protocol_type,
                port: conn.port,
            })
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn store() -> MemoryStore {
        let store = MemoryStore::new();
        store.add_connection(1, 5020, ProtocolType::Tcp).unwrap();
        store.add_slave(1, 1).unwrap();
        store
    }

    #[test]
    fn test_connection_uniqueness() {
        let store = store();
        assert_eq!(
            store.add_connection(1, 5021, ProtocolType::Tcp),
            Err(StoreError::DuplicateConnectionId { id: 1 })
        );
        assert_eq!(
            store.add_connection(2, 5020, ProtocolType::RtuOverTcp),
            Err(StoreError::DuplicatePort { port: 5020, id: 1 })
        );
        assert!(store.add_connection(2, 5021, ProtocolType::RtuOverTcp).is_ok());
        assert_eq!(store.port_map().len(), 2);
    }

    #[test]
    fn test_slave_checks() {
        let store = store();
        assert_eq!(
            store.add_slave(1, 0),
            Err(StoreError::SlaveIdOutOfRange { slave_id: 0 })
        );
        assert_eq!(
            store.add_slave(1, 248),
            Err(StoreError::SlaveIdOutOfRange { slave_id: 248 })
        );
        assert_eq!(
            store.add_slave(1, 1),
            Err(StoreError::DuplicateSlave { id: 1, slave_id: 1 })
        );
        assert_eq!(
            store.add_slave(9, 1),
            Err(StoreError::UnknownConnection { id: 9 })
        );
    }

    #[test]
    fn test_segment_validation() {
        let store = store();
        assert!(store.upsert_segment(1, 1, 40001, "0x1234 5678").is_ok());
        assert!(matches!(
            store.upsert_segment(1, 1, 40001, "12"),
            Err(StoreError::InvalidHex { .. })
        ));
        assert!(matches!(
            store.upsert_segment(1, 1, 40001, "12xz"),
            Err(StoreError::InvalidHex { .. })
        ));
        assert_eq!(
            store.upsert_segment(1, 1, 49999, "0001 0002"),
            Err(StoreError::AddressOutOfRange {
                start: 49999,
                end: 50000
            })
        );
        assert_eq!(
            store.upsert_segment(1, 1, 20000, "0001"),
            Err(StoreError::AddressOutOfRange {
                start: 20000,
                end: 20000
            })
        );
        assert_eq!(
            store.upsert_segment(1, 2, 40001, "0001"),
            Err(StoreError::UnknownSlave { id: 1, slave_id: 2 })
        );
    }

    #[test]
    fn test_segment_end_overflow_is_out_of_range() {
        let store = store();
        assert_eq!(
            store.upsert_segment(1, 1, u32::MAX, "0001 0002"),
            Err(StoreError::AddressOutOfRange {
                start: u32::MAX,
                end: u32::MAX
            })
        );
    }

    #[test]
    fn test_from_config_rejects_huge_start_addr() {
        let config = SimulatorConfig::from_json(
            r#"{ "connections": [ { "id": 1, "port": 5020, "protocol_type": "tcp",
                "slaves": [ { "slave_id": 1,
                    "registers": [ { "start_addr": 4294967295, "hex_data": "0001 0002" } ] } ] } ] }"#,
        )
        .unwrap();
        let err = MemoryStore::from_config(&config).unwrap_err();
        assert!(matches!(
            err.downcast_ref::<StoreError>(),
            Some(StoreError::AddressOutOfRange { .. })
        ));
    }

    #[tokio::test]
    async fn test_lookup_by_port_and_slave() -> Result<()> {
        let store = store();
        store.upsert_segment(1, 1, 40002, "5678")?;
        store.upsert_segment(1, 1, 40001, "1234")?;
        store.upsert_segment(1, 1, 40001, "0x4321")?;

        let segments = store.registers_by_slave(5020, 1).await?;
        assert_eq!(
            segments,
            vec![
                RegisterSegment::new(1, 40001, "4321"),
                RegisterSegment::new(1, 40002, "5678"),
            ]
        );
        assert!(store.registers_by_slave(5020, 7).await?.is_empty());
        assert!(store.registers_by_slave(6000, 1).await?.is_empty());

        assert!(store.remove_segment(1, 1, 40002)?);
        assert!(!store.remove_segment(1, 1, 40002)?);
        assert_eq!(store.registers_by_slave(5020, 1).await?.len(), 1);
        Ok(())
    }

    #[tokio::test]
    async fn test_connection_tree() -> Result<()> {
        let store = store();
        store.add_connection(2, 5021, ProtocolType::RtuOverTcp)?;
        let tree = store.connections_tree().await?;
        assert_eq!(
            tree,
            vec![
                ConnectionNode {
                    id: 1,
                    protocol_type: ProtocolType::Tcp,
                    port: 5020
                },
                ConnectionNode {
                    id: 2,
                    protocol_type: ProtocolType::RtuOverTcp,
                    port: 5021
                },
            ]
        );
        store.remove_connection(1)?;
        assert_eq!(store.connections_tree().await?.len(), 1);
        Ok(())
    }
}
