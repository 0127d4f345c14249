use serde::{Deserialize, Serialize};
use std::{fmt, net::SocketAddr};
use num_enum::TryFromPrimitive;
use strum::EnumIter;

/// Identifier of a configured connection (one listening port)
pub type ConnectionId = u32;

/// Wire variant served on a port
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProtocolType {
    /// Standard Modbus TCP with MBAP header
    Tcp,
    /// Modbus RTU frames (CRC16, no MBAP) carried over a TCP stream
    #[serde(alias = "rtu")]
    RtuOverTcp,
}

impl fmt::Display for ProtocolType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProtocolType::Tcp => write!(f, "tcp"),
            ProtocolType::RtuOverTcp => write!(f, "rtu_over_tcp"),
        }
    }
}

/// Register categories, numbered after the read function code that serves them
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, EnumIter, TryFromPrimitive)]
#[repr(u8)]
pub enum RegisterMode {
    Coils = 1,
    DiscreteInputs = 2,
    Holding = 3,
    Input = 4,
}

impl fmt::Display for RegisterMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RegisterMode::Coils => write!(f, "coils"),
            RegisterMode::DiscreteInputs => write!(f, "discrete_inputs"),
            RegisterMode::Holding => write!(f, "holding"),
            RegisterMode::Input => write!(f, "input"),
        }
    }
}

/// A block of consecutive register words stored for one slave.
///
/// `hex_data` holds big-endian words as hex text; the segment covers
/// `start_addr ..= start_addr + word_count - 1` in the logical address space.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegisterSegment {
    pub slave_id: u8,
    pub start_addr: u32,
    pub hex_data: String,
}

impl RegisterSegment {
    pub fn new(slave_id: u8, start_addr: u32, hex_data: impl Into<String>) -> Self {
        Self {
            slave_id,
            start_addr,
            hex_data: hex_data.into(),
        }
    }
}

/// Port binding resolved once when a listener starts
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ConnectionInfo {
    pub id: ConnectionId,
    pub protocol_type: ProtocolType,
}

/// One entry of the connection tree served by the configuration backend
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConnectionNode {
    pub id: ConnectionId,
    pub protocol_type: ProtocolType,
    pub port: u16,
}

/// Per-connection context, created when a socket is accepted
#[derive(Debug, Clone)]
pub struct ProtocolContext {
    pub connection_id: uuid::Uuid,
    pub local_port: u16,
    pub remote_endpoint: SocketAddr,
}

impl ProtocolContext {
    pub fn new(local_port: u16, remote_endpoint: SocketAddr) -> Self {
        Self {
            connection_id: uuid::Uuid::new_v4(),
            local_port,
            remote_endpoint,
        }
    }
}
