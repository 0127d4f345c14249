pub mod core;
pub mod server;
pub mod traits;

use anyhow::{anyhow, Result};
use parking_lot::RwLock;
use std::{collections::HashMap, sync::Arc};

// Re-export protocol types used by API consumers
pub use crate::protocol::{
    modbus::ModbusException,
    types::{
        ConnectionId, ConnectionInfo, ConnectionNode, ProtocolContext, ProtocolType, RegisterMode,
        RegisterSegment,
    },
};

pub use server::{ModbusServer, ServerError};
pub use traits::{
    ChannelHook, ConnectionTree, LoggingHook, ModbusHook, NoOpHook, RegisterLookup, ServerEvent,
};

use crate::protocol::modbus::TCP_MIN_FRAME_LEN;

pub const DEFAULT_BIND_HOST: &str = "0.0.0.0";
pub const DEFAULT_READ_BUFFER_SIZE: usize = 512;

/// Builder for a [`ModbusServer`].
///
/// # Middleware Pattern
///
/// Hooks added with `.add_hook()` observe every connection's traffic and are
/// executed in the order they were added.
///
/// # Example
///
/// ```no_run
/// use modsim::api::modbus::{LoggingHook, ModbusServerBuilder};
/// use modsim::core::MemoryStore;
/// use std::sync::Arc;
///
/// # async fn run() -> anyhow::Result<()> {
/// let store = Arc::new(MemoryStore::new());
/// let server = ModbusServerBuilder::new(store.clone(), store.clone())
///     .with_bind_host("127.0.0.1")
///     .add_hook(Arc::new(LoggingHook))
///     .build()?;
/// server.start(store.port_map()).await?;
/// # Ok(())
/// # }
/// ```
pub struct ModbusServerBuilder {
    lookup: Arc<dyn RegisterLookup>,
    tree: Arc<dyn ConnectionTree>,
    bind_host: String,
    read_buffer_size: usize,
    hooks: Vec<Arc<dyn ModbusHook>>,
}

impl ModbusServerBuilder {
    pub fn new(lookup: Arc<dyn RegisterLookup>, tree: Arc<dyn ConnectionTree>) -> Self {
        Self {
            lookup,
            tree,
            bind_host: DEFAULT_BIND_HOST.to_string(),
            read_buffer_size: DEFAULT_READ_BUFFER_SIZE,
            hooks: Vec::new(),
        }
    }

    /// Interface every listener binds to
    pub fn with_bind_host(mut self, host: impl Into<String>) -> Self {
        self.bind_host = host.into();
        self
    }

    /// Bytes read from a socket per request
    pub fn with_read_buffer_size(mut self, size: usize) -> Self {
        self.read_buffer_size = size;
        self
    }

    pub fn add_hook(mut self, hook: Arc<dyn ModbusHook>) -> Self {
        self.hooks.push(hook);
        self
    }

    pub fn build(self) -> Result<ModbusServer> {
        if self.bind_host.trim().is_empty() {
            return Err(anyhow!("Bind host must not be empty"));
        }
        if self.read_buffer_size < TCP_MIN_FRAME_LEN {
            return Err(anyhow!(
                "Read buffer of {} bytes cannot hold a request (need at least {TCP_MIN_FRAME_LEN})",
                self.read_buffer_size
            ));
        }

        let shared = core::ConnectionShared {
            lookup: self.lookup,
            bindings: RwLock::new(HashMap::new()),
            hooks: self.hooks,
            read_buffer_size: self.read_buffer_size,
        };
        Ok(ModbusServer::new(self.tree, shared, self.bind_host))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::MemoryStore;

    #[test]
    fn test_builder_validation() {
        let store = Arc::new(MemoryStore::new());

        assert!(ModbusServerBuilder::new(store.clone(), store.clone())
            .build()
            .is_ok());
        assert!(ModbusServerBuilder::new(store.clone(), store.clone())
            .with_bind_host(" ")
            .build()
            .is_err());
        assert!(ModbusServerBuilder::new(store.clone(), store.clone())
            .with_read_buffer_size(4)
            .build()
            .is_err());
    }

    #[tokio::test]
    async fn test_start_rejects_empty_map() -> Result<()> {
        let store = Arc::new(MemoryStore::new());
        let server = ModbusServerBuilder::new(store.clone(), store.clone()).build()?;

        let err = server.start(HashMap::new()).await.unwrap_err();
        assert_eq!(
            err.downcast_ref::<ServerError>(),
            Some(&ServerError::EmptyPortMap)
        );
        assert!(server.active_ports().is_empty());
        Ok(())
    }

    #[tokio::test]
    async fn test_start_rejects_unknown_connection_before_binding() -> Result<()> {
        let store = Arc::new(MemoryStore::new());
        store.add_connection(1, 0, ProtocolType::Tcp)?;
        let server = ModbusServerBuilder::new(store.clone(), store.clone())
            .with_bind_host("127.0.0.1")
            .build()?;

        let err = server
            .start(HashMap::from([(0, 1), (1, 9)]))
            .await
            .unwrap_err();
        assert_eq!(
            err.downcast_ref::<ServerError>(),
            Some(&ServerError::UnknownConnection { port: 1, id: 9 })
        );
        assert!(server.active_ports().is_empty());
        Ok(())
    }
}
