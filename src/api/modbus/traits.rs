//! Collaborator and observer interfaces of the simulator
//!
//! The protocol engine owns no register data. Everything it serves is read
//! through [`RegisterLookup`] on every request, and port bindings come from
//! [`ConnectionTree`] when listeners start. Both are implemented by the
//! configuration backend; [`crate::core::store::MemoryStore`] is the bundled
//! in-memory implementation.

use anyhow::Result;
use async_trait::async_trait;

use crate::protocol::types::{ConnectionNode, ProtocolContext, RegisterSegment};

/// Source of stored register segments
#[async_trait]
pub trait RegisterLookup: Send + Sync {
    /// All segments stored for `slave_id` on the connection bound to `port`
    async fn registers_by_slave(&self, port: u16, slave_id: u8) -> Result<Vec<RegisterSegment>>;
}

/// Source of the configured connections and their protocol variants
#[async_trait]
pub trait ConnectionTree: Send + Sync {
    async fn connections_tree(&self) -> Result<Vec<ConnectionNode>>;
}

/// Observer for per-connection traffic.
///
/// Hooks are called in the order they were added and cannot alter the
/// bytes written back to the client.
pub trait ModbusHook: Send + Sync {
    fn on_connect(&self, _context: &ProtocolContext) {}
    fn on_request(&self, _context: &ProtocolContext, _request: &[u8]) {}
    fn on_response(&self, _context: &ProtocolContext, _response: &[u8]) {}
    fn on_error(&self, _context: &ProtocolContext, _error: &anyhow::Error) {}
    fn on_disconnect(&self, _context: &ProtocolContext) {}
}

/// Hook that ignores everything (useful for testing)
pub struct NoOpHook;

impl ModbusHook for NoOpHook {}

/// Hook that logs traffic through the `log` facade
pub struct LoggingHook;

impl ModbusHook for LoggingHook {
    fn on_connect(&self, context: &ProtocolContext) {
        log::info!(
            "Accepted {} on port {} (connection {})",
            context.remote_endpoint,
            context.local_port,
            context.connection_id
        );
    }

    fn on_request(&self, context: &ProtocolContext, request: &[u8]) {
        log::info!(
            "RX {} port {}: {:02x?}",
            context.remote_endpoint,
            context.local_port,
            request
        );
    }

    fn on_response(&self, context: &ProtocolContext, response: &[u8]) {
        if response.is_empty() {
            log::debug!(
                "Dropped request from {} on port {} without reply",
                context.remote_endpoint,
                context.local_port
            );
        } else {
            log::info!(
                "TX {} port {}: {:02x?}",
                context.remote_endpoint,
                context.local_port,
                response
            );
        }
    }

    fn on_error(&self, context: &ProtocolContext, error: &anyhow::Error) {
        log::warn!(
            "Request from {} on port {} failed: {error:#}",
            context.remote_endpoint,
            context.local_port
        );
    }

    fn on_disconnect(&self, context: &ProtocolContext) {
        log::info!(
            "Connection {} from {} closed",
            context.connection_id,
            context.remote_endpoint
        );
    }
}

/// Traffic observed by [`ChannelHook`]
#[derive(Debug, Clone)]
pub enum ServerEvent {
    Connected(ProtocolContext),
    Request(ProtocolContext, Vec<u8>),
    Response(ProtocolContext, Vec<u8>),
    Error(ProtocolContext, String),
    Disconnected(ProtocolContext),
}

/// Hook that forwards traffic to a channel for consumers outside the server
pub struct ChannelHook {
    sender: flume::Sender<ServerEvent>,
}

impl ChannelHook {
    pub fn new() -> (Self, flume::Receiver<ServerEvent>) {
        let (sender, receiver) = flume::unbounded();
        (Self { sender }, receiver)
    }

    fn send(&self, event: ServerEvent) {
        // Nobody listening is not an error for the server
        let _ = self.sender.send(event);
    }
}

impl ModbusHook for ChannelHook {
    fn on_connect(&self, context: &ProtocolContext) {
        self.send(ServerEvent::Connected(context.clone()));
    }

    fn on_request(&self, context: &ProtocolContext, request: &[u8]) {
        self.send(ServerEvent::Request(context.clone(), request.to_vec()));
    }

    fn on_response(&self, context: &ProtocolContext, response: &[u8]) {
        self.send(ServerEvent::Response(context.clone(), response.to_vec()));
    }

    fn on_error(&self, context: &ProtocolContext, error: &anyhow::Error) {
        self.send(ServerEvent::Error(context.clone(), format!("{error:#}")));
    }

    fn on_disconnect(&self, context: &ProtocolContext) {
        self.send(ServerEvent::Disconnected(context.clone()));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_channel_hook_forwards_in_order() {
        let (hook, receiver) = ChannelHook::new();
        let context = ProtocolContext::new(5020, "127.0.0.1:40000".parse().unwrap());

        hook.on_connect(&context);
        hook.on_request(&context, &[0x01, 0x03]);
        hook.on_error(&context, &anyhow::anyhow!("boom"));
        hook.on_disconnect(&context);

        let events: Vec<_> = receiver.drain().collect();
        assert_eq!(events.len(), 4);
        assert!(matches!(&events[1], ServerEvent::Request(_, bytes) if bytes == &[0x01, 0x03]));
        assert!(matches!(&events[2], ServerEvent::Error(_, msg) if msg == "boom"));
        assert!(matches!(events[3], ServerEvent::Disconnected(_)));
    }

    #[test]
    fn test_channel_hook_without_receiver() {
        let (hook, receiver) = ChannelHook::new();
        drop(receiver);
        let context = ProtocolContext::new(5020, "127.0.0.1:40000".parse().unwrap());
        hook.on_response(&context, &[0x00]);
    }
}
