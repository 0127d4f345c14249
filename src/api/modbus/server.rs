use anyhow::{Context, Result};
use derive_more::{Display, Error};
use parking_lot::RwLock;
use std::{collections::HashMap, net::SocketAddr, sync::Arc, time::Duration};
use tokio::{net::TcpListener, task::JoinHandle};
use tokio_util::sync::CancellationToken;

use super::{
    core::{serve_connection, ConnectionShared},
    traits::ConnectionTree,
};
use crate::{
    core::task_manager::spawn_task,
    protocol::types::{ConnectionId, ConnectionInfo, ProtocolContext},
};

#[derive(Debug, Clone, PartialEq, Eq, Display, Error)]
pub enum ServerError {
    #[display("port map must contain at least one port")]
    EmptyPortMap,
    #[display("port {port} refers to connection {id}, which is not configured")]
    UnknownConnection { port: u16, id: ConnectionId },
    #[display("port {port} already has a running listener")]
    PortInUse { port: u16 },
}

struct PortListener {
    token: CancellationToken,
    handle: JoinHandle<()>,
    local_addr: SocketAddr,
}

/// Supervisor owning one listener per port.
///
/// Built through [`super::ModbusServerBuilder`]. Each listener and each of its
/// connections runs as its own task under a child of the server's
/// cancellation token, so stopping a port closes its open connections too.
pub struct ModbusServer {
    tree: Arc<dyn ConnectionTree>,
    shared: Arc<ConnectionShared>,
    bind_host: String,
    root: RwLock<CancellationToken>,
    listeners: RwLock<HashMap<u16, PortListener>>,
}

impl ModbusServer {
    pub(crate) fn new(
        tree: Arc<dyn ConnectionTree>,
        shared: ConnectionShared,
        bind_host: String,
    ) -> Self {
        Self {
            tree,
            shared: Arc::new(shared),
            bind_host,
            root: RwLock::new(CancellationToken::new()),
            listeners: RwLock::new(HashMap::new()),
        }
    }

    /// Bind and start a listener for every `port -> connection id` entry.
    ///
    /// Protocol variants are resolved from the connection tree once, and
    /// every entry is validated before the first socket is bound. Returns as
    /// soon as the listeners are running.
    pub async fn start(&self, port_map: HashMap<u16, ConnectionId>) -> Result<()> {
        if port_map.is_empty() {
            return Err(ServerError::EmptyPortMap.into());
        }

        let tree = self
            .tree
            .connections_tree()
            .await
            .context("failed to load connection tree")?;

        let mut plan = Vec::with_capacity(port_map.len());
        {
            let listeners = self.listeners.read();
            for (&port, &id) in &port_map {
                if listeners.contains_key(&port) {
                    return Err(ServerError::PortInUse { port }.into());
                }
                let node = tree
                    .iter()
                    .find(|node| node.id == id)
                    .ok_or(ServerError::UnknownConnection { port, id })?;
                plan.push((
                    port,
                    ConnectionInfo {
                        id,
                        protocol_type: node.protocol_type,
                    },
                ));
            }
        }
        plan.sort_by_key(|(port, _)| *port);

        for (port, info) in plan {
            let listener = TcpListener::bind((self.bind_host.as_str(), port))
                .await
                .with_context(|| format!("failed to bind {}:{port}", self.bind_host))?;
            let local_addr = listener.local_addr()?;
            log::info!(
                "Serving {} connection {} on {local_addr}",
                info.protocol_type,
                info.id
            );

            let token = self.root.read().child_token();
            self.shared.bindings.write().insert(port, info);
            let handle = spawn_task(
                format!("modbus listener {port}"),
                run_listener(listener, port, self.shared.clone(), token.clone()),
            );
            self.listeners.write().insert(
                port,
                PortListener {
                    token,
                    handle,
                    local_addr,
                },
            );
        }

        Ok(())
    }

    /// Stop one port's listener and its connections. Returns `false` if the
    /// port was not running.
    pub async fn stop(&self, port: u16) -> bool {
        let listener = self.listeners.write().remove(&port);
        self.shared.bindings.write().remove(&port);
        let Some(listener) = listener else {
            return false;
        };
        listener.token.cancel();
        if let Err(err) = listener.handle.await {
            log::warn!("Listener for port {port} ended abnormally: {err}");
        }
        log::info!("Stopped listener on port {port}");
        true
    }

    /// Cancel everything and clear all state; the server can be started again.
    pub async fn stop_all(&self) {
        let previous = std::mem::take(&mut *self.root.write());
        previous.cancel();

        let listeners: Vec<_> = self.listeners.write().drain().collect();
        self.shared.bindings.write().clear();

        let handles = listeners.into_iter().map(|(_, listener)| listener.handle);
        for result in futures::future::join_all(handles).await {
            if let Err(err) = result {
                log::warn!("Listener ended abnormally: {err}");
            }
        }
        log::info!("All listeners stopped");
    }

    /// Address the listener for `port` is bound to
    pub fn local_addr(&self, port: u16) -> Option<SocketAddr> {
        self.listeners.read().get(&port).map(|l| l.local_addr)
    }

    pub fn active_ports(&self) -> Vec<u16> {
        let mut ports: Vec<_> = self.listeners.read().keys().copied().collect();
        ports.sort_unstable();
        ports
    }
}

impl Drop for ModbusServer {
    fn drop(&mut self) {
        self.root.read().cancel();
    }
}

async fn run_listener(
    listener: TcpListener,
    port: u16,
    shared: Arc<ConnectionShared>,
    token: CancellationToken,
) {
    loop {
        let accepted = tokio::select! {
            _ = token.cancelled() => break,
            accepted = listener.accept() => accepted,
        };

        let (stream, remote) = match accepted {
            Ok(accepted) => accepted,
            Err(err) => {
                log::warn!("Accept failed on port {port}: {err}");
                tokio::time::sleep(Duration::from_millis(100)).await;
                continue;
            }
        };

        let context = ProtocolContext::new(port, remote);
        let shared = shared.clone();
        let token = token.clone();
        spawn_task(format!("modbus connection {remote}"), async move {
            for hook in &shared.hooks {
                hook.on_connect(&context);
            }
            if let Err(err) = serve_connection(stream, &context, &shared, &token).await {
                shared.notify_error(&context, &err);
            }
            for hook in &shared.hooks {
                hook.on_disconnect(&context);
            }
        });
    }
}
