//! Per-connection request loop
//!
//! Reads one chunk per logical request, hands it to the protocol handler for
//! the port's wire variant and writes back whatever the handler produced.
//! The loop is generic over the stream so it can be driven by a mock in tests.

use anyhow::{Context, Result};
use parking_lot::RwLock;
use std::{collections::HashMap, sync::Arc};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio_util::sync::CancellationToken;

use super::traits::{ModbusHook, RegisterLookup};
use crate::protocol::{
    handler::handler_for,
    types::{ConnectionInfo, ProtocolContext},
};

/// State shared by every connection of a server
pub struct ConnectionShared {
    pub lookup: Arc<dyn RegisterLookup>,
    pub bindings: RwLock<HashMap<u16, ConnectionInfo>>,
    pub hooks: Vec<Arc<dyn ModbusHook>>,
    pub read_buffer_size: usize,
}

impl ConnectionShared {
    pub fn binding(&self, port: u16) -> Option<ConnectionInfo> {
        self.bindings.read().get(&port).copied()
    }

    pub fn notify_error(&self, context: &ProtocolContext, error: &anyhow::Error) {
        for hook in &self.hooks {
            hook.on_error(context, error);
        }
    }
}

/// Serve one accepted stream until EOF, an I/O error or cancellation.
///
/// Handler errors are reported to the hooks and the connection stays open;
/// only I/O errors end the loop with `Err`.
pub async fn serve_connection<S>(
    mut stream: S,
    context: &ProtocolContext,
    shared: &ConnectionShared,
    cancel: &CancellationToken,
) -> Result<()>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    let mut buffer = vec![0u8; shared.read_buffer_size];

    loop {
        let read = tokio::select! {
            _ = cancel.cancelled() => break,
            read = stream.read(&mut buffer) => read,
        };
        let len = read.with_context(|| format!("read from {} failed", context.remote_endpoint))?;
        if len == 0 {
            break;
        }

        let Some(info) = shared.binding(context.local_port) else {
            log::debug!(
                "Port {} no longer bound, closing {}",
                context.local_port,
                context.remote_endpoint
            );
            break;
        };

        let request = &buffer[..len];
        for hook in &shared.hooks {
            hook.on_request(context, request);
        }

        let response = match handler_for(info.protocol_type)
            .process_request(request, context, shared.lookup.as_ref())
            .await
        {
            Ok(response) => response,
            Err(err) => {
                shared.notify_error(context, &err);
                continue;
            }
        };

        for hook in &shared.hooks {
            hook.on_response(context, &response);
        }
        if !response.is_empty() {
            stream
                .write_all(&response)
                .await
                .with_context(|| format!("write to {} failed", context.remote_endpoint))?;
        }
    }

    Ok(())
}
