use anyhow::{Context, Result};

use crate::{
    api::modbus::traits::RegisterLookup,
    protocol::{
        modbus::{build_read_response, resolve_read_request, ModbusException, RtuFrame, TcpFrame},
        types::{ProtocolContext, ProtocolType},
    },
};

/// Request processor for one wire variant
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProtocolHandler {
    Tcp,
    RtuOverTcp,
}

impl From<ProtocolType> for ProtocolHandler {
    fn from(protocol: ProtocolType) -> Self {
        match protocol {
            ProtocolType::Tcp => ProtocolHandler::Tcp,
            ProtocolType::RtuOverTcp => ProtocolHandler::RtuOverTcp,
        }
    }
}

/// Handler factory used by connection loops
pub fn handler_for(protocol: ProtocolType) -> ProtocolHandler {
    ProtocolHandler::from(protocol)
}

enum ReadOutcome {
    Data(Vec<u8>),
    Exception(ModbusException),
}

impl ProtocolHandler {
    /// Turn one inbound message into the bytes to write back.
    ///
    /// Malformed input and RTU frames with a bad CRC yield an empty reply.
    /// A failing register lookup is returned as an error; callers report it
    /// and keep the connection open.
    pub async fn process_request(
        &self,
        request: &[u8],
        context: &ProtocolContext,
        lookup: &dyn RegisterLookup,
    ) -> Result<Vec<u8>> {
        match self {
            ProtocolHandler::Tcp => {
                let Ok(frame) = TcpFrame::parse(request) else {
                    return Ok(Vec::new());
                };
                let outcome = execute_read(
                    context.local_port,
                    frame.unit_id(),
                    frame.function_code,
                    &frame.payload,
                    lookup,
                )
                .await?;
                Ok(match outcome {
                    ReadOutcome::Data(data) => frame.build_response(&data),
                    ReadOutcome::Exception(exception) => frame.build_exception(exception),
                })
            }
            ProtocolHandler::RtuOverTcp => {
                let frame = match RtuFrame::parse(request) {
                    Ok(frame) => frame,
                    Err(err) => {
                        log::debug!("Ignoring RTU frame on port {}: {err}", context.local_port);
                        return Ok(Vec::new());
                    }
                };
                let outcome = execute_read(
                    context.local_port,
                    frame.unit_id,
                    frame.function_code,
                    &frame.payload,
                    lookup,
                )
                .await?;
                Ok(match outcome {
                    ReadOutcome::Data(data) => frame.build_response(&data),
                    ReadOutcome::Exception(exception) => frame.build_exception(exception),
                })
            }
        }
    }
}

async fn execute_read(
    port: u16,
    unit_id: u8,
    function_code: u8,
    payload: &[u8],
    lookup: &dyn RegisterLookup,
) -> Result<ReadOutcome> {
    let request = match resolve_read_request(function_code, payload) {
        Ok(request) => request,
        Err(exception) => return Ok(ReadOutcome::Exception(exception)),
    };
    let segments = lookup
        .registers_by_slave(port, unit_id)
        .await
        .with_context(|| format!("register lookup failed for slave {unit_id} on port {port}"))?;
    Ok(ReadOutcome::Data(build_read_response(&request, &segments)))
}
