// JDWP Event Loop
//
// Routes replies from the JDWP socket back to the command that asked for
// them, and logs any events the target sends on its own.

use crate::commands::{command_sets, event_commands};
use crate::events::{parse_event_packet, EventKind};
use crate::protocol::{CommandPacket, JdwpError, JdwpResult, ReplyPacket, HEADER_SIZE, REPLY_FLAG};
use bytes::BytesMut;
use std::collections::HashMap;
use std::io::ErrorKind;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, error, info, warn};

/// Maximum allowed JDWP packet size (10MB)
/// This prevents memory exhaustion from malicious or buggy JVMs
const MAX_PACKET_SIZE: usize = 10 * 1024 * 1024;

/// Request to send a command and get reply
pub struct CommandRequest {
    pub packet: CommandPacket,
    pub reply_tx: oneshot::Sender<JdwpResult<ReplyPacket>>,
}

/// Raw packet as read from the socket
struct RawPacket {
    is_reply: bool,
    id: u32,
    bytes: Vec<u8>,
}

/// Handle to the event loop for sending commands
///
/// Dropping every handle stops the loop and closes the socket.
#[derive(Clone, Debug)]
pub struct EventLoopHandle {
    command_tx: mpsc::Sender<CommandRequest>,
}

impl EventLoopHandle {
    /// Send a command and wait for reply
    pub async fn send_command(&self, packet: CommandPacket) -> JdwpResult<ReplyPacket> {
        let (reply_tx, reply_rx) = oneshot::channel();

        let request = CommandRequest { packet, reply_tx };

        self.command_tx
            .send(request)
            .await
            .map_err(|_| JdwpError::ConnectionClosed)?;

        reply_rx.await.map_err(|_| JdwpError::ConnectionClosed)?
    }

    /// Whether the loop has already stopped
    pub fn is_closed(&self) -> bool {
        self.command_tx.is_closed()
    }
}

/// Start the event loop task
///
/// `object_id_size` is shared with the connection, which fills it in once
/// the target has answered IDSizes.
pub fn spawn_event_loop(
    reader: OwnedReadHalf,
    writer: OwnedWriteHalf,
    object_id_size: Arc<AtomicUsize>,
) -> EventLoopHandle {
    let (command_tx, command_rx) = mpsc::channel(32);
    let (packet_tx, packet_rx) = mpsc::channel(32);

    tokio::spawn(event_loop_task(
        reader,
        writer,
        command_rx,
        packet_tx,
        packet_rx,
        object_id_size,
    ));

    EventLoopHandle { command_tx }
}

/// Main event loop task
async fn event_loop_task(
    reader: OwnedReadHalf,
    mut writer: OwnedWriteHalf,
    mut command_rx: mpsc::Receiver<CommandRequest>,
    packet_tx: mpsc::Sender<JdwpResult<RawPacket>>,
    mut packet_rx: mpsc::Receiver<JdwpResult<RawPacket>>,
    object_id_size: Arc<AtomicUsize>,
) {
    debug!("Event loop started");

    // Reads run in their own task so a partially read packet is never lost
    // when the select below picks a command instead
    let read_task = tokio::spawn(read_loop(reader, packet_tx));

    let mut pending_replies: HashMap<u32, oneshot::Sender<JdwpResult<ReplyPacket>>> =
        HashMap::new();

    loop {
        tokio::select! {
            cmd = command_rx.recv() => {
                let Some(cmd) = cmd else {
                    debug!("Connection handle dropped");
                    break;
                };

                let packet_id = cmd.packet.id;
                debug!(
                    "Sending command id={} set={} cmd={}",
                    packet_id, cmd.packet.command_set, cmd.packet.command
                );

                let encoded = cmd.packet.encode();
                if let Err(e) = writer.write_all(&encoded).await {
                    error!("Failed to write command: {}", e);
                    cmd.reply_tx.send(Err(JdwpError::Io(e))).ok();
                    continue;
                }

                if let Err(e) = writer.flush().await {
                    error!("Failed to flush command: {}", e);
                    cmd.reply_tx.send(Err(JdwpError::Io(e))).ok();
                    continue;
                }

                pending_replies.insert(packet_id, cmd.reply_tx);
            }

            result = packet_rx.recv() => {
                match result {
                    Some(Ok(packet)) if packet.is_reply => {
                        debug!("Received reply id={}", packet.id);

                        if let Some(tx) = pending_replies.remove(&packet.id) {
                            tx.send(ReplyPacket::decode(&packet.bytes)).ok();
                        } else {
                            warn!("Received reply for unknown command id={}", packet.id);
                        }
                    }
                    Some(Ok(packet)) => {
                        log_event_packet(&packet.bytes, object_id_size.load(Ordering::Acquire));
                    }
                    Some(Err(JdwpError::Io(e))) if e.kind() == ErrorKind::UnexpectedEof => {
                        info!("Target closed the connection");
                        break;
                    }
                    Some(Err(e)) => {
                        error!("Failed to read packet: {}", e);
                        break;
                    }
                    None => break,
                }
            }
        }
    }

    read_task.abort();
    writer.shutdown().await.ok();

    // Pending callers see their reply channel close
    if !pending_replies.is_empty() {
        warn!("Dropping {} commands still awaiting a reply", pending_replies.len());
    }

    debug!("Event loop shutting down");
}

/// Forward packets from the socket until it fails or closes
async fn read_loop(mut reader: OwnedReadHalf, packet_tx: mpsc::Sender<JdwpResult<RawPacket>>) {
    loop {
        let result = read_packet(&mut reader).await;
        let failed = result.is_err();
        if packet_tx.send(result).await.is_err() || failed {
            break;
        }
    }
}

/// Decode an unsolicited packet and log what the target reported
fn log_event_packet(bytes: &[u8], object_id_size: usize) {
    let command_set = bytes[9];
    let command = bytes[10];

    if command_set != command_sets::EVENT || command != event_commands::COMPOSITE {
        warn!("Ignoring unexpected command from target: set={} cmd={}", command_set, command);
        return;
    }

    match parse_event_packet(&bytes[HEADER_SIZE..], object_id_size) {
        Ok(event_set) => {
            for event in &event_set.events {
                match &event.details {
                    EventKind::VMDeath => warn!("Target VM reported VMDeath"),
                    EventKind::Unknown { kind } => debug!("Ignoring event kind {}", kind),
                    details => debug!("Target event: {:?}", details),
                }
            }
        }
        Err(e) => warn!("Failed to parse event: {}", e),
    }
}

/// Read a packet from the socket and determine if it's a reply or event
async fn read_packet(reader: &mut OwnedReadHalf) -> JdwpResult<RawPacket> {
    let mut header = BytesMut::with_capacity(HEADER_SIZE);
    header.resize(HEADER_SIZE, 0);

    reader
        .read_exact(&mut header)
        .await
        .map_err(JdwpError::Io)?;

    let length = u32::from_be_bytes([header[0], header[1], header[2], header[3]]) as usize;
    let id = u32::from_be_bytes([header[4], header[5], header[6], header[7]]);
    let flags = header[8];

    if length < HEADER_SIZE {
        return Err(JdwpError::Protocol(format!(
            "Invalid packet length: {}",
            length
        )));
    }

    if length > MAX_PACKET_SIZE {
        return Err(JdwpError::Protocol(format!(
            "Packet too large: {} bytes (max: {} bytes)",
            length, MAX_PACKET_SIZE
        )));
    }

    let data_len = length - HEADER_SIZE;
    let mut bytes = header.to_vec();

    if data_len > 0 {
        let mut data = vec![0u8; data_len];
        reader.read_exact(&mut data).await.map_err(JdwpError::Io)?;
        bytes.extend_from_slice(&data);
    }

    Ok(RawPacket {
        is_reply: flags == REPLY_FLAG,
        id,
        bytes,
    })
}
