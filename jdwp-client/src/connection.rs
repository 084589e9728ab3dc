// JDWP connection management
//
// Handles TCP connection, handshake, and event loop startup

use crate::eventloop::{spawn_event_loop, EventLoopHandle};
use crate::protocol::*;
use crate::vm::VmIdSizes;
use std::sync::atomic::{AtomicU32, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tracing::{debug, info, warn};

#[derive(Debug)]
pub struct JdwpConnection {
    event_loop: EventLoopHandle,
    next_id: Arc<AtomicU32>,
    id_sizes: VmIdSizes,
}

impl JdwpConnection {
    /// Connect to a JVM via JDWP
    ///
    /// `timeout` bounds the TCP connect, the handshake and the IDSizes
    /// exchange together.
    pub async fn connect(host: &str, port: u16, timeout: Option<Duration>) -> JdwpResult<Self> {
        info!("Connecting to JDWP at {}:{}", host, port);

        match timeout {
            Some(limit) => tokio::time::timeout(limit, Self::establish(host, port))
                .await
                .map_err(|_| JdwpError::Timeout(limit))?,
            None => Self::establish(host, port).await,
        }
    }

    async fn establish(host: &str, port: u16) -> JdwpResult<Self> {
        let stream = Self::open(host, port).await?;

        let object_id_size = Arc::new(AtomicUsize::new(8));
        let (reader, writer) = stream.into_split();
        let event_loop = spawn_event_loop(reader, writer, object_id_size.clone());

        let mut connection = Self {
            event_loop,
            next_id: Arc::new(AtomicU32::new(1)),
            id_sizes: VmIdSizes::default(),
        };

        // Every ID on the wire depends on these, so ask before anything else
        let id_sizes = connection.get_id_sizes().await?;
        id_sizes.validate()?;
        object_id_size.store(id_sizes.object_id_size as usize, Ordering::Release);
        connection.id_sizes = id_sizes;

        Ok(connection)
    }

    async fn open(host: &str, port: u16) -> JdwpResult<TcpStream> {
        let mut stream = TcpStream::connect((host, port)).await?;
        Self::handshake(&mut stream).await?;
        Ok(stream)
    }

    /// Perform JDWP handshake
    async fn handshake(stream: &mut TcpStream) -> JdwpResult<()> {
        debug!("Performing JDWP handshake");

        stream.write_all(JDWP_HANDSHAKE).await?;
        stream.flush().await?;

        let mut buf = vec![0u8; JDWP_HANDSHAKE.len()];
        stream.read_exact(&mut buf).await?;

        if buf != JDWP_HANDSHAKE {
            warn!("Invalid handshake response: {:?}", buf);
            return Err(JdwpError::InvalidHandshake);
        }

        info!("JDWP handshake successful");
        Ok(())
    }

    /// Send a command and wait for reply
    pub async fn send_command(&mut self, packet: CommandPacket) -> JdwpResult<ReplyPacket> {
        debug!("Sending command packet id={}", packet.id);
        self.event_loop.send_command(packet).await
    }

    /// ID widths declared by the target
    pub fn id_sizes(&self) -> &VmIdSizes {
        &self.id_sizes
    }

    /// Whether the event loop has stopped (target gone or socket failed)
    pub fn is_closed(&self) -> bool {
        self.event_loop.is_closed()
    }

    /// Generate next packet ID
    pub fn next_id(&self) -> u32 {
        self.next_id.fetch_add(1, Ordering::SeqCst)
    }
}
