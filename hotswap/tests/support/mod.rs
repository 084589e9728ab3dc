//! In-process fake JVM speaking just enough JDWP for hot swapping.
//!
//! Serves a single debugger connection and records what it was asked to do.

use jdwp_client::commands::class_status;
use jdwp_client::protocol::error_codes;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};

const HANDSHAKE: &[u8] = b"JDWP-Handshake";

/// How the fake target behaves
#[derive(Debug, Clone)]
pub struct FakeVmOptions {
    pub can_redefine: bool,
    pub jdwp_version: (i32, i32),
    /// Loaded types by JNI signature: (type id, class status)
    pub classes: HashMap<String, Vec<(u64, i32)>>,
    /// Error code returned for every RedefineClasses request
    pub reject_with: Option<u16>,
    /// Answer unknown signatures with NOT_FOUND instead of an empty list
    pub not_found_error: bool,
    /// Error code returned for Dispose
    pub reject_dispose: Option<u16>,
    /// Stop answering once this (command set, command) arrives
    pub stall_on: Option<(u8, u8)>,
    pub send_vm_start: bool,
}

impl Default for FakeVmOptions {
    fn default() -> Self {
        Self {
            can_redefine: true,
            jdwp_version: (17, 0),
            classes: HashMap::new(),
            reject_with: None,
            not_found_error: false,
            reject_dispose: None,
            stall_on: None,
            send_vm_start: true,
        }
    }
}

impl FakeVmOptions {
    /// Add a loaded, prepared and initialized copy of `type_name`
    pub fn with_class(mut self, type_name: &str, type_id: u64) -> Self {
        self.classes
            .entry(format!("L{};", type_name.replace('.', "/")))
            .or_default()
            .push((
                type_id,
                class_status::VERIFIED | class_status::PREPARED | class_status::INITIALIZED,
            ));
        self
    }
}

/// What the debugger did while connected
#[derive(Debug, Clone, Default)]
pub struct Recorded {
    pub commands: Vec<(u8, u8)>,
    pub lookups: Vec<String>,
    /// One entry per RedefineClasses request: (type id, class file bytes)
    pub redefinitions: Vec<Vec<(u64, Vec<u8>)>>,
    pub disposed: bool,
}

pub struct FakeVm {
    pub port: u16,
    recorded: Arc<Mutex<Recorded>>,
}

impl FakeVm {
    pub async fn start(options: FakeVmOptions) -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        let recorded = Arc::new(Mutex::new(Recorded::default()));

        let state = recorded.clone();
        tokio::spawn(async move {
            if let Ok((socket, _)) = listener.accept().await {
                serve(socket, options, state).await.ok();
            }
        });

        Self { port, recorded }
    }

    pub fn recorded(&self) -> Recorded {
        self.recorded.lock().unwrap().clone()
    }
}

/// A listener that accepts connections and never answers the handshake
pub async fn silent_listener() -> u16 {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();

    tokio::spawn(async move {
        if let Ok((_socket, _)) = listener.accept().await {
            tokio::time::sleep(Duration::from_secs(30)).await;
        }
    });

    port
}

/// A port nothing listens on
pub async fn closed_port() -> u16 {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    listener.local_addr().unwrap().port()
}

async fn serve(
    mut socket: TcpStream,
    options: FakeVmOptions,
    recorded: Arc<Mutex<Recorded>>,
) -> std::io::Result<()> {
    let mut handshake = [0u8; 14];
    socket.read_exact(&mut handshake).await?;
    assert_eq!(&handshake, HANDSHAKE);
    socket.write_all(HANDSHAKE).await?;

    if options.send_vm_start {
        socket.write_all(&vm_start_event()).await?;
    }

    loop {
        let mut header = [0u8; 11];
        if socket.read_exact(&mut header).await.is_err() {
            return Ok(());
        }

        let length = u32::from_be_bytes([header[0], header[1], header[2], header[3]]) as usize;
        let id = u32::from_be_bytes([header[4], header[5], header[6], header[7]]);
        let command = (header[9], header[10]);

        let mut body = vec![0u8; length - 11];
        socket.read_exact(&mut body).await?;

        if options.stall_on == Some(command) {
            recorded.lock().unwrap().commands.push(command);
            tokio::time::sleep(Duration::from_secs(30)).await;
            return Ok(());
        }

        let (error, data) = {
            let mut recorded = recorded.lock().unwrap();
            recorded.commands.push(command);
            respond(command, &body, &options, &mut recorded)
        };

        socket.write_all(&reply(id, error, &data)).await?;

        if command == (1, 6) {
            return Ok(());
        }
    }
}

fn respond(
    command: (u8, u8),
    body: &[u8],
    options: &FakeVmOptions,
    recorded: &mut Recorded,
) -> (u16, Vec<u8>) {
    let mut data = Vec::new();

    match command {
        // Version
        (1, 1) => {
            put_string(&mut data, "Fake VM for hot swap tests");
            data.extend_from_slice(&options.jdwp_version.0.to_be_bytes());
            data.extend_from_slice(&options.jdwp_version.1.to_be_bytes());
            put_string(&mut data, "17.0.9");
            put_string(&mut data, "Fake HotSpot");
            (0, data)
        }
        // ClassesBySignature
        (1, 2) => {
            let len = u32::from_be_bytes([body[0], body[1], body[2], body[3]]) as usize;
            let signature = String::from_utf8(body[4..4 + len].to_vec()).unwrap();
            recorded.lookups.push(signature.clone());

            let classes = options.classes.get(&signature).cloned().unwrap_or_default();
            if classes.is_empty() && options.not_found_error {
                return (error_codes::NOT_FOUND, data);
            }

            data.extend_from_slice(&(classes.len() as i32).to_be_bytes());
            for (type_id, status) in classes {
                data.push(1);
                data.extend_from_slice(&type_id.to_be_bytes());
                data.extend_from_slice(&status.to_be_bytes());
            }
            (0, data)
        }
        // Dispose
        (1, 6) => {
            recorded.disposed = true;
            (options.reject_dispose.unwrap_or(error_codes::NONE), data)
        }
        // IDSizes
        (1, 7) => {
            for _ in 0..5 {
                data.extend_from_slice(&8i32.to_be_bytes());
            }
            (0, data)
        }
        // CapabilitiesNew
        (1, 17) => {
            data.resize(32, 0);
            data[2] = 1;
            data[7] = options.can_redefine as u8;
            (0, data)
        }
        // RedefineClasses
        (1, 18) => {
            let mut request = Vec::new();
            let mut buf = body;
            let count = take_i32(&mut buf);
            for _ in 0..count {
                let type_id = u64::from_be_bytes(buf[..8].try_into().unwrap());
                buf = &buf[8..];
                let len = take_i32(&mut buf) as usize;
                request.push((type_id, buf[..len].to_vec()));
                buf = &buf[len..];
            }
            recorded.redefinitions.push(request);
            (options.reject_with.unwrap_or(error_codes::NONE), data)
        }
        _ => (error_codes::NOT_IMPLEMENTED, data),
    }
}

fn take_i32(buf: &mut &[u8]) -> i32 {
    let value = i32::from_be_bytes(buf[..4].try_into().unwrap());
    *buf = &buf[4..];
    value
}

fn put_string(data: &mut Vec<u8>, value: &str) {
    data.extend_from_slice(&(value.len() as u32).to_be_bytes());
    data.extend_from_slice(value.as_bytes());
}

fn reply(id: u32, error: u16, data: &[u8]) -> Vec<u8> {
    let mut packet = Vec::with_capacity(11 + data.len());
    packet.extend_from_slice(&((11 + data.len()) as u32).to_be_bytes());
    packet.extend_from_slice(&id.to_be_bytes());
    packet.push(0x80);
    packet.extend_from_slice(&error.to_be_bytes());
    packet.extend_from_slice(data);
    packet
}

/// Composite event packet carrying a single VMStart
fn vm_start_event() -> Vec<u8> {
    let mut data = vec![0u8]; // suspend policy NONE
    data.extend_from_slice(&1i32.to_be_bytes());
    data.push(90);
    data.extend_from_slice(&0i32.to_be_bytes());
    data.extend_from_slice(&1u64.to_be_bytes());

    let mut packet = Vec::with_capacity(11 + data.len());
    packet.extend_from_slice(&((11 + data.len()) as u32).to_be_bytes());
    packet.extend_from_slice(&1u32.to_be_bytes());
    packet.push(0x00);
    packet.push(64);
    packet.push(100);
    packet.extend_from_slice(&data);
    packet
}
