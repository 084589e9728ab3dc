// Attaching connectors
//
// A connector describes one way of reaching a target VM and the named
// arguments that parameterize it. Only the socket transport is spoken by
// this library; the shared memory connector is listed where the platform
// offers it so that callers see the same choices a JDK debugger would.

use crate::connection::JdwpConnection;
use crate::protocol::{JdwpError, JdwpResult};
use std::collections::BTreeMap;
use std::time::Duration;
use tracing::debug;

pub const SOCKET_TRANSPORT: &str = "dt_socket";
pub const SHARED_MEMORY_TRANSPORT: &str = "dt_shmem";

pub mod argument_names {
    pub const HOSTNAME: &str = "hostname";
    pub const PORT: &str = "port";
    pub const TIMEOUT: &str = "timeout";
    pub const NAME: &str = "name";
}

/// One named argument slot of a connector
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Argument {
    name: &'static str,
    label: &'static str,
    description: &'static str,
    value: String,
    must_specify: bool,
}

impl Argument {
    fn new(
        name: &'static str,
        label: &'static str,
        description: &'static str,
        value: &str,
        must_specify: bool,
    ) -> Self {
        Self {
            name,
            label,
            description,
            value: value.to_string(),
            must_specify,
        }
    }

    pub fn name(&self) -> &str {
        self.name
    }

    pub fn label(&self) -> &str {
        self.label
    }

    pub fn description(&self) -> &str {
        self.description
    }

    pub fn value(&self) -> &str {
        &self.value
    }

    pub fn set_value(&mut self, value: impl Into<String>) {
        self.value = value.into();
    }

    pub fn must_specify(&self) -> bool {
        self.must_specify
    }
}

/// Argument slots of a connector, keyed by name
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConnectorArguments {
    slots: BTreeMap<&'static str, Argument>,
}

impl ConnectorArguments {
    fn from_slots(slots: impl IntoIterator<Item = Argument>) -> Self {
        Self {
            slots: slots.into_iter().map(|arg| (arg.name, arg)).collect(),
        }
    }

    pub fn get(&self, name: &str) -> Option<&Argument> {
        self.slots.get(name)
    }

    pub fn value(&self, name: &str) -> Option<&str> {
        self.get(name).map(Argument::value)
    }

    /// Overwrite an existing slot; connectors never grow new slots
    pub fn set_value(&mut self, name: &str, value: impl Into<String>) -> JdwpResult<()> {
        match self.slots.get_mut(name) {
            Some(arg) => {
                arg.set_value(value);
                Ok(())
            }
            None => Err(JdwpError::IllegalArgument(format!(
                "connector has no '{}' argument",
                name
            ))),
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = &Argument> {
        self.slots.values()
    }

    fn required(&self, name: &str) -> JdwpResult<&str> {
        match self.value(name) {
            Some(value) if !value.trim().is_empty() => Ok(value.trim()),
            _ => Err(JdwpError::IllegalArgument(format!("'{}' must be specified", name))),
        }
    }

    /// Timeout slot in milliseconds; empty or zero means wait indefinitely
    fn timeout(&self) -> JdwpResult<Option<Duration>> {
        let raw = self.value(argument_names::TIMEOUT).unwrap_or("").trim();
        if raw.is_empty() {
            return Ok(None);
        }
        let millis: u64 = raw.parse().map_err(|_| {
            JdwpError::IllegalArgument(format!("timeout '{}' is not a number of milliseconds", raw))
        })?;
        Ok((millis > 0).then(|| Duration::from_millis(millis)))
    }
}

/// Attaches over TCP to a VM started with `-agentlib:jdwp=transport=dt_socket,server=y`
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SocketAttachingConnector;

impl SocketAttachingConnector {
    pub fn default_arguments(&self) -> ConnectorArguments {
        ConnectorArguments::from_slots([
            Argument::new(
                argument_names::HOSTNAME,
                "Host",
                "Machine name to which to attach for VM connections",
                "localhost",
                false,
            ),
            Argument::new(
                argument_names::PORT,
                "Port",
                "Port number to which to attach for VM connections",
                "",
                true,
            ),
            Argument::new(
                argument_names::TIMEOUT,
                "Timeout",
                "Timeout while waiting to attach, in milliseconds",
                "",
                false,
            ),
        ])
    }

    pub async fn attach(&self, arguments: &ConnectorArguments) -> JdwpResult<JdwpConnection> {
        let host = match arguments.value(argument_names::HOSTNAME).map(str::trim) {
            Some(host) if !host.is_empty() => host,
            _ => "localhost",
        };
        let port_text = arguments.required(argument_names::PORT)?;
        let port: u16 = port_text.parse().map_err(|_| {
            JdwpError::IllegalArgument(format!("port '{}' is not a valid port number", port_text))
        })?;
        let timeout = arguments.timeout()?;

        debug!("Socket attach to {}:{} (timeout {:?})", host, port, timeout);
        JdwpConnection::connect(host, port, timeout).await
    }
}

/// Attaches through a named shared memory region (Windows JDKs only)
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SharedMemoryAttachingConnector;

impl SharedMemoryAttachingConnector {
    pub fn default_arguments(&self) -> ConnectorArguments {
        ConnectorArguments::from_slots([
            Argument::new(
                argument_names::NAME,
                "Name",
                "Name of the shared memory area to which to attach for VM connections",
                "javadebug",
                true,
            ),
            Argument::new(
                argument_names::TIMEOUT,
                "Timeout",
                "Timeout while waiting to attach, in milliseconds",
                "",
                false,
            ),
        ])
    }

    pub async fn attach(&self, arguments: &ConnectorArguments) -> JdwpResult<JdwpConnection> {
        arguments.required(argument_names::NAME)?;
        Err(JdwpError::UnsupportedTransport(SHARED_MEMORY_TRANSPORT))
    }
}

/// An attach mechanism offered by this library
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Connector {
    Socket(SocketAttachingConnector),
    SharedMemory(SharedMemoryAttachingConnector),
}

impl Connector {
    pub fn name(&self) -> &'static str {
        match self {
            Connector::Socket(_) => "com.sun.jdi.SocketAttach",
            Connector::SharedMemory(_) => "com.sun.jdi.SharedMemoryAttach",
        }
    }

    /// Transport identifier, as used in `-agentlib:jdwp=transport=...`
    pub fn transport(&self) -> &'static str {
        match self {
            Connector::Socket(_) => SOCKET_TRANSPORT,
            Connector::SharedMemory(_) => SHARED_MEMORY_TRANSPORT,
        }
    }

    pub fn description(&self) -> &'static str {
        match self {
            Connector::Socket(_) => "Attaches by socket to other VMs",
            Connector::SharedMemory(_) => "Attaches by shared memory to other VMs",
        }
    }

    pub fn default_arguments(&self) -> ConnectorArguments {
        match self {
            Connector::Socket(c) => c.default_arguments(),
            Connector::SharedMemory(c) => c.default_arguments(),
        }
    }

    /// Attach to the target described by `arguments`
    ///
    /// Arguments are validated before any network traffic.
    pub async fn attach(&self, arguments: &ConnectorArguments) -> JdwpResult<JdwpConnection> {
        match self {
            Connector::Socket(c) => c.attach(arguments).await,
            Connector::SharedMemory(c) => c.attach(arguments).await,
        }
    }
}

/// Connectors available on this platform, in a stable order
pub fn attaching_connectors() -> Vec<Connector> {
    let mut connectors = vec![Connector::Socket(SocketAttachingConnector)];
    if cfg!(windows) {
        connectors.push(Connector::SharedMemory(SharedMemoryAttachingConnector));
    }
    connectors
}
