// Attachment management
//
// Owns the JDWP connection for one invocation: configure the connector,
// attach, check the target can redefine classes, and release it again.

use crate::error::{DetachWarning, HotSwapError, Result};
use jdwp_client::connector::argument_names;
use jdwp_client::{Capabilities, Connector, ConnectorArguments, JdwpConnection, JdwpError, VmVersion};
use std::time::Duration;
use tokio::time::Instant;
use tracing::{info, warn};

/// One live attachment to a target VM
#[derive(Debug)]
pub struct Session {
    connection: Option<JdwpConnection>,
    target: String,
    version: VmVersion,
    capabilities: Capabilities,
}

/// Fill the hostname and port slots of `defaults`
///
/// When either value is empty the defaults are returned untouched; a target
/// listening on the connector's default settings may still be reachable.
pub fn configure_arguments(
    host: &str,
    port: &str,
    mut defaults: ConnectorArguments,
) -> Result<ConnectorArguments> {
    if host.is_empty() || port.is_empty() {
        return Ok(defaults);
    }

    for (slot, value) in [(argument_names::HOSTNAME, host), (argument_names::PORT, port)] {
        defaults
            .set_value(slot, value)
            .map_err(|e| HotSwapError::InvalidArgument(e.to_string()))?;
    }
    Ok(defaults)
}

/// Attach to the target at `host:port` through `connector`
///
/// Only returns a session once the target has confirmed it can redefine
/// classes; otherwise the connection is released before failing.
pub async fn attach(host: &str, port: &str, connector: &Connector) -> Result<Session> {
    attach_with_timeout(host, port, None, connector).await
}

/// As [`attach`], bounding the whole attach sequence by `timeout_ms`
///
/// The connector's timeout slot covers connect, handshake and IDSizes; the
/// version and capability queries get whatever is left of the same budget.
pub async fn attach_with_timeout(
    host: &str,
    port: &str,
    timeout_ms: Option<u64>,
    connector: &Connector,
) -> Result<Session> {
    let budget = timeout_ms.filter(|ms| *ms > 0).map(|ms| {
        let limit = Duration::from_millis(ms);
        (limit, Instant::now() + limit)
    });

    let mut arguments = configure_arguments(host, port, connector.default_arguments())?;
    if let Some(timeout_ms) = timeout_ms {
        arguments
            .set_value(argument_names::TIMEOUT, timeout_ms.to_string())
            .map_err(|e| HotSwapError::InvalidArgument(e.to_string()))?;
    }
    let target = format!(
        "{}:{}",
        arguments.value(argument_names::HOSTNAME).unwrap_or(host),
        arguments.value(argument_names::PORT).unwrap_or(port)
    );

    info!("Attaching to {} using {}", target, connector.name());

    let mut connection = connector.attach(&arguments).await.map_err(|source| match source {
        JdwpError::IllegalArgument(reason) => HotSwapError::InvalidArgument(reason),
        source => HotSwapError::AttachFailed {
            target: target.clone(),
            source,
        },
    })?;

    let queried = match budget {
        Some((limit, deadline)) => tokio::time::timeout_at(deadline, query_target(&mut connection))
            .await
            .unwrap_or(Err(JdwpError::Timeout(limit))),
        None => query_target(&mut connection).await,
    };

    let (version, capabilities) = match queried {
        Ok(found) => found,
        Err(source @ JdwpError::Timeout(_)) => {
            // Dispose would wait on the same unresponsive target
            warn!("{} stopped answering during attach, closing connection", target);
            drop(connection);
            return Err(HotSwapError::AttachFailed { target, source });
        }
        Err(source) => {
            let mut session = Session::new(connection, target.clone(), empty_version(), Capabilities::default());
            session.detach().await;
            return Err(HotSwapError::AttachFailed { target, source });
        }
    };

    let mut session = Session::new(connection, target, version, capabilities);

    if !session.can_redefine_classes() {
        let vm = session.version.description.clone();
        session.detach().await;
        return Err(HotSwapError::UnsupportedTarget { vm });
    }

    info!("Attached to {} ({})", session.target, session.version.vm_name);
    Ok(session)
}

/// Version and capabilities; CapabilitiesNew only exists from JDWP 1.4
async fn query_target(connection: &mut JdwpConnection) -> std::result::Result<(VmVersion, Capabilities), JdwpError> {
    let version = connection.get_version().await?;
    let capabilities = if version.is_at_least(1, 4) {
        connection.capabilities_new().await?
    } else {
        Capabilities::default()
    };
    Ok((version, capabilities))
}

fn empty_version() -> VmVersion {
    VmVersion {
        description: String::new(),
        jdwp_major: 0,
        jdwp_minor: 0,
        vm_version: String::new(),
        vm_name: String::new(),
    }
}

impl Session {
    fn new(connection: JdwpConnection, target: String, version: VmVersion, capabilities: Capabilities) -> Self {
        Self {
            connection: Some(connection),
            target,
            version,
            capabilities,
        }
    }

    /// "host:port" this session was attached to
    pub fn target(&self) -> &str {
        &self.target
    }

    pub fn version(&self) -> &VmVersion {
        &self.version
    }

    pub fn capabilities(&self) -> &Capabilities {
        &self.capabilities
    }

    pub fn can_redefine_classes(&self) -> bool {
        self.version.is_at_least(1, 4) && self.capabilities.can_redefine_classes
    }

    pub fn is_attached(&self) -> bool {
        self.connection.is_some()
    }

    /// Connection for protocol calls; fails once detached
    pub(crate) fn connection(&mut self) -> Result<&mut JdwpConnection> {
        self.connection.as_mut().ok_or(HotSwapError::SessionClosed)
    }

    /// Release the target, best effort
    ///
    /// Safe to call repeatedly. Failures are logged and handed back for
    /// reporting but never raised, so teardown cannot mask an earlier error.
    pub async fn detach(&mut self) -> Option<DetachWarning> {
        let mut connection = self.connection.take()?;

        if connection.is_closed() {
            info!("Connection to {} already closed", self.target);
            return None;
        }

        match connection.dispose().await {
            Ok(()) => {
                info!("Detached from {}", self.target);
                None
            }
            Err(source) => {
                let warning = DetachWarning {
                    target: self.target.clone(),
                    source,
                };
                warn!("{}", warning);
                Some(warning)
            }
        }
    }
}

impl Drop for Session {
    fn drop(&mut self) {
        if self.connection.is_some() {
            warn!("Session for {} dropped while attached, closing connection", self.target);
        }
    }
}
