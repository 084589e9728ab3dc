// Transport selection
//
// Picks the socket connector from those the client library offers.

use crate::error::{HotSwapError, Result};
use jdwp_client::connector::SOCKET_TRANSPORT;
use jdwp_client::{attaching_connectors, Connector};
use tracing::debug;

/// First socket connector in enumeration order
pub fn select_transport(connectors: &[Connector]) -> Result<&Connector> {
    connectors
        .iter()
        .find(|connector| connector.transport() == SOCKET_TRANSPORT)
        .ok_or(HotSwapError::NoSuitableTransport)
}

/// Select from the connectors available on this platform
pub fn select_local_transport() -> Result<Connector> {
    let connectors = attaching_connectors();
    debug!(
        "Available connectors: {:?}",
        connectors.iter().map(Connector::name).collect::<Vec<_>>()
    );
    select_transport(&connectors).cloned()
}
