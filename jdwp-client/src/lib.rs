// JDWP client library for class redefinition
//
// Implements the subset of the JDWP protocol needed to hot swap classes:
// - Attaching connectors and their arguments
// - Connection handshake and reply routing
// - Version and capability queries
// - Class lookup, redefinition and dispose

pub mod connection;
pub mod connector;
pub mod protocol;
pub mod commands;
pub mod events;
pub mod types;
pub mod reader;
pub mod vm;
mod eventloop;

pub use connection::JdwpConnection;
pub use connector::{attaching_connectors, Argument, Connector, ConnectorArguments};
pub use protocol::{JdwpError, JdwpResult};
pub use vm::{Capabilities, ClassInfo, VmVersion};
