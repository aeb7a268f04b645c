//! Protocol server surface
//!
//! The OPC UA stack is an external collaborator: it binds the TCP
//! endpoint, runs sessions and dispatches attribute reads and writes into
//! the [`VariableAdapter`] using the registry table. This module carries
//! the fixed identity the server announces and the endpoint formatting.
//!
//! [`VariableAdapter`]: crate::core::adapter::VariableAdapter

/// Application URI announced in the server's application description
pub const APPLICATION_URI: &str = "iosrv.opcua.server";

/// Application name announced in the server's application description
pub const APPLICATION_NAME: &str = "OPC_UA_IO_Gateway";

/// Conventional OPC UA TCP port
pub const DEFAULT_PORT: u16 = 4840;

/// Endpoint URL for the given port
pub fn endpoint_url(port: u16) -> String {
    format!("opc.tcp://0.0.0.0:{}", port)
}
