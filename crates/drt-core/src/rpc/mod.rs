//! Local RPC plumbing: ports implemented by transport adapters, the wire
//! envelope, and the client that drives typed commands over a transport.

pub mod client;
pub mod port;
pub mod protocol;
