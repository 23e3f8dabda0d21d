//! `scalyclaw-protocol` — the WebSocket wire protocol shared by the gateway
//! and management UI clients: frame envelopes, the connect handshake, and
//! well-known method name constants.

pub mod frames;
pub mod handshake;
pub mod methods;
