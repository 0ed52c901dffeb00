//! Transport listeners feeding accepted connections to the server loop.

pub mod websocket;
