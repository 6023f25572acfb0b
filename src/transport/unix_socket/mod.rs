//! Unix domain socket transport layer (newline-delimited JSON-RPC 2.0)

pub mod session;

pub use session::{SessionReader, SessionWriter};
