//! Transport to the mesh stack daemon

pub mod unix_socket;
