//! Mesh stack abstraction layer

pub mod mesh_backend;
pub mod mock_backend;
pub mod rpc_backend;

pub use mesh_backend::MeshBackend;
pub use rpc_backend::RpcMeshBackend;

#[cfg(test)]
pub use mock_backend::MockMeshBackend;
