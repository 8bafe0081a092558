//! Provider implementations for the background feed

mod shared_memory;
mod tcp;

pub use shared_memory::SharedMemoryProvider;
pub use tcp::TcpProvider;
