//! Concrete transports: file (with rotation, retention, encryption
//! and buffering), bounded in-memory buffer, and TCP console.

pub mod encrypt;
pub mod file;
pub mod memory;
pub mod tcp;

pub use encrypt::{EncryptStream, EncryptionKey};
pub use file::FileTransport;
pub use memory::{FlushTarget, MemoryTransport, FLUSH_TO_WRITER};
pub use tcp::TcpTransport;
