//! Wire protocol: the fixed 32-byte header and the packet container.

mod packet;
mod wire_format;

pub use packet::{read_packet, write_packet, Packet};
pub use wire_format::{Header, HEADER_SIZE, MAGIC_CODE_A, MAGIC_CODE_B, MAX_RPC_SIZE};
