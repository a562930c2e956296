pub mod decode;
pub mod frame;
pub mod header;

pub use frame::{parse_dump_packet, DumpPacket, EventKind, RawEvent};
pub use header::EventHeader;
