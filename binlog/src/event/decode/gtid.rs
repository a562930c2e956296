//! GTID / PreviousGTIDs events: observed and logged, never interpreted.
//! This pipeline tracks position by filename/offset, not GTID set, so
//! these events carry no information the assembler needs to act on.

/// Marker type — the assembler logs arrival and otherwise ignores the body.
pub struct Gtid;

pub fn decode(_body: &[u8]) -> Gtid {
    Gtid
}
