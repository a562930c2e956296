//! Server status flags returned in OK/EOF packets. Grounded on
//! `connection/src/declar/status_flags.rs`.

use bitflags::bitflags;

bitflags! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct StatusFlags: u16 {
        const SERVER_STATUS_IN_TRANS        = 0x0001;
        const SERVER_STATUS_AUTOCOMMIT      = 0x0002;
        const SERVER_MORE_RESULTS_EXISTS    = 0x0008;
        const SERVER_STATUS_NO_GOOD_INDEX_USED = 0x0010;
        const SERVER_STATUS_NO_INDEX_USED   = 0x0020;
        const SERVER_STATUS_CURSOR_EXISTS   = 0x0040;
        const SERVER_STATUS_LAST_ROW_SENT   = 0x0080;
        const SERVER_STATUS_DB_DROPPED      = 0x0100;
    }
}
