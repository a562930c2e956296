//! Immutable collation-name -> single-byte code table, initialized once at
//! first use via `once_cell`, matching the lazy-initialization convention
//! used for the process-wide tracing subscriber in `log.rs`.

use once_cell::sync::Lazy;
use std::collections::HashMap;

pub const DEFAULT_COLLATION: &str = "utf8mb4_general_ci";

static COLLATIONS: Lazy<HashMap<&'static str, u8>> = Lazy::new(|| {
    HashMap::from([
        ("big5_chinese_ci", 1),
        ("latin1_swedish_ci", 8),
        ("ascii_general_ci", 11),
        ("utf8_general_ci", 33),
        ("binary", 63),
        ("utf8mb4_general_ci", 45),
        ("utf8mb4_unicode_ci", 224),
        ("utf8mb4_0900_ai_ci", 255),
        ("utf8mb3_general_ci", 33),
        ("gbk_chinese_ci", 28),
    ])
});

/// Looks up the single-byte collation code for `name`, falling back to
/// [`DEFAULT_COLLATION`]'s code if `name` is unknown.
pub fn lookup(name: &str) -> u8 {
    COLLATIONS
        .get(name)
        .copied()
        .unwrap_or_else(|| COLLATIONS[DEFAULT_COLLATION])
}
