//! Decoded row-change data: one `ColumnData` per column, grouped into a
//! `RowData` per affected row, grouped into a `StreamEvent` per statement,
//! grouped into a `Transaction` per commit.

use crate::column_type::ColumnType;
use crate::position::BinlogPosition;
use crate::statement::StatementType;

/// One column's value within a [`RowData`]. `data` is `None` both for an
/// absent column (not present in this row image — `is_empty` distinguishes
/// that case) and for a SQL NULL.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnData {
    pub field_name: String,
    pub column_type: ColumnType,
    pub is_empty: bool,
    pub data: Option<Vec<u8>>,
}

impl ColumnData {
    pub fn new(field_name: impl Into<String>, column_type: ColumnType) -> Self {
        Self {
            field_name: field_name.into(),
            column_type,
            is_empty: false,
            data: None,
        }
    }

    pub fn absent(field_name: impl Into<String>, column_type: ColumnType) -> Self {
        Self {
            field_name: field_name.into(),
            column_type,
            is_empty: true,
            data: None,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RowData {
    pub columns: Vec<ColumnData>,
}

/// One insert/update/delete, decoded against its table's schema. Inserts
/// populate only `row_values`, deletes only `row_identifies`, updates
/// populate both (a before/after pair per affected row).
#[derive(Debug, Clone)]
pub struct StreamEvent {
    pub statement: StatementType,
    pub timestamp: i64,
    pub table: String,
    pub row_values: Vec<RowData>,
    pub row_identifies: Vec<RowData>,
}

impl StreamEvent {
    pub fn new(statement: StatementType, timestamp: i64, table: impl Into<String>) -> Self {
        Self {
            statement,
            timestamp,
            table: table.into(),
            row_values: Vec::new(),
            row_identifies: Vec::new(),
        }
    }
}

/// A committed group of row changes. `now`/`next` bracket the binlog
/// position consumed to produce it, so a sink can persist `next` as a
/// resume point after processing.
#[derive(Debug, Clone)]
pub struct Transaction {
    pub now: BinlogPosition,
    pub next: BinlogPosition,
    pub timestamp: i64,
    pub statements: Vec<StreamEvent>,
}

impl Transaction {
    pub fn new(now: BinlogPosition, next: BinlogPosition, timestamp: i64, statements: Vec<StreamEvent>) -> Self {
        Self {
            now,
            next,
            timestamp,
            statements,
        }
    }
}
