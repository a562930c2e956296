//! The binlog stream assembler: folds a sequence of raw events into
//! committed [`Transaction`]s. Holds the format/table-map cache, the
//! in-flight transaction buffer, and the autocommit flag; a fatal error
//! here ends the stream by propagating up through `handle`'s `Result`
//! rather than being swallowed and retried internally.

use std::collections::HashMap;

use common::codec::Bitmap;
use common::error::{Error, ProtocolError, Result};

use crate::cell;
use crate::column_type::ColumnType;
use crate::event::decode::rows::{self, RowsEventHeader};
use crate::event::decode::{format_description, gtid, query, rotate, xid};
use crate::event::frame::{EventKind, RawEvent};
use crate::event::header::EventHeader;
use crate::format::BinlogFormat;
use crate::position::BinlogPosition;
use crate::row::{ColumnData, RowData, StreamEvent, Transaction};
use crate::schema::{ColumnSchema, TableInfoMapper};
use crate::statement::{self, StatementType};
use crate::table_map::TableMap;

struct TableEntry {
    table_map: TableMap,
    schema: Vec<ColumnSchema>,
}

/// Owns every piece of state `parseEvents` closed over: the learned binlog
/// format, the table-map cache, the buffered in-flight transaction, the
/// autocommit flag and the current position.
pub struct Assembler<M: TableInfoMapper> {
    mapper: M,
    format: BinlogFormat,
    tables: HashMap<u64, TableEntry>,
    buffer: Option<Vec<StreamEvent>>,
    autocommit: bool,
    position: BinlogPosition,
}

impl<M: TableInfoMapper> Assembler<M> {
    pub fn new(mapper: M, start: BinlogPosition) -> Self {
        Self {
            mapper,
            format: BinlogFormat::default(),
            tables: HashMap::new(),
            buffer: None,
            autocommit: true,
            position: start,
        }
    }

    pub fn position(&self) -> &BinlogPosition {
        &self.position
    }

    /// The binlog format learned so far, needed by the transport layer to
    /// interpret the next raw dump-stream packet before handing it here.
    pub fn format(&self) -> &BinlogFormat {
        &self.format
    }

    /// Folds one raw event into assembler state. Returns `Some(Transaction)`
    /// exactly when this event closed a transaction (an XID, an autocommit
    /// row event, or a Query classified as commit/rollback).
    pub fn handle(&mut self, event: RawEvent) -> Result<Option<Transaction>> {
        if !event.is_valid() {
            return Err(fatal("invalid event: declared length shorter than the common header"));
        }

        if let EventKind::FormatDescription = event.kind {
            self.format = format_description::decode(&event.body)?;
            tracing::debug!(version = self.format.format_version, "learned binlog format");
            return Ok(None);
        }

        if self.format.is_zero() {
            if let EventKind::Rotate = event.kind {
                let r = rotate::decode(&event.body)?;
                self.position = BinlogPosition::new(r.filename, r.position);
                return Ok(None);
            }
            return Err(fatal("event seen before any format-description event"));
        }

        match event.kind {
            EventKind::Rotate => {
                let r = rotate::decode(&event.body)?;
                self.position = BinlogPosition::new(r.filename, r.position);
                Ok(None)
            }
            EventKind::Xid => {
                xid::decode(&event.body)?;
                Ok(Some(self.commit(&event.header)))
            }
            EventKind::Query => self.handle_query(&event.header, &event.body),
            EventKind::TableMap => self.handle_table_map(&event.body),
            EventKind::WriteRows { v2 } => self.handle_rows(&event.header, StatementType::Insert, false, true, v2, &event.body),
            EventKind::UpdateRows { v2 } => self.handle_rows(&event.header, StatementType::Update, true, true, v2, &event.body),
            EventKind::DeleteRows { v2 } => self.handle_rows(&event.header, StatementType::Delete, true, false, v2, &event.body),
            EventKind::Gtid => {
                gtid::decode(&event.body);
                tracing::debug!("observed GTID event");
                Ok(None)
            }
            EventKind::PreviousGtids => {
                tracing::debug!("observed previous-GTIDs event");
                Ok(None)
            }
            EventKind::Rand => Err(fatal("unsupported RAND event in row-based binlog stream")),
            EventKind::IntVar => Err(fatal("unsupported INTVAR event in row-based binlog stream")),
            EventKind::RowsQuery => Err(fatal("unsupported ROWS_QUERY event in row-based binlog stream")),
            EventKind::Other(_) | EventKind::FormatDescription => Ok(None),
        }
    }

    fn handle_query(&mut self, header: &EventHeader, body: &[u8]) -> Result<Option<Transaction>> {
        let q = query::decode(body)?;
        match statement::category(&q.sql) {
            StatementType::Begin => {
                if let Some(dropped) = self.buffer.take() {
                    tracing::warn!(count = dropped.len(), "BEGIN while a transaction was already open, dropping buffered events");
                }
                self.buffer = Some(Vec::new());
                self.autocommit = false;
                Ok(None)
            }
            StatementType::Rollback => {
                self.buffer = None;
                Ok(Some(self.commit(header)))
            }
            StatementType::Commit => Ok(Some(self.commit(header))),
            other => {
                tracing::warn!(statement = other.as_str(), sql = %q.sql, "non-transactional statement in row-based binlog stream");
                Ok(None)
            }
        }
    }

    fn handle_table_map(&mut self, body: &[u8]) -> Result<Option<Transaction>> {
        let tm = TableMap::parse(body)?;
        if let Some(entry) = self.tables.get_mut(&tm.table_id) {
            entry.table_map = tm;
            return Ok(None);
        }

        let schema = self
            .mapper
            .columns(&tm.database, &tm.table)
            .map_err(|e| fatal(&format!("resolving schema for {}.{}: {e}", tm.database, tm.table)))?;
        if schema.len() != tm.can_be_null.len() {
            return Err(fatal(&format!(
                "table-map column count ({}) does not match schema column count ({}) for {}.{}",
                tm.can_be_null.len(),
                schema.len(),
                tm.database,
                tm.table
            )));
        }

        self.tables.insert(tm.table_id, TableEntry { table_map: tm, schema });
        Ok(None)
    }

    fn handle_rows(
        &mut self,
        header: &EventHeader,
        statement: StatementType,
        has_identify: bool,
        has_data: bool,
        v2: bool,
        body: &[u8],
    ) -> Result<Option<Transaction>> {
        let (rows_header, rows_blob) = rows::decode(body, has_identify, has_data, v2)?;
        let entry = self
            .tables
            .get(&rows_header.table_id)
            .ok_or_else(|| fatal(&format!("unknown tableID {} in rows event", rows_header.table_id)))?;

        let (identifies, values) = decode_rows(rows_blob, &rows_header, &entry.table_map, &entry.schema)?;

        let mut stream_event = StreamEvent::new(statement, header.timestamp as i64, entry.table_map.table.clone());
        stream_event.row_identifies = identifies;
        stream_event.row_values = values;

        self.buffer.get_or_insert_with(Vec::new).push(stream_event);
        if self.autocommit {
            Ok(Some(self.commit(header)))
        } else {
            Ok(None)
        }
    }

    fn commit(&mut self, header: &EventHeader) -> Transaction {
        let now = self.position.clone();
        self.position.offset = header.next_position as u64;
        let next = self.position.clone();
        let statements = self.buffer.take().unwrap_or_default();
        self.autocommit = true;
        Transaction::new(now, next, header.timestamp as i64, statements)
    }
}

fn decode_rows(
    rows_blob: &[u8],
    header: &RowsEventHeader,
    table_map: &TableMap,
    schema: &[ColumnSchema],
) -> Result<(Vec<RowData>, Vec<RowData>)> {
    let mut identifies = Vec::new();
    let mut values = Vec::new();
    let mut offset = 0usize;

    while offset < rows_blob.len() {
        if let Some(present) = &header.identify_columns {
            let (row, consumed) = decode_row_image(&rows_blob[offset..], present, table_map, schema)?;
            identifies.push(row);
            offset += consumed;
        }
        if let Some(present) = &header.data_columns {
            let (row, consumed) = decode_row_image(&rows_blob[offset..], present, table_map, schema)?;
            values.push(row);
            offset += consumed;
        }
    }

    Ok((identifies, values))
}

fn decode_row_image(
    payload: &[u8],
    present: &Bitmap,
    table_map: &TableMap,
    schema: &[ColumnSchema],
) -> Result<(RowData, usize)> {
    let present_count = present.count();
    let null_bitmap_len = (present_count + 7) / 8;
    let null_bytes = payload
        .get(..null_bitmap_len)
        .ok_or_else(|| fatal("row image shorter than its null bitmap"))?;
    let null_bitmap = Bitmap::from_bytes(null_bytes, present_count)?;

    let mut offset = null_bitmap_len;
    let mut null_index = 0usize;
    let mut columns = Vec::with_capacity(table_map.column_types.len());

    for c in 0..table_map.column_types.len() {
        let column_type: ColumnType = table_map.column_types[c];
        let field_name = schema.get(c).map(|s| s.name.clone()).unwrap_or_default();

        if !present.bit(c) {
            columns.push(ColumnData::absent(field_name, column_type));
            continue;
        }

        if null_bitmap.bit(null_index) {
            columns.push(ColumnData::new(field_name, column_type));
            null_index += 1;
            continue;
        }

        let is_unsigned = schema.get(c).map(|s| s.is_unsigned_integer).unwrap_or(false);
        let metadata = table_map.metadata[c];
        let (text, consumed) = cell::decode(&payload[offset..], column_type, metadata, is_unsigned)?;

        let mut column = ColumnData::new(field_name, column_type);
        column.data = Some(text);
        columns.push(column);

        offset += consumed;
        null_index += 1;
    }

    Ok((RowData { columns }, offset))
}

fn fatal(msg: &str) -> Error {
    ProtocolError::Malformed(msg.to_string()).into()
}
