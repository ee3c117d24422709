// In-process SQLite engine
// Output mirrors the sqlite3 shell in list mode: one line per row, columns joined by '|'

use std::io::Write;
use std::path::Path;

use rusqlite::types::ValueRef;
use rusqlite::{Batch, Connection, ErrorCode, Statement};

use super::engine::{EngineOutput, ExitStatus, SqlEngine};

const COLUMN_SEPARATOR: u8 = b'|';

/// Exit code the sqlite3 shell reports after a failed statement.
const STATEMENT_ERROR_CODE: i32 = 1;

/// SQLite's own REAL to TEXT conversion, the one the sqlite3 shell prints with.
const REAL_TEXT_SQL: &str = "SELECT CAST(?1 AS TEXT)";

pub struct EmbeddedEngine {
    conn: Connection,
}

impl EmbeddedEngine {
    pub fn open(path: &Path) -> rusqlite::Result<Self> {
        let conn = Connection::open(path)?;
        Ok(Self { conn })
    }

    fn write_rows(
        conn: &Connection,
        stmt: &mut Statement<'_>,
        out: &mut Vec<u8>,
    ) -> rusqlite::Result<()> {
        let columns = stmt.column_count();
        let mut rows = stmt.raw_query();
        while let Some(row) = rows.next()? {
            for i in 0..columns {
                if i > 0 {
                    out.push(COLUMN_SEPARATOR);
                }
                write_value(conn, out, row.get_ref(i)?)?;
            }
            out.push(b'\n');
        }
        Ok(())
    }
}

fn write_value(
    conn: &Connection,
    out: &mut Vec<u8>,
    value: ValueRef<'_>,
) -> rusqlite::Result<()> {
    match value {
        ValueRef::Null => {}
        ValueRef::Integer(i) => {
            let _ = write!(out, "{}", i);
        }
        ValueRef::Real(f) => out.extend_from_slice(real_text(conn, f)?.as_bytes()),
        ValueRef::Text(bytes) | ValueRef::Blob(bytes) => out.extend_from_slice(bytes),
    }
    Ok(())
}

fn real_text(conn: &Connection, value: f64) -> rusqlite::Result<String> {
    conn.prepare_cached(REAL_TEXT_SQL)?
        .query_row([value], |row| row.get(0))
}

/// Errors that say the database or the process is unhealthy rather than the statement wrong.
fn fault_reason(err: &rusqlite::Error) -> Option<String> {
    let rusqlite::Error::SqliteFailure(failure, _) = err else {
        return None;
    };
    let fatal = matches!(
        failure.code,
        ErrorCode::InternalMalfunction
            | ErrorCode::PermissionDenied
            | ErrorCode::DatabaseBusy
            | ErrorCode::DatabaseLocked
            | ErrorCode::OutOfMemory
            | ErrorCode::ReadOnly
            | ErrorCode::SystemIoFailure
            | ErrorCode::DatabaseCorrupt
            | ErrorCode::DiskFull
            | ErrorCode::CannotOpen
            | ErrorCode::FileLockingProtocolFailed
            | ErrorCode::NoLargeFileSupport
            | ErrorCode::NotADatabase
    );
    fatal.then(|| err.to_string())
}

impl SqlEngine for EmbeddedEngine {
    fn run(&mut self, script: &str) -> EngineOutput {
        let mut stdout = Vec::new();
        let mut stderr = Vec::new();
        let mut failed = false;

        let mut batch = Batch::new(&self.conn, script);
        loop {
            match batch.next() {
                Ok(Some(mut stmt)) => {
                    if let Err(e) = Self::write_rows(&self.conn, &mut stmt, &mut stdout) {
                        if let Some(reason) = fault_reason(&e) {
                            return EngineOutput::fault(reason);
                        }
                        let _ = writeln!(stderr, "Error: {}", e);
                        failed = true;
                    }
                }
                Ok(None) => break,
                // A statement that fails to prepare leaves the rest of the script unparseable.
                Err(e) => {
                    if let Some(reason) = fault_reason(&e) {
                        return EngineOutput::fault(reason);
                    }
                    let _ = writeln!(stderr, "Error: {}", e);
                    failed = true;
                    break;
                }
            }
        }

        let status = if failed {
            ExitStatus::StatementError(STATEMENT_ERROR_CODE)
        } else {
            ExitStatus::Success
        };
        EngineOutput {
            status,
            stdout,
            stderr,
        }
    }

    fn name(&self) -> &'static str {
        "embedded"
    }
}
