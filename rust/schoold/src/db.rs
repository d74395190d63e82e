use rusqlite::Connection;
use std::path::Path;

pub const DB_FILE_NAME: &str = "schoold.sqlite3";

/// Opens (creating if needed) the workspace database. `":memory:"` opens a
/// throwaway in-memory database.
pub fn open_db(workspace: &Path) -> anyhow::Result<Connection> {
    let conn = if workspace.as_os_str() == ":memory:" {
        Connection::open_in_memory()?
    } else {
        std::fs::create_dir_all(workspace)?;
        Connection::open(workspace.join(DB_FILE_NAME))?
    };
    conn.execute("PRAGMA foreign_keys = ON", [])?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS students(
            id TEXT PRIMARY KEY,
            name TEXT NOT NULL,
            grade_level TEXT NOT NULL,
            section TEXT,
            admission_seq INTEGER NOT NULL
        )",
        [],
    )?;
    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_students_grade ON students(grade_level, admission_seq)",
        [],
    )?;
    // Added after the first schema; older workspaces get the columns on open.
    ensure_students_timestamps(&conn)?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS subjects(
            code TEXT PRIMARY KEY,
            name TEXT NOT NULL
        )",
        [],
    )?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS assessment_records(
            student_id TEXT NOT NULL,
            subject TEXT NOT NULL,
            category TEXT NOT NULL,
            term TEXT NOT NULL,
            raw_score REAL NOT NULL,
            max_score REAL NOT NULL,
            updated_at TEXT,
            PRIMARY KEY(student_id, subject, category, term),
            FOREIGN KEY(student_id) REFERENCES students(id),
            FOREIGN KEY(subject) REFERENCES subjects(code)
        )",
        [],
    )?;
    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_assessment_records_subject_term
         ON assessment_records(subject, term)",
        [],
    )?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS settings(
            key TEXT PRIMARY KEY,
            value_json TEXT NOT NULL
        )",
        [],
    )?;

    Ok(conn)
}

fn ensure_students_timestamps(conn: &Connection) -> anyhow::Result<()> {
    if !table_has_column(conn, "students", "admitted_at")? {
        conn.execute("ALTER TABLE students ADD COLUMN admitted_at TEXT", [])?;
    }
    if !table_has_column(conn, "students", "updated_at")? {
        conn.execute("ALTER TABLE students ADD COLUMN updated_at TEXT", [])?;
    }
    Ok(())
}

fn table_has_column(conn: &Connection, table: &str, column: &str) -> anyhow::Result<bool> {
    let sql = format!("PRAGMA table_info({})", table);
    let mut stmt = conn.prepare(&sql)?;
    let mut rows = stmt.query([])?;
    while let Some(row) = rows.next()? {
        let name: String = row.get(1)?;
        if name == column {
            return Ok(true);
        }
    }
    Ok(false)
}
