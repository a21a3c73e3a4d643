use rusqlite::Connection;
use std::path::Path;

pub const DB_FILE_NAME: &str = "attendance.sqlite3";

pub fn open_db(workspace: &Path) -> anyhow::Result<Connection> {
    std::fs::create_dir_all(workspace)?;
    let db_path = workspace.join(DB_FILE_NAME);
    let conn = Connection::open(&db_path)?;
    init_schema(&conn)?;
    tracing::info!(path = %db_path.display(), "workspace database ready");
    Ok(conn)
}

pub fn init_schema(conn: &Connection) -> anyhow::Result<()> {
    conn.execute("PRAGMA foreign_keys = ON", [])?;

    // Zero hours means the course has no such component.
    conn.execute(
        "CREATE TABLE IF NOT EXISTS courses(
            id TEXT PRIMARY KEY,
            name TEXT NOT NULL,
            practical_hours INTEGER NOT NULL DEFAULT 0,
            theoretical_hours INTEGER NOT NULL DEFAULT 0,
            max_absence_limit_practical REAL NOT NULL DEFAULT 0,
            max_absence_limit_theoretical REAL NOT NULL DEFAULT 0,
            full_attendance REAL NOT NULL
        )",
        [],
    )?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS professors(
            id TEXT PRIMARY KEY,
            full_name TEXT NOT NULL
        )",
        [],
    )?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS students(
            id TEXT PRIMARY KEY,
            full_name TEXT NOT NULL
        )",
        [],
    )?;
    ensure_students_student_no(conn)?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS professor_courses(
            id TEXT PRIMARY KEY,
            course_id TEXT NOT NULL,
            professor_id TEXT NOT NULL,
            practical_n INTEGER NOT NULL DEFAULT 0,
            theoretical_n INTEGER NOT NULL DEFAULT 0,
            FOREIGN KEY(course_id) REFERENCES courses(id),
            FOREIGN KEY(professor_id) REFERENCES professors(id)
        )",
        [],
    )?;
    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_professor_courses_course ON professor_courses(course_id)",
        [],
    )?;
    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_professor_courses_professor ON professor_courses(professor_id)",
        [],
    )?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS enrollments(
            student_id TEXT NOT NULL,
            professor_course_id TEXT NOT NULL,
            PRIMARY KEY(student_id, professor_course_id),
            FOREIGN KEY(student_id) REFERENCES students(id),
            FOREIGN KEY(professor_course_id) REFERENCES professor_courses(id)
        )",
        [],
    )?;
    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_enrollments_assignment ON enrollments(professor_course_id)",
        [],
    )?;

    // One record per student, assignment and session date, whatever the
    // session type.
    conn.execute(
        "CREATE TABLE IF NOT EXISTS attendance_records(
            id TEXT PRIMARY KEY,
            student_id TEXT NOT NULL,
            professor_course_id TEXT NOT NULL,
            session_date TEXT NOT NULL,
            session_type TEXT NOT NULL CHECK(session_type IN ('practical', 'theoretical')),
            present INTEGER NOT NULL,
            FOREIGN KEY(student_id) REFERENCES students(id),
            FOREIGN KEY(professor_course_id) REFERENCES professor_courses(id),
            UNIQUE(student_id, professor_course_id, session_date)
        )",
        [],
    )?;
    ensure_attendance_notes(conn)?;
    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_attendance_assignment ON attendance_records(professor_course_id)",
        [],
    )?;

    Ok(())
}

fn ensure_students_student_no(conn: &Connection) -> anyhow::Result<()> {
    if table_has_column(conn, "students", "student_no")? {
        return Ok(());
    }
    conn.execute("ALTER TABLE students ADD COLUMN student_no TEXT", [])?;
    Ok(())
}

fn ensure_attendance_notes(conn: &Connection) -> anyhow::Result<()> {
    if table_has_column(conn, "attendance_records", "notes")? {
        return Ok(());
    }
    conn.execute("ALTER TABLE attendance_records ADD COLUMN notes TEXT", [])?;
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
