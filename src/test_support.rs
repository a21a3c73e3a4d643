use rusqlite::Connection;
use uuid::Uuid;

use crate::db;

pub(crate) struct Fixture {
    pub(crate) course: String,
    pub(crate) professor: String,
    pub(crate) section: String,
    pub(crate) student: String,
}

pub(crate) fn workspace() -> Connection {
    let conn = Connection::open_in_memory().expect("open in-memory db");
    db::init_schema(&conn).expect("init schema");
    conn
}

/// `practical` and `theoretical` are (hours, per-absence weight).
pub(crate) fn course(
    conn: &Connection,
    name: &str,
    practical: (u32, f64),
    theoretical: (u32, f64),
    full_attendance: f64,
) -> String {
    let id = Uuid::new_v4().to_string();
    conn.execute(
        "INSERT INTO courses(id, name, practical_hours, theoretical_hours,
           max_absence_limit_practical, max_absence_limit_theoretical, full_attendance)
         VALUES(?, ?, ?, ?, ?, ?, ?)",
        (
            &id,
            name,
            practical.0 as i64,
            theoretical.0 as i64,
            practical.1,
            theoretical.1,
            full_attendance,
        ),
    )
    .expect("insert course");
    id
}

pub(crate) fn professor(conn: &Connection, full_name: &str) -> String {
    let id = Uuid::new_v4().to_string();
    conn.execute(
        "INSERT INTO professors(id, full_name) VALUES(?, ?)",
        (&id, full_name),
    )
    .expect("insert professor");
    id
}

pub(crate) fn student(conn: &Connection, full_name: &str) -> String {
    let id = Uuid::new_v4().to_string();
    conn.execute(
        "INSERT INTO students(id, full_name) VALUES(?, ?)",
        (&id, full_name),
    )
    .expect("insert student");
    id
}

pub(crate) fn assignment(
    conn: &Connection,
    course_id: &str,
    professor_id: &str,
    practical_n: u32,
    theoretical_n: u32,
) -> String {
    let id = Uuid::new_v4().to_string();
    conn.execute(
        "INSERT INTO professor_courses(id, course_id, professor_id, practical_n, theoretical_n)
         VALUES(?, ?, ?, ?, ?)",
        (&id, course_id, professor_id, practical_n as i64, theoretical_n as i64),
    )
    .expect("insert assignment");
    id
}

pub(crate) fn enroll(conn: &Connection, student_id: &str, professor_course_id: &str) {
    conn.execute(
        "INSERT INTO enrollments(student_id, professor_course_id) VALUES(?, ?)",
        (student_id, professor_course_id),
    )
    .expect("insert enrollment");
}

/// Writes an absence straight into the ledger table, bypassing validation.
pub(crate) fn absent(
    conn: &Connection,
    student_id: &str,
    professor_course_id: &str,
    session_date: &str,
    session_type: &str,
) {
    conn.execute(
        "INSERT INTO attendance_records(
           id, student_id, professor_course_id, session_date, session_type, present
         ) VALUES(?, ?, ?, ?, ?, 0)",
        (
            Uuid::new_v4().to_string(),
            student_id,
            professor_course_id,
            session_date,
            session_type,
        ),
    )
    .expect("insert absence");
}

/// Practical-only course (2 hours, weight 5, threshold 20) with one section
/// and one enrolled student.
pub(crate) fn single_section() -> (Connection, Fixture) {
    let conn = workspace();
    let course = course(&conn, "Fluid Mechanics", (2, 5.0), (0, 0.0), 20.0);
    let professor = professor(&conn, "Dr. Mansour");
    let section = assignment(&conn, &course, &professor, 1, 0);
    let student = student(&conn, "Yara Haddad");
    enroll(&conn, &student, &section);
    (
        conn,
        Fixture {
            course,
            professor,
            section,
            student,
        },
    )
}
