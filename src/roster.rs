use crate::course::SessionType;
use crate::error::EngineResult;
use rusqlite::{Connection, OptionalExtension};
use serde::Serialize;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Student {
    #[serde(rename = "studentId")]
    pub id: String,
    pub full_name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub student_no: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CourseAssignment {
    pub professor_course_id: String,
    pub course_id: String,
    pub professor_id: String,
    pub practical_n: u32,
    pub theoretical_n: u32,
}

impl CourseAssignment {
    pub fn teaches(&self, session_type: SessionType) -> bool {
        match session_type {
            SessionType::Practical => self.practical_n > 0,
            SessionType::Theoretical => self.theoretical_n > 0,
        }
    }

    /// The session type to assume when a caller does not name one: only
    /// defined when the assignment teaches exactly one type.
    pub fn only_session_type(&self) -> Option<SessionType> {
        match (self.practical_n > 0, self.theoretical_n > 0) {
            (true, false) => Some(SessionType::Practical),
            (false, true) => Some(SessionType::Theoretical),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EnrollmentScope<'a> {
    Course(&'a str),
    Assignment(&'a str),
}

fn map_assignment(r: &rusqlite::Row<'_>) -> rusqlite::Result<CourseAssignment> {
    Ok(CourseAssignment {
        professor_course_id: r.get(0)?,
        course_id: r.get(1)?,
        professor_id: r.get(2)?,
        practical_n: r.get::<_, i64>(3)?.max(0) as u32,
        theoretical_n: r.get::<_, i64>(4)?.max(0) as u32,
    })
}

fn map_student(r: &rusqlite::Row<'_>) -> rusqlite::Result<Student> {
    Ok(Student {
        id: r.get(0)?,
        full_name: r.get(1)?,
        student_no: r.get(2)?,
    })
}

pub fn load_assignment(
    conn: &Connection,
    professor_course_id: &str,
) -> EngineResult<Option<CourseAssignment>> {
    let row = conn
        .query_row(
            "SELECT id, course_id, professor_id, practical_n, theoretical_n
             FROM professor_courses
             WHERE id = ?",
            [professor_course_id],
            map_assignment,
        )
        .optional()?;
    Ok(row)
}

pub fn assignments_for_professor(
    conn: &Connection,
    professor_id: &str,
) -> EngineResult<Vec<CourseAssignment>> {
    let mut stmt = conn.prepare(
        "SELECT pc.id, pc.course_id, pc.professor_id, pc.practical_n, pc.theoretical_n
         FROM professor_courses pc
         LEFT JOIN courses c ON c.id = pc.course_id
         WHERE pc.professor_id = ?
         ORDER BY c.name, pc.id",
    )?;
    let rows = stmt
        .query_map([professor_id], map_assignment)?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(rows)
}

/// Students enrolled in the scope, ordered by name then id. A course scope
/// deduplicates students enrolled in several of its sections; an assignment
/// scope never reaches beyond that assignment's own enrollments.
pub fn enrolled_students(conn: &Connection, scope: EnrollmentScope<'_>) -> EngineResult<Vec<Student>> {
    let (sql, key) = match scope {
        EnrollmentScope::Course(course_id) => (
            "SELECT s.id, s.full_name, s.student_no
             FROM students s
             WHERE s.id IN (
               SELECT e.student_id
               FROM enrollments e
               JOIN professor_courses pc ON pc.id = e.professor_course_id
               WHERE pc.course_id = ?
             )
             ORDER BY s.full_name, s.id",
            course_id,
        ),
        EnrollmentScope::Assignment(professor_course_id) => (
            "SELECT s.id, s.full_name, s.student_no
             FROM students s
             JOIN enrollments e ON e.student_id = s.id
             WHERE e.professor_course_id = ?
             ORDER BY s.full_name, s.id",
            professor_course_id,
        ),
    };
    let mut stmt = conn.prepare(sql)?;
    let rows = stmt
        .query_map([key], map_student)?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(rows)
}

pub fn is_enrolled(
    conn: &Connection,
    student_id: &str,
    professor_course_id: &str,
) -> EngineResult<bool> {
    let hit = conn
        .query_row(
            "SELECT 1 FROM enrollments WHERE student_id = ? AND professor_course_id = ?",
            (student_id, professor_course_id),
            |r| r.get::<_, i64>(0),
        )
        .optional()?;
    Ok(hit.is_some())
}

pub fn load_student(conn: &Connection, student_id: &str) -> EngineResult<Option<Student>> {
    let row = conn
        .query_row(
            "SELECT id, full_name, student_no FROM students WHERE id = ?",
            [student_id],
            map_student,
        )
        .optional()?;
    Ok(row)
}

pub fn professor_exists(conn: &Connection, professor_id: &str) -> EngineResult<bool> {
    let hit = conn
        .query_row(
            "SELECT 1 FROM professors WHERE id = ?",
            [professor_id],
            |r| r.get::<_, i64>(0),
        )
        .optional()?;
    Ok(hit.is_some())
}

/// A course is known when it has a row of its own or when an assignment
/// still points at it.
pub fn course_known(conn: &Connection, course_id: &str) -> EngineResult<bool> {
    let hit = conn
        .query_row(
            "SELECT 1 FROM courses WHERE id = ?1
             UNION ALL
             SELECT 1 FROM professor_courses WHERE course_id = ?1
             LIMIT 1",
            [course_id],
            |r| r.get::<_, i64>(0),
        )
        .optional()?;
    Ok(hit.is_some())
}

/// Distinct courses a student is enrolled in through any section, ordered by
/// course name.
pub fn courses_for_student(conn: &Connection, student_id: &str) -> EngineResult<Vec<String>> {
    let mut stmt = conn.prepare(
        "SELECT pc.course_id, MIN(c.name) AS course_name
         FROM enrollments e
         JOIN professor_courses pc ON pc.id = e.professor_course_id
         LEFT JOIN courses c ON c.id = pc.course_id
         WHERE e.student_id = ?
         GROUP BY pc.course_id
         ORDER BY course_name, pc.course_id",
    )?;
    let rows = stmt
        .query_map([student_id], |r| r.get::<_, String>(0))?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(rows)
}
