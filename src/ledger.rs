use crate::course::SessionType;
use crate::error::{EngineError, EngineResult};
use crate::roster;
use chrono::NaiveDate;
use rusqlite::types::Type;
use rusqlite::{Connection, OptionalExtension};
use serde::Serialize;
use uuid::Uuid;

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AttendanceRecord {
    pub id: String,
    pub student_id: String,
    pub professor_course_id: String,
    pub course_id: String,
    pub session_date: NaiveDate,
    pub session_type: SessionType,
    pub present: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
}

#[derive(Debug, Clone)]
pub struct NewAttendance {
    pub student_id: String,
    pub professor_course_id: String,
    pub session_date: NaiveDate,
    /// `None` lets a single-type assignment pick its own type.
    pub session_type: Option<SessionType>,
    pub present: bool,
    pub notes: Option<String>,
}

const RECORD_SELECT: &str = "SELECT a.id, a.student_id, a.professor_course_id, pc.course_id,
        a.session_date, a.session_type, a.present, a.notes
 FROM attendance_records a
 JOIN professor_courses pc ON pc.id = a.professor_course_id";

fn map_record(r: &rusqlite::Row<'_>) -> rusqlite::Result<AttendanceRecord> {
    let raw_type: String = r.get(5)?;
    let session_type = SessionType::parse(&raw_type).ok_or_else(|| {
        rusqlite::Error::FromSqlConversionFailure(
            5,
            Type::Text,
            format!("unknown session type {raw_type:?}").into(),
        )
    })?;
    Ok(AttendanceRecord {
        id: r.get(0)?,
        student_id: r.get(1)?,
        professor_course_id: r.get(2)?,
        course_id: r.get(3)?,
        session_date: r.get(4)?,
        session_type,
        present: r.get::<_, i64>(6)? != 0,
        notes: r.get(7)?,
    })
}

fn is_unique_violation(e: &rusqlite::Error) -> bool {
    matches!(
        e,
        rusqlite::Error::SqliteFailure(f, _)
            if f.extended_code == rusqlite::ffi::SQLITE_CONSTRAINT_UNIQUE
    )
}

/// Appends one session record. Uniqueness of (student, assignment, date) is
/// left to the table constraint so that concurrent writers for the same key
/// see exactly one success.
pub fn record_attendance(conn: &Connection, new: &NewAttendance) -> EngineResult<AttendanceRecord> {
    let Some(assignment) = roster::load_assignment(conn, &new.professor_course_id)? else {
        return Err(EngineError::NotFound("course assignment".into()));
    };
    let session_type = match new.session_type {
        Some(t) if assignment.teaches(t) => t,
        Some(t) => {
            return Err(EngineError::SessionTypeNotAssigned {
                professor_course_id: assignment.professor_course_id,
                session_type: t.to_string(),
            })
        }
        None => assignment.only_session_type().ok_or_else(|| {
            EngineError::InvalidInput(
                "sessionType is required for assignments teaching both types".into(),
            )
        })?,
    };
    if !roster::is_enrolled(conn, &new.student_id, &new.professor_course_id)? {
        return Err(EngineError::NotEnrolled {
            student_id: new.student_id.clone(),
            professor_course_id: new.professor_course_id.clone(),
        });
    }

    let notes = new
        .notes
        .as_deref()
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string);
    let id = Uuid::new_v4().to_string();
    let inserted = conn.execute(
        "INSERT INTO attendance_records(
           id, student_id, professor_course_id, session_date, session_type, present, notes
         ) VALUES(?, ?, ?, ?, ?, ?, ?)",
        (
            &id,
            &new.student_id,
            &new.professor_course_id,
            new.session_date,
            session_type.as_str(),
            new.present as i64,
            &notes,
        ),
    );
    match inserted {
        Ok(_) => {}
        Err(e) if is_unique_violation(&e) => {
            tracing::warn!(
                student_id = %new.student_id,
                professor_course_id = %new.professor_course_id,
                session_date = %new.session_date,
                "duplicate attendance submission rejected"
            );
            return Err(EngineError::DuplicateRecord {
                student_id: new.student_id.clone(),
                professor_course_id: new.professor_course_id.clone(),
                session_date: new.session_date,
            });
        }
        Err(e) => return Err(e.into()),
    }

    tracing::info!(
        student_id = %new.student_id,
        professor_course_id = %new.professor_course_id,
        session_date = %new.session_date,
        session_type = %session_type,
        present = new.present,
        "attendance recorded"
    );
    Ok(AttendanceRecord {
        id,
        student_id: new.student_id.clone(),
        professor_course_id: new.professor_course_id.clone(),
        course_id: assignment.course_id,
        session_date: new.session_date,
        session_type,
        present: new.present,
        notes,
    })
}

fn delete_one(
    conn: &Connection,
    student_id: &str,
    professor_course_id: &str,
    session_date: Option<NaiveDate>,
) -> EngineResult<AttendanceRecord> {
    let tx = conn.unchecked_transaction()?;
    let found = match session_date {
        Some(date) => tx
            .query_row(
                &format!(
                    "{RECORD_SELECT}
                     WHERE a.student_id = ? AND a.professor_course_id = ? AND a.session_date = ?"
                ),
                (student_id, professor_course_id, date),
                map_record,
            )
            .optional()?,
        None => tx
            .query_row(
                &format!(
                    "{RECORD_SELECT}
                     WHERE a.student_id = ? AND a.professor_course_id = ?
                     ORDER BY a.session_date DESC
                     LIMIT 1"
                ),
                (student_id, professor_course_id),
                map_record,
            )
            .optional()?,
    };
    let Some(record) = found else {
        return Err(EngineError::NotFound("attendance record".into()));
    };
    tx.execute("DELETE FROM attendance_records WHERE id = ?", [&record.id])?;
    tx.commit()?;

    tracing::info!(
        student_id = %student_id,
        professor_course_id = %professor_course_id,
        session_date = %record.session_date,
        "attendance record deleted"
    );
    Ok(record)
}

/// Removes the most recently dated record for the pair.
pub fn delete_latest(
    conn: &Connection,
    student_id: &str,
    professor_course_id: &str,
) -> EngineResult<AttendanceRecord> {
    delete_one(conn, student_id, professor_course_id, None)
}

pub fn delete_by_date(
    conn: &Connection,
    student_id: &str,
    professor_course_id: &str,
    session_date: NaiveDate,
) -> EngineResult<AttendanceRecord> {
    delete_one(conn, student_id, professor_course_id, Some(session_date))
}

pub fn list_for_assignment(
    conn: &Connection,
    student_id: &str,
    professor_course_id: &str,
) -> EngineResult<Vec<AttendanceRecord>> {
    let mut stmt = conn.prepare(&format!(
        "{RECORD_SELECT}
         WHERE a.student_id = ? AND a.professor_course_id = ?
         ORDER BY a.session_date"
    ))?;
    let rows = stmt
        .query_map((student_id, professor_course_id), map_record)?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(rows)
}

/// Every record of the student for the course, summed across all sections.
pub fn records_for_course(
    conn: &Connection,
    student_id: &str,
    course_id: &str,
) -> EngineResult<Vec<AttendanceRecord>> {
    let mut stmt = conn.prepare(&format!(
        "{RECORD_SELECT}
         WHERE a.student_id = ? AND pc.course_id = ?
         ORDER BY a.session_date, a.professor_course_id"
    ))?;
    let rows = stmt
        .query_map((student_id, course_id), map_record)?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(rows)
}
