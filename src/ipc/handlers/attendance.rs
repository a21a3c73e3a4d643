use crate::course::SessionType;
use crate::eligibility;
use crate::error::EngineError;
use crate::ipc::helpers::{
    get_optional_session_type, get_optional_str, get_required_bool, get_required_date,
    get_required_str, to_json, with_conn, HandlerErr,
};
use crate::ipc::types::{AppState, Request};
use crate::ledger::{self, NewAttendance};
use crate::roster;
use chrono::NaiveDate;
use rusqlite::Connection;
use serde_json::json;

/// Recomputes the student's standing for the course after a mutation. A
/// course whose configuration is broken still reports the mutation itself.
fn fresh_summary(
    conn: &Connection,
    student_id: &str,
    course_id: &str,
) -> Result<(&'static str, serde_json::Value), HandlerErr> {
    match eligibility::student_course_summary(conn, student_id, course_id) {
        Ok(summary) => Ok(("summary", to_json(&summary)?)),
        Err(e) if e.is_configuration_failure() => {
            Ok(("summaryError", HandlerErr::from(e).to_json()))
        }
        Err(e) => Err(e.into()),
    }
}

fn attendance_record(conn: &Connection, params: &serde_json::Value) -> Result<serde_json::Value, HandlerErr> {
    let new = NewAttendance {
        student_id: get_required_str(params, "studentId")?,
        professor_course_id: get_required_str(params, "professorCourseId")?,
        session_date: get_required_date(params, "sessionDate")?,
        session_type: get_optional_session_type(params, "sessionType")?,
        present: get_required_bool(params, "present")?,
        notes: get_optional_str(params, "notes")?,
    };
    let record = ledger::record_attendance(conn, &new)?;
    let (key, summary) = fresh_summary(conn, &record.student_id, &record.course_id)?;

    let mut out = json!({ "record": to_json(&record)? });
    out[key] = summary;
    Ok(out)
}

fn batch_entry(
    conn: &Connection,
    entry: &serde_json::Value,
    professor_course_id: &str,
    session_date: NaiveDate,
    session_type: Option<SessionType>,
) -> Result<serde_json::Value, HandlerErr> {
    let new = NewAttendance {
        student_id: get_required_str(entry, "studentId")?,
        professor_course_id: professor_course_id.to_string(),
        session_date,
        session_type,
        present: get_required_bool(entry, "present")?,
        notes: get_optional_str(entry, "notes")?,
    };
    let record = ledger::record_attendance(conn, &new)?;
    to_json(&record)
}

/// Records one session for many students. Each entry stands on its own: a
/// duplicate or unenrolled student is reported in its slot and the rest of
/// the batch is still written.
fn attendance_record_batch(
    conn: &Connection,
    params: &serde_json::Value,
) -> Result<serde_json::Value, HandlerErr> {
    let professor_course_id = get_required_str(params, "professorCourseId")?;
    let session_date = get_required_date(params, "sessionDate")?;
    let requested_type = get_optional_session_type(params, "sessionType")?;
    let Some(entries) = params.get("entries").and_then(|v| v.as_array()) else {
        return Err(HandlerErr::bad_params("missing entries"));
    };

    // Problems shared by every entry fail the whole batch.
    let Some(assignment) = roster::load_assignment(conn, &professor_course_id)? else {
        return Err(EngineError::NotFound("course assignment".into()).into());
    };
    let session_type = match requested_type {
        Some(t) if !assignment.teaches(t) => {
            return Err(EngineError::SessionTypeNotAssigned {
                professor_course_id,
                session_type: t.to_string(),
            }
            .into())
        }
        Some(t) => t,
        None => assignment.only_session_type().ok_or_else(|| {
            HandlerErr::bad_params("sessionType is required for assignments teaching both types")
        })?,
    };

    let mut results = Vec::with_capacity(entries.len());
    let mut recorded = 0usize;
    for entry in entries {
        let student_id = entry.get("studentId").cloned().unwrap_or(serde_json::Value::Null);
        match batch_entry(conn, entry, &professor_course_id, session_date, Some(session_type)) {
            Ok(record) => {
                recorded += 1;
                results.push(json!({ "studentId": student_id, "ok": true, "record": record }));
            }
            Err(e) if e.code == "db_query_failed" => return Err(e),
            Err(e) => {
                results.push(json!({ "studentId": student_id, "ok": false, "error": e.to_json() }));
            }
        }
    }
    let failed = results.len() - recorded;
    if failed > 0 {
        tracing::warn!(
            professor_course_id = %professor_course_id,
            session_date = %session_date,
            recorded,
            failed,
            "attendance batch partially recorded"
        );
    }

    Ok(json!({
        "professorCourseId": professor_course_id,
        "sessionDate": session_date.to_string(),
        "sessionType": session_type,
        "recorded": recorded,
        "failed": failed,
        "results": results
    }))
}

fn removed_with_summary(
    conn: &Connection,
    record: &ledger::AttendanceRecord,
) -> Result<serde_json::Value, HandlerErr> {
    let (key, summary) = fresh_summary(conn, &record.student_id, &record.course_id)?;
    let mut out = json!({ "removed": to_json(record)? });
    out[key] = summary;
    Ok(out)
}

fn attendance_delete_latest(
    conn: &Connection,
    params: &serde_json::Value,
) -> Result<serde_json::Value, HandlerErr> {
    let student_id = get_required_str(params, "studentId")?;
    let professor_course_id = get_required_str(params, "professorCourseId")?;
    let record = ledger::delete_latest(conn, &student_id, &professor_course_id)?;
    removed_with_summary(conn, &record)
}

fn attendance_delete_by_date(
    conn: &Connection,
    params: &serde_json::Value,
) -> Result<serde_json::Value, HandlerErr> {
    let student_id = get_required_str(params, "studentId")?;
    let professor_course_id = get_required_str(params, "professorCourseId")?;
    let session_date = get_required_date(params, "sessionDate")?;
    let record = ledger::delete_by_date(conn, &student_id, &professor_course_id, session_date)?;
    removed_with_summary(conn, &record)
}

fn attendance_list(conn: &Connection, params: &serde_json::Value) -> Result<serde_json::Value, HandlerErr> {
    let student_id = get_required_str(params, "studentId")?;
    let professor_course_id = get_required_str(params, "professorCourseId")?;
    if roster::load_assignment(conn, &professor_course_id)?.is_none() {
        return Err(EngineError::NotFound("course assignment".into()).into());
    }
    let records = ledger::list_for_assignment(conn, &student_id, &professor_course_id)?;
    Ok(json!({ "records": to_json(&records)? }))
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "attendance.record" => Some(with_conn(state, req, attendance_record)),
        "attendance.recordBatch" => Some(with_conn(state, req, attendance_record_batch)),
        "attendance.deleteLatest" => Some(with_conn(state, req, attendance_delete_latest)),
        "attendance.deleteByDate" => Some(with_conn(state, req, attendance_delete_by_date)),
        "attendance.list" => Some(with_conn(state, req, attendance_list)),
        _ => None,
    }
}
