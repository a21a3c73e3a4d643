use crate::eligibility::{self, ViolatorScope};
use crate::ipc::helpers::{get_optional_str, get_required_str, to_json, with_conn, HandlerErr};
use crate::ipc::types::{AppState, Request};
use rusqlite::Connection;
use serde_json::json;

fn student_course_summary(
    conn: &Connection,
    params: &serde_json::Value,
) -> Result<serde_json::Value, HandlerErr> {
    let student_id = get_required_str(params, "studentId")?;
    let course_id = get_required_str(params, "courseId")?;
    let summary = eligibility::student_course_summary(conn, &student_id, &course_id)?;
    Ok(json!({ "summary": to_json(&summary)? }))
}

fn student_summary(conn: &Connection, params: &serde_json::Value) -> Result<serde_json::Value, HandlerErr> {
    let student_id = get_required_str(params, "studentId")?;
    let report = eligibility::student_summary(conn, &student_id)?;
    to_json(&report)
}

fn violators(conn: &Connection, params: &serde_json::Value) -> Result<serde_json::Value, HandlerErr> {
    let course_id = get_optional_str(params, "courseId")?;
    let professor_course_id = get_optional_str(params, "professorCourseId")?;
    let scope = match (course_id, professor_course_id) {
        (Some(course_id), None) => ViolatorScope::Course(course_id),
        (None, Some(professor_course_id)) => ViolatorScope::Assignment(professor_course_id),
        _ => {
            return Err(HandlerErr::bad_params(
                "exactly one of courseId or professorCourseId is required",
            ))
        }
    };
    let report = eligibility::find_violators(conn, &scope)?;
    to_json(&report)
}

fn professor_violators(
    conn: &Connection,
    params: &serde_json::Value,
) -> Result<serde_json::Value, HandlerErr> {
    let professor_id = get_required_str(params, "professorId")?;
    let assignments = eligibility::find_professor_violators(conn, &professor_id)?;
    Ok(json!({
        "professorId": professor_id,
        "assignments": to_json(&assignments)?
    }))
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "eligibility.studentCourseSummary" => Some(with_conn(state, req, student_course_summary)),
        "eligibility.studentSummary" => Some(with_conn(state, req, student_summary)),
        "eligibility.violators" => Some(with_conn(state, req, violators)),
        "eligibility.professorViolators" => Some(with_conn(state, req, professor_violators)),
        _ => None,
    }
}
