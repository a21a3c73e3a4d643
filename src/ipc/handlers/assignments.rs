use crate::course;
use crate::error::EngineError;
use crate::ipc::helpers::{get_count, get_required_str, to_json, with_conn, HandlerErr};
use crate::ipc::types::{AppState, Request};
use crate::roster::{self, CourseAssignment, EnrollmentScope};
use rusqlite::Connection;
use serde_json::json;
use uuid::Uuid;

fn require_assignment(conn: &Connection, professor_course_id: &str) -> Result<CourseAssignment, HandlerErr> {
    roster::load_assignment(conn, professor_course_id)?
        .ok_or_else(|| EngineError::NotFound("course assignment".into()).into())
}

fn assignments_create(conn: &Connection, params: &serde_json::Value) -> Result<serde_json::Value, HandlerErr> {
    let course_id = get_required_str(params, "courseId")?;
    let professor_id = get_required_str(params, "professorId")?;
    let practical_n = get_count(params, "practicalN", Some(0))?;
    let theoretical_n = get_count(params, "theoreticalN", Some(0))?;

    if practical_n == 0 && theoretical_n == 0 {
        return Err(HandlerErr::bad_params(
            "practicalN or theoreticalN must be greater than 0",
        ));
    }
    let Some(cols) = course::load_course_columns(conn, &course_id)? else {
        return Err(EngineError::NotFound("course".into()).into());
    };
    if !roster::professor_exists(conn, &professor_id)? {
        return Err(EngineError::NotFound("professor".into()).into());
    }
    if practical_n > 0 && cols.practical_hours == 0 {
        return Err(HandlerErr::bad_params("course has no practical component"));
    }
    if theoretical_n > 0 && cols.theoretical_hours == 0 {
        return Err(HandlerErr::bad_params("course has no theoretical component"));
    }

    let professor_course_id = Uuid::new_v4().to_string();
    conn.execute(
        "INSERT INTO professor_courses(id, course_id, professor_id, practical_n, theoretical_n)
         VALUES(?, ?, ?, ?, ?)",
        (
            &professor_course_id,
            &course_id,
            &professor_id,
            practical_n as i64,
            theoretical_n as i64,
        ),
    )
    .map_err(|e| HandlerErr {
        code: "db_insert_failed",
        message: e.to_string(),
        details: Some(json!({ "table": "professor_courses" })),
    })?;
    tracing::info!(
        professor_course_id = %professor_course_id,
        course_id = %course_id,
        professor_id = %professor_id,
        "course assignment created"
    );

    Ok(json!({ "professorCourseId": professor_course_id }))
}

fn assignments_get(conn: &Connection, params: &serde_json::Value) -> Result<serde_json::Value, HandlerErr> {
    let professor_course_id = get_required_str(params, "professorCourseId")?;
    let assignment = require_assignment(conn, &professor_course_id)?;
    Ok(json!({ "assignment": to_json(&assignment)? }))
}

fn assignments_list_for_professor(
    conn: &Connection,
    params: &serde_json::Value,
) -> Result<serde_json::Value, HandlerErr> {
    let professor_id = get_required_str(params, "professorId")?;
    if !roster::professor_exists(conn, &professor_id)? {
        return Err(EngineError::NotFound("professor".into()).into());
    }
    let mut out = Vec::new();
    for assignment in roster::assignments_for_professor(conn, &professor_id)? {
        let course_name = course::load_course_columns(conn, &assignment.course_id)?.map(|c| c.name);
        let mut v = to_json(&assignment)?;
        v["courseName"] = json!(course_name);
        out.push(v);
    }
    Ok(json!({ "assignments": out }))
}

fn assignments_students(conn: &Connection, params: &serde_json::Value) -> Result<serde_json::Value, HandlerErr> {
    let professor_course_id = get_required_str(params, "professorCourseId")?;
    require_assignment(conn, &professor_course_id)?;
    let students = roster::enrolled_students(conn, EnrollmentScope::Assignment(&professor_course_id))?;
    Ok(json!({ "students": to_json(&students)? }))
}

fn enrollments_add(conn: &Connection, params: &serde_json::Value) -> Result<serde_json::Value, HandlerErr> {
    let student_id = get_required_str(params, "studentId")?;
    let professor_course_id = get_required_str(params, "professorCourseId")?;
    require_assignment(conn, &professor_course_id)?;
    if roster::load_student(conn, &student_id)?.is_none() {
        return Err(EngineError::NotFound("student".into()).into());
    }

    let changed = conn.execute(
        "INSERT INTO enrollments(student_id, professor_course_id)
         VALUES(?, ?)
         ON CONFLICT(student_id, professor_course_id) DO NOTHING",
        (&student_id, &professor_course_id),
    )?;
    if changed > 0 {
        tracing::info!(student_id = %student_id, professor_course_id = %professor_course_id, "student enrolled");
    }
    Ok(json!({ "created": changed > 0 }))
}

/// Attendance already recorded for the pair is kept.
fn enrollments_remove(conn: &Connection, params: &serde_json::Value) -> Result<serde_json::Value, HandlerErr> {
    let student_id = get_required_str(params, "studentId")?;
    let professor_course_id = get_required_str(params, "professorCourseId")?;
    let changed = conn.execute(
        "DELETE FROM enrollments WHERE student_id = ? AND professor_course_id = ?",
        (&student_id, &professor_course_id),
    )?;
    if changed == 0 {
        return Err(EngineError::NotFound("enrollment".into()).into());
    }
    tracing::info!(student_id = %student_id, professor_course_id = %professor_course_id, "student unenrolled");
    Ok(json!({ "removed": true }))
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "assignments.create" => Some(with_conn(state, req, assignments_create)),
        "assignments.get" => Some(with_conn(state, req, assignments_get)),
        "assignments.listForProfessor" => Some(with_conn(state, req, assignments_list_for_professor)),
        "assignments.students" => Some(with_conn(state, req, assignments_students)),
        "enrollments.add" => Some(with_conn(state, req, enrollments_add)),
        "enrollments.remove" => Some(with_conn(state, req, enrollments_remove)),
        _ => None,
    }
}
