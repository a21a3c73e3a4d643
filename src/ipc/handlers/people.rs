use crate::ipc::helpers::{get_optional_str, get_required_name, with_conn, HandlerErr};
use crate::ipc::types::{AppState, Request};
use rusqlite::Connection;
use serde_json::json;
use uuid::Uuid;

fn professors_list(conn: &Connection, _params: &serde_json::Value) -> Result<serde_json::Value, HandlerErr> {
    let mut stmt = conn.prepare(
        "SELECT
           p.id,
           p.full_name,
           (SELECT COUNT(*) FROM professor_courses pc WHERE pc.professor_id = p.id) AS assignment_count
         FROM professors p
         ORDER BY p.full_name, p.id",
    )?;
    let rows = stmt
        .query_map([], |r| {
            let id: String = r.get(0)?;
            let full_name: String = r.get(1)?;
            let assignment_count: i64 = r.get(2)?;
            Ok(json!({
                "professorId": id,
                "fullName": full_name,
                "assignmentCount": assignment_count
            }))
        })?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(json!({ "professors": rows }))
}

fn professors_create(conn: &Connection, params: &serde_json::Value) -> Result<serde_json::Value, HandlerErr> {
    let full_name = get_required_name(params, "fullName")?;
    let professor_id = Uuid::new_v4().to_string();
    conn.execute(
        "INSERT INTO professors(id, full_name) VALUES(?, ?)",
        (&professor_id, &full_name),
    )
    .map_err(|e| HandlerErr {
        code: "db_insert_failed",
        message: e.to_string(),
        details: Some(json!({ "table": "professors" })),
    })?;
    Ok(json!({ "professorId": professor_id, "fullName": full_name }))
}

fn students_list(conn: &Connection, _params: &serde_json::Value) -> Result<serde_json::Value, HandlerErr> {
    let mut stmt = conn.prepare(
        "SELECT id, full_name, student_no
         FROM students
         ORDER BY full_name, id",
    )?;
    let rows = stmt
        .query_map([], |r| {
            let id: String = r.get(0)?;
            let full_name: String = r.get(1)?;
            let student_no: Option<String> = r.get(2)?;
            Ok(json!({
                "studentId": id,
                "fullName": full_name,
                "studentNo": student_no
            }))
        })?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(json!({ "students": rows }))
}

fn students_create(conn: &Connection, params: &serde_json::Value) -> Result<serde_json::Value, HandlerErr> {
    let full_name = get_required_name(params, "fullName")?;
    let student_no = get_optional_str(params, "studentNo")?
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty());
    let student_id = Uuid::new_v4().to_string();
    conn.execute(
        "INSERT INTO students(id, full_name, student_no) VALUES(?, ?, ?)",
        (&student_id, &full_name, &student_no),
    )
    .map_err(|e| HandlerErr {
        code: "db_insert_failed",
        message: e.to_string(),
        details: Some(json!({ "table": "students" })),
    })?;
    Ok(json!({ "studentId": student_id, "fullName": full_name }))
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "professors.list" => Some(with_conn(state, req, professors_list)),
        "professors.create" => Some(with_conn(state, req, professors_create)),
        "students.list" => Some(with_conn(state, req, students_list)),
        "students.create" => Some(with_conn(state, req, students_create)),
        _ => None,
    }
}
