use crate::course::{self, CourseColumns};
use crate::error::EngineError;
use crate::ipc::helpers::{
    get_count, get_number, get_required_name, get_required_str, to_json, with_conn, HandlerErr,
};
use crate::ipc::types::{AppState, Request};
use rusqlite::Connection;
use serde_json::json;
use uuid::Uuid;

/// Flat course row as shown in admin lists. Fields of a missing component
/// are left out rather than reported as zero.
fn course_row_json(id: &str, cols: &CourseColumns, assignment_count: i64) -> serde_json::Value {
    let mut v = json!({
        "id": id,
        "name": cols.name,
        "fullAttendance": cols.full_attendance,
        "assignmentCount": assignment_count,
    });
    if cols.practical_hours > 0 {
        v["practicalHours"] = json!(cols.practical_hours);
        v["maxAbsenceLimitPractical"] = json!(cols.max_absence_limit_practical);
    }
    if cols.theoretical_hours > 0 {
        v["theoreticalHours"] = json!(cols.theoretical_hours);
        v["maxAbsenceLimitTheoretical"] = json!(cols.max_absence_limit_theoretical);
    }
    v
}

fn courses_list(conn: &Connection, _params: &serde_json::Value) -> Result<serde_json::Value, HandlerErr> {
    let mut stmt = conn.prepare(
        "SELECT
           c.id,
           c.name,
           c.practical_hours,
           c.theoretical_hours,
           c.max_absence_limit_practical,
           c.max_absence_limit_theoretical,
           c.full_attendance,
           (SELECT COUNT(*) FROM professor_courses pc WHERE pc.course_id = c.id) AS assignment_count
         FROM courses c
         ORDER BY c.name, c.id",
    )?;
    let rows = stmt
        .query_map([], |r| {
            let id: String = r.get(0)?;
            let cols = CourseColumns {
                name: r.get(1)?,
                practical_hours: r.get::<_, i64>(2)?.max(0) as u32,
                theoretical_hours: r.get::<_, i64>(3)?.max(0) as u32,
                max_absence_limit_practical: r.get(4)?,
                max_absence_limit_theoretical: r.get(5)?,
                full_attendance: r.get(6)?,
            };
            let assignment_count: i64 = r.get(7)?;
            Ok(course_row_json(&id, &cols, assignment_count))
        })?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(json!({ "courses": rows }))
}

fn courses_get(conn: &Connection, params: &serde_json::Value) -> Result<serde_json::Value, HandlerErr> {
    let course_id = get_required_str(params, "courseId")?;
    let config = course::load_course_configuration(conn, &course_id)?;
    Ok(json!({ "course": to_json(&config)? }))
}

fn courses_create(conn: &Connection, params: &serde_json::Value) -> Result<serde_json::Value, HandlerErr> {
    let cols = CourseColumns {
        name: get_required_name(params, "name")?,
        practical_hours: get_count(params, "practicalHours", Some(0))?,
        theoretical_hours: get_count(params, "theoreticalHours", Some(0))?,
        max_absence_limit_practical: get_number(params, "maxAbsenceLimitPractical", Some(0.0))?,
        max_absence_limit_theoretical: get_number(params, "maxAbsenceLimitTheoretical", Some(0.0))?,
        full_attendance: get_number(params, "fullAttendance", None)?,
    };
    cols.validate()?;

    let course_id = Uuid::new_v4().to_string();
    conn.execute(
        "INSERT INTO courses(id, name, practical_hours, theoretical_hours,
           max_absence_limit_practical, max_absence_limit_theoretical, full_attendance)
         VALUES(?, ?, ?, ?, ?, ?, ?)",
        (
            &course_id,
            &cols.name,
            cols.practical_hours as i64,
            cols.theoretical_hours as i64,
            cols.max_absence_limit_practical,
            cols.max_absence_limit_theoretical,
            cols.full_attendance,
        ),
    )
    .map_err(|e| HandlerErr {
        code: "db_insert_failed",
        message: e.to_string(),
        details: Some(json!({ "table": "courses" })),
    })?;
    tracing::info!(course_id = %course_id, name = %cols.name, "course created");

    Ok(json!({ "courseId": course_id, "name": cols.name }))
}

fn courses_update(conn: &Connection, params: &serde_json::Value) -> Result<serde_json::Value, HandlerErr> {
    let course_id = get_required_str(params, "courseId")?;
    let Some(patch) = params.get("patch").filter(|p| p.is_object()) else {
        return Err(HandlerErr::bad_params("missing patch"));
    };
    let Some(current) = course::load_course_columns(conn, &course_id)? else {
        return Err(EngineError::NotFound("course".into()).into());
    };

    let next = CourseColumns {
        name: match patch.get("name") {
            Some(_) => get_required_name(patch, "name")?,
            None => current.name.clone(),
        },
        practical_hours: get_count(patch, "practicalHours", Some(current.practical_hours))?,
        theoretical_hours: get_count(patch, "theoreticalHours", Some(current.theoretical_hours))?,
        max_absence_limit_practical: get_number(
            patch,
            "maxAbsenceLimitPractical",
            Some(current.max_absence_limit_practical),
        )?,
        max_absence_limit_theoretical: get_number(
            patch,
            "maxAbsenceLimitTheoretical",
            Some(current.max_absence_limit_theoretical),
        )?,
        full_attendance: get_number(patch, "fullAttendance", Some(current.full_attendance))?,
    };
    next.validate()?;

    // A component cannot be removed while an assignment still teaches it.
    let (practical_taught, theoretical_taught): (i64, i64) = conn.query_row(
        "SELECT
           COALESCE(SUM(CASE WHEN practical_n > 0 THEN 1 ELSE 0 END), 0),
           COALESCE(SUM(CASE WHEN theoretical_n > 0 THEN 1 ELSE 0 END), 0)
         FROM professor_courses
         WHERE course_id = ?",
        [&course_id],
        |r| Ok((r.get(0)?, r.get(1)?)),
    )?;
    if next.practical_hours == 0 && practical_taught > 0 {
        return Err(HandlerErr::bad_params(
            "practicalHours cannot be 0 while assignments teach practical sessions",
        ));
    }
    if next.theoretical_hours == 0 && theoretical_taught > 0 {
        return Err(HandlerErr::bad_params(
            "theoreticalHours cannot be 0 while assignments teach theoretical sessions",
        ));
    }

    conn.execute(
        "UPDATE courses SET
           name = ?, practical_hours = ?, theoretical_hours = ?,
           max_absence_limit_practical = ?, max_absence_limit_theoretical = ?,
           full_attendance = ?
         WHERE id = ?",
        (
            &next.name,
            next.practical_hours as i64,
            next.theoretical_hours as i64,
            next.max_absence_limit_practical,
            next.max_absence_limit_theoretical,
            next.full_attendance,
            &course_id,
        ),
    )
    .map_err(|e| HandlerErr {
        code: "db_update_failed",
        message: e.to_string(),
        details: Some(json!({ "table": "courses" })),
    })?;
    tracing::info!(course_id = %course_id, "course updated");

    let config = course::load_course_configuration(conn, &course_id)?;
    Ok(json!({ "course": to_json(&config)? }))
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "courses.list" => Some(with_conn(state, req, courses_list)),
        "courses.get" => Some(with_conn(state, req, courses_get)),
        "courses.create" => Some(with_conn(state, req, courses_create)),
        "courses.update" => Some(with_conn(state, req, courses_update)),
        _ => None,
    }
}
