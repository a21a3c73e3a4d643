use serde_json::json;
use std::io::{BufRead, BufReader, Write};
use std::path::PathBuf;
use std::process::{Child, ChildStdin, ChildStdout, Command, Stdio};
use std::time::{SystemTime, UNIX_EPOCH};

fn temp_dir(prefix: &str) -> PathBuf {
    let p = std::env::temp_dir().join(format!(
        "{}-{}",
        prefix,
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .expect("clock")
            .as_nanos()
    ));
    std::fs::create_dir_all(&p).expect("create temp dir");
    p
}

fn spawn_sidecar() -> (Child, ChildStdin, BufReader<ChildStdout>) {
    let exe = env!("CARGO_BIN_EXE_attendanced");
    let mut child = Command::new(exe)
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::null())
        .env_remove("ATTENDANCED_WORKSPACE")
        .spawn()
        .expect("spawn attendanced");
    let stdin = child.stdin.take().expect("child stdin");
    let stdout = child.stdout.take().expect("child stdout");
    (child, stdin, BufReader::new(stdout))
}

fn request(
    stdin: &mut ChildStdin,
    reader: &mut BufReader<ChildStdout>,
    id: &str,
    method: &str,
    params: serde_json::Value,
) -> serde_json::Value {
    let payload = json!({
        "id": id,
        "method": method,
        "params": params,
    });
    writeln!(stdin, "{}", payload).expect("write request");
    stdin.flush().expect("flush request");

    let mut line = String::new();
    reader.read_line(&mut line).expect("read response line");
    assert!(!line.trim().is_empty(), "empty response for {}", method);
    let value: serde_json::Value = serde_json::from_str(line.trim()).expect("parse response json");
    assert_eq!(value.get("id").and_then(|v| v.as_str()), Some(id));
    value
}

fn request_ok(
    stdin: &mut ChildStdin,
    reader: &mut BufReader<ChildStdout>,
    id: &str,
    method: &str,
    params: serde_json::Value,
) -> serde_json::Value {
    let value = request(stdin, reader, id, method, params);
    assert!(
        value.get("ok").and_then(|v| v.as_bool()).unwrap_or(false),
        "{} failed: {}",
        method,
        value
            .get("error")
            .and_then(|e| e.get("message"))
            .and_then(|v| v.as_str())
            .unwrap_or("unknown error")
    );
    value.get("result").cloned().unwrap_or_else(|| json!({}))
}

fn request_err(
    stdin: &mut ChildStdin,
    reader: &mut BufReader<ChildStdout>,
    id: &str,
    method: &str,
    params: serde_json::Value,
) -> serde_json::Value {
    let value = request(stdin, reader, id, method, params);
    assert_eq!(
        value.get("ok").and_then(|v| v.as_bool()),
        Some(false),
        "{} unexpectedly succeeded",
        method
    );
    value.get("error").cloned().expect("error object")
}

fn str_field(v: &serde_json::Value, key: &str) -> String {
    v.get(key)
        .and_then(|v| v.as_str())
        .unwrap_or_else(|| panic!("missing {}", key))
        .to_string()
}

struct Section {
    course_id: String,
    pc_id: String,
    students: Vec<String>,
}

/// Practical-only course (2 hours, weight 5, threshold 20), one section and
/// the named students enrolled in it.
fn seed_section(
    stdin: &mut ChildStdin,
    reader: &mut BufReader<ChildStdout>,
    workspace: &PathBuf,
    names: &[&str],
) -> Section {
    request_ok(
        stdin,
        reader,
        "ws",
        "workspace.select",
        json!({ "path": workspace.to_string_lossy() }),
    );
    let course = request_ok(
        stdin,
        reader,
        "course",
        "courses.create",
        json!({
            "name": "Fluid Mechanics",
            "practicalHours": 2,
            "theoreticalHours": 0,
            "maxAbsenceLimitPractical": 5,
            "fullAttendance": 20
        }),
    );
    let course_id = str_field(&course, "courseId");
    let prof = request_ok(
        stdin,
        reader,
        "prof",
        "professors.create",
        json!({ "fullName": "Dr. Mansour" }),
    );
    let professor_id = str_field(&prof, "professorId");
    let assignment = request_ok(
        stdin,
        reader,
        "assign",
        "assignments.create",
        json!({
            "courseId": course_id,
            "professorId": professor_id,
            "practicalN": 1,
            "theoreticalN": 0
        }),
    );
    let pc_id = str_field(&assignment, "professorCourseId");

    let mut students = Vec::new();
    for (i, name) in names.iter().enumerate() {
        let s = request_ok(
            stdin,
            reader,
            &format!("student-{}", i),
            "students.create",
            json!({ "fullName": name }),
        );
        let student_id = str_field(&s, "studentId");
        request_ok(
            stdin,
            reader,
            &format!("enroll-{}", i),
            "enrollments.add",
            json!({ "studentId": student_id, "professorCourseId": pc_id }),
        );
        students.push(student_id);
    }
    Section {
        course_id,
        pc_id,
        students,
    }
}

#[test]
fn duplicate_submission_is_rejected_and_ledger_keeps_one_record() {
    let workspace = temp_dir("attendanced-ledger-duplicate");
    let (mut child, mut stdin, mut reader) = spawn_sidecar();
    let section = seed_section(&mut stdin, &mut reader, &workspace, &["Yara Haddad"]);
    let student_id = &section.students[0];

    let first = request_ok(
        &mut stdin,
        &mut reader,
        "r1",
        "attendance.record",
        json!({
            "studentId": student_id,
            "professorCourseId": section.pc_id,
            "sessionDate": "2025-10-06",
            "present": false,
            "notes": "no excuse given"
        }),
    );
    assert_eq!(first["record"]["sessionType"], json!("practical"));
    assert_eq!(first["record"]["notes"], json!("no excuse given"));
    assert_eq!(first["summary"]["aggregate"]["weightedTotal"].as_f64(), Some(5.0));

    let dup = request_err(
        &mut stdin,
        &mut reader,
        "r2",
        "attendance.record",
        json!({
            "studentId": student_id,
            "professorCourseId": section.pc_id,
            "sessionDate": "2025-10-06",
            "sessionType": "practical",
            "present": true
        }),
    );
    assert_eq!(dup["code"], json!("duplicate_record"));
    assert_eq!(dup["details"]["sessionDate"], json!("2025-10-06"));

    let listed = request_ok(
        &mut stdin,
        &mut reader,
        "list",
        "attendance.list",
        json!({ "studentId": student_id, "professorCourseId": section.pc_id }),
    );
    let records = listed["records"].as_array().expect("records");
    assert_eq!(records.len(), 1);
    assert_eq!(records[0]["present"], json!(false));

    drop(stdin);
    let _ = child.wait();
    let _ = std::fs::remove_dir_all(workspace);
}

#[test]
fn record_then_delete_latest_restores_prior_summary() {
    let workspace = temp_dir("attendanced-ledger-undo");
    let (mut child, mut stdin, mut reader) = spawn_sidecar();
    let section = seed_section(&mut stdin, &mut reader, &workspace, &["Yara Haddad"]);
    let student_id = &section.students[0];

    for (i, day) in ["2025-10-06", "2025-10-13"].iter().enumerate() {
        request_ok(
            &mut stdin,
            &mut reader,
            &format!("seed-{}", i),
            "attendance.record",
            json!({
                "studentId": student_id,
                "professorCourseId": section.pc_id,
                "sessionDate": day,
                "present": false
            }),
        );
    }
    let before = request_ok(
        &mut stdin,
        &mut reader,
        "before",
        "eligibility.studentCourseSummary",
        json!({ "studentId": student_id, "courseId": section.course_id }),
    );

    request_ok(
        &mut stdin,
        &mut reader,
        "add",
        "attendance.record",
        json!({
            "studentId": student_id,
            "professorCourseId": section.pc_id,
            "sessionDate": "2025-10-20",
            "present": false
        }),
    );
    let undone = request_ok(
        &mut stdin,
        &mut reader,
        "undo",
        "attendance.deleteLatest",
        json!({ "studentId": student_id, "professorCourseId": section.pc_id }),
    );
    assert_eq!(undone["removed"]["sessionDate"], json!("2025-10-20"));
    assert_eq!(undone["summary"], before["summary"]);

    let by_date = request_ok(
        &mut stdin,
        &mut reader,
        "by-date",
        "attendance.deleteByDate",
        json!({
            "studentId": student_id,
            "professorCourseId": section.pc_id,
            "sessionDate": "2025-10-06"
        }),
    );
    assert_eq!(by_date["removed"]["sessionDate"], json!("2025-10-06"));
    assert_eq!(
        by_date["summary"]["aggregate"]["practicalAbsenceDates"],
        json!(["2025-10-13"])
    );

    let missing = request_err(
        &mut stdin,
        &mut reader,
        "missing",
        "attendance.deleteByDate",
        json!({
            "studentId": student_id,
            "professorCourseId": section.pc_id,
            "sessionDate": "2025-10-06"
        }),
    );
    assert_eq!(missing["code"], json!("not_found"));

    request_ok(
        &mut stdin,
        &mut reader,
        "last",
        "attendance.deleteLatest",
        json!({ "studentId": student_id, "professorCourseId": section.pc_id }),
    );
    let empty = request_err(
        &mut stdin,
        &mut reader,
        "empty",
        "attendance.deleteLatest",
        json!({ "studentId": student_id, "professorCourseId": section.pc_id }),
    );
    assert_eq!(empty["code"], json!("not_found"));

    drop(stdin);
    let _ = child.wait();
    let _ = std::fs::remove_dir_all(workspace);
}

#[test]
fn batch_reports_failures_per_student_and_records_the_rest() {
    let workspace = temp_dir("attendanced-ledger-batch");
    let (mut child, mut stdin, mut reader) = spawn_sidecar();
    let section = seed_section(
        &mut stdin,
        &mut reader,
        &workspace,
        &["Yara Haddad", "Sami Karam"],
    );
    let (yara, sami) = (&section.students[0], &section.students[1]);
    let outsider = request_ok(
        &mut stdin,
        &mut reader,
        "outsider",
        "students.create",
        json!({ "fullName": "Nour Ayoub" }),
    );
    let outsider_id = str_field(&outsider, "studentId");

    request_ok(
        &mut stdin,
        &mut reader,
        "pre",
        "attendance.record",
        json!({
            "studentId": yara,
            "professorCourseId": section.pc_id,
            "sessionDate": "2025-11-03",
            "present": true
        }),
    );

    let batch = request_ok(
        &mut stdin,
        &mut reader,
        "batch",
        "attendance.recordBatch",
        json!({
            "professorCourseId": section.pc_id,
            "sessionDate": "2025-11-03",
            "entries": [
                { "studentId": yara, "present": false },
                { "studentId": sami, "present": false },
                { "studentId": outsider_id, "present": false }
            ]
        }),
    );
    assert_eq!(batch["recorded"], json!(1));
    assert_eq!(batch["failed"], json!(2));
    assert_eq!(batch["sessionType"], json!("practical"));
    let results = batch["results"].as_array().expect("results");
    assert_eq!(results[0]["error"]["code"], json!("duplicate_record"));
    assert_eq!(results[1]["ok"], json!(true));
    assert_eq!(results[2]["error"]["code"], json!("not_enrolled"));

    let wrong_type = request_err(
        &mut stdin,
        &mut reader,
        "wrong-type",
        "attendance.recordBatch",
        json!({
            "professorCourseId": section.pc_id,
            "sessionDate": "2025-11-10",
            "sessionType": "theoretical",
            "entries": [{ "studentId": sami, "present": false }]
        }),
    );
    assert_eq!(wrong_type["code"], json!("session_type_not_assigned"));

    drop(stdin);
    let _ = child.wait();
    let _ = std::fs::remove_dir_all(workspace);
}

#[test]
fn record_validates_assignment_enrollment_and_date() {
    let workspace = temp_dir("attendanced-ledger-validation");
    let (mut child, mut stdin, mut reader) = spawn_sidecar();
    let section = seed_section(&mut stdin, &mut reader, &workspace, &["Yara Haddad"]);
    let student_id = &section.students[0];

    let unknown = request_err(
        &mut stdin,
        &mut reader,
        "unknown",
        "attendance.record",
        json!({
            "studentId": student_id,
            "professorCourseId": "no-such-section",
            "sessionDate": "2025-10-06",
            "present": false
        }),
    );
    assert_eq!(unknown["code"], json!("not_found"));

    let bad_date = request_err(
        &mut stdin,
        &mut reader,
        "bad-date",
        "attendance.record",
        json!({
            "studentId": student_id,
            "professorCourseId": section.pc_id,
            "sessionDate": "06/10/2025",
            "present": false
        }),
    );
    assert_eq!(bad_date["code"], json!("bad_params"));

    let wrong_type = request_err(
        &mut stdin,
        &mut reader,
        "wrong-type",
        "attendance.record",
        json!({
            "studentId": student_id,
            "professorCourseId": section.pc_id,
            "sessionDate": "2025-10-06",
            "sessionType": "theoretical",
            "present": false
        }),
    );
    assert_eq!(wrong_type["code"], json!("session_type_not_assigned"));

    request_ok(
        &mut stdin,
        &mut reader,
        "unenroll",
        "enrollments.remove",
        json!({ "studentId": student_id, "professorCourseId": section.pc_id }),
    );
    let not_enrolled = request_err(
        &mut stdin,
        &mut reader,
        "not-enrolled",
        "attendance.record",
        json!({
            "studentId": student_id,
            "professorCourseId": section.pc_id,
            "sessionDate": "2025-10-06",
            "present": false
        }),
    );
    assert_eq!(not_enrolled["code"], json!("not_enrolled"));

    drop(stdin);
    let _ = child.wait();
    let _ = std::fs::remove_dir_all(workspace);
}
