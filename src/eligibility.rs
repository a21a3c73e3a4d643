//! Read-through eligibility queries. Nothing here is cached: every call
//! resolves a fresh configuration snapshot and re-reads the ledger, so a
//! ledger mutation is visible to the very next query.

use crate::calc::{self, AbsenceAggregate, EligibilityStatus, Standing, StudentCourseSummary};
use crate::course::{self, CourseConfiguration};
use crate::error::{EngineError, EngineResult};
use crate::ledger;
use crate::roster::{self, EnrollmentScope, Student};
use rusqlite::Connection;
use serde::Serialize;

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FailureEntry {
    pub id: String,
    pub code: String,
    pub message: String,
}

impl FailureEntry {
    fn new(id: &str, e: &EngineError) -> Self {
        Self {
            id: id.to_string(),
            code: e.code().to_string(),
            message: e.to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StudentSummaryReport {
    pub student: Student,
    pub courses: Vec<StudentCourseSummary>,
    /// Courses whose configuration could not be resolved; `id` is the course id.
    pub failures: Vec<FailureEntry>,
    pub partial: bool,
    pub has_warning: bool,
    pub has_barred: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ViolatorEntry {
    pub student: Student,
    pub aggregate: AbsenceAggregate,
    pub status: EligibilityStatus,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ViolatorReport {
    pub course_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub professor_course_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub course_name: Option<String>,
    pub barred: Vec<ViolatorEntry>,
    pub at_limit: Vec<ViolatorEntry>,
    /// Candidates that could not be classified; `id` is the student id.
    pub failures: Vec<FailureEntry>,
    pub partial: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AssignmentViolators {
    pub professor_course_id: String,
    pub course_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub report: Option<ViolatorReport>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<FailureEntry>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ViolatorScope {
    Course(String),
    Assignment(String),
}

fn require_student(conn: &Connection, student_id: &str) -> EngineResult<Student> {
    roster::load_student(conn, student_id)?.ok_or_else(|| EngineError::NotFound("student".into()))
}

fn summarize(
    conn: &Connection,
    student_id: &str,
    config: &CourseConfiguration,
) -> EngineResult<StudentCourseSummary> {
    let records = ledger::records_for_course(conn, student_id, &config.course_id)?;
    Ok(calc::evaluate(student_id, config, &records))
}

pub fn student_course_summary(
    conn: &Connection,
    student_id: &str,
    course_id: &str,
) -> EngineResult<StudentCourseSummary> {
    require_student(conn, student_id)?;
    let config = course::load_course_configuration(conn, course_id)?;
    summarize(conn, student_id, &config)
}

/// Summaries for every course the student is enrolled in. A course whose
/// configuration cannot be resolved is reported in `failures` and does not
/// abort its siblings.
pub fn student_summary(conn: &Connection, student_id: &str) -> EngineResult<StudentSummaryReport> {
    let student = require_student(conn, student_id)?;
    let mut courses = Vec::new();
    let mut failures = Vec::new();
    for course_id in roster::courses_for_student(conn, student_id)? {
        match student_course_summary(conn, student_id, &course_id) {
            Ok(summary) => courses.push(summary),
            Err(e) if e.is_configuration_failure() => {
                tracing::warn!(student_id, course_id = %course_id, error = %e, "course skipped in student summary");
                failures.push(FailureEntry::new(&course_id, &e));
            }
            Err(e) => return Err(e),
        }
    }
    let has_warning = courses
        .iter()
        .any(|c| c.status.standing == Standing::AtLimit);
    let has_barred = courses
        .iter()
        .any(|c| c.status.standing == Standing::Barred);
    Ok(StudentSummaryReport {
        student,
        courses,
        partial: !failures.is_empty(),
        failures,
        has_warning,
        has_barred,
    })
}

/// Students of the scope who are at the absence limit or past it.
pub fn find_violators(conn: &Connection, scope: &ViolatorScope) -> EngineResult<ViolatorReport> {
    let (course_id, professor_course_id, enrollment) = match scope {
        ViolatorScope::Course(course_id) => {
            if !roster::course_known(conn, course_id)? {
                return Err(EngineError::NotFound("course".into()));
            }
            (course_id.clone(), None, EnrollmentScope::Course(course_id))
        }
        ViolatorScope::Assignment(professor_course_id) => {
            let Some(assignment) = roster::load_assignment(conn, professor_course_id)? else {
                return Err(EngineError::NotFound("course assignment".into()));
            };
            (
                assignment.course_id,
                Some(professor_course_id.clone()),
                EnrollmentScope::Assignment(professor_course_id),
            )
        }
    };

    // Resolved once for the whole query; a configuration failure lands on
    // every candidate instead of aborting the report.
    let config = match course::load_course_configuration(conn, &course_id) {
        Err(e) if !e.is_configuration_failure() => return Err(e),
        resolved => resolved,
    };

    let mut barred = Vec::new();
    let mut at_limit = Vec::new();
    let mut failures = Vec::new();
    for student in roster::enrolled_students(conn, enrollment)? {
        let config = match &config {
            Ok(config) => config,
            Err(e) => {
                failures.push(FailureEntry::new(&student.id, e));
                continue;
            }
        };
        let summary = summarize(conn, &student.id, config)?;
        let entry = ViolatorEntry {
            student,
            aggregate: summary.aggregate,
            status: summary.status,
        };
        match entry.status.standing {
            Standing::Barred => barred.push(entry),
            Standing::AtLimit => at_limit.push(entry),
            Standing::InGoodStanding => {}
        }
    }

    if !failures.is_empty() {
        tracing::warn!(
            course_id = %course_id,
            failed = failures.len(),
            "violator query returned partial results"
        );
    }
    tracing::debug!(
        course_id = %course_id,
        barred = barred.len(),
        at_limit = at_limit.len(),
        "violator query finished"
    );
    Ok(ViolatorReport {
        course_name: config.as_ref().ok().map(|c| c.name.clone()),
        course_id,
        professor_course_id,
        barred,
        at_limit,
        partial: !failures.is_empty(),
        failures,
    })
}

/// Runs the section-scoped violator query for each of a professor's
/// assignments. One failing assignment does not hide the others.
pub fn find_professor_violators(
    conn: &Connection,
    professor_id: &str,
) -> EngineResult<Vec<AssignmentViolators>> {
    if !roster::professor_exists(conn, professor_id)? {
        return Err(EngineError::NotFound("professor".into()));
    }
    let mut out = Vec::new();
    for assignment in roster::assignments_for_professor(conn, professor_id)? {
        let scope = ViolatorScope::Assignment(assignment.professor_course_id.clone());
        let (report, error) = match find_violators(conn, &scope) {
            Ok(report) => (Some(report), None),
            Err(EngineError::Storage(e)) => return Err(EngineError::Storage(e)),
            Err(e) => (
                None,
                Some(FailureEntry::new(&assignment.professor_course_id, &e)),
            ),
        };
        out.push(AssignmentViolators {
            professor_course_id: assignment.professor_course_id,
            course_id: assignment.course_id,
            report,
            error,
        });
    }
    Ok(out)
}
