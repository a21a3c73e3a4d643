use chrono::NaiveDate;
use serde_json::json;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum EngineError {
    #[error("course configuration not found: {course_id}")]
    ConfigurationNotFound { course_id: String },
    #[error("course {course_id} has neither a practical nor a theoretical component")]
    InvalidConfiguration { course_id: String },
    #[error("attendance already recorded for {session_date}")]
    DuplicateRecord {
        student_id: String,
        professor_course_id: String,
        session_date: NaiveDate,
    },
    #[error("{0} not found")]
    NotFound(String),
    #[error("student {student_id} is not enrolled in {professor_course_id}")]
    NotEnrolled {
        student_id: String,
        professor_course_id: String,
    },
    #[error("assignment {professor_course_id} does not teach {session_type} sessions")]
    SessionTypeNotAssigned {
        professor_course_id: String,
        session_type: String,
    },
    #[error("{0}")]
    InvalidInput(String),
    #[error("storage error: {0}")]
    Storage(#[from] rusqlite::Error),
}

impl EngineError {
    pub fn code(&self) -> &'static str {
        match self {
            EngineError::ConfigurationNotFound { .. } => "configuration_not_found",
            EngineError::InvalidConfiguration { .. } => "invalid_configuration",
            EngineError::DuplicateRecord { .. } => "duplicate_record",
            EngineError::NotFound(_) => "not_found",
            EngineError::NotEnrolled { .. } => "not_enrolled",
            EngineError::SessionTypeNotAssigned { .. } => "session_type_not_assigned",
            EngineError::InvalidInput(_) => "bad_params",
            EngineError::Storage(_) => "db_query_failed",
        }
    }

    pub fn details(&self) -> Option<serde_json::Value> {
        match self {
            EngineError::ConfigurationNotFound { course_id }
            | EngineError::InvalidConfiguration { course_id } => {
                Some(json!({ "courseId": course_id }))
            }
            EngineError::DuplicateRecord {
                student_id,
                professor_course_id,
                session_date,
            } => Some(json!({
                "studentId": student_id,
                "professorCourseId": professor_course_id,
                "sessionDate": session_date.to_string(),
            })),
            EngineError::NotEnrolled {
                student_id,
                professor_course_id,
            } => Some(json!({
                "studentId": student_id,
                "professorCourseId": professor_course_id,
            })),
            EngineError::SessionTypeNotAssigned {
                professor_course_id,
                session_type,
            } => Some(json!({
                "professorCourseId": professor_course_id,
                "sessionType": session_type,
            })),
            _ => None,
        }
    }

    /// Configuration failures abort one course's computation but are
    /// collected, not propagated, by multi-student and multi-course queries.
    pub fn is_configuration_failure(&self) -> bool {
        matches!(
            self,
            EngineError::ConfigurationNotFound { .. } | EngineError::InvalidConfiguration { .. }
        )
    }
}

pub type EngineResult<T> = Result<T, EngineError>;
