use crate::error::{EngineError, EngineResult};
use rusqlite::{Connection, OptionalExtension};
use serde::Serialize;
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SessionType {
    Practical,
    Theoretical,
}

impl SessionType {
    pub fn as_str(self) -> &'static str {
        match self {
            SessionType::Practical => "practical",
            SessionType::Theoretical => "theoretical",
        }
    }

    /// Accepts the stored spelling plus the short labels the portal uses
    /// ("Practical" / "Theory").
    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "practical" | "p" => Some(SessionType::Practical),
            "theoretical" | "theory" | "t" => Some(SessionType::Theoretical),
            _ => None,
        }
    }
}

impl fmt::Display for SessionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One deliverable component of a course.
///
/// `absence_weight` is a per-absence weight: each absence of this type adds
/// `absence_weight` to the student's weighted absence score, which is compared
/// against `CourseConfiguration::full_attendance` in the same unit.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ComponentRule {
    pub hours: u32,
    pub absence_weight: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum Components {
    PracticalOnly { practical: ComponentRule },
    TheoreticalOnly { theoretical: ComponentRule },
    Both {
        practical: ComponentRule,
        theoretical: ComponentRule,
    },
}

impl Components {
    /// Builds the variant from the flat column layout, where zero hours
    /// means the component does not exist. Returns `None` when neither
    /// component is present.
    pub fn from_columns(
        practical_hours: u32,
        theoretical_hours: u32,
        practical_weight: f64,
        theoretical_weight: f64,
    ) -> Option<Self> {
        let practical = (practical_hours > 0).then_some(ComponentRule {
            hours: practical_hours,
            absence_weight: practical_weight,
        });
        let theoretical = (theoretical_hours > 0).then_some(ComponentRule {
            hours: theoretical_hours,
            absence_weight: theoretical_weight,
        });
        match (practical, theoretical) {
            (Some(practical), Some(theoretical)) => Some(Components::Both {
                practical,
                theoretical,
            }),
            (Some(practical), None) => Some(Components::PracticalOnly { practical }),
            (None, Some(theoretical)) => Some(Components::TheoreticalOnly { theoretical }),
            (None, None) => None,
        }
    }

    pub fn practical(&self) -> Option<&ComponentRule> {
        match self {
            Components::PracticalOnly { practical } | Components::Both { practical, .. } => {
                Some(practical)
            }
            Components::TheoreticalOnly { .. } => None,
        }
    }

    pub fn theoretical(&self) -> Option<&ComponentRule> {
        match self {
            Components::TheoreticalOnly { theoretical }
            | Components::Both { theoretical, .. } => Some(theoretical),
            Components::PracticalOnly { .. } => None,
        }
    }

    pub fn rule_for(&self, session_type: SessionType) -> Option<&ComponentRule> {
        match session_type {
            SessionType::Practical => self.practical(),
            SessionType::Theoretical => self.theoretical(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CourseConfiguration {
    pub course_id: String,
    pub name: String,
    pub components: Components,
    pub full_attendance: f64,
}

/// Flat, user-facing shape of a course row, as accepted by `courses.create`.
#[derive(Debug, Clone, PartialEq)]
pub struct CourseColumns {
    pub name: String,
    pub practical_hours: u32,
    pub theoretical_hours: u32,
    pub max_absence_limit_practical: f64,
    pub max_absence_limit_theoretical: f64,
    pub full_attendance: f64,
}

impl CourseColumns {
    pub fn validate(&self) -> EngineResult<Components> {
        if self.name.trim().is_empty() {
            return Err(EngineError::InvalidInput("name must not be empty".into()));
        }
        for (field, value) in [
            ("maxAbsenceLimitPractical", self.max_absence_limit_practical),
            ("maxAbsenceLimitTheoretical", self.max_absence_limit_theoretical),
            ("fullAttendance", self.full_attendance),
        ] {
            if !value.is_finite() || value < 0.0 {
                return Err(EngineError::InvalidInput(format!(
                    "{field} must be a non-negative number"
                )));
            }
        }
        Components::from_columns(
            self.practical_hours,
            self.theoretical_hours,
            self.max_absence_limit_practical,
            self.max_absence_limit_theoretical,
        )
        .ok_or_else(|| {
            EngineError::InvalidInput(
                "a course needs practicalHours or theoreticalHours greater than 0".into(),
            )
        })
    }
}

pub fn load_course_columns(conn: &Connection, course_id: &str) -> EngineResult<Option<CourseColumns>> {
    let row = conn
        .query_row(
            "SELECT name, practical_hours, theoretical_hours,
                    max_absence_limit_practical, max_absence_limit_theoretical,
                    full_attendance
             FROM courses
             WHERE id = ?",
            [course_id],
            |r| {
                Ok(CourseColumns {
                    name: r.get(0)?,
                    practical_hours: r.get::<_, i64>(1)?.max(0) as u32,
                    theoretical_hours: r.get::<_, i64>(2)?.max(0) as u32,
                    max_absence_limit_practical: r.get(3)?,
                    max_absence_limit_theoretical: r.get(4)?,
                    full_attendance: r.get(5)?,
                })
            },
        )
        .optional()?;
    Ok(row)
}

/// Resolves the configuration snapshot used by one evaluation. A missing row
/// or a row without any component is an error; thresholds are never
/// defaulted.
pub fn load_course_configuration(
    conn: &Connection,
    course_id: &str,
) -> EngineResult<CourseConfiguration> {
    let Some(columns) = load_course_columns(conn, course_id)? else {
        return Err(EngineError::ConfigurationNotFound {
            course_id: course_id.to_string(),
        });
    };
    let components = Components::from_columns(
        columns.practical_hours,
        columns.theoretical_hours,
        columns.max_absence_limit_practical,
        columns.max_absence_limit_theoretical,
    )
    .ok_or_else(|| EngineError::InvalidConfiguration {
        course_id: course_id.to_string(),
    })?;
    Ok(CourseConfiguration {
        course_id: course_id.to_string(),
        name: columns.name,
        components,
        full_attendance: columns.full_attendance,
    })
}
