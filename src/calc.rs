use crate::course::{CourseConfiguration, SessionType};
use crate::ledger::AttendanceRecord;
use chrono::NaiveDate;
use serde::Serialize;
use std::cmp::Ordering;

/// Weighted totals are products of counts and configured weights; exact
/// threshold equality is judged with this tolerance so that e.g. `4 * 2.5`
/// lands on a threshold of `10`.
pub const THRESHOLD_EPSILON: f64 = 1e-9;

/// 1-decimal rounding used for display percentages.
pub fn round_off_1_decimal(x: f64) -> f64 {
    ((10.0 * x) + 0.5).floor() / 10.0
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AbsenceAggregate {
    pub student_id: String,
    pub course_id: String,
    pub practical_absence_count: u32,
    pub theoretical_absence_count: u32,
    pub practical_absence_dates: Vec<NaiveDate>,
    pub theoretical_absence_dates: Vec<NaiveDate>,
    pub weighted_practical: f64,
    pub weighted_theoretical: f64,
    pub weighted_total: f64,
    /// Absences per scheduled hour of the component, times 100. Omitted when
    /// the course has no such component.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub practical_absence_percentage: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub theoretical_absence_percentage: Option<f64>,
    /// Absences recorded against a component the course does not have.
    pub ignored_record_count: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum Standing {
    InGoodStanding,
    AtLimit,
    Barred,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EligibilityStatus {
    pub standing: Standing,
    pub weighted_total: f64,
    pub full_attendance: f64,
    pub remaining: f64,
    pub reason: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StudentCourseSummary {
    pub course_id: String,
    pub course_name: String,
    pub aggregate: AbsenceAggregate,
    pub status: EligibilityStatus,
}

/// Folds one student's attendance records for a course into absence counts
/// and weighted scores. Records of other students or other courses are
/// skipped, as are presences.
pub fn aggregate_absences(
    student_id: &str,
    config: &CourseConfiguration,
    records: &[AttendanceRecord],
) -> AbsenceAggregate {
    let mut practical_dates: Vec<NaiveDate> = Vec::new();
    let mut theoretical_dates: Vec<NaiveDate> = Vec::new();
    let mut ignored: u32 = 0;

    for r in records {
        if r.present || r.student_id != student_id || r.course_id != config.course_id {
            continue;
        }
        if config.components.rule_for(r.session_type).is_none() {
            ignored += 1;
            continue;
        }
        match r.session_type {
            SessionType::Practical => practical_dates.push(r.session_date),
            SessionType::Theoretical => theoretical_dates.push(r.session_date),
        }
    }
    practical_dates.sort();
    theoretical_dates.sort();

    let practical = config.components.practical();
    let theoretical = config.components.theoretical();
    let practical_count = practical_dates.len() as u32;
    let theoretical_count = theoretical_dates.len() as u32;

    let weighted_practical = practical
        .map(|rule| practical_count as f64 * rule.absence_weight)
        .unwrap_or(0.0);
    let weighted_theoretical = theoretical
        .map(|rule| theoretical_count as f64 * rule.absence_weight)
        .unwrap_or(0.0);

    AbsenceAggregate {
        student_id: student_id.to_string(),
        course_id: config.course_id.clone(),
        practical_absence_count: practical_count,
        theoretical_absence_count: theoretical_count,
        practical_absence_dates: practical_dates,
        theoretical_absence_dates: theoretical_dates,
        weighted_practical,
        weighted_theoretical,
        weighted_total: weighted_practical + weighted_theoretical,
        practical_absence_percentage: practical.map(|rule| {
            round_off_1_decimal(100.0 * practical_count as f64 / rule.hours as f64)
        }),
        theoretical_absence_percentage: theoretical.map(|rule| {
            round_off_1_decimal(100.0 * theoretical_count as f64 / rule.hours as f64)
        }),
        ignored_record_count: ignored,
    }
}

/// The one place a weighted absence total is compared with a threshold.
pub fn classify(weighted_total: f64, full_attendance: f64) -> EligibilityStatus {
    let standing = if (weighted_total - full_attendance).abs() <= THRESHOLD_EPSILON {
        Standing::AtLimit
    } else {
        match weighted_total.partial_cmp(&full_attendance) {
            Some(Ordering::Greater) => Standing::Barred,
            Some(Ordering::Less) => Standing::InGoodStanding,
            // NaN never reaches here from stored data; treat it as over the limit.
            _ => Standing::Barred,
        }
    };
    let reason = match standing {
        Standing::InGoodStanding => format!(
            "weighted absences {} of {} allowed",
            weighted_total, full_attendance
        ),
        Standing::AtLimit => format!(
            "weighted absences reached the limit of {}",
            full_attendance
        ),
        Standing::Barred => format!(
            "weighted absences {} exceed the limit of {}",
            weighted_total, full_attendance
        ),
    };
    EligibilityStatus {
        standing,
        weighted_total,
        full_attendance,
        remaining: full_attendance - weighted_total,
        reason,
    }
}

pub fn evaluate(
    student_id: &str,
    config: &CourseConfiguration,
    records: &[AttendanceRecord],
) -> StudentCourseSummary {
    let aggregate = aggregate_absences(student_id, config, records);
    let status = classify(aggregate.weighted_total, config.full_attendance);
    StudentCourseSummary {
        course_id: config.course_id.clone(),
        course_name: config.name.clone(),
        aggregate,
        status,
    }
}
