//! Submission model

use crate::core::field::FieldValue;
use crate::core::service::Record;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

/// Fields `PATCH /submissions/{id}` may touch
pub const SUBMISSION_UPDATABLE_FIELDS: &[&str] = &["grade"];

/// A student's file submission for an assignment
///
/// `course_id` always equals the course of `assignment_id`; `file` is the
/// blob key and is only set once the blob is durably stored.
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct Submission {
    pub id: Uuid,
    pub assignment_id: Uuid,
    pub student_id: Uuid,
    pub course_id: Uuid,
    pub timestamp: DateTime<Utc>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[validate(range(min = 0.0, message = "grade must not be negative"))]
    pub grade: Option<f64>,

    pub file: String,
}

impl Record for Submission {
    const COLLECTION: &'static str = "submission";

    fn id(&self) -> Uuid {
        self.id
    }

    fn field_value(&self, field: &str) -> Option<FieldValue> {
        match field {
            "id" => Some(FieldValue::Uuid(self.id)),
            "assignmentId" => Some(FieldValue::Uuid(self.assignment_id)),
            "studentId" => Some(FieldValue::Uuid(self.student_id)),
            "courseId" => Some(FieldValue::Uuid(self.course_id)),
            "timestamp" => Some(FieldValue::DateTime(self.timestamp)),
            "grade" => Some(self.grade.map_or(FieldValue::Null, FieldValue::Float)),
            "file" => Some(FieldValue::String(self.file.clone())),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn submission() -> Submission {
        Submission {
            id: Uuid::new_v4(),
            assignment_id: Uuid::new_v4(),
            student_id: Uuid::new_v4(),
            course_id: Uuid::new_v4(),
            timestamp: Utc::now(),
            grade: None,
            file: "4f2c.pdf".to_string(),
        }
    }

    #[test]
    fn test_ungraded_submission_omits_grade() {
        let json = serde_json::to_value(submission()).unwrap();
        assert!(json.get("grade").is_none());
        assert_eq!(json["file"], "4f2c.pdf");
    }

    #[test]
    fn test_negative_grade_fails_validation() {
        let mut s = submission();
        s.grade = Some(-1.0);
        assert!(s.validate().is_err());
        s.grade = Some(92.5);
        assert!(s.validate().is_ok());
    }
}
