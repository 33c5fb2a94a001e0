//! Assignment model

use crate::core::field::FieldValue;
use crate::core::service::Record;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

/// Fields `PATCH /assignments/{id}` may touch
pub const ASSIGNMENT_UPDATABLE_FIELDS: &[&str] = &["title", "points", "due"];

/// An assignment belonging to one course
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct Assignment {
    pub id: Uuid,

    pub course_id: Uuid,

    #[validate(length(min = 1, message = "title must not be empty"))]
    pub title: String,

    pub points: u32,

    pub due: DateTime<Utc>,
}

impl Record for Assignment {
    const COLLECTION: &'static str = "assignment";

    fn id(&self) -> Uuid {
        self.id
    }

    fn field_value(&self, field: &str) -> Option<FieldValue> {
        match field {
            "id" => Some(FieldValue::Uuid(self.id)),
            "courseId" => Some(FieldValue::Uuid(self.course_id)),
            "title" => Some(FieldValue::String(self.title.clone())),
            "points" => Some(FieldValue::Integer(i64::from(self.points))),
            "due" => Some(FieldValue::DateTime(self.due)),
            _ => None,
        }
    }
}

/// Body for `POST /assignments`, minus the course reference
///
/// `courseId` is read separately because authorization depends on it.
#[derive(Debug, Clone, Deserialize)]
pub struct NewAssignment {
    pub title: String,
    pub points: u32,
    pub due: DateTime<Utc>,
}

impl NewAssignment {
    pub fn into_assignment(self, course_id: Uuid) -> Assignment {
        Assignment {
            id: Uuid::new_v4(),
            course_id,
            title: self.title,
            points: self.points,
            due: self.due,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_negative_points_are_rejected() {
        let result = serde_json::from_value::<NewAssignment>(json!({
            "title": "Project",
            "points": -5,
            "due": "2022-06-14T17:00:00Z"
        }));
        assert!(result.is_err());
    }

    #[test]
    fn test_course_id_is_exposed_in_camel_case() {
        let assignment = serde_json::from_value::<NewAssignment>(json!({
            "title": "Project",
            "points": 100,
            "due": "2022-06-14T17:00:00Z"
        }))
        .unwrap()
        .into_assignment(Uuid::nil());
        let json = serde_json::to_value(&assignment).unwrap();
        assert_eq!(json["courseId"], Uuid::nil().to_string());
        assert_eq!(json["points"], 100);
    }
}
