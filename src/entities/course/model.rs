//! Course model and its public projection

use crate::core::field::FieldValue;
use crate::core::service::Record;
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

/// Fields `PATCH /courses/{id}` may touch
pub const COURSE_UPDATABLE_FIELDS: &[&str] = &["subject", "number", "title", "term"];

/// A course taught by one instructor
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct Course {
    pub id: Uuid,

    #[validate(length(min = 1, message = "subject must not be empty"))]
    pub subject: String,

    #[validate(length(min = 1, message = "number must not be empty"))]
    pub number: String,

    #[validate(length(min = 1, message = "title must not be empty"))]
    pub title: String,

    #[validate(length(min = 1, message = "term must not be empty"))]
    pub term: String,

    pub instructor_id: Uuid,

    /// Enrolled student ids, without duplicates
    #[serde(default)]
    pub students: Vec<Uuid>,
}

impl Course {
    pub fn is_enrolled(&self, user_id: &Uuid) -> bool {
        self.students.contains(user_id)
    }

    /// Add-to-set; returns whether the student was newly added
    pub fn enroll(&mut self, user_id: Uuid) -> bool {
        if self.is_enrolled(&user_id) {
            return false;
        }
        self.students.push(user_id);
        true
    }

    pub fn unenroll(&mut self, user_ids: &[Uuid]) {
        self.students.retain(|id| !user_ids.contains(id));
    }
}

impl Record for Course {
    const COLLECTION: &'static str = "course";

    fn id(&self) -> Uuid {
        self.id
    }

    fn field_value(&self, field: &str) -> Option<FieldValue> {
        match field {
            "id" => Some(FieldValue::Uuid(self.id)),
            "subject" => Some(FieldValue::String(self.subject.clone())),
            "number" => Some(FieldValue::String(self.number.clone())),
            "title" => Some(FieldValue::String(self.title.clone())),
            "term" => Some(FieldValue::String(self.term.clone())),
            "instructorId" => Some(FieldValue::Uuid(self.instructor_id)),
            "students" => Some(FieldValue::List(
                self.students.iter().copied().map(FieldValue::Uuid).collect(),
            )),
            _ => None,
        }
    }
}

/// A course as returned by public reads: enrollment is never exposed
#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct CourseSummary {
    pub id: Uuid,
    pub subject: String,
    pub number: String,
    pub title: String,
    pub term: String,
    pub instructor_id: Uuid,
}

impl From<Course> for CourseSummary {
    fn from(course: Course) -> Self {
        Self {
            id: course.id,
            subject: course.subject,
            number: course.number,
            title: course.title,
            term: course.term,
            instructor_id: course.instructor_id,
        }
    }
}

/// Body for `POST /courses`
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewCourse {
    pub subject: String,
    pub number: String,
    pub title: String,
    pub term: String,
    pub instructor_id: Uuid,
}

impl NewCourse {
    pub fn into_course(self) -> Course {
        Course {
            id: Uuid::new_v4(),
            subject: self.subject,
            number: self.number,
            title: self.title,
            term: self.term,
            instructor_id: self.instructor_id,
            students: Vec::new(),
        }
    }
}

/// Body for `POST /courses/{id}/students`
///
/// Ids are kept as raw strings: malformed entries are skipped, not rejected.
#[derive(Debug, Clone, Deserialize)]
pub struct EnrollmentUpdate {
    pub add: Option<Vec<String>>,
    pub remove: Option<Vec<String>>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn course() -> Course {
        NewCourse {
            subject: "CS".to_string(),
            number: "493".to_string(),
            title: "Cloud Application Development".to_string(),
            term: "sp22".to_string(),
            instructor_id: Uuid::new_v4(),
        }
        .into_course()
    }

    #[test]
    fn test_enroll_is_idempotent() {
        let mut c = course();
        let student = Uuid::new_v4();
        assert!(c.enroll(student));
        assert!(!c.enroll(student));
        assert_eq!(c.students, vec![student]);
    }

    #[test]
    fn test_unenroll_removes_listed_students_only() {
        let mut c = course();
        let (a, b) = (Uuid::new_v4(), Uuid::new_v4());
        c.enroll(a);
        c.enroll(b);
        c.unenroll(&[a, Uuid::new_v4()]);
        assert_eq!(c.students, vec![b]);
    }

    #[test]
    fn test_summary_omits_students() {
        let mut c = course();
        c.enroll(Uuid::new_v4());
        let json = serde_json::to_value(CourseSummary::from(c)).unwrap();
        assert!(json.get("students").is_none());
        assert!(json.get("instructorId").is_some());
    }

    #[test]
    fn test_students_field_matches_membership() {
        let mut c = course();
        let student = Uuid::new_v4();
        c.enroll(student);
        let students = c.field_value("students").unwrap();
        assert!(students.matches(&FieldValue::Uuid(student)));
        assert!(!students.matches(&FieldValue::Uuid(c.instructor_id)));
    }

    #[test]
    fn test_empty_title_fails_validation() {
        let mut c = course();
        c.title.clear();
        assert!(c.validate().is_err());
    }
}
