//! User model
//!
//! A single record type with a closed role tag. Authorization never
//! dispatches on a user subtype; it reads [`Role`] and relationships.

use crate::core::field::FieldValue;
use crate::core::service::Record;
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;
use validator::Validate;

/// The three roles a user can hold
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Admin,
    Instructor,
    #[default]
    Student,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Admin => "admin",
            Role::Instructor => "instructor",
            Role::Student => "student",
        }
    }

    /// Roles only an admin may hand out
    pub fn is_privileged(&self) -> bool {
        matches!(self, Role::Admin | Role::Instructor)
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A registered user
///
/// The password hash is never serialized into responses.
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub id: Uuid,

    #[validate(length(min = 1, message = "name must not be empty"))]
    pub name: String,

    #[validate(email(message = "email must be a valid address"))]
    pub email: String,

    #[serde(skip_serializing, default)]
    pub password_hash: String,

    pub role: Role,
}

impl Record for User {
    const COLLECTION: &'static str = "user";

    fn id(&self) -> Uuid {
        self.id
    }

    fn field_value(&self, field: &str) -> Option<FieldValue> {
        match field {
            "id" => Some(FieldValue::Uuid(self.id)),
            "name" => Some(FieldValue::String(self.name.clone())),
            "email" => Some(FieldValue::String(self.email.clone())),
            "role" => Some(FieldValue::String(self.role.as_str().to_string())),
            _ => None,
        }
    }
}

/// Signup body for `POST /users`
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct NewUser {
    #[validate(length(min = 1, message = "name must not be empty"))]
    pub name: String,

    #[validate(email(message = "email must be a valid address"))]
    pub email: String,

    #[validate(length(min = 1, message = "password must not be empty"))]
    pub password: String,

    #[serde(default)]
    pub role: Role,
}

/// Body for `POST /users/login`
#[derive(Debug, Clone, Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn user() -> User {
        User {
            id: Uuid::new_v4(),
            name: "Ada".to_string(),
            email: "ada@example.com".to_string(),
            password_hash: "$argon2id$secret".to_string(),
            role: Role::Instructor,
        }
    }

    #[test]
    fn test_password_hash_is_never_serialized() {
        let json = serde_json::to_value(user()).unwrap();
        assert!(json.get("passwordHash").is_none());
        assert_eq!(json["role"], "instructor");
        assert_eq!(json["email"], "ada@example.com");
    }

    #[test]
    fn test_role_defaults_to_student() {
        let body: NewUser = serde_json::from_value(serde_json::json!({
            "name": "Sam",
            "email": "sam@example.com",
            "password": "pw"
        }))
        .unwrap();
        assert_eq!(body.role, Role::Student);
    }

    #[test]
    fn test_unknown_role_is_rejected() {
        let result = serde_json::from_value::<NewUser>(serde_json::json!({
            "name": "Sam",
            "email": "sam@example.com",
            "password": "pw",
            "role": "superuser"
        }));
        assert!(result.is_err());
    }

    #[test]
    fn test_privileged_roles() {
        assert!(Role::Admin.is_privileged());
        assert!(Role::Instructor.is_privileged());
        assert!(!Role::Student.is_privileged());
    }

    #[test]
    fn test_invalid_email_fails_validation() {
        let mut u = user();
        u.email = "not-an-email".to_string();
        assert!(u.validate().is_err());
    }
}
