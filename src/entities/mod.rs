//! Domain entities: one directory per collection with its model and handlers

pub mod assignment;
pub mod course;
pub mod submission;
pub mod user;

pub use assignment::Assignment;
pub use course::{Course, CourseSummary};
pub use submission::Submission;
pub use user::{Role, User};
