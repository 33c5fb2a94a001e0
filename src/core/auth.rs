//! Authorization engine
//!
//! Authorization is a small table of named predicates over the resolved
//! caller and a resource anchor, composed with AND/OR:
//! - [`is_admin`]: the caller holds the admin role
//! - [`is_instructor`]: the caller teaches the course
//! - [`is_student`]: the caller is enrolled in the course
//! - [`is_self`]: the caller is the user being addressed
//!
//! Every endpoint combines them the same way, `admin OR <relation>`, via
//! [`AuthPolicy::admin_or`]. A policy that is not satisfied is a 403. Policies
//! are evaluated on every request against current data, so role and
//! enrollment changes take effect immediately.

use crate::core::error::{ApiError, ApiResult};
use crate::core::service::Repository;
use crate::entities::{Course, Role, User};
use anyhow::Result;
use futures::future::BoxFuture;
use uuid::Uuid;

/// Caller identity resolved for one request
#[derive(Debug, Clone, Default)]
pub enum AuthContext {
    /// A bearer token resolved to an existing user
    User(User),

    /// No token, an invalid token, or a token for an unknown user
    #[default]
    Anonymous,
}

impl AuthContext {
    pub fn user(&self) -> Option<&User> {
        match self {
            AuthContext::User(user) => Some(user),
            AuthContext::Anonymous => None,
        }
    }

    pub fn user_id(&self) -> Option<Uuid> {
        self.user().map(|u| u.id)
    }

    pub fn role(&self) -> Option<Role> {
        self.user().map(|u| u.role)
    }

    pub fn is_admin(&self) -> bool {
        self.role() == Some(Role::Admin)
    }

    pub fn is_authenticated(&self) -> bool {
        matches!(self, AuthContext::User(_))
    }
}

/// True iff the caller holds the admin role
pub fn is_admin(context: &AuthContext) -> bool {
    context.is_admin()
}

/// True iff the caller is the user `user_id`
pub fn is_self(context: &AuthContext, user_id: &Uuid) -> bool {
    context.user_id().as_ref() == Some(user_id)
}

/// True iff course `course_id` exists and the caller is its instructor
///
/// A nonexistent course yields `false`; only backend failures are errors.
pub async fn is_instructor<R>(context: &AuthContext, courses: &R, course_id: &Uuid) -> Result<bool>
where
    R: Repository<Course> + ?Sized,
{
    let Some(caller) = context.user_id() else {
        return Ok(false);
    };
    Ok(courses
        .get(course_id)
        .await?
        .is_some_and(|course| course.instructor_id == caller))
}

/// True iff course `course_id` exists and lists the caller as a student
pub async fn is_student<R>(context: &AuthContext, courses: &R, course_id: &Uuid) -> Result<bool>
where
    R: Repository<Course> + ?Sized,
{
    let Some(caller) = context.user_id() else {
        return Ok(false);
    };
    Ok(courses
        .get(course_id)
        .await?
        .is_some_and(|course| course.is_enrolled(&caller)))
}

/// Authorization policy for an operation
#[derive(Debug, Clone)]
pub enum AuthPolicy {
    /// Public access (no auth required)
    Public,

    /// Any resolved user
    Authenticated,

    /// Admin only
    AdminOnly,

    /// Instructor of the given course
    InstructorOf(Uuid),

    /// Student enrolled in the given course
    StudentOf(Uuid),

    /// The given user themself
    SelfOf(Uuid),

    /// Combination of policies (AND)
    And(Vec<AuthPolicy>),

    /// Combination of policies (OR)
    Or(Vec<AuthPolicy>),
}

impl AuthPolicy {
    /// `admin OR relation`, the composition every endpoint uses
    pub fn admin_or(relation: AuthPolicy) -> Self {
        AuthPolicy::Or(vec![AuthPolicy::AdminOnly, relation])
    }

    /// Check if the caller satisfies this policy
    ///
    /// Short-circuits: relational lookups only run when needed.
    pub fn check<'a, R>(&'a self, context: &'a AuthContext, courses: &'a R) -> BoxFuture<'a, Result<bool>>
    where
        R: Repository<Course> + ?Sized,
    {
        Box::pin(async move {
            match self {
                AuthPolicy::Public => Ok(true),
                AuthPolicy::Authenticated => Ok(context.is_authenticated()),
                AuthPolicy::AdminOnly => Ok(is_admin(context)),
                AuthPolicy::InstructorOf(course_id) => is_instructor(context, courses, course_id).await,
                AuthPolicy::StudentOf(course_id) => is_student(context, courses, course_id).await,
                AuthPolicy::SelfOf(user_id) => Ok(is_self(context, user_id)),
                AuthPolicy::And(policies) => {
                    for policy in policies {
                        if !policy.check(context, courses).await? {
                            return Ok(false);
                        }
                    }
                    Ok(true)
                }
                AuthPolicy::Or(policies) => {
                    for policy in policies {
                        if policy.check(context, courses).await? {
                            return Ok(true);
                        }
                    }
                    Ok(false)
                }
            }
        })
    }
}

/// Evaluate `policy` and turn a negative answer into a 403
pub async fn authorize<R>(policy: &AuthPolicy, context: &AuthContext, courses: &R) -> ApiResult<()>
where
    R: Repository<Course> + ?Sized,
{
    if policy.check(context, courses).await? {
        Ok(())
    } else {
        tracing::debug!(caller = ?context.user_id(), ?policy, "authorization denied");
        Err(ApiError::forbidden())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::InMemoryRepository;

    fn user(role: Role) -> User {
        User {
            id: Uuid::new_v4(),
            name: "Test".to_string(),
            email: "test@example.com".to_string(),
            password_hash: String::new(),
            role,
        }
    }

    async fn course_taught_by(courses: &InMemoryRepository<Course>, instructor: &User, students: Vec<Uuid>) -> Course {
        courses
            .insert(Course {
                id: Uuid::new_v4(),
                subject: "CS".to_string(),
                number: "493".to_string(),
                title: "Cloud".to_string(),
                term: "sp22".to_string(),
                instructor_id: instructor.id,
                students,
            })
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn test_policy_check_simple() {
        let ctx = AuthContext::User(user(Role::Student));
        let courses = InMemoryRepository::<Course>::new();

        assert!(AuthPolicy::Public.check(&ctx, &courses).await.unwrap());
        assert!(AuthPolicy::Authenticated.check(&ctx, &courses).await.unwrap());
        assert!(!AuthPolicy::AdminOnly.check(&ctx, &courses).await.unwrap());

        let anon = AuthContext::Anonymous;
        assert!(AuthPolicy::Public.check(&anon, &courses).await.unwrap());
        assert!(!AuthPolicy::Authenticated.check(&anon, &courses).await.unwrap());
    }

    #[tokio::test]
    async fn test_is_instructor_only_for_the_course_instructor() {
        let courses = InMemoryRepository::new();
        let instructor = user(Role::Instructor);
        let other_instructor = user(Role::Instructor);
        let course = course_taught_by(&courses, &instructor, vec![]).await;

        let owner = AuthContext::User(instructor);
        assert!(is_instructor(&owner, &courses, &course.id).await.unwrap());
        assert!(!is_instructor(&owner, &courses, &Uuid::new_v4()).await.unwrap());

        for ctx in [
            AuthContext::User(other_instructor),
            AuthContext::User(user(Role::Admin)),
            AuthContext::User(user(Role::Student)),
            AuthContext::Anonymous,
        ] {
            assert!(!is_instructor(&ctx, &courses, &course.id).await.unwrap());
        }
    }

    #[tokio::test]
    async fn test_is_student_requires_enrollment() {
        let courses = InMemoryRepository::new();
        let instructor = user(Role::Instructor);
        let enrolled = user(Role::Student);
        let course = course_taught_by(&courses, &instructor, vec![enrolled.id]).await;

        assert!(is_student(&AuthContext::User(enrolled), &courses, &course.id).await.unwrap());
        assert!(!is_student(&AuthContext::User(user(Role::Student)), &courses, &course.id).await.unwrap());
        assert!(!is_student(&AuthContext::User(instructor), &courses, &course.id).await.unwrap());
        assert!(!is_student(&AuthContext::Anonymous, &courses, &Uuid::new_v4()).await.unwrap());
    }

    #[test]
    fn test_is_self() {
        let me = user(Role::Student);
        let id = me.id;
        let ctx = AuthContext::User(me);
        assert!(is_self(&ctx, &id));
        assert!(!is_self(&ctx, &Uuid::new_v4()));
        assert!(!is_self(&AuthContext::Anonymous, &id));
    }

    #[tokio::test]
    async fn test_admin_or_relation() {
        let courses = InMemoryRepository::new();
        let instructor = user(Role::Instructor);
        let course = course_taught_by(&courses, &instructor, vec![]).await;
        let policy = AuthPolicy::admin_or(AuthPolicy::InstructorOf(course.id));

        assert!(authorize(&policy, &AuthContext::User(user(Role::Admin)), &courses).await.is_ok());
        assert!(authorize(&policy, &AuthContext::User(instructor), &courses).await.is_ok());

        let denied = authorize(&policy, &AuthContext::User(user(Role::Instructor)), &courses)
            .await
            .unwrap_err();
        assert_eq!(denied.status_code(), axum::http::StatusCode::FORBIDDEN);
        assert!(authorize(&policy, &AuthContext::Anonymous, &courses).await.is_err());
    }

    #[tokio::test]
    async fn test_policy_check_and() {
        let courses = InMemoryRepository::new();
        let instructor = user(Role::Instructor);
        let student = user(Role::Student);
        let course = course_taught_by(&courses, &instructor, vec![student.id]).await;

        let submitter_only = AuthPolicy::And(vec![
            AuthPolicy::StudentOf(course.id),
            AuthPolicy::SelfOf(student.id),
        ]);
        assert!(submitter_only.check(&AuthContext::User(student), &courses).await.unwrap());

        let classmate = user(Role::Student);
        let mut enrolled_course = courses.get(&course.id).await.unwrap().unwrap();
        enrolled_course.enroll(classmate.id);
        courses.update(enrolled_course).await.unwrap();
        assert!(!submitter_only.check(&AuthContext::User(classmate), &courses).await.unwrap());
    }

    #[tokio::test]
    async fn test_enrollment_changes_are_seen_immediately() {
        let courses = InMemoryRepository::new();
        let instructor = user(Role::Instructor);
        let student = user(Role::Student);
        let mut course = course_taught_by(&courses, &instructor, vec![student.id]).await;
        let ctx = AuthContext::User(student.clone());
        let policy = AuthPolicy::StudentOf(course.id);

        assert!(policy.check(&ctx, &courses).await.unwrap());
        course.unenroll(&[student.id]);
        courses.update(course).await.unwrap();
        assert!(!policy.check(&ctx, &courses).await.unwrap());
    }

    #[test]
    fn test_auth_context_accessors() {
        let admin = user(Role::Admin);
        let id = admin.id;
        let ctx = AuthContext::User(admin);
        assert_eq!(ctx.user_id(), Some(id));
        assert_eq!(ctx.role(), Some(Role::Admin));
        assert!(ctx.is_admin());
        assert!(ctx.is_authenticated());

        assert_eq!(AuthContext::Anonymous.user_id(), None);
        assert!(!AuthContext::Anonymous.is_admin());
        assert!(!AuthContext::default().is_authenticated());
    }
}
