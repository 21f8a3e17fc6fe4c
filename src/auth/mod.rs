// Session authentication: password hashing, token resolution and role gates

pub mod middleware;
pub mod password;

pub use middleware::{require_admin_role, session_auth_middleware, AuthenticatedUser, SESSION_HEADER};
pub use password::PasswordService;
