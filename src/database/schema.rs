// Column types shared between the SQL schema in `migrations/` and the models.

pub mod types {
    use serde::{Deserialize, Serialize};
    use std::fmt;
    use utoipa::ToSchema;

    #[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type, ToSchema)]
    #[sqlx(type_name = "user_role", rename_all = "UPPERCASE")]
    #[serde(rename_all = "UPPERCASE")]
    pub enum UserRole {
        Admin,
        User,
    }

    impl fmt::Display for UserRole {
        fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            match self {
                UserRole::Admin => write!(f, "ADMIN"),
                UserRole::User => write!(f, "USER"),
            }
        }
    }
}
