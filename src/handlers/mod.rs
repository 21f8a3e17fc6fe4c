pub mod admin;
pub mod auth;
pub mod health;
pub mod response;

pub use response::{Created, DataResponse, NoContent};
