//! Domain records shared by the stores, services and handlers.

pub mod meter;
pub mod session;
pub mod user;

pub use meter::{Meter, MeterWithOwner, NewMeter, TokenHistory, UsageHistory};
pub use session::{IssuedSession, Session};
pub use user::{NewUser, User, UserProfile};
