pub mod conversations;
pub mod error;
pub mod messages;
pub mod reactions;
pub mod session;
pub mod uploads;
pub mod users;
