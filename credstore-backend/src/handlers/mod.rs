pub mod credentials;
pub mod files;
pub mod uploads;
pub mod users;
