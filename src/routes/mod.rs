pub mod api;
pub mod board;
pub mod record;
pub mod user;
