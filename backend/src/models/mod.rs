pub mod common;
pub mod invite;
pub mod member;
pub mod organisation;
pub mod user;
