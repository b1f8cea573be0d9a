pub mod admin;
pub mod dashboard;
pub mod department;
pub mod request;
pub mod user;
