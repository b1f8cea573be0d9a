pub mod admin;
pub mod auth;
pub mod dashboard;
pub mod department;
pub mod health;
pub mod request;
pub mod user;
