pub mod department;
pub mod request;
pub mod user;
