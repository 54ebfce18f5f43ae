pub mod admin;
pub mod admin_requests;
pub mod groups;
pub mod health;
pub mod navigation;
pub mod profiles;
