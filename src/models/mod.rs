pub mod activity;
pub mod admin_request;
pub mod group;
pub mod profile;
pub mod role;

pub use admin_request::{AdminRequest, Decision, RequestStatus};
pub use profile::Profile;
pub use role::Role;
