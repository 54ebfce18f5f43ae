//! Authorization: role resolution, the API gate and the route guard.
//!
//! - `RoleResolver` turns an identity into its effective `Role`
//! - `Gate` checks a `Requirement` and hands out the privileged store handle
//! - `RouteGuard` decides whether a UI navigation renders or redirects

mod gate;
mod guard;
mod resolver;

pub use gate::{Gate, Privileged, Requirement};
pub use guard::{GuardOptions, GuardSession, GuardState, RouteGuard, RouteRules};
pub use resolver::RoleResolver;

use serde::Serialize;
use uuid::Uuid;

/// Who is calling, as asserted by a validated bearer token.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Identity {
    pub user_id: Uuid,
    pub email: String,
}

impl Identity {
    pub fn new(user_id: Uuid, email: impl Into<String>) -> Self {
        Self {
            user_id,
            email: email.into(),
        }
    }
}
