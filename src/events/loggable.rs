use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Importance attached to every activity entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    /// Privilege changes
    Critical,
    Important,
}

impl Severity {
    pub fn as_str(&self) -> &'static str {
        match self {
            Severity::Critical => "critical",
            Severity::Important => "important",
        }
    }
}

impl Default for Severity {
    fn default() -> Self {
        Severity::Important
    }
}

/// Entities that can appear in the activity log.
///
/// The event name is `<entity_type>.<action>`, e.g. `admin_request.approved`.
pub trait Loggable: Serialize + Send + Sync {
    fn entity_type() -> &'static str;

    fn subject_id(&self) -> Uuid;

    fn severity(&self) -> Severity {
        Severity::Important
    }

    /// Role changes are always critical; everything else uses `severity()`.
    fn severity_for_action(&self, action: &str) -> Severity {
        match action {
            "role_changed" => Severity::Critical,
            _ => self.severity(),
        }
    }
}
