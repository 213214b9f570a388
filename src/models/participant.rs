use serde::{Deserialize, Serialize};

use super::enums::ParticipantRole;

/// A registered doctor or patient.
///
/// The role is fixed at registration. Demographics are optional and used
/// only for report display and assistant grounding, never for room math.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Participant {
    pub email: String,
    pub display_name: String,
    pub role: ParticipantRole,
    pub phone: Option<String>,
    pub age: Option<u32>,
    pub gender: Option<String>,
}

impl Participant {
    /// The key used for this participant's side of a room id:
    /// email, else phone, else nothing (callers fall back to an opaque id).
    pub fn room_key(&self) -> &str {
        if !self.email.trim().is_empty() {
            &self.email
        } else {
            self.phone.as_deref().unwrap_or("")
        }
    }
}
