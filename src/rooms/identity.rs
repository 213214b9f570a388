/// Separator between the doctor and patient halves of a room id.
const ROOM_KEY_SEPARATOR: &str = "::";

/// Derive the stable room id for a doctor-patient pair.
///
/// Both identities are trimmed and lowercased before joining, so the same
/// two parties always map to the same room regardless of call-site casing
/// or whitespace. The patient key is whichever identity the caller has:
/// email, else phone, else an opaque patient id.
///
/// Pure function, no side effects.
///
/// Known gap: an identity containing `"::"` could collide with another
/// pair. No escaping is applied; emails and phone numbers cannot contain
/// the separator, and opaque ids are caller-controlled.
pub fn resolve_room_id(doctor_identity: &str, patient_key: &str) -> String {
    format!(
        "{}{}{}",
        doctor_identity.trim().to_lowercase(),
        ROOM_KEY_SEPARATOR,
        patient_key.trim().to_lowercase()
    )
}
