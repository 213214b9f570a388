use crate::db::DatabaseError;
use serde::{Deserialize, Serialize};

/// Macro to generate enum with as_str + std::str::FromStr pattern
macro_rules! str_enum {
    ($name:ident { $($variant:ident => $s:literal),+ $(,)? }) => {
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
        #[serde(rename_all = "lowercase")]
        pub enum $name {
            $($variant),+
        }

        impl $name {
            pub fn as_str(&self) -> &'static str {
                match self {
                    $(Self::$variant => $s),+
                }
            }
        }

        impl std::str::FromStr for $name {
            type Err = DatabaseError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                match s {
                    $($s => Ok(Self::$variant)),+,
                    _ => Err(DatabaseError::InvalidEnum {
                        field: stringify!($name).into(),
                        value: s.into(),
                    }),
                }
            }
        }
    };
}

str_enum!(ParticipantRole {
    Doctor => "doctor",
    Patient => "patient",
});

str_enum!(TurnRole {
    User => "user",
    Assistant => "assistant",
});

str_enum!(DiseaseType {
    Pneumonia => "pneumonia",
    Tuberculosis => "tuberculosis",
    Melanoma => "melanoma",
});

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    #[test]
    fn round_trip_participant_role() {
        for role in [ParticipantRole::Doctor, ParticipantRole::Patient] {
            assert_eq!(ParticipantRole::from_str(role.as_str()).unwrap(), role);
        }
    }

    #[test]
    fn unknown_disease_is_rejected() {
        assert!(DiseaseType::from_str("gout").is_err());
    }

    #[test]
    fn disease_strings_match_classifier_keys() {
        assert_eq!(DiseaseType::Pneumonia.as_str(), "pneumonia");
        assert_eq!(DiseaseType::Tuberculosis.as_str(), "tuberculosis");
        assert_eq!(DiseaseType::Melanoma.as_str(), "melanoma");
    }
}
