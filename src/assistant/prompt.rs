use crate::models::{AiTurn, Report, TurnRole};

use super::ollama::{ChatMessage, ChatRole};

pub const ASSISTANT_SYSTEM_PROMPT: &str = r#"You are Careline, a medical assistant that helps patients understand their diagnostic results. You are NOT a doctor.

ABSOLUTE RULES — NO EXCEPTIONS:
1. Ground your answers in the diagnostic report provided below, when one is provided.
2. NEVER issue your own diagnosis, prescribe, or recommend treatments.
3. NEVER contradict the treating clinician; for clinical decisions, always defer to them.
4. Explain results in plain, patient-friendly language. Avoid jargon unless explaining it.
5. If asked something the report does not cover, say so clearly and suggest the patient raise it with their doctor.
6. If the patient describes worsening or alarming symptoms, tell them to contact their care team promptly."#;

/// Severity band for a confidence percentage: <60 Mild, <85 Moderate,
/// else Severe.
pub fn severity_band(confidence_percentage: f64) -> &'static str {
    if confidence_percentage < 60.0 {
        "Mild"
    } else if confidence_percentage < 85.0 {
        "Moderate"
    } else {
        "Severe"
    }
}

/// Build the instruction turn: system rules plus, when a report is
/// attached, the patient demographics and primary diagnosis the model
/// grounds on.
pub fn instruction_turn(report: Option<&Report>) -> ChatMessage {
    let mut content = String::from(ASSISTANT_SYSTEM_PROMPT);

    if let Some(report) = report {
        content.push_str("\n\nDIAGNOSTIC REPORT:\n");
        if !report.patient_name.is_empty() {
            content.push_str(&format!("Patient: {}\n", report.patient_name));
        }
        if let Some(age) = report.patient_age {
            content.push_str(&format!("Age: {age}\n"));
        }
        if let Some(gender) = &report.patient_gender {
            content.push_str(&format!("Gender: {gender}\n"));
        }
        content.push_str(&format!(
            "Primary diagnosis: {} (confidence {:.2}%, severity band: {})\n",
            report.disease_name,
            report.confidence_percentage,
            severity_band(report.confidence_percentage)
        ));
        content.push_str(&format!(
            "Images evaluated: {} of {}\n",
            report.images_evaluated, report.images_requested
        ));
        content.push_str(
            "Answer only about this report. Do not add a diagnosis of your own; \
             the treating clinician has the final word.",
        );
    }

    ChatMessage {
        role: ChatRole::System,
        content,
    }
}

/// Map persisted turns onto role-tagged model messages, in order.
pub fn history_messages(turns: &[AiTurn]) -> Vec<ChatMessage> {
    turns
        .iter()
        .map(|turn| ChatMessage {
            role: match turn.role {
                TurnRole::User => ChatRole::User,
                TurnRole::Assistant => ChatRole::Assistant,
            },
            content: turn.content.clone(),
        })
        .collect()
}
