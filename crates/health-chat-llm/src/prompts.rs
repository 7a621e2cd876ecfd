//! Prompt templates and fixed replies for the health assistant.

use health_chat_core::{format_appointment, Patient};

/// Reply when moderation flags the message or cannot be reached.
pub const OFF_TOPIC_REPLY: &str =
    "I'm sorry, but I can only assist with health-related questions.";

/// Reply when an appointment change is requested without a usable time.
pub const ASK_FOR_TIME_REPLY: &str =
    "Could you please specify the date and time you'd like to reschedule your appointment to?";

/// Reply when the completion call fails.
pub const LLM_FAILURE_REPLY: &str =
    "I'm sorry, I'm having trouble processing your request right now.";

pub fn appointment_confirmation(doctor_name: &str, formatted_time: &str) -> String {
    format!(
        "I will convey your request to Dr. {} to reschedule to {}.",
        doctor_name, formatted_time
    )
}

pub fn medication_acknowledgement(doctor_name: &str) -> String {
    format!(
        "I will inform Dr. {} about your request regarding medication changes.",
        doctor_name
    )
}

/// Reply prompt: patient profile, recent history, then the new message.
pub fn build_reply_prompt(patient: &Patient, history: &str, user_input: &str) -> String {
    format!(
        r#"You are an AI health assistant for {name}. As an AI health assistant, provide a concise, helpful, and empathetic response focusing on the patient's message.

Patient's Medical Information:
- Condition: {condition}
- Medication: {medication}
- Next Appointment: {next_appointment}
- Doctor: {doctor}

Conversation History:
{history}

The patient says: "{user_input}""#,
        name = patient.full_name(),
        condition = patient.medical_condition,
        medication = patient.medication_regimen,
        next_appointment = format_appointment(&patient.next_appointment),
        doctor = patient.doctor_name,
        history = history,
        user_input = user_input,
    )
}

/// Summary prompt over the full conversation, one message per line.
pub fn build_summary_prompt<S: AsRef<str>>(messages: &[S]) -> String {
    let conversation = messages
        .iter()
        .map(AsRef::as_ref)
        .collect::<Vec<_>>()
        .join("\n");

    format!(
        r#"Summarize the following conversation between a patient and an AI health assistant, highlighting any important medical information or concerns.

Conversation:
{}

Summary:"#,
        conversation
    )
}

/// System prompt for entity extraction.
pub const ENTITY_SYSTEM_PROMPT: &str = r#"You extract named entities from messages a patient sends to their health assistant.

Use only these labels:
- DRUG: medication names (brand or generic)
- CONDITION: diagnosed conditions or diseases
- SYMPTOM: symptoms the patient describes
- DATE: dates or days
- TIME: times of day
- PERSON: people's names
- ORG: clinics, hospitals, pharmacies

Output JSON with an "entities" array and nothing else."#;

/// User prompt for entity extraction.
pub fn make_entity_prompt(message: &str) -> String {
    format!(
        r#"{}

Extract all entities from this patient message:

"{}"

Return a JSON object with an "entities" array. Each entity should have:
- label: One of the labels above
- text: The entity text as written in the message"#,
        ENTITY_SYSTEM_PROMPT, message
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn patient() -> Patient {
        Patient {
            id: 1,
            first_name: "Jane".into(),
            last_name: "Doe".into(),
            date_of_birth: NaiveDate::from_ymd_opt(1980, 4, 12).unwrap(),
            phone_number: "555-0100".into(),
            email: "jane@example.com".into(),
            medical_condition: "Type 2 diabetes".into(),
            medication_regimen: "Metformin 500mg twice daily".into(),
            last_appointment: NaiveDate::from_ymd_opt(2025, 1, 2)
                .unwrap()
                .and_hms_opt(9, 0, 0)
                .unwrap(),
            next_appointment: NaiveDate::from_ymd_opt(2025, 3, 5)
                .unwrap()
                .and_hms_opt(14, 30, 0)
                .unwrap(),
            doctor_name: "Patel".into(),
        }
    }

    #[test]
    fn test_reply_prompt_contains_profile() {
        let prompt = build_reply_prompt(&patient(), "earlier line\n", "Is fruit OK?");
        assert!(prompt.contains("AI health assistant for Jane Doe"));
        assert!(prompt.contains("- Condition: Type 2 diabetes"));
        assert!(prompt.contains("- Medication: Metformin 500mg twice daily"));
        assert!(prompt.contains("- Next Appointment: March 05, 2025 at 02:30 PM"));
        assert!(prompt.contains("- Doctor: Patel"));
        assert!(prompt.contains("earlier line"));
        assert!(prompt.ends_with("The patient says: \"Is fruit OK?\""));
    }

    #[test]
    fn test_summary_prompt_joins_lines() {
        let prompt = build_summary_prompt(&["hello", "hi there"]);
        assert!(prompt.contains("Conversation:\nhello\nhi there\n"));
        assert!(prompt.ends_with("Summary:"));
    }

    #[test]
    fn test_canned_replies() {
        assert_eq!(
            appointment_confirmation("Patel", "March 05, 2025 at 02:30 PM"),
            "I will convey your request to Dr. Patel to reschedule to March 05, 2025 at 02:30 PM."
        );
        assert_eq!(
            medication_acknowledgement("Patel"),
            "I will inform Dr. Patel about your request regarding medication changes."
        );
    }

    #[test]
    fn test_entity_prompt() {
        let prompt = make_entity_prompt("I take metformin");
        assert!(prompt.contains("\"I take metformin\""));
        assert!(prompt.contains("DRUG"));
        assert!(prompt.contains("entities"));
    }
}
