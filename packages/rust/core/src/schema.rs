//! Self-description of the request form, for clients that render inputs.

use serde::Serialize;
use serde_json::{Value, json};

use outreach_shared::Tone;

/// One request field as a form input.
#[derive(Debug, Clone, Serialize)]
pub struct InputField {
    pub id: &'static str,
    #[serde(rename = "type")]
    pub kind: &'static str,
    pub name: &'static str,
    pub data: Value,
    pub validations: Vec<Value>,
}

/// Describe every request field, in declaration order.
pub fn input_schema() -> Vec<InputField> {
    let required = || json!({"type": "required"});
    let min_length = |value: usize| json!({"type": "min_length", "value": value});
    let max_length = |value: usize| json!({"type": "max_length", "value": value});

    vec![
        InputField {
            id: "company_name",
            kind: "string",
            name: "Company Name",
            data: json!({"placeholder": "e.g., Stripe"}),
            validations: vec![required(), min_length(1), max_length(200)],
        },
        InputField {
            id: "company_website",
            kind: "string",
            name: "Company Website",
            data: json!({"placeholder": "https://stripe.com"}),
            validations: vec![required(), json!({"type": "url"})],
        },
        InputField {
            id: "target_role",
            kind: "string",
            name: "Target Role",
            data: json!({"placeholder": "e.g., Head of Growth"}),
            validations: vec![required(), min_length(1), max_length(100)],
        },
        InputField {
            id: "product_description",
            kind: "string",
            name: "Your Product Description",
            data: json!({"placeholder": "AI-powered tool that..."}),
            validations: vec![required(), min_length(10), max_length(500)],
        },
        InputField {
            id: "outreach_goal",
            kind: "string",
            name: "Outreach Goal",
            data: json!({"placeholder": "Book a 15-minute demo call"}),
            validations: vec![required(), min_length(5), max_length(200)],
        },
        InputField {
            id: "tone",
            kind: "option",
            name: "Email Tone",
            data: json!({"options": Tone::ALL.iter().map(|t| json!({
                "value": t.as_str(),
                "label": tone_label(*t),
            })).collect::<Vec<_>>()}),
            validations: vec![required()],
        },
    ]
}

fn tone_label(tone: Tone) -> &'static str {
    match tone {
        Tone::Professional => "Professional",
        Tone::Casual => "Casual",
        Tone::Founder => "Founder-to-Founder",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::validator::REQUEST_FIELDS;

    #[test]
    fn schema_lists_request_fields_in_order() {
        let ids: Vec<_> = input_schema().iter().map(|f| f.id).collect();
        assert_eq!(ids, REQUEST_FIELDS);
    }

    #[test]
    fn tone_field_offers_every_tone() {
        let schema = serde_json::to_value(input_schema()).unwrap();
        let tone = &schema[5];
        assert_eq!(tone["type"], "option");
        let values: Vec<_> = tone["data"]["options"]
            .as_array()
            .unwrap()
            .iter()
            .map(|o| o["value"].as_str().unwrap())
            .collect();
        assert_eq!(values, vec!["professional", "casual", "founder"]);
    }
}
