//! Structural contracts at both pipeline boundaries.
//!
//! [`validate_input`] turns an untrusted JSON body into a [`CampaignRequest`].
//! [`validate_output`] checks the assembled result, in its serialized form,
//! before it is released to the caller.

use serde_json::{Map, Value};
use url::Url;

use outreach_shared::{CampaignRequest, CampaignResult, OutreachError, Result, Tone, word_count};

/// Request fields, in declaration order.
pub const REQUEST_FIELDS: [&str; 6] = [
    "company_name",
    "company_website",
    "target_role",
    "product_description",
    "outreach_goal",
    "tone",
];

/// Result fields. Anything else in a candidate result is a violation.
pub const RESULT_FIELDS: [&str; 5] = [
    "subject_lines",
    "primary_email",
    "follow_up_email",
    "personalization_points",
    "spam_risk_score",
];

pub const SUBJECT_LINE_COUNT: usize = 3;
pub const MAX_BODY_WORDS: usize = 120;
pub const MAX_PERSONALIZATION_POINTS: usize = 5;

/// Character limits (inclusive) applied after trimming.
const LENGTH_LIMITS: &[(&str, usize, usize)] = &[
    ("company_name", 1, 200),
    ("target_role", 1, 100),
    ("product_description", 10, 500),
    ("outreach_goal", 5, 200),
];

// ---------------------------------------------------------------------------
// Input
// ---------------------------------------------------------------------------

/// Validate a raw request body.
///
/// Absent or `null` fields are reported together as `missing_field`.
/// Every other problem is collected into a single `validation_error`.
pub fn validate_input(raw: &Value) -> Result<CampaignRequest> {
    let Some(obj) = raw.as_object() else {
        return Err(OutreachError::validation(format!(
            "request body must be a JSON object, got {}",
            json_type(raw)
        )));
    };

    let missing: Vec<String> = REQUEST_FIELDS
        .iter()
        .filter(|field| matches!(obj.get(**field), None | Some(Value::Null)))
        .map(|field| field.to_string())
        .collect();
    if !missing.is_empty() {
        return Err(OutreachError::MissingField { fields: missing });
    }

    let mut details = Vec::new();

    let company_name = text_field(obj, "company_name", &mut details);
    let company_website =
        text_field(obj, "company_website", &mut details).and_then(|raw| {
            parse_website(&raw)
                .map_err(|reason| details.push(format!("company_website: {reason}")))
                .ok()
        });
    let target_role = text_field(obj, "target_role", &mut details);
    let product_description = text_field(obj, "product_description", &mut details);
    let outreach_goal = text_field(obj, "outreach_goal", &mut details);
    let tone = text_field(obj, "tone", &mut details).and_then(|raw| {
        raw.parse::<Tone>()
            .map_err(|reason| details.push(format!("tone: {reason}")))
            .ok()
    });

    for key in obj.keys() {
        if !REQUEST_FIELDS.contains(&key.as_str()) {
            details.push(format!("{key}: unexpected field"));
        }
    }

    match (
        company_name,
        company_website,
        target_role,
        product_description,
        outreach_goal,
        tone,
    ) {
        (
            Some(company_name),
            Some(company_website),
            Some(target_role),
            Some(product_description),
            Some(outreach_goal),
            Some(tone),
        ) if details.is_empty() => Ok(CampaignRequest {
            company_name,
            company_website,
            target_role,
            product_description,
            outreach_goal,
            tone,
        }),
        _ => Err(OutreachError::Validation { details }),
    }
}

/// Read a required string field, trimmed and length-checked.
fn text_field(
    obj: &Map<String, Value>,
    field: &'static str,
    details: &mut Vec<String>,
) -> Option<String> {
    let text = match obj.get(field) {
        Some(Value::String(s)) => s.trim(),
        other => {
            details.push(format!(
                "{field}: expected a string, got {}",
                other.map_or("null", json_type)
            ));
            return None;
        }
    };

    if text.is_empty() {
        details.push(format!("{field}: must not be empty"));
        return None;
    }

    if let Some((_, min, max)) = LENGTH_LIMITS.iter().find(|(name, _, _)| *name == field) {
        let len = text.chars().count();
        if len < *min || len > *max {
            details.push(format!(
                "{field}: length must be between {min} and {max} characters, got {len}"
            ));
            return None;
        }
    }

    Some(text.to_string())
}

fn parse_website(raw: &str) -> std::result::Result<Url, String> {
    let url = Url::parse(raw).map_err(|e| format!("not an absolute URL ({e})"))?;
    if !matches!(url.scheme(), "http" | "https") {
        return Err(format!("scheme '{}' is not http or https", url.scheme()));
    }
    if url.host_str().is_none_or(str::is_empty) {
        return Err("URL has no host".to_string());
    }
    Ok(url)
}

// ---------------------------------------------------------------------------
// Output
// ---------------------------------------------------------------------------

/// Validate a candidate result in its serialized form.
///
/// Any violation is an `agent_error`: the stages produced something the
/// response contract does not allow.
pub fn validate_output(candidate: Value) -> Result<CampaignResult> {
    let details = output_violations(&candidate);
    if !details.is_empty() {
        return Err(OutreachError::agent(format!(
            "result failed output validation: {}",
            details.join("; ")
        )));
    }

    serde_json::from_value(candidate)
        .map_err(|e| OutreachError::agent(format!("result failed output validation: {e}")))
}

fn output_violations(candidate: &Value) -> Vec<String> {
    let Some(obj) = candidate.as_object() else {
        return vec![format!("result must be a JSON object, got {}", json_type(candidate))];
    };

    let mut details = Vec::new();

    for key in obj.keys() {
        if !RESULT_FIELDS.contains(&key.as_str()) {
            details.push(format!("{key}: unexpected field"));
        }
    }

    match obj.get("subject_lines").and_then(Value::as_array) {
        Some(lines) => {
            if lines.len() != SUBJECT_LINE_COUNT {
                details.push(format!(
                    "subject_lines: expected exactly {SUBJECT_LINE_COUNT}, got {}",
                    lines.len()
                ));
            }
            for (i, line) in lines.iter().enumerate() {
                if !non_empty_string(line) {
                    details.push(format!("subject_lines[{i}]: must be a non-empty string"));
                }
            }
        }
        None => details.push("subject_lines: expected an array".to_string()),
    }

    for field in ["primary_email", "follow_up_email"] {
        match obj.get(field).and_then(Value::as_str) {
            Some(body) if !body.trim().is_empty() => details.extend(body_violations(field, body)),
            _ => details.push(format!("{field}: must be a non-empty string")),
        }
    }

    match obj.get("personalization_points").and_then(Value::as_array) {
        Some(points) => {
            if points.is_empty() || points.len() > MAX_PERSONALIZATION_POINTS {
                details.push(format!(
                    "personalization_points: expected 1 to {MAX_PERSONALIZATION_POINTS}, got {}",
                    points.len()
                ));
            }
            for (i, point) in points.iter().enumerate() {
                if !non_empty_string(point) {
                    details.push(format!(
                        "personalization_points[{i}]: must be a non-empty string"
                    ));
                }
            }
        }
        None => details.push("personalization_points: expected an array".to_string()),
    }

    match obj.get("spam_risk_score").and_then(Value::as_str) {
        Some("low" | "medium" | "high") => {}
        Some(other) => details.push(format!(
            "spam_risk_score: '{other}' is not one of low, medium, high"
        )),
        None => details.push("spam_risk_score: expected a string".to_string()),
    }

    details
}

// ---------------------------------------------------------------------------
// Body rules
// ---------------------------------------------------------------------------

/// Exclamation mark characters, including the inverted, doubled and fullwidth forms.
const EXCLAMATION_MARKS: &[char] = &[
    '!', '\u{A1}', '\u{203C}', '\u{2048}', '\u{2049}', '\u{2762}', '\u{2763}', '\u{2755}',
    '\u{2757}', '\u{FE57}', '\u{FF01}',
];

/// Violations of the email body rules: word limit, no emoji, no `!`.
pub fn body_violations(label: &str, body: &str) -> Vec<String> {
    let mut violations = Vec::new();

    let words = word_count(body);
    if words > MAX_BODY_WORDS {
        violations.push(format!(
            "{label}: {words} words exceeds the {MAX_BODY_WORDS}-word limit"
        ));
    }
    if let Some(mark) = body.chars().find(|c| EXCLAMATION_MARKS.contains(c)) {
        violations.push(format!("{label}: contains '{mark}'"));
    }
    if body.chars().any(is_emoji) {
        violations.push(format!("{label}: contains emoji"));
    }

    violations
}

/// Code points with the Unicode `Emoji` property (Unicode 15.1
/// `emoji-data.txt`), minus the ASCII keycap bases `#`, `*` and `0-9`, plus
/// the components that only occur inside emoji sequences.
pub fn is_emoji(c: char) -> bool {
    matches!(
        c as u32,
        0x00A9
            | 0x00AE
            | 0x203C
            | 0x2049
            | 0x2122
            | 0x2139
            | 0x2194..=0x2199
            | 0x21A9..=0x21AA
            | 0x231A..=0x231B
            | 0x2328
            | 0x23CF
            | 0x23E9..=0x23F3
            | 0x23F8..=0x23FA
            | 0x24C2
            | 0x25AA..=0x25AB
            | 0x25B6
            | 0x25C0
            | 0x25FB..=0x25FE
            | 0x2600..=0x2604
            | 0x260E
            | 0x2611
            | 0x2614..=0x2615
            | 0x2618
            | 0x261D
            | 0x2620
            | 0x2622..=0x2623
            | 0x2626
            | 0x262A
            | 0x262E..=0x262F
            | 0x2638..=0x263A
            | 0x2640
            | 0x2642
            | 0x2648..=0x2653
            | 0x265F..=0x2660
            | 0x2663
            | 0x2665..=0x2666
            | 0x2668
            | 0x267B
            | 0x267E..=0x267F
            | 0x2692..=0x2697
            | 0x2699
            | 0x269B..=0x269C
            | 0x26A0..=0x26A1
            | 0x26A7
            | 0x26AA..=0x26AB
            | 0x26B0..=0x26B1
            | 0x26BD..=0x26BE
            | 0x26C4..=0x26C5
            | 0x26C8
            | 0x26CE..=0x26CF
            | 0x26D1
            | 0x26D3..=0x26D4
            | 0x26E9..=0x26EA
            | 0x26F0..=0x26F5
            | 0x26F7..=0x26FA
            | 0x26FD
            | 0x2702
            | 0x2705
            | 0x2708..=0x270D
            | 0x270F
            | 0x2712
            | 0x2714
            | 0x2716
            | 0x271D
            | 0x2721
            | 0x2728
            | 0x2733..=0x2734
            | 0x2744
            | 0x2747
            | 0x274C
            | 0x274E
            | 0x2753..=0x2755
            | 0x2757
            | 0x2763..=0x2764
            | 0x2795..=0x2797
            | 0x27A1
            | 0x27B0
            | 0x27BF
            | 0x2934..=0x2935
            | 0x2B05..=0x2B07
            | 0x2B1B..=0x2B1C
            | 0x2B50
            | 0x2B55
            | 0x3030
            | 0x303D
            | 0x3297
            | 0x3299
            | 0x1F004
            | 0x1F0CF
            | 0x1F170..=0x1F171
            | 0x1F17E..=0x1F17F
            | 0x1F18E
            | 0x1F191..=0x1F19A
            | 0x1F1E6..=0x1F1FF
            | 0x1F201..=0x1F202
            | 0x1F21A
            | 0x1F22F
            | 0x1F232..=0x1F23A
            | 0x1F250..=0x1F251
            | 0x1F300..=0x1F321
            | 0x1F324..=0x1F393
            | 0x1F396..=0x1F397
            | 0x1F399..=0x1F39B
            | 0x1F39E..=0x1F3F0
            | 0x1F3F3..=0x1F3F5
            | 0x1F3F7..=0x1F4FD
            | 0x1F4FF..=0x1F53D
            | 0x1F549..=0x1F54E
            | 0x1F550..=0x1F567
            | 0x1F56F..=0x1F570
            | 0x1F573..=0x1F57A
            | 0x1F587
            | 0x1F58A..=0x1F58D
            | 0x1F590
            | 0x1F595..=0x1F596
            | 0x1F5A4..=0x1F5A5
            | 0x1F5A8
            | 0x1F5B1..=0x1F5B2
            | 0x1F5BC
            | 0x1F5C2..=0x1F5C4
            | 0x1F5D1..=0x1F5D3
            | 0x1F5DC..=0x1F5DE
            | 0x1F5E1
            | 0x1F5E3
            | 0x1F5E8
            | 0x1F5EF
            | 0x1F5F3
            | 0x1F5FA..=0x1F64F
            | 0x1F680..=0x1F6C5
            | 0x1F6CB..=0x1F6D2
            | 0x1F6D5..=0x1F6D7
            | 0x1F6DC..=0x1F6E5
            | 0x1F6E9
            | 0x1F6EB..=0x1F6EC
            | 0x1F6F0
            | 0x1F6F3..=0x1F6FC
            | 0x1F7E0..=0x1F7EB
            | 0x1F7F0
            | 0x1F90C..=0x1F93A
            | 0x1F93C..=0x1F945
            | 0x1F947..=0x1F9FF
            | 0x1FA70..=0x1FA7C
            | 0x1FA80..=0x1FA88
            | 0x1FA90..=0x1FABD
            | 0x1FABF..=0x1FAC5
            | 0x1FACE..=0x1FADB
            | 0x1FAE0..=0x1FAE8
            | 0x1FAF0..=0x1FAF8
            // Presentation selector, keycap, tag characters.
            | 0xFE0F
            | 0x20E3
            | 0xE0020..=0xE007F
    )
}

fn non_empty_string(value: &Value) -> bool {
    value.as_str().is_some_and(|s| !s.trim().is_empty())
}

fn json_type(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
