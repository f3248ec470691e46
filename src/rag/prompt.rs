//! Prompt templates. Every builder is a pure function of its inputs.

use serde_json::{Map, Value};

use super::index::Snippet;
use crate::predict::therapy::TherapyRecord;

pub const MEDICAL_ASSISTANT_SYSTEM: &str = "You are a helpful medical AI assistant.";

/// Context block from retrieved snippets, in retrieval order, one per line.
pub fn join_context(snippets: &[Snippet]) -> String {
    snippets
        .iter()
        .map(|s| s.text.as_str())
        .collect::<Vec<_>>()
        .join("\n")
}

/// Generic RAG prompt. An empty context still yields a well-formed prompt.
pub fn rag_prompt(context: &str, question: &str) -> String {
    format!(
        "Context:\n{}\n\nUser Question: {}\n\nAnswer:",
        context, question
    )
}

/// `key: value` per line, in the object's own key order. Top-level strings
/// are written bare, everything else the way Python would print it
/// (`8.0`, `True`, `None`, `{'k': 'v'}`).
pub fn format_patient(patient: &Map<String, Value>) -> String {
    patient
        .iter()
        .map(|(key, value)| match value {
            Value::String(text) => format!("{}: {}", key, text),
            other => format!("{}: {}", key, python_repr(other)),
        })
        .collect::<Vec<_>>()
        .join("\n")
}

fn python_repr(value: &Value) -> String {
    match value {
        Value::Null => "None".to_string(),
        Value::Bool(true) => "True".to_string(),
        Value::Bool(false) => "False".to_string(),
        Value::Number(n) => match n.as_f64() {
            Some(f) if n.is_f64() => python_float(f),
            _ => n.to_string(),
        },
        Value::String(text) => python_str(text),
        Value::Array(items) => format!(
            "[{}]",
            items.iter().map(python_repr).collect::<Vec<_>>().join(", ")
        ),
        Value::Object(map) => format!(
            "{{{}}}",
            map.iter()
                .map(|(k, v)| format!("{}: {}", python_str(k), python_repr(v)))
                .collect::<Vec<_>>()
                .join(", ")
        ),
    }
}

/// Shortest round-trip form with a decimal point, exponent as `e+16`/`e-05`.
fn python_float(value: f64) -> String {
    let debug = format!("{:?}", value);
    let Some((mantissa, exponent)) = debug.split_once('e') else {
        return debug;
    };
    let (sign, digits) = match exponent.strip_prefix('-') {
        Some(digits) => ('-', digits),
        None => ('+', exponent),
    };
    format!("{}e{}{:0>2}", mantissa, sign, digits)
}

fn python_str(text: &str) -> String {
    let quote = if text.contains('\'') && !text.contains('"') { '"' } else { '\'' };
    let mut out = String::with_capacity(text.len() + 2);
    out.push(quote);
    for c in text.chars() {
        match c {
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\t' => out.push_str("\\t"),
            c if c == quote => {
                out.push('\\');
                out.push(c);
            }
            c => out.push(c),
        }
    }
    out.push(quote);
    out
}

/// Retrieval query for treatment recommendations.
pub fn treatment_query(patient: &Map<String, Value>, question: &str) -> String {
    format!(
        "Patient data:\n{}\n\nQuestion: {}",
        format_patient(patient),
        question
    )
}

/// Patient-scoped chat prompt with answer-style instructions.
pub fn patient_chat_prompt(patient: &Map<String, Value>, query: &str) -> String {
    format!(
        "\nYou are a medical AI assistant. Given the patient's data and their question, generate a helpful and personalized response.\n\
         \n\
         Patient Info:\n\
         {}\n\
         \n\
         User Question: {}\n\
         \n\
         Instructions:\n\
         - Use markdown headers like ## Recommendations or ## Monitoring Tips if multiple points need clarity.\n\
         - For short or direct questions, reply naturally without forcing a structure.\n\
         - Do not fabricate data. Base all suggestions on the context and user's question.\n",
        format_patient(patient),
        query
    )
}

/// Narrative request explaining per-visit effectiveness probabilities.
pub fn therapy_insight_prompt(patient: &TherapyRecord, probabilities: &[f64]) -> String {
    let visits = probabilities
        .iter()
        .enumerate()
        .map(|(i, p)| format!("Visit {}: {:.1}%", i + 1, p * 100.0))
        .collect::<Vec<_>>()
        .join("\n");

    format!(
        "The patient is undergoing the insulin regimen: {regimen}.\n\
         The predicted therapy effectiveness probabilities over three visits are:\n\
         {visits}\n\
         \n\
         Based on these probabilities, provide personalized insights or advice regarding this patient's therapy effectiveness.\n\
         Additionally, justify the therapy effectiveness probabilities by analyzing the patient's HbA1c, FVG, and DDS score trends.\n\
         For example, indicate if decreasing trends in these scores support the predicted effectiveness or if there are concerns.\n\
         Use the following patient score values for your analysis:\n\
         - HbA1c scores: {h1}, {h2}, {h3}\n\
         - FVG scores: {f1}, {f2}, {f3}\n\
         - DDS scores: {d1}, {d3}\n\
         Please keep your response concise and limit it to no more than 360 words.",
        regimen = patient.insulin_regimen,
        visits = visits,
        h1 = python_float(patient.hba1c1),
        h2 = python_float(patient.hba1c2),
        h3 = python_float(patient.hba1c3),
        f1 = python_float(patient.fvg1),
        f2 = python_float(patient.fvg2),
        f3 = python_float(patient.fvg3),
        d1 = python_float(patient.dds1),
        d3 = python_float(patient.dds3),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn patient() -> Map<String, Value> {
        match json!({ "name": "A. Tan", "age": 54, "hba1c": 8.4, "on_insulin": true }) {
            Value::Object(map) => map,
            _ => unreachable!(),
        }
    }

    #[test]
    fn empty_context_still_produces_full_template() {
        let prompt = rag_prompt(&join_context(&[]), "What is HbA1c?");
        assert_eq!(prompt, "Context:\n\n\nUser Question: What is HbA1c?\n\nAnswer:");
    }

    #[test]
    fn context_keeps_retrieval_order() {
        let snippets = vec![
            Snippet { text: "second-best".into(), score: 0.2 },
            Snippet { text: "best".into(), score: 0.9 },
        ];
        assert_eq!(join_context(&snippets), "second-best\nbest");
    }

    #[test]
    fn patient_lines_follow_key_order_with_bare_strings() {
        assert_eq!(
            format_patient(&patient()),
            "name: A. Tan\nage: 54\nhba1c: 8.4\non_insulin: True"
        );
    }

    #[test]
    fn treatment_query_embeds_patient_and_question() {
        let query = treatment_query(&patient(), "Should we add metformin?");
        assert!(query.starts_with("Patient data:\nname: A. Tan\n"));
        assert!(query.ends_with("\n\nQuestion: Should we add metformin?"));
    }

    #[test]
    fn patient_chat_prompt_carries_instruction_block() {
        let prompt = patient_chat_prompt(&patient(), "Is my sugar ok?");
        assert!(prompt.contains("Patient Info:\nname: A. Tan"));
        assert!(prompt.contains("User Question: Is my sugar ok?"));
        assert!(prompt.contains("- Do not fabricate data."));
        assert_eq!(prompt, patient_chat_prompt(&patient(), "Is my sugar ok?"));
    }

    #[test]
    fn insight_prompt_lists_visits_as_percentages() {
        let record = crate::predict::therapy::tests::patient();
        let prompt = therapy_insight_prompt(&record, &[0.25, 0.75, 0.8]);
        assert!(prompt.contains("insulin regimen: Basal."));
        assert!(prompt.contains("Visit 1: 25.0%\nVisit 2: 75.0%\nVisit 3: 80.0%"));
        assert!(prompt.contains("- HbA1c scores: 9.2, 8.0, 7.1"));
        assert!(prompt.contains("- FVG scores: 180.0, 150.0, 130.0"));
        assert!(prompt.contains("no more than 360 words"));
    }

    #[test]
    fn patient_values_print_like_python() {
        let patient = match json!({
            "weight": 80.0,
            "notes": null,
            "smoker": false,
            "meds": ["metformin", 500, 0.5],
            "labs": { "ldl": 2.0, "note": "it's high" },
            "egfr_trace": 0.00001,
            "copies": 1e16
        }) {
            Value::Object(map) => map,
            _ => unreachable!(),
        };

        assert_eq!(
            format_patient(&patient),
            "weight: 80.0\n\
             notes: None\n\
             smoker: False\n\
             meds: ['metformin', 500, 0.5]\n\
             labs: {'ldl': 2.0, 'note': \"it's high\"}\n\
             egfr_trace: 1e-05\n\
             copies: 1e+16"
        );
    }
}
