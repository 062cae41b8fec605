use serde_json::{json, Value};

use crate::pipeline::structuring::{Tool, ToolDefinition};

pub const LOOKUP_TOOL_NAME: &str = "searchMedicalDatabase";

/// Reference paragraphs, checked in order; the first keyword contained in the topic wins.
const TOPICS: &[(&str, &str)] = &[
    (
        "diabetes",
        "Diabetes is a chronic condition that affects how your body turns food into energy. \
Most of the food you eat is broken down into sugar (also called glucose) and released into \
your bloodstream. When your blood sugar goes up, it signals your pancreas to release insulin. \
Insulin acts like a key to let blood sugar into your body's cells for use as energy. With \
diabetes, your body doesn't make enough insulin or can't use the insulin it makes as well as \
it should.",
    ),
    (
        "hypertension",
        "Hypertension, also known as high blood pressure, is a common condition in which the \
long-term force of the blood against your artery walls is high enough that it may eventually \
cause health problems, such as heart disease. Blood pressure is determined both by the amount \
of blood your heart pumps and the amount of resistance to blood flow in your arteries. The more \
blood your heart pumps and the narrower your arteries, the higher your blood pressure.",
    ),
    (
        "common cold",
        "The common cold is a viral infection of your nose and throat (upper respiratory tract). \
It's usually harmless, although it might not feel that way. Many types of viruses can cause a \
common cold. Symptoms include a runny or stuffy nose, sore throat, cough, congestion, slight \
body aches or a mild headache, sneezing, and low-grade fever.",
    ),
];

/// Look up reference text for a medical topic.
pub fn lookup(topic: &str) -> String {
    let needle = topic.to_lowercase();
    TOPICS
        .iter()
        .find(|(keyword, _)| needle.contains(keyword))
        .map(|(_, text)| (*text).to_string())
        .unwrap_or_else(|| {
            format!("No specific information found for \"{topic}\" in the medical database.")
        })
}

/// Exposes [`lookup`] to the model.
pub struct MedicalDatabaseTool;

impl Tool for MedicalDatabaseTool {
    fn definition(&self) -> ToolDefinition {
        ToolDefinition {
            name: LOOKUP_TOOL_NAME.into(),
            description: "Searches a comprehensive medical database for information related to \
the user's query. Use this tool to get factual medical information before answering complex \
medical questions."
                .into(),
            parameters: json!({
                "type": "object",
                "properties": {
                    "topic": {
                        "type": "string",
                        "description": "The specific medical topic or keyword to search for in the database."
                    }
                },
                "required": ["topic"]
            }),
        }
    }

    fn call(&self, args: &Value) -> String {
        match args.get("topic").and_then(Value::as_str) {
            Some(topic) => {
                tracing::debug!(topic_len = topic.len(), "Medical database lookup");
                lookup(topic)
            }
            None => "Error: the 'topic' argument is required and must be a string.".into(),
        }
    }
}
