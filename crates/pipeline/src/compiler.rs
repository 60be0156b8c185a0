//! Query compiler — turns one history entry into one prompt message.
//!
//! System entries are compiled according to their declared [`QueryType`];
//! character entries are echoed back as replies. Compilation is pure and
//! deterministic: the same record always yields the same text.

use npcmind_core::error::CompilationError;
use npcmind_core::history::{HistoryEntry, Origin, QueryType, Record, json_kind};
use npcmind_core::message::CompiledMessage;
use serde_json::Value;

/// Control phrase for a turn in which nothing new happened.
pub const CONTINUE_PHRASE: &str = "Nothing new has happened. Continue with what you were doing.";

/// Appended to identity declarations that carry no personality.
pub const NO_PERSONALITY: &str = "You have no specific personality.";

const CONTEXT_CLAUSES: [(&str, &str); 4] = [
    ("location", "Location"),
    ("time", "Time"),
    ("weather", "Weather"),
    ("vibe", "Vibe"),
];

/// Perception categories with the verb that introduces each.
const PERCEPTION_CATEGORIES: [(&str, &str); 3] =
    [("visual", "see"), ("audio", "hear"), ("other", "feel")];

/// Compile a single history entry.
///
/// Returns `Ok(None)` for entries that produce no text (`ignore`, `inspect`).
pub fn compile_entry(entry: &HistoryEntry) -> Result<Option<CompiledMessage>, CompilationError> {
    match entry.from {
        Origin::System => {
            let query = entry.query_type()?;
            Ok(compile_query(query, &entry.content)?.map(CompiledMessage::instruction))
        }
        Origin::Character => {
            if !entry.content.contains_key("action") {
                return Err(CompilationError::MissingActionKey);
            }
            let text = Value::Object(entry.content.clone()).to_string();
            Ok(Some(CompiledMessage::reply(text)))
        }
    }
}

/// Compile the content of a system entry for the given query type.
pub fn compile_query(query: QueryType, content: &Record) -> Result<Option<String>, CompilationError> {
    match query {
        QueryType::Continue => Ok(Some(CONTINUE_PHRASE.to_string())),
        QueryType::Context => compile_context(content).map(Some),
        QueryType::WhoAmI => compile_whoami(content).map(Some),
        QueryType::Actions => compile_actions(content).map(Some),
        QueryType::Perception => compile_perception(content),
        // Inspect results come back from the model; nothing to send.
        QueryType::Inspect | QueryType::Ignore => Ok(None),
    }
}

fn compile_context(content: &Record) -> Result<String, CompilationError> {
    let mut text = required_text(content, "desc")?;

    for (key, label) in CONTEXT_CLAUSES {
        if let Some(value) = content.get(key).and_then(plain_text) {
            text.push_str(&format!(" {label}: {value}."));
        }
    }

    Ok(text)
}

fn compile_whoami(content: &Record) -> Result<String, CompilationError> {
    let name = required_text(content, "name")?;
    let desc = content
        .get("desc")
        .ok_or_else(|| CompilationError::MissingField("desc".into()))?;

    let desc = plain_text(desc)
        .map(|d| d.trim_end_matches('.').trim_end().to_string())
        .filter(|d| !d.is_empty());

    let mut text = match desc {
        Some(desc) => format!("You are {name} - {desc}. "),
        None => format!("You are {name}. "),
    };

    match content.get("personality") {
        Some(Value::Object(traits)) if !traits.is_empty() => {
            let flattened: Vec<String> = traits
                .iter()
                .map(|(trait_name, level)| match plain_text(level) {
                    Some(level) => format!("{trait_name} - {level}"),
                    None => trait_name.clone(),
                })
                .collect();
            text.push_str(&format!("Your personality: {}.", flattened.join(", ")));
        }
        Some(Value::Object(_)) | Some(Value::Null) | None => text.push_str(NO_PERSONALITY),
        Some(raw) => match plain_text(raw) {
            Some(raw) => text.push_str(&format!("Your personality: {{{raw}}}.")),
            // a blank string says as much as no personality at all
            None => text.push_str(NO_PERSONALITY),
        },
    }

    Ok(text)
}

fn compile_actions(content: &Record) -> Result<String, CompilationError> {
    let actions = content
        .get("actions")
        .ok_or_else(|| CompilationError::MissingField("actions".into()))?;

    let Value::Array(list) = actions else {
        return Ok(format!("These are the actions you can take: {actions}"));
    };

    if let Some(index) = list.iter().position(|a| !a.is_object()) {
        return Err(CompilationError::InvalidActionElement { index });
    }

    if list.is_empty() {
        return Ok("There are no actions you can take right now.".to_string());
    }

    let mut text = String::from("These are the actions you can take:");
    for (i, action) in list.iter().enumerate() {
        text.push_str(&format!("\n{}. {}", i + 1, action));
    }
    Ok(text)
}

fn compile_perception(content: &Record) -> Result<Option<String>, CompilationError> {
    let perception = content
        .get("perception")
        .ok_or_else(|| CompilationError::MissingField("perception".into()))?;

    let Value::Object(categories) = perception else {
        return Err(CompilationError::InvalidPerceptionShape(format!(
            "perception is {}, expected a record",
            json_kind(perception)
        )));
    };

    if let Some(unknown) = categories
        .keys()
        .find(|k| !PERCEPTION_CATEGORIES.iter().any(|(name, _)| *name == k.as_str()))
    {
        return Err(CompilationError::InvalidPerceptionCategory(unknown.clone()));
    }

    let mut clauses = Vec::new();
    for (category, verb) in PERCEPTION_CATEGORIES {
        let entries = match categories.get(category) {
            None | Some(Value::Null) => continue,
            Some(Value::Array(entries)) => entries,
            Some(other) => {
                return Err(CompilationError::InvalidPerceptionShape(format!(
                    "`{category}` is {}, expected a list",
                    json_kind(other)
                )));
            }
        };

        let mut described = Vec::with_capacity(entries.len());
        for entry in entries {
            let Value::Object(entry) = entry else {
                return Err(CompilationError::InvalidPerceptionShape(format!(
                    "`{category}` entries must be records, found {}",
                    json_kind(entry)
                )));
            };
            if let Some(item) = describe_perceived(entry) {
                described.push(item);
            }
        }

        if !described.is_empty() {
            clauses.push(format!("You {verb}: {}.", described.join(", ")));
        }
    }

    if clauses.is_empty() {
        Ok(None)
    } else {
        Ok(Some(clauses.join(" ")))
    }
}

/// `name - desc`, or just `name`; entries without a name are skipped.
fn describe_perceived(entry: &Record) -> Option<String> {
    let name = entry.get("name").and_then(plain_text)?;
    match entry.get("desc").and_then(plain_text) {
        Some(desc) => Some(format!("{name} - {desc}")),
        None => Some(name),
    }
}

/// A present, non-empty field rendered as text.
fn required_text(content: &Record, key: &str) -> Result<String, CompilationError> {
    content
        .get(key)
        .and_then(plain_text)
        .ok_or_else(|| CompilationError::MissingField(key.to_string()))
}

/// Render a value for prose: strings unquoted, null and blank as absent.
fn plain_text(value: &Value) -> Option<String> {
    match value {
        Value::Null => None,
        Value::String(s) if s.trim().is_empty() => None,
        Value::String(s) => Some(s.trim().to_string()),
        other => Some(other.to_string()),
    }
}
