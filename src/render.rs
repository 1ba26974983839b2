use crate::catalog::{Field, Record};

// Distinguishes how a cell value is asked for: Display decorates the raw
// value for humans, Sort and Filter always get the raw value back so that
// ordering and matching never operate on decorated text.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum RenderMode {
    Display,
    Sort,
    Filter,
}

pub fn raw(field: Field, record: &Record) -> String {
    match field {
        Field::Category => record.category.clone(),
        Field::Title => record.title.clone(),
        Field::Description => record.description.clone(),
        Field::Tags => record.tags.join(" "),
        Field::Official => record.official.to_string(),
        Field::Year => record.year.to_string(),
        Field::Difficulty => record.difficulty_level.clone(),
        Field::Duration => record.duration.clone(),
        Field::Interactivity => record.interactivity_level.clone(),
        Field::Free => record.free.to_string(),
    }
}

pub fn render(field: Field, record: &Record, mode: RenderMode) -> String {
    if mode != RenderMode::Display {
        return raw(field, record);
    }
    match field {
        Field::Category => render_category(&record.category),
        Field::Official => render_flag(record.official),
        Field::Free => render_flag(record.free),
        Field::Difficulty => render_difficulty(&record.difficulty_level),
        Field::Interactivity => render_interactivity(&record.interactivity_level),
        _ => raw(field, record),
    }
}

pub fn render_category(category: &str) -> String {
    let symbol = match category {
        "article" => "📝",
        "video" => "📺",
        "guide" => "📖",
        "forum" => "💬",
        "talk" => "🎤",
        "workshop" => "🏋",
        "project" => "⚙",
        _ => "📚",
    };
    format!("{} {}", symbol, capitalize_first_letter(category))
}

// Unrecognized levels pass through unchanged instead of failing.
pub fn render_difficulty(level: &str) -> String {
    match level {
        "beginner" | "all" | "varied" => "➕".to_string(),
        "intermediate" => "➕➕".to_string(),
        "advanced" => "➕➕➕".to_string(),
        _ => level.to_string(),
    }
}

pub fn render_interactivity(level: &str) -> String {
    match level {
        "low" => "⚙".to_string(),
        "medium" => "⚙⚙".to_string(),
        "high" => "⚙⚙⚙".to_string(),
        _ => level.to_string(),
    }
}

pub fn render_flag(value: bool) -> String {
    if value { "✅".to_string() } else { "❌".to_string() }
}

fn capitalize_first_letter(s: &str) -> String {
    let mut chars = s.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().collect::<String>() + chars.as_str(),
        None => String::new(),
    }
}
