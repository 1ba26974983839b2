use std::fs;
use std::io::ErrorKind;
use std::path::Path;

use serde::Deserialize;
use tracing::{debug, info};

use crate::domain::LvError;

// One entry of the curated link catalog. Loaded once, never mutated;
// a record is identified by its position in the loaded vector.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Record {
    pub category: String,
    pub title: String,
    pub url: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub official: bool,
    #[serde(default)]
    pub year: u16,
    #[serde(default)]
    pub difficulty_level: String,
    #[serde(default)]
    pub duration: String,
    #[serde(default)]
    pub interactivity_level: String,
    #[serde(default)]
    pub free: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Field {
    Category,
    Title,
    Description,
    Tags,
    Official,
    Year,
    Difficulty,
    Duration,
    Interactivity,
    Free,
}

pub struct ColumnSpec {
    pub field: Field,
    pub title: &'static str,
    pub key: char,
    pub default_visible: bool,
    pub filterable: bool,
}

// Column order and default visibility follow the catalog page layout.
pub const COLUMNS: [ColumnSpec; 10] = [
    ColumnSpec {
        field: Field::Category,
        title: "Category",
        key: '1',
        default_visible: true,
        filterable: true,
    },
    ColumnSpec {
        field: Field::Title,
        title: "Title",
        key: '2',
        default_visible: true,
        filterable: false,
    },
    ColumnSpec {
        field: Field::Description,
        title: "Description",
        key: '3',
        default_visible: false,
        filterable: false,
    },
    ColumnSpec {
        field: Field::Tags,
        title: "Tags",
        key: '4',
        default_visible: true,
        filterable: true,
    },
    ColumnSpec {
        field: Field::Official,
        title: "Official",
        key: '5',
        default_visible: false,
        filterable: false,
    },
    ColumnSpec {
        field: Field::Year,
        title: "Year",
        key: '6',
        default_visible: false,
        filterable: false,
    },
    ColumnSpec {
        field: Field::Difficulty,
        title: "Difficulty",
        key: '7',
        default_visible: true,
        filterable: true,
    },
    ColumnSpec {
        field: Field::Duration,
        title: "Duration",
        key: '8',
        default_visible: false,
        filterable: false,
    },
    ColumnSpec {
        field: Field::Interactivity,
        title: "Interactivity",
        key: '9',
        default_visible: true,
        filterable: true,
    },
    ColumnSpec {
        field: Field::Free,
        title: "Free",
        key: '0',
        default_visible: false,
        filterable: true,
    },
];

pub fn column_index(field: Field) -> usize {
    COLUMNS
        .iter()
        .position(|spec| spec.field == field)
        .unwrap_or(0)
}

pub fn load_records(path: &Path) -> Result<Vec<Record>, LvError> {
    let metadata = fs::metadata(path).map_err(|e| match e.kind() {
        ErrorKind::NotFound => LvError::FileNotFound,
        ErrorKind::PermissionDenied => LvError::PermissionDenied,
        _ => LvError::IoError(e),
    })?;
    if !metadata.is_file() {
        return Err(LvError::LoadingFailed("Not a file!".into()));
    }

    let raw = fs::read_to_string(path)?;
    let records: Vec<Record> = serde_json::from_str(&raw)?;
    info!("Loaded {} records from {}", records.len(), path.display());
    for record in records.iter() {
        debug!("Record: {} [{}]", record.title, record.tags.join(", "));
    }
    Ok(records)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn record_parses_camel_case_fields() {
        let raw = r#"{
            "category": "video",
            "title": "Ownership explained",
            "url": "https://example.com/ownership",
            "description": "A walkthrough of move semantics.",
            "tags": ["ownership", "borrowing"],
            "official": false,
            "year": 2022,
            "difficultyLevel": "beginner",
            "duration": "1h",
            "interactivityLevel": "low",
            "free": true
        }"#;
        let record: Record = serde_json::from_str(raw).unwrap();
        assert_eq!(record.category, "video");
        assert_eq!(record.difficulty_level, "beginner");
        assert_eq!(record.interactivity_level, "low");
        assert_eq!(record.tags, vec!["ownership", "borrowing"]);
        assert!(record.free);
        assert!(!record.official);
    }

    #[test]
    fn missing_optional_fields_fall_back_to_defaults() {
        let raw = r#"{
            "category": "article",
            "title": "Minimal entry",
            "url": "https://example.com/minimal"
        }"#;
        let record: Record = serde_json::from_str(raw).unwrap();
        assert!(record.tags.is_empty());
        assert_eq!(record.year, 0);
        assert_eq!(record.difficulty_level, "");
        assert!(!record.free);
    }

    #[test]
    fn loads_fixture_catalog() {
        let records = load_records(Path::new("tests/fixtures/catalog_01.json")).unwrap();
        assert_eq!(records.len(), 5);
        assert!(records.iter().any(|r| r.category == "workshop"));
    }

    #[test]
    fn missing_file_maps_to_file_not_found() {
        let err = load_records(Path::new("tests/fixtures/no_such_file.json")).unwrap_err();
        assert!(matches!(err, LvError::FileNotFound));
    }

    #[test]
    fn column_specs_cover_every_field_once() {
        assert_eq!(COLUMNS.len(), 10);
        assert_eq!(column_index(Field::Difficulty), 6);
        assert_eq!(column_index(Field::Free), 9);
        let keys: Vec<char> = COLUMNS.iter().map(|c| c.key).collect();
        assert_eq!(keys, vec!['1', '2', '3', '4', '5', '6', '7', '8', '9', '0']);
    }
}
