use std::collections::{BTreeSet, HashMap};

use tracing::trace;

use crate::catalog::{Field, Record};
use crate::render::{self, RenderMode};

// The set of tags the user has toggled on. Owned state, passed around
// explicitly; empty set means no tag filtering at all.
#[derive(Debug, Default, Clone)]
pub struct TagFilter {
    active: BTreeSet<String>,
}

impl TagFilter {
    // Returns whether the tag is active after the toggle.
    pub fn toggle(&mut self, tag: &str) -> bool {
        if self.active.remove(tag) {
            trace!("Tag filter removed: {tag}");
            false
        } else {
            self.active.insert(tag.to_string());
            trace!("Tag filter added: {tag}");
            true
        }
    }

    pub fn reset(&mut self) {
        self.active.clear();
    }

    pub fn is_empty(&self) -> bool {
        self.active.is_empty()
    }

    pub fn len(&self) -> usize {
        self.active.len()
    }

    // Active markers use exact tag identity, not substring containment.
    pub fn is_active(&self, tag: &str) -> bool {
        self.active.contains(tag)
    }

    // True for the empty set; otherwise every active tag must appear in
    // the row's tag list (AND semantics).
    pub fn matches(&self, tags: &[String]) -> bool {
        self.active.iter().all(|tag| tags.iter().any(|t| t == tag))
    }

    pub fn active_tags(&self) -> impl Iterator<Item = &str> {
        self.active.iter().map(|s| s.as_str())
    }
}

// Exact-match filters installed from the per-column value picker, one
// selected value per column at most.
#[derive(Debug, Default, Clone)]
pub struct ValueFilters {
    selected: HashMap<Field, String>,
}

impl ValueFilters {
    pub fn set(&mut self, field: Field, value: Option<String>) {
        match value {
            Some(v) => {
                trace!("Column filter {field:?} = {v:?}");
                self.selected.insert(field, v);
            }
            None => {
                trace!("Column filter {field:?} cleared");
                self.selected.remove(&field);
            }
        }
    }

    pub fn get(&self, field: Field) -> Option<&str> {
        self.selected.get(&field).map(|s| s.as_str())
    }

    pub fn is_empty(&self) -> bool {
        self.selected.is_empty()
    }

    pub fn matches(&self, record: &Record) -> bool {
        self.selected
            .iter()
            .all(|(field, value)| render::render(*field, record, RenderMode::Filter) == *value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tags(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn empty_set_matches_every_row() {
        let filter = TagFilter::default();
        assert!(filter.matches(&tags(&["cli", "async"])));
        assert!(filter.matches(&tags(&[])));
    }

    #[test]
    fn matching_is_subset_not_overlap() {
        let mut filter = TagFilter::default();
        filter.toggle("cli");
        filter.toggle("async");
        // Overlap on one tag is not enough, every active tag must be present.
        assert!(!filter.matches(&tags(&["cli", "gui"])));
        assert!(filter.matches(&tags(&["cli", "async", "gui"])));
    }

    #[test]
    fn toggle_is_its_own_inverse() {
        let mut filter = TagFilter::default();
        assert!(filter.toggle("cli"));
        assert!(filter.is_active("cli"));
        assert!(!filter.toggle("cli"));
        assert!(!filter.is_active("cli"));
        assert!(filter.is_empty());
    }

    #[test]
    fn reset_always_yields_the_empty_set() {
        let mut filter = TagFilter::default();
        filter.toggle("cli");
        filter.toggle("async");
        filter.toggle("gui");
        filter.reset();
        assert!(filter.is_empty());
        assert_eq!(filter.len(), 0);
        filter.reset();
        assert!(filter.is_empty());
    }

    #[test]
    fn active_marker_matching_is_exact() {
        let mut filter = TagFilter::default();
        filter.toggle("cli");
        // "cli" must not visually activate "clippy".
        assert!(filter.is_active("cli"));
        assert!(!filter.is_active("clippy"));
    }

    #[test]
    fn filter_narrows_then_reset_restores() {
        let rows = [tags(&["cli", "async"]), tags(&["gui"])];
        let mut filter = TagFilter::default();

        filter.toggle("cli");
        assert!(filter.matches(&rows[0]));
        assert!(!filter.matches(&rows[1]));

        filter.toggle("async");
        assert!(filter.matches(&rows[0]));
        assert!(!filter.matches(&rows[1]));

        // Row 0 still satisfies the remaining "async" filter.
        filter.toggle("cli");
        assert!(filter.matches(&rows[0]));
        assert!(!filter.matches(&rows[1]));

        filter.reset();
        assert!(filter.matches(&rows[0]));
        assert!(filter.matches(&rows[1]));
    }

    #[test]
    fn value_filters_compare_raw_values() {
        let record = Record {
            category: "video".to_string(),
            title: "t".to_string(),
            url: "u".to_string(),
            description: String::new(),
            tags: Vec::new(),
            official: false,
            year: 2020,
            difficulty_level: "beginner".to_string(),
            duration: String::new(),
            interactivity_level: "low".to_string(),
            free: true,
        };

        let mut filters = ValueFilters::default();
        assert!(filters.matches(&record));

        filters.set(Field::Category, Some("video".to_string()));
        assert!(filters.matches(&record));

        // The decorated display value must not match.
        filters.set(Field::Category, Some("📺 Video".to_string()));
        assert!(!filters.matches(&record));

        filters.set(Field::Category, Some("video".to_string()));
        filters.set(Field::Free, Some("true".to_string()));
        assert!(filters.matches(&record));

        filters.set(Field::Free, None);
        filters.set(Field::Category, None);
        assert!(filters.is_empty());
        assert!(filters.matches(&record));
    }
}
