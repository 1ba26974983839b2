use std::cmp::Ordering;
use std::collections::{BTreeMap, HashSet};
use std::path::Path;
use std::time::Instant;

use arboard::Clipboard;
use rayon::prelude::*;
use ratatui::crossterm::event::KeyEvent;
use tracing::{debug, trace};

use crate::catalog::{self, COLUMNS, Field, Record, column_index};
use crate::domain::{HELP_TEXT, LvConfig, LvError, Message};
use crate::filter::{TagFilter, ValueFilters};
use crate::prompt::{Prompt, PromptOutcome};
use crate::render::{self, RenderMode};
use crate::ui::{
    COLUMN_WIDTH_MARGIN, DETAIL_HEIGHT, EXPAND_CONTROL_WIDTH, MIN_COLUMN_WIDTH, STATUSLINE_HEIGHT,
    TABLE_HEADER_HEIGHT, TOGGLE_BAR_HEIGHT,
};

#[derive(Debug, PartialEq)]
pub enum Status {
    READY,
    QUITTING,
}

#[derive(Debug, Clone, Copy)]
enum Modus {
    TABLE,
    PICKER,
    POPUP,
    PROMPT,
}

#[derive(Debug, Clone)]
struct SortSpec {
    column: usize,
    ascending: bool,
}

// Unique values of one column, offered by the value picker. A `None` value
// stands for the "(all)" entry that clears the column filter.
struct PickerEntry {
    value: Option<String>,
    count: usize,
}

struct PickerView {
    column: usize,
    entries: Vec<PickerEntry>,
    curser_row: usize,
}

#[derive(Default, Clone, Debug)]
pub struct UILayout {
    pub width: usize,
    pub height: usize,
    pub table_width: usize,
    pub table_height: usize,
    pub statusline_width: usize,
}

impl UILayout {
    pub fn from_values(width: usize, height: usize) -> Self {
        let table_height =
            height.saturating_sub(TOGGLE_BAR_HEIGHT + TABLE_HEADER_HEIGHT + STATUSLINE_HEIGHT);
        let layout = UILayout {
            width,
            height,
            table_width: width,
            table_height,
            statusline_width: width,
        };
        trace!("Build UILayout: {:?}", layout);
        layout
    }
}

#[derive(Clone)]
pub struct ToggleView {
    pub key: char,
    pub title: &'static str,
    pub active: bool,
}

#[derive(Clone)]
pub struct HeaderView {
    pub title: String,
    pub width: usize,
    pub selected: bool,
    // Some(true) = sorted ascending, Some(false) = descending.
    pub sort: Option<bool>,
}

#[derive(Clone)]
pub struct TagView {
    pub text: String,
    pub active: bool,
}

#[derive(Clone)]
pub enum CellView {
    Text(String),
    Tags(Vec<TagView>),
}

#[derive(Clone)]
pub struct RecordRow {
    pub cells: Vec<CellView>,
    pub selected: bool,
    pub expanded: bool,
}

#[derive(Clone)]
pub struct DetailRow {
    pub description: String,
    pub url: String,
}

#[derive(Clone)]
pub enum RowView {
    Record(RecordRow),
    Detail(DetailRow),
}

#[derive(Clone)]
pub struct PickerEntryView {
    pub label: String,
    pub count: usize,
    pub active: bool,
}

#[derive(Clone)]
pub struct PickerData {
    pub title: String,
    pub entries: Vec<PickerEntryView>,
    pub selected: usize,
}

pub struct UIData {
    pub name: String,
    pub toggles: Vec<ToggleView>,
    pub headers: Vec<HeaderView>,
    pub rows: Vec<RowView>,
    pub nrows: usize,
    pub total: usize,
    pub abs_selected_row: usize,
    pub active_tags: Vec<String>,
    pub show_reset: bool,
    pub value_filters_active: bool,
    pub show_popup: bool,
    pub popup_message: String,
    pub picker: Option<PickerData>,
    pub prompt: Option<String>,
    pub status_message: String,
    pub last_status_message_update: Instant,
    pub layout: UILayout,
}

impl UIData {
    pub fn empty() -> Self {
        UIData {
            name: String::new(),
            toggles: Vec::new(),
            headers: Vec::new(),
            rows: Vec::new(),
            nrows: 0,
            total: 0,
            abs_selected_row: 0,
            active_tags: Vec::new(),
            show_reset: false,
            value_filters_active: false,
            show_popup: false,
            popup_message: String::new(),
            picker: None,
            prompt: None,
            status_message: String::new(),
            last_status_message_update: Instant::now(),
            layout: UILayout::default(),
        }
    }
}

pub struct Model {
    config: LvConfig,
    pub status: Status,
    modus: Modus,
    previous_modus: Modus,
    name: String,
    records: Vec<Record>,
    column_visible: [bool; COLUMNS.len()],
    column_widths: [usize; COLUMNS.len()],
    // Mapping of visible row position to record index, after filters and sort.
    rows: Vec<usize>,
    // Record indices with an open detail panel. Independent per row, any
    // number may be open at once.
    expanded: HashSet<usize>,
    tag_filter: TagFilter,
    value_filters: ValueFilters,
    sort: Option<SortSpec>,
    curser_row: usize,
    curser_column: usize,
    offset_row: usize,
    offset_column: usize,
    visible_columns: Vec<usize>,
    fitted_columns: Vec<(usize, usize)>,
    search_results: Vec<(usize, usize)>,
    search_idx: usize,
    picker: Option<PickerView>,
    input: Prompt,
    clipboard: Option<Clipboard>,
    uilayout: UILayout,
    uidata: UIData,
    status_message: String,
    last_status_message_update: Instant,
}

impl Model {
    pub fn new(config: &LvConfig) -> Self {
        let clipboard = match Clipboard::new() {
            Ok(clipboard) => Some(clipboard),
            Err(e) => {
                debug!("Clipboard unavailable: {e:?}");
                None
            }
        };
        let mut model = Self {
            config: config.clone(),
            status: Status::READY,
            modus: Modus::TABLE,
            previous_modus: Modus::TABLE,
            name: String::new(),
            records: Vec::new(),
            column_visible: std::array::from_fn(|idx| COLUMNS[idx].default_visible),
            column_widths: [0; COLUMNS.len()],
            rows: Vec::new(),
            expanded: HashSet::new(),
            tag_filter: TagFilter::default(),
            value_filters: ValueFilters::default(),
            sort: None,
            curser_row: 0,
            curser_column: 0,
            offset_row: 0,
            offset_column: 0,
            visible_columns: Vec::new(),
            fitted_columns: Vec::new(),
            search_results: Vec::new(),
            search_idx: 0,
            picker: None,
            input: Prompt::default(),
            clipboard,
            uilayout: UILayout::from_values(80, 24),
            uidata: UIData::empty(),
            status_message: "Started lv!".to_string(),
            last_status_message_update: Instant::now(),
        };
        model.refresh_view();
        model
    }

    pub fn load_catalog(&mut self, path: &Path) -> Result<(), LvError> {
        let records = catalog::load_records(path)?;
        self.name = path
            .file_name()
            .and_then(|s| s.to_str())
            .unwrap_or("???")
            .to_string();
        let count = records.len();
        self.install_records(records);
        self.set_status_message(format!("Loaded {count} links"));
        Ok(())
    }

    fn install_records(&mut self, records: Vec<Record>) {
        self.records = records;
        self.compute_column_widths();
        // The catalog page opens sorted by difficulty.
        self.sort = Some(SortSpec {
            column: column_index(Field::Difficulty),
            ascending: true,
        });
        self.recompute_rows();
        self.refresh_view();
    }

    pub fn get_uidata(&self) -> &UIData {
        &self.uidata
    }

    pub fn raw_keyevents(&self) -> bool {
        matches!(self.modus, Modus::PROMPT)
    }

    pub fn quit(&mut self) {
        self.status = Status::QUITTING;
    }

    pub fn update(&mut self, message: Message) -> Result<(), LvError> {
        match self.modus {
            Modus::TABLE => match message {
                Message::Quit => self.quit(),
                Message::MoveUp => self.move_table_selection_up(1),
                Message::MoveDown => self.move_table_selection_down(1),
                Message::MovePageUp => {
                    self.move_table_selection_up(self.uilayout.table_height.max(1))
                }
                Message::MovePageDown => {
                    self.move_table_selection_down(self.uilayout.table_height.max(1))
                }
                Message::MoveBeginning => self.move_table_selection_beginning(),
                Message::MoveEnd => self.move_table_selection_end(),
                Message::MoveLeft => self.move_table_selection_left(),
                Message::MoveRight => self.move_table_selection_right(),
                Message::Enter => self.toggle_row_expansion(),
                Message::ToggleColumn(idx) => self.toggle_column_visibility(idx),
                Message::OpenPicker => self.open_picker(),
                Message::ResetTagFilters => self.reset_tag_filters(),
                Message::Search => self.enter_search_prompt(),
                Message::SearchNext => self.search_next(1),
                Message::SearchPrev => self.search_next(-1),
                Message::SortAscending => self.sort_current_column(true),
                Message::SortDescending => self.sort_current_column(false),
                Message::CopyLink => self.copy_link(),
                Message::CopyRecord => self.copy_record(),
                Message::Help => self.show_help(),
                Message::Resize(width, height) => self.ui_resize(width, height),
                _ => (),
            },
            Modus::PICKER => match message {
                Message::Quit => self.quit(),
                Message::MoveUp => self.move_picker_selection(-1),
                Message::MoveDown => self.move_picker_selection(1),
                Message::MovePageUp => self.move_picker_selection(-10),
                Message::MovePageDown => self.move_picker_selection(10),
                Message::MoveBeginning => self.move_picker_selection(isize::MIN),
                Message::MoveEnd => self.move_picker_selection(isize::MAX),
                Message::Enter => self.apply_picker_entry(),
                Message::Exit | Message::OpenPicker => self.close_picker(),
                Message::ResetTagFilters => self.reset_tag_filters(),
                Message::Help => self.show_help(),
                Message::Resize(width, height) => self.ui_resize(width, height),
                _ => (),
            },
            Modus::POPUP => match message {
                Message::Quit => self.quit(),
                Message::Exit | Message::Enter | Message::Help => self.close_popup(),
                Message::Resize(width, height) => self.ui_resize(width, height),
                _ => (),
            },
            Modus::PROMPT => match message {
                Message::RawKey(key) => self.prompt_input(key),
                Message::Resize(width, height) => self.ui_resize(width, height),
                _ => (),
            },
        }

        self.refresh_view();
        Ok(())
    }

    // -------------------- Control handling functions ---------------------- //

    fn ui_resize(&mut self, width: usize, height: usize) {
        trace!(
            "UI was resized! w:{}->{}, h:{}->{}",
            self.uilayout.width, width, self.uilayout.height, height
        );
        self.uilayout = UILayout::from_values(width, height);
    }

    fn move_table_selection_up(&mut self, size: usize) {
        self.curser_row = self.curser_row.saturating_sub(size);
    }

    fn move_table_selection_down(&mut self, size: usize) {
        if self.rows.is_empty() {
            return;
        }
        self.curser_row = std::cmp::min(self.curser_row + size, self.rows.len() - 1);
    }

    fn move_table_selection_beginning(&mut self) {
        self.curser_row = 0;
    }

    fn move_table_selection_end(&mut self) {
        self.curser_row = self.rows.len().saturating_sub(1);
    }

    fn move_table_selection_left(&mut self) {
        self.curser_column = self.curser_column.saturating_sub(1);
    }

    fn move_table_selection_right(&mut self) {
        if self.visible_columns.is_empty() {
            return;
        }
        self.curser_column = std::cmp::min(self.curser_column + 1, self.visible_columns.len() - 1);
    }

    // One independent collapsed/expanded state machine per row, keyed by
    // record index so it survives sorting.
    fn toggle_row_expansion(&mut self) {
        let Some(&ridx) = self.rows.get(self.curser_row) else {
            return;
        };
        if self.expanded.remove(&ridx) {
            trace!("Collapsed row {ridx}");
        } else {
            self.expanded.insert(ridx);
            trace!("Expanded row {ridx}");
        }
    }

    fn toggle_column_visibility(&mut self, idx: usize) {
        if idx >= COLUMNS.len() {
            return;
        }
        if self.column_visible[idx] && self.visible_columns.len() == 1 {
            self.set_status_message("The last visible column can not be hidden");
            return;
        }
        self.column_visible[idx] = !self.column_visible[idx];
        trace!(
            "Column \"{}\" visible: {}",
            COLUMNS[idx].title, self.column_visible[idx]
        );
    }

    fn sort_current_column(&mut self, ascending: bool) {
        let Some(&column) = self.visible_columns.get(self.curser_column) else {
            return;
        };
        self.sort = Some(SortSpec { column, ascending });
        self.recompute_rows();
        self.set_status_message(format!(
            "Sorted by {} {}",
            COLUMNS[column].title,
            if ascending { "ascending" } else { "descending" }
        ));
    }

    fn toggle_tag(&mut self, tag: &str) {
        let active = self.tag_filter.toggle(tag);
        self.recompute_rows();
        if active {
            self.set_status_message(format!("Tag filter on: {tag}"));
        } else {
            self.set_status_message(format!("Tag filter off: {tag}"));
        }
    }

    fn reset_tag_filters(&mut self) {
        self.tag_filter.reset();
        self.recompute_rows();
        self.set_status_message("Tag filters cleared");
    }

    fn open_picker(&mut self) {
        let Some(&column) = self.visible_columns.get(self.curser_column) else {
            return;
        };
        let spec = &COLUMNS[column];
        if !spec.filterable {
            self.set_status_message(format!("No value filter for {}", spec.title));
            return;
        }

        // Unique sorted values with their occurrence counts over the whole
        // catalog; raw values, never display decorations.
        let mut tally: BTreeMap<String, usize> = BTreeMap::new();
        if spec.field == Field::Tags {
            for record in self.records.iter() {
                for tag in record.tags.iter() {
                    *tally.entry(tag.clone()).or_insert(0) += 1;
                }
            }
        } else {
            for record in self.records.iter() {
                *tally
                    .entry(render::render(spec.field, record, RenderMode::Filter))
                    .or_insert(0) += 1;
            }
        }

        let mut entries: Vec<PickerEntry> = Vec::with_capacity(tally.len() + 1);
        if spec.field != Field::Tags {
            entries.push(PickerEntry {
                value: None,
                count: self.records.len(),
            });
        }
        entries.extend(
            tally
                .into_iter()
                .map(|(value, count)| PickerEntry {
                    value: Some(value),
                    count,
                }),
        );

        trace!("Opened picker for column \"{}\"", spec.title);
        self.picker = Some(PickerView {
            column,
            entries,
            curser_row: 0,
        });
        self.previous_modus = self.modus;
        self.modus = Modus::PICKER;
    }

    fn close_picker(&mut self) {
        self.picker = None;
        self.modus = Modus::TABLE;
        self.previous_modus = Modus::PICKER;
    }

    fn move_picker_selection(&mut self, step: isize) {
        if let Some(picker) = self.picker.as_mut() {
            if picker.entries.is_empty() {
                return;
            }
            let last = picker.entries.len() as isize - 1;
            let target = (picker.curser_row as isize).saturating_add(step);
            picker.curser_row = target.clamp(0, last) as usize;
        }
    }

    fn apply_picker_entry(&mut self) {
        let Some((column, value)) = self.picker.as_ref().and_then(|picker| {
            picker
                .entries
                .get(picker.curser_row)
                .map(|entry| (picker.column, entry.value.clone()))
        }) else {
            return;
        };

        let spec = &COLUMNS[column];
        if spec.field == Field::Tags {
            // Toggling keeps the picker open so several tags can be combined.
            if let Some(tag) = value {
                self.toggle_tag(&tag);
            }
        } else {
            match &value {
                Some(v) => self.set_status_message(format!("{} = {v}", spec.title)),
                None => self.set_status_message(format!("{}: filter cleared", spec.title)),
            }
            self.value_filters.set(spec.field, value);
            self.recompute_rows();
            self.close_picker();
        }
    }

    fn enter_search_prompt(&mut self) {
        self.previous_modus = self.modus;
        self.modus = Modus::PROMPT;
        self.input.clear();
    }

    fn prompt_input(&mut self, key: KeyEvent) {
        match self.input.read(key) {
            PromptOutcome::Pending => (),
            PromptOutcome::Cancel => {
                self.modus = self.previous_modus;
                self.previous_modus = Modus::PROMPT;
            }
            PromptOutcome::Submit(term) => {
                self.modus = self.previous_modus;
                self.previous_modus = Modus::PROMPT;
                if !term.is_empty() {
                    self.run_search(&term);
                }
            }
        }
    }

    fn show_help(&mut self) {
        self.previous_modus = self.modus;
        self.modus = Modus::POPUP;
    }

    fn close_popup(&mut self) {
        trace!("Close popup ...");
        self.modus = self.previous_modus;
        self.previous_modus = Modus::POPUP;
    }

    fn copy_link(&mut self) {
        let Some(&ridx) = self.rows.get(self.curser_row) else {
            return;
        };
        let url = self.records[ridx].url.clone();
        trace!("Link url: {url}");
        self.copy_to_clipboard(url, "Copied link to clipboard");
    }

    fn copy_record(&mut self) {
        let Some(&ridx) = self.rows.get(self.curser_row) else {
            return;
        };
        let record = &self.records[ridx];
        let content = COLUMNS
            .iter()
            .map(|spec| Self::wrap_cell_content(&render::raw(spec.field, record)))
            .collect::<Vec<String>>();
        self.copy_to_clipboard(content.join(","), "Copied record to clipboard");
    }

    fn copy_to_clipboard(&mut self, content: String, success: &str) {
        match self.clipboard.as_mut() {
            Some(clipboard) => match clipboard.set_text(content) {
                Ok(_) => self.set_status_message(success.to_string()),
                Err(e) => {
                    trace!("Error copying to clipboard: {:?}", e);
                    self.set_status_message("Clipboard copy failed");
                }
            },
            None => self.set_status_message("Clipboard unavailable"),
        }
    }

    fn wrap_cell_content(c: &str) -> String {
        let needs_escaping = c.chars().any(|c| c == '"');
        let needs_wrapping = c.chars().any(|c| c == ' ' || c == '\t' || c == ',');
        let mut out = String::from(c);

        if needs_escaping {
            out = out.replace("\"", "\"\"");
        }
        if needs_wrapping {
            out = format!("\"{out}\"");
        }
        out
    }

    // ----------------------- Search ----------------------- //

    fn run_search(&mut self, term: &str) {
        trace!("Starting search for {} ...", term);
        let records = &self.records;
        let rows = &self.rows;
        let needle = term.to_string();

        // Raw values only; one worker per column.
        let mut matches: Vec<(usize, usize)> = COLUMNS
            .par_iter()
            .enumerate()
            .flat_map(|(cidx, spec)| {
                rows.iter()
                    .enumerate()
                    .filter(|&(_, &ridx)| {
                        render::raw(spec.field, &records[ridx]).contains(&needle)
                    })
                    .map(|(rpos, _)| (rpos, cidx))
                    .collect::<Vec<_>>()
            })
            .collect();

        if matches.is_empty() {
            self.search_results.clear();
            self.set_status_message("Found no matches!");
        } else {
            matches.sort_unstable();
            self.search_results = matches;

            // Jump to the first match at or after the curser.
            self.search_idx = self
                .search_results
                .iter()
                .position(|&(row, _col)| row >= self.curser_row)
                .unwrap_or(0);

            let total = self.search_results.len();
            self.search_next(0);
            self.set_status_message(format!("Found {} results", total));
        }
    }

    // Sets the curser to the next search result. step has to be -1, 0, 1.
    fn search_next(&mut self, step: i32) {
        let total = self.search_results.len();
        if total == 0 {
            return;
        }
        if step >= 0 {
            let s = step as usize;
            if self.search_idx + s >= total {
                self.search_idx = 0;
            } else {
                self.search_idx += s;
            }
        } else if self.search_idx as i32 + step < 0 {
            self.search_idx = total - 1;
        } else {
            self.search_idx = (self.search_idx as i32 + step) as usize;
        }

        let (row, column) = self.search_results[self.search_idx];
        self.select_cell(row, column);
        self.set_status_message(format!("Search result {}/{}", self.search_idx + 1, total));
    }

    fn select_cell(&mut self, row: usize, column: usize) {
        trace!("Select record {}:{}", row, column);
        self.curser_row = row;
        // Hidden columns stay hidden, the row alone is selected then.
        if let Some(pos) = self.visible_columns.iter().position(|&c| c == column) {
            self.curser_column = pos;
        }
    }

    // ----------------------- View bookkeeping ----------------------- //

    // Re-evaluates the row predicate for every record and re-applies the
    // sort. Called after every filter or sort change, the redraw picks the
    // result up on the next tick.
    fn recompute_rows(&mut self) {
        let records = &self.records;
        let tag_filter = &self.tag_filter;
        let value_filters = &self.value_filters;
        let mut rows: Vec<usize> = (0..records.len())
            .filter(|&idx| {
                tag_filter.matches(&records[idx].tags) && value_filters.matches(&records[idx])
            })
            .collect();

        if let Some(sort) = &self.sort {
            Self::sort_rows(&mut rows, records, sort);
        }
        self.rows = rows;

        // Detail panels of rows that left the view are discarded.
        let visible: HashSet<usize> = self.rows.iter().copied().collect();
        self.expanded.retain(|idx| visible.contains(idx));

        // Search positions are relative to the old mapping.
        self.search_results.clear();
        self.search_idx = 0;

        if self.curser_row >= self.rows.len() {
            self.curser_row = self.rows.len().saturating_sub(1);
        }
    }

    fn sort_rows(rows: &mut [usize], records: &[Record], sort: &SortSpec) {
        let field = COLUMNS[sort.column].field;
        let keys: Vec<String> = records
            .iter()
            .map(|record| render::render(field, record, RenderMode::Sort))
            .collect();
        let ascending = sort.ascending;

        if field == Field::Year {
            // Numeric column; values that fail to parse sort last.
            rows.sort_by(|&a, &b| {
                let a_val: Result<f64, _> = keys[a].parse();
                let b_val: Result<f64, _> = keys[b].parse();
                match (a_val, b_val) {
                    (Ok(a_float), Ok(b_float)) => {
                        if ascending {
                            a_float.partial_cmp(&b_float).unwrap_or(Ordering::Equal)
                        } else {
                            b_float.partial_cmp(&a_float).unwrap_or(Ordering::Equal)
                        }
                    }
                    (Ok(_), Err(_)) => Ordering::Less,
                    (Err(_), Ok(_)) => Ordering::Greater,
                    (Err(_), Err(_)) => {
                        if ascending {
                            keys[a].cmp(&keys[b])
                        } else {
                            keys[b].cmp(&keys[a])
                        }
                    }
                }
            });
        } else if ascending {
            rows.sort_by(|&a, &b| keys[a].cmp(&keys[b]));
        } else {
            rows.sort_by(|&a, &b| keys[b].cmp(&keys[a]));
        }
    }

    fn compute_column_widths(&mut self) {
        for (idx, spec) in COLUMNS.iter().enumerate() {
            let mut width = spec.title.chars().count();
            for record in self.records.iter() {
                width = std::cmp::max(
                    width,
                    render::render(spec.field, record, RenderMode::Display)
                        .chars()
                        .count(),
                );
            }
            self.column_widths[idx] =
                std::cmp::min(width + COLUMN_WIDTH_MARGIN, self.config.max_column_width);
        }
    }

    fn refresh_view(&mut self) {
        self.fit_columns();
        self.ensure_curser_in_frame();
        self.update_uidata();
    }

    fn fit_columns(&mut self) {
        self.visible_columns = (0..COLUMNS.len())
            .filter(|&idx| self.column_visible[idx])
            .collect();
        if self.visible_columns.is_empty() {
            self.fitted_columns.clear();
            return;
        }
        if self.curser_column >= self.visible_columns.len() {
            self.curser_column = self.visible_columns.len() - 1;
        }
        if self.offset_column > self.curser_column {
            self.offset_column = self.curser_column;
        }

        // Shift the column window right until the curser column fits.
        loop {
            self.fitted_columns = self.fit_from(self.offset_column);
            let last_fit = self.offset_column + self.fitted_columns.len().saturating_sub(1);
            if last_fit >= self.curser_column || self.offset_column == self.curser_column {
                break;
            }
            self.offset_column += 1;
        }
    }

    // Visible columns that fit in the table width starting at the given
    // offset; the last column may be rendered partially.
    fn fit_from(&self, offset: usize) -> Vec<(usize, usize)> {
        let budget = self
            .uilayout
            .table_width
            .saturating_sub(EXPAND_CONTROL_WIDTH);
        let mut fitted = Vec::new();
        let mut used = 0;
        for &cidx in self.visible_columns[offset..].iter() {
            let width = self.column_widths[cidx];
            if used + width + 1 <= budget {
                fitted.push((cidx, width));
                used += width + 1;
            } else {
                let remaining = budget.saturating_sub(used);
                if remaining >= MIN_COLUMN_WIDTH {
                    fitted.push((cidx, remaining));
                }
                break;
            }
        }
        fitted
    }

    fn ensure_curser_in_frame(&mut self) {
        if self.rows.is_empty() {
            self.curser_row = 0;
            self.offset_row = 0;
            return;
        }
        if self.curser_row >= self.rows.len() {
            self.curser_row = self.rows.len() - 1;
        }
        if self.offset_row > self.curser_row {
            self.offset_row = self.curser_row;
        }

        // Expanded rows take extra lines, shift the frame until the curser
        // line is inside it.
        let height = self.uilayout.table_height.max(1);
        loop {
            let mut lines = 0;
            for &ridx in self.rows[self.offset_row..self.curser_row].iter() {
                lines += 1;
                if self.expanded.contains(&ridx) {
                    lines += DETAIL_HEIGHT;
                }
            }
            lines += 1; // the curser row itself
            if lines <= height || self.offset_row == self.curser_row {
                break;
            }
            self.offset_row += 1;
        }
    }

    fn set_status_message(&mut self, message: impl Into<String>) {
        self.status_message = message.into();
        self.last_status_message_update = Instant::now();
    }

    fn update_uidata(&mut self) {
        let toggles: Vec<ToggleView> = COLUMNS
            .iter()
            .enumerate()
            .map(|(idx, spec)| ToggleView {
                key: spec.key,
                title: spec.title,
                active: self.column_visible[idx],
            })
            .collect();

        let current_column = self.visible_columns.get(self.curser_column).copied();
        let headers: Vec<HeaderView> = self
            .fitted_columns
            .iter()
            .map(|&(cidx, width)| HeaderView {
                title: COLUMNS[cidx].title.to_string(),
                width,
                selected: current_column == Some(cidx),
                sort: self
                    .sort
                    .as_ref()
                    .filter(|sort| sort.column == cidx)
                    .map(|sort| sort.ascending),
            })
            .collect();

        let height = self.uilayout.table_height;
        let mut rows_view: Vec<RowView> = Vec::new();
        let mut lines = 0;
        let mut i = self.offset_row;
        while i < self.rows.len() && lines < height {
            let ridx = self.rows[i];
            let record = &self.records[ridx];
            let expanded = self.expanded.contains(&ridx);
            let cells: Vec<CellView> = self
                .fitted_columns
                .iter()
                .map(|&(cidx, _)| {
                    let spec = &COLUMNS[cidx];
                    if spec.field == Field::Tags {
                        CellView::Tags(
                            record
                                .tags
                                .iter()
                                .map(|tag| TagView {
                                    active: self.tag_filter.is_active(tag),
                                    text: tag.clone(),
                                })
                                .collect(),
                        )
                    } else {
                        CellView::Text(render::render(spec.field, record, RenderMode::Display))
                    }
                })
                .collect();
            rows_view.push(RowView::Record(RecordRow {
                cells,
                selected: i == self.curser_row,
                expanded,
            }));
            lines += 1;
            if expanded && lines < height {
                rows_view.push(RowView::Detail(DetailRow {
                    description: record.description.clone(),
                    url: record.url.clone(),
                }));
                lines += DETAIL_HEIGHT;
            }
            i += 1;
        }

        let picker = match (&self.modus, &self.picker) {
            (Modus::PICKER, Some(picker)) => {
                let spec = &COLUMNS[picker.column];
                Some(PickerData {
                    title: format!(" Filter: {} ", spec.title),
                    selected: picker.curser_row,
                    entries: picker
                        .entries
                        .iter()
                        .map(|entry| PickerEntryView {
                            label: entry
                                .value
                                .clone()
                                .unwrap_or_else(|| "(all)".to_string()),
                            count: entry.count,
                            active: match (&entry.value, spec.field) {
                                (Some(v), Field::Tags) => self.tag_filter.is_active(v),
                                (Some(v), field) => {
                                    self.value_filters.get(field) == Some(v.as_str())
                                }
                                (None, field) => self.value_filters.get(field).is_none(),
                            },
                        })
                        .collect(),
                })
            }
            _ => None,
        };

        self.uidata = UIData {
            name: self.name.clone(),
            toggles,
            headers,
            rows: rows_view,
            nrows: self.rows.len(),
            total: self.records.len(),
            abs_selected_row: if self.rows.is_empty() {
                0
            } else {
                self.curser_row + 1
            },
            active_tags: self.tag_filter.active_tags().map(str::to_string).collect(),
            show_reset: !self.tag_filter.is_empty(),
            value_filters_active: !self.value_filters.is_empty(),
            show_popup: matches!(self.modus, Modus::POPUP),
            popup_message: HELP_TEXT.to_string(),
            picker,
            prompt: matches!(self.modus, Modus::PROMPT).then(|| self.input.text().to_string()),
            status_message: self.status_message.clone(),
            last_status_message_update: self.last_status_message_update,
            layout: self.uilayout.clone(),
        };
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(
        title: &str,
        category: &str,
        tags: &[&str],
        difficulty: &str,
        year: u16,
    ) -> Record {
        Record {
            category: category.to_string(),
            title: title.to_string(),
            url: format!("https://example.com/{}", title.to_lowercase().replace(' ', "-")),
            description: format!("About {title}."),
            tags: tags.iter().map(|s| s.to_string()).collect(),
            official: false,
            year,
            difficulty_level: difficulty.to_string(),
            duration: "1h".to_string(),
            interactivity_level: "low".to_string(),
            free: true,
        }
    }

    fn sample_records() -> Vec<Record> {
        vec![
            record("Building clis", "article", &["cli", "async"], "beginner", 2021),
            record("Egui patterns", "video", &["gui"], "intermediate", 2019),
            record("Async deep dive", "guide", &["async"], "advanced", 2023),
        ]
    }

    fn test_model() -> Model {
        let mut model = Model::new(&LvConfig::default());
        model.ui_resize(160, 30);
        model.install_records(sample_records());
        model
    }

    fn visible_records(model: &Model) -> Vec<usize> {
        model.rows.clone()
    }

    #[test]
    fn initial_view_is_sorted_by_difficulty_raw_value() {
        let model = test_model();
        // advanced < beginner < intermediate on the raw strings
        assert_eq!(visible_records(&model), vec![2, 0, 1]);
    }

    #[test]
    fn tag_filters_narrow_with_subset_semantics() {
        let mut model = test_model();

        model.toggle_tag("cli");
        assert_eq!(visible_records(&model), vec![0]);

        // Both tags active, row 0 carries both so it stays.
        model.toggle_tag("async");
        assert_eq!(visible_records(&model), vec![0]);

        // Dropping "cli" leaves "async", which rows 0 and 2 satisfy.
        model.toggle_tag("cli");
        assert_eq!(visible_records(&model), vec![2, 0]);

        model.reset_tag_filters();
        assert_eq!(visible_records(&model), vec![2, 0, 1]);
    }

    #[test]
    fn reset_clears_the_set_and_hides_the_reset_affordance() {
        let mut model = test_model();
        model.toggle_tag("cli");
        model.refresh_view();
        assert!(model.get_uidata().show_reset);
        assert_eq!(model.get_uidata().active_tags, vec!["cli"]);

        model.update(Message::ResetTagFilters).unwrap();
        assert!(!model.get_uidata().show_reset);
        assert!(model.get_uidata().active_tags.is_empty());
        assert_eq!(model.get_uidata().nrows, 3);
    }

    #[test]
    fn row_expansion_double_toggle_restores_the_original_state() {
        let mut model = test_model();
        assert!(model.expanded.is_empty());

        model.update(Message::Enter).unwrap();
        assert_eq!(model.expanded.len(), 1);
        let has_detail = model
            .get_uidata()
            .rows
            .iter()
            .any(|row| matches!(row, RowView::Detail(_)));
        assert!(has_detail);

        model.update(Message::Enter).unwrap();
        assert!(model.expanded.is_empty());
        let has_detail = model
            .get_uidata()
            .rows
            .iter()
            .any(|row| matches!(row, RowView::Detail(_)));
        assert!(!has_detail);
    }

    #[test]
    fn expansion_state_is_independent_per_row() {
        let mut model = test_model();
        model.update(Message::Enter).unwrap();
        model.update(Message::MoveDown).unwrap();
        model.update(Message::Enter).unwrap();
        // Two rows expanded at the same time.
        assert_eq!(model.expanded.len(), 2);
    }

    #[test]
    fn expansion_flag_is_discarded_when_the_row_is_filtered_out() {
        let mut model = test_model();
        // Expand the first visible row (record 2, tags ["async"]).
        model.update(Message::Enter).unwrap();
        assert!(model.expanded.contains(&2));

        model.toggle_tag("gui");
        assert_eq!(visible_records(&model), vec![1]);
        assert!(model.expanded.is_empty());
    }

    #[test]
    fn column_visibility_double_toggle_is_idempotent() {
        let mut model = test_model();
        let description = 2;
        assert!(!model.column_visible[description]);
        assert!(!model.get_uidata().toggles[description].active);

        model.update(Message::ToggleColumn(description)).unwrap();
        assert!(model.column_visible[description]);
        assert!(model.get_uidata().toggles[description].active);
        assert!(model.visible_columns.contains(&description));

        model.update(Message::ToggleColumn(description)).unwrap();
        assert!(!model.column_visible[description]);
        assert!(!model.get_uidata().toggles[description].active);
        assert!(!model.visible_columns.contains(&description));
    }

    #[test]
    fn the_last_visible_column_stays_visible() {
        let mut model = test_model();
        // Hide everything except Category.
        for idx in [1, 3, 6, 8] {
            model.update(Message::ToggleColumn(idx)).unwrap();
        }
        assert_eq!(model.visible_columns, vec![0]);

        model.update(Message::ToggleColumn(0)).unwrap();
        assert_eq!(model.visible_columns, vec![0]);
        assert!(model.get_uidata().toggles[0].active);
    }

    #[test]
    fn year_column_sorts_numerically() {
        let mut model = test_model();
        model.sort = Some(SortSpec {
            column: column_index(Field::Year),
            ascending: true,
        });
        model.recompute_rows();
        assert_eq!(visible_records(&model), vec![1, 0, 2]);

        model.sort = Some(SortSpec {
            column: column_index(Field::Year),
            ascending: false,
        });
        model.recompute_rows();
        assert_eq!(visible_records(&model), vec![2, 0, 1]);
    }

    #[test]
    fn value_picker_applies_an_exact_match_filter() {
        let mut model = test_model();
        // Curser starts on the Category column.
        model.update(Message::OpenPicker).unwrap();
        let picker = model.get_uidata().picker.clone().unwrap();
        let labels: Vec<String> = picker.entries.iter().map(|e| e.label.clone()).collect();
        assert_eq!(labels, vec!["(all)", "article", "guide", "video"]);
        // No filter installed, so "(all)" carries the active marker.
        assert!(picker.entries[0].active);

        model.update(Message::MoveDown).unwrap();
        model.update(Message::Enter).unwrap();
        assert_eq!(visible_records(&model), vec![0]);
        assert!(model.get_uidata().picker.is_none());

        // Re-open and clear via "(all)".
        model.update(Message::OpenPicker).unwrap();
        let picker = model.get_uidata().picker.clone().unwrap();
        assert!(picker.entries[1].active); // "article" is the installed filter
        model.update(Message::Enter).unwrap(); // "(all)" selected
        assert_eq!(model.get_uidata().nrows, 3);
    }

    #[test]
    fn tag_picker_toggles_filters_and_stays_open() {
        let mut model = test_model();
        // Move the curser to the Tags column (Category -> Title -> Tags).
        model.update(Message::MoveRight).unwrap();
        model.update(Message::MoveRight).unwrap();
        model.update(Message::OpenPicker).unwrap();

        let picker = model.get_uidata().picker.clone().unwrap();
        let labels: Vec<String> = picker.entries.iter().map(|e| e.label.clone()).collect();
        assert_eq!(labels, vec!["async", "cli", "gui"]);

        model.update(Message::Enter).unwrap();
        // Picker stays open and marks the toggled tag active.
        let picker = model.get_uidata().picker.clone().unwrap();
        assert!(picker.entries[0].active);
        assert_eq!(model.get_uidata().nrows, 2);

        model.update(Message::Exit).unwrap();
        assert!(model.get_uidata().picker.is_none());
        // Tag spans of matching rows carry the active marker.
        let tag_active = model.get_uidata().rows.iter().any(|row| match row {
            RowView::Record(record) => record.cells.iter().any(|cell| match cell {
                CellView::Tags(tags) => tags.iter().any(|tag| tag.active && tag.text == "async"),
                _ => false,
            }),
            _ => false,
        });
        assert!(tag_active);
    }

    #[test]
    fn search_jumps_to_the_first_match() {
        let mut model = test_model();
        model.run_search("Egui");
        // Record 1 sits at visible position 2 after the initial sort; the
        // term matches its title and its description.
        assert_eq!(model.curser_row, 2);
        assert!(model.status_message.starts_with("Found 2"));
    }

    #[test]
    fn search_with_no_match_reports_it() {
        let mut model = test_model();
        model.run_search("quantum");
        assert!(model.search_results.is_empty());
        assert_eq!(model.status_message, "Found no matches!");
    }

    #[test]
    fn search_prompt_flow_submits_a_term() {
        use ratatui::crossterm::event::{KeyCode, KeyEvent, KeyModifiers};

        let mut model = test_model();
        model.update(Message::Search).unwrap();
        assert!(model.raw_keyevents());
        for chr in ['g', 'u', 'i'] {
            model
                .update(Message::RawKey(KeyEvent::new(
                    KeyCode::Char(chr),
                    KeyModifiers::NONE,
                )))
                .unwrap();
        }
        assert_eq!(model.get_uidata().prompt.as_deref(), Some("gui"));
        model
            .update(Message::RawKey(KeyEvent::new(
                KeyCode::Enter,
                KeyModifiers::NONE,
            )))
            .unwrap();
        assert!(!model.raw_keyevents());
        // "gui" matches record 1 (tags) at visible position 2.
        assert_eq!(model.curser_row, 2);
    }

    #[test]
    fn empty_filter_result_keeps_the_model_consistent() {
        let mut model = test_model();
        model.toggle_tag("cli");
        model.toggle_tag("gui");
        model.refresh_view();
        assert!(visible_records(&model).is_empty());
        assert_eq!(model.get_uidata().nrows, 0);
        assert_eq!(model.get_uidata().abs_selected_row, 0);

        // Movement and expansion are no-ops on an empty view.
        model.update(Message::MoveDown).unwrap();
        model.update(Message::Enter).unwrap();
        assert!(model.expanded.is_empty());

        model.update(Message::ResetTagFilters).unwrap();
        assert_eq!(model.get_uidata().nrows, 3);
    }

    #[test]
    fn csv_cells_are_quoted_like_the_row_copy_expects() {
        assert_eq!(Model::wrap_cell_content("plain"), "plain");
        assert_eq!(Model::wrap_cell_content("two words"), "\"two words\"");
        assert_eq!(
            Model::wrap_cell_content("say \"hi\""),
            "\"say \"\"hi\"\"\""
        );
        assert_eq!(Model::wrap_cell_content("a,b"), "\"a,b\"");
    }
}
