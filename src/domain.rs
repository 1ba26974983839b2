use std::io::Error;

use derive_setters::Setters;
use ratatui::crossterm::event::KeyEvent;

#[derive(Debug)]
pub enum LvError {
    IoError(Error),
    JsonError(serde_json::Error),
    LoadingFailed(String),
    FileNotFound,
    PermissionDenied,
}

impl From<Error> for LvError {
    fn from(err: Error) -> Self {
        LvError::IoError(err)
    }
}

impl From<serde_json::Error> for LvError {
    fn from(err: serde_json::Error) -> Self {
        LvError::JsonError(err)
    }
}

#[derive(Debug, Clone, Setters)]
pub struct LvConfig {
    pub event_poll_time: u64,
    pub max_column_width: usize,
    pub beacon_dwell_secs: u64,
    pub track_url: Option<String>,
}

impl Default for LvConfig {
    fn default() -> Self {
        LvConfig {
            event_poll_time: 100,
            max_column_width: 42,
            beacon_dwell_secs: 20,
            track_url: None,
        }
    }
}

#[derive(Debug)]
pub enum Message {
    Quit,
    MoveUp,
    MoveDown,
    MoveLeft,
    MoveRight,
    MovePageUp,
    MovePageDown,
    MoveBeginning,
    MoveEnd,
    Enter,
    Exit,
    ToggleColumn(usize),
    OpenPicker,
    ResetTagFilters,
    Search,
    SearchNext,
    SearchPrev,
    SortAscending,
    SortDescending,
    CopyLink,
    CopyRecord,
    Help,
    Resize(usize, usize),
    RawKey(KeyEvent),
}

pub const HELP_TEXT: &str = "  lv - link catalog viewer

  Navigation
    j/k or Up/Down     move selection
    h/l or Left/Right  change column
    PageUp/PageDown    move a page
    g/G                first/last row

  Rows
    Enter              expand/collapse link details

  Columns
    1-9, 0             show/hide column
    s/S                sort by current column (asc/desc)

  Filtering
    f                  value picker for the current column;
                       on the Tags column it toggles tag filters
    r                  reset all tag filters
    /                  search, n/N jump to next/previous match

  Other
    c/C                copy link url / record as csv
    ?                  this help
    Esc                close picker/popup
    q                  quit";
