use std::time::Duration;

use ratatui::crossterm::event::{self, Event, KeyCode};
use tracing::trace;

use crate::domain::{LvConfig, LvError, Message};
use crate::model::Model;

pub struct Controller {
    event_poll_time: u64,
}

impl Controller {
    pub fn new(cfg: &LvConfig) -> Self {
        Self {
            event_poll_time: cfg.event_poll_time,
        }
    }

    pub fn handle_event(&self, model: &Model) -> Result<Option<Message>, LvError> {
        if event::poll(Duration::from_millis(self.event_poll_time))? {
            match event::read()? {
                Event::Key(key) if key.kind == event::KeyEventKind::Press => {
                    // While the search prompt is open the model consumes
                    // the raw key stream.
                    if model.raw_keyevents() {
                        return Ok(Some(Message::RawKey(key)));
                    }
                    return Ok(self.handle_key(key));
                }
                Event::Resize(width, height) => {
                    return Ok(Some(Message::Resize(width as usize, height as usize)));
                }
                _ => {}
            }
        }
        Ok(None)
    }

    fn handle_key(&self, key: event::KeyEvent) -> Option<Message> {
        let message = match key.code {
            KeyCode::Char('q') => Some(Message::Quit),
            KeyCode::Up | KeyCode::Char('k') => Some(Message::MoveUp),
            KeyCode::Down | KeyCode::Char('j') => Some(Message::MoveDown),
            KeyCode::Left | KeyCode::Char('h') => Some(Message::MoveLeft),
            KeyCode::Right | KeyCode::Char('l') => Some(Message::MoveRight),
            KeyCode::PageUp => Some(Message::MovePageUp),
            KeyCode::PageDown => Some(Message::MovePageDown),
            KeyCode::Home | KeyCode::Char('g') => Some(Message::MoveBeginning),
            KeyCode::End | KeyCode::Char('G') => Some(Message::MoveEnd),
            KeyCode::Enter => Some(Message::Enter),
            KeyCode::Esc => Some(Message::Exit),
            KeyCode::Char(c @ '0'..='9') => Some(Message::ToggleColumn(toggle_index(c))),
            KeyCode::Char('f') => Some(Message::OpenPicker),
            KeyCode::Char('r') => Some(Message::ResetTagFilters),
            KeyCode::Char('/') => Some(Message::Search),
            KeyCode::Char('n') => Some(Message::SearchNext),
            KeyCode::Char('N') => Some(Message::SearchPrev),
            KeyCode::Char('s') => Some(Message::SortAscending),
            KeyCode::Char('S') => Some(Message::SortDescending),
            KeyCode::Char('c') => Some(Message::CopyLink),
            KeyCode::Char('C') => Some(Message::CopyRecord),
            KeyCode::Char('?') => Some(Message::Help),
            _ => None,
        };
        trace!("Mapped: {key:?} => {message:?}");
        message
    }
}

// Keys 1-9 address the first nine columns, 0 the tenth.
fn toggle_index(key: char) -> usize {
    if key == '0' {
        9
    } else {
        key as usize - '1' as usize
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn toggle_keys_map_to_column_indices() {
        assert_eq!(toggle_index('1'), 0);
        assert_eq!(toggle_index('4'), 3);
        assert_eq!(toggle_index('9'), 8);
        assert_eq!(toggle_index('0'), 9);
    }
}
