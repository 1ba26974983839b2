use ratatui::crossterm::event::{KeyCode, KeyEvent, KeyModifiers};

// One-line search input shown in the status line while active.
#[derive(Debug, Default)]
pub struct Prompt {
    buffer: String,
}

#[derive(Debug, PartialEq)]
pub enum PromptOutcome {
    Pending,
    Submit(String),
    Cancel,
}

impl Prompt {
    pub fn clear(&mut self) {
        self.buffer.clear();
    }

    pub fn text(&self) -> &str {
        &self.buffer
    }

    pub fn read(&mut self, key: KeyEvent) -> PromptOutcome {
        match key.code {
            KeyCode::Enter => PromptOutcome::Submit(std::mem::take(&mut self.buffer)),
            KeyCode::Esc => {
                self.clear();
                PromptOutcome::Cancel
            }
            KeyCode::Backspace => {
                self.buffer.pop();
                PromptOutcome::Pending
            }
            code => {
                if let Some(chr) = code.as_char()
                    && !key.modifiers.contains(KeyModifiers::CONTROL)
                {
                    self.buffer.push(chr);
                }
                PromptOutcome::Pending
            }
        }
    }
}
