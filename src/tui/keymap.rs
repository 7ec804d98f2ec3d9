// Key → Command map. Keys that map to nothing go to the focused text input.

use crossterm::event::{KeyCode, KeyEvent, KeyModifiers};

use crate::wizard::WizardStep;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    FocusNext,
    FocusPrev,
    Activate,
    NextStep,
    PrevStep,
    JumpTo(WizardStep),
    Analyze,
    Dismiss,
    Help,
    LoadDemo,
    About,
    Restart,
    Quit,
    ScrollUp,
    ScrollDown,
}

pub fn map_key(key: KeyEvent) -> Option<Command> {
    let ctrl = key.modifiers.contains(KeyModifiers::CONTROL);
    let alt = key.modifiers.contains(KeyModifiers::ALT);

    if ctrl {
        return match key.code {
            KeyCode::Right => Some(Command::NextStep),
            KeyCode::Left => Some(Command::PrevStep),
            KeyCode::Enter => Some(Command::Analyze),
            KeyCode::Char('r') | KeyCode::Char('R') => Some(Command::Restart),
            KeyCode::Char('q') | KeyCode::Char('Q') | KeyCode::Char('c') => Some(Command::Quit),
            _ => None,
        };
    }

    if alt {
        if let KeyCode::Char(c @ '1'..='5') = key.code {
            let index = c as usize - '1' as usize;
            return WizardStep::from_index(index).map(Command::JumpTo);
        }
        return None;
    }

    match key.code {
        KeyCode::Tab | KeyCode::Down => Some(Command::FocusNext),
        KeyCode::BackTab | KeyCode::Up => Some(Command::FocusPrev),
        KeyCode::Enter => Some(Command::Activate),
        KeyCode::Esc => Some(Command::Dismiss),
        KeyCode::F(1) => Some(Command::Help),
        KeyCode::F(2) => Some(Command::LoadDemo),
        KeyCode::F(3) => Some(Command::About),
        KeyCode::F(5) => Some(Command::Analyze),
        KeyCode::PageUp => Some(Command::ScrollUp),
        KeyCode::PageDown => Some(Command::ScrollDown),
        _ => None,
    }
}
