use crate::app::InputMode;
use crossterm::event::{KeyCode, KeyEvent, KeyModifiers};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Action {
    Quit,
    Down,
    Up,
    PageDown,
    PageUp,
    Top,
    Bottom,
    ToggleHelp,
    StartInput,
    Refresh,
    ResetHome,
    ClearNotice,
    SubmitInput,
    CancelInput,
    Backspace,
    ClearInput,
    InputChar(char),
}

pub fn map_key(mode: InputMode, key: KeyEvent) -> Option<Action> {
    if key.code == KeyCode::Char('c') && key.modifiers.contains(KeyModifiers::CONTROL) {
        return Some(Action::Quit);
    }

    match mode {
        InputMode::Normal => map_normal_mode_key(key),
        InputMode::Prompt | InputMode::Followup => map_input_mode_key(key),
    }
}

fn map_normal_mode_key(key: KeyEvent) -> Option<Action> {
    match key.code {
        KeyCode::Char('q') => Some(Action::Quit),
        KeyCode::Char('j') if key.modifiers.is_empty() => Some(Action::Down),
        KeyCode::Down => Some(Action::Down),
        KeyCode::Char('k') if key.modifiers.is_empty() => Some(Action::Up),
        KeyCode::Up => Some(Action::Up),
        KeyCode::Char('g') | KeyCode::Home => Some(Action::Top),
        KeyCode::Char('G') | KeyCode::End => Some(Action::Bottom),
        KeyCode::PageDown => Some(Action::PageDown),
        KeyCode::PageUp => Some(Action::PageUp),
        KeyCode::Char('d') if key.modifiers.contains(KeyModifiers::CONTROL) => {
            Some(Action::PageDown)
        }
        KeyCode::Char('u') if key.modifiers.contains(KeyModifiers::CONTROL) => Some(Action::PageUp),
        KeyCode::Char('?') => Some(Action::ToggleHelp),
        KeyCode::Char('r') | KeyCode::F(5) => Some(Action::Refresh),
        KeyCode::Char('i') | KeyCode::Char(':') | KeyCode::Enter => Some(Action::StartInput),
        KeyCode::Char('h') if key.modifiers.is_empty() => Some(Action::ResetHome),
        KeyCode::Backspace => Some(Action::ResetHome),
        KeyCode::Esc => Some(Action::ClearNotice),
        _ => None,
    }
}

fn map_input_mode_key(key: KeyEvent) -> Option<Action> {
    match key.code {
        KeyCode::Esc => Some(Action::CancelInput),
        KeyCode::Enter => Some(Action::SubmitInput),
        KeyCode::Char('m') | KeyCode::Char('j')
            if key.modifiers.contains(KeyModifiers::CONTROL) =>
        {
            Some(Action::SubmitInput)
        }
        KeyCode::Char('u') if key.modifiers.contains(KeyModifiers::CONTROL) => {
            Some(Action::ClearInput)
        }
        KeyCode::Backspace => Some(Action::Backspace),
        KeyCode::Char(c) if key.modifiers.is_empty() || key.modifiers == KeyModifiers::SHIFT => {
            Some(Action::InputChar(c))
        }
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::{Action, map_key};
    use crate::app::InputMode;
    use crossterm::event::{KeyCode, KeyEvent, KeyModifiers};

    #[test]
    fn normal_mode_maps_quit() {
        let key = KeyEvent::new(KeyCode::Char('q'), KeyModifiers::NONE);
        assert_eq!(map_key(InputMode::Normal, key), Some(Action::Quit));
    }

    #[test]
    fn ctrl_c_quits_from_any_mode() {
        let key = KeyEvent::new(KeyCode::Char('c'), KeyModifiers::CONTROL);
        for mode in [InputMode::Normal, InputMode::Prompt, InputMode::Followup] {
            assert_eq!(map_key(mode, key), Some(Action::Quit));
        }
    }

    #[test]
    fn input_mode_types_letters_that_are_shortcuts_in_normal_mode() {
        for c in ['q', 'h', 'j', 'r', '?', 'Q'] {
            let modifiers = if c.is_ascii_uppercase() {
                KeyModifiers::SHIFT
            } else {
                KeyModifiers::NONE
            };
            let key = KeyEvent::new(KeyCode::Char(c), modifiers);
            assert_eq!(map_key(InputMode::Prompt, key), Some(Action::InputChar(c)));
        }
    }

    #[test]
    fn backspace_resets_in_normal_mode_but_edits_in_input() {
        let key = KeyEvent::new(KeyCode::Backspace, KeyModifiers::NONE);
        assert_eq!(map_key(InputMode::Normal, key), Some(Action::ResetHome));
        assert_eq!(map_key(InputMode::Followup, key), Some(Action::Backspace));
    }

    #[test]
    fn enter_starts_and_submits_input() {
        let key = KeyEvent::new(KeyCode::Enter, KeyModifiers::NONE);
        assert_eq!(map_key(InputMode::Normal, key), Some(Action::StartInput));
        assert_eq!(map_key(InputMode::Prompt, key), Some(Action::SubmitInput));
        let ctrl_m = KeyEvent::new(KeyCode::Char('m'), KeyModifiers::CONTROL);
        assert_eq!(map_key(InputMode::Prompt, ctrl_m), Some(Action::SubmitInput));
    }

    #[test]
    fn escape_cancels_input_or_clears_notice() {
        let key = KeyEvent::new(KeyCode::Esc, KeyModifiers::NONE);
        assert_eq!(map_key(InputMode::Prompt, key), Some(Action::CancelInput));
        assert_eq!(map_key(InputMode::Normal, key), Some(Action::ClearNotice));
    }

    #[test]
    fn normal_mode_scrolls_with_vim_keys_and_pages() {
        let down = KeyEvent::new(KeyCode::Char('j'), KeyModifiers::NONE);
        let page = KeyEvent::new(KeyCode::PageDown, KeyModifiers::NONE);
        let ctrl_u = KeyEvent::new(KeyCode::Char('u'), KeyModifiers::CONTROL);
        assert_eq!(map_key(InputMode::Normal, down), Some(Action::Down));
        assert_eq!(map_key(InputMode::Normal, page), Some(Action::PageDown));
        assert_eq!(map_key(InputMode::Normal, ctrl_u), Some(Action::PageUp));
    }
}
