use crossterm::event::{KeyCode, KeyEvent, KeyEventKind, KeyModifiers};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    TogglePlay,
    SeekBackward,
    SeekForward,
    Previous,
    Next,
    ToggleMute,
    VolumeUp,
    VolumeDown,
    ToggleLike,
    ToggleExpanded,
    ToggleShuffle,
    CycleRepeat,
    CycleMood,
    Select(usize),
}

/// A resolved key. `prevent_default` marks navigation keys the host must
/// not also act on (scrolling, focus moves).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KeyOutcome {
    pub action: Action,
    pub prevent_default: bool,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct Keymap;

impl Keymap {
    pub fn new() -> Self {
        Self
    }

    /// Maps a key press to a player action. Releases and repeats from
    /// terminals that report them resolve to nothing.
    pub fn resolve(&self, key: KeyEvent) -> Option<KeyOutcome> {
        if key.kind != KeyEventKind::Press {
            return None;
        }
        if key
            .modifiers
            .intersects(KeyModifiers::CONTROL | KeyModifiers::ALT)
        {
            return None;
        }
        let shift = key.modifiers.contains(KeyModifiers::SHIFT);

        let action = match key.code {
            KeyCode::Char(' ') | KeyCode::Char('k') => Action::TogglePlay,
            KeyCode::Left if shift => Action::Previous,
            KeyCode::Right if shift => Action::Next,
            KeyCode::Left => Action::SeekBackward,
            KeyCode::Right => Action::SeekForward,
            KeyCode::Char('p') => Action::Previous,
            KeyCode::Char('n') => Action::Next,
            KeyCode::Char('m') => Action::ToggleMute,
            KeyCode::Up => Action::VolumeUp,
            KeyCode::Down => Action::VolumeDown,
            KeyCode::Char('l') => Action::ToggleLike,
            KeyCode::Char('f') => Action::ToggleExpanded,
            KeyCode::Char('s') => Action::ToggleShuffle,
            KeyCode::Char('r') => Action::CycleRepeat,
            KeyCode::Tab => Action::CycleMood,
            KeyCode::Char(digit @ '1'..='9') => {
                Action::Select(digit as usize - '1' as usize)
            }
            _ => return None,
        };

        let prevent_default = matches!(
            key.code,
            KeyCode::Char(' ') | KeyCode::Left | KeyCode::Right | KeyCode::Up | KeyCode::Down
        );
        Some(KeyOutcome {
            action,
            prevent_default,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crossterm::event::KeyEventState;

    fn press(code: KeyCode, modifiers: KeyModifiers) -> KeyEvent {
        KeyEvent {
            code,
            modifiers,
            kind: KeyEventKind::Press,
            state: KeyEventState::NONE,
        }
    }

    fn resolve(code: KeyCode) -> Option<KeyOutcome> {
        Keymap::new().resolve(press(code, KeyModifiers::NONE))
    }

    #[test]
    fn arrows_and_space_prevent_default() {
        for code in [
            KeyCode::Char(' '),
            KeyCode::Left,
            KeyCode::Right,
            KeyCode::Up,
            KeyCode::Down,
        ] {
            let outcome = resolve(code).expect("mapped");
            assert!(outcome.prevent_default, "{code:?} should prevent default");
        }
        assert!(!resolve(KeyCode::Char('m')).expect("mapped").prevent_default);
    }

    #[test]
    fn shift_arrows_switch_tracks() {
        let keymap = Keymap::new();
        let previous = keymap.resolve(press(KeyCode::Left, KeyModifiers::SHIFT));
        let next = keymap.resolve(press(KeyCode::Right, KeyModifiers::SHIFT));
        assert_eq!(previous.map(|o| o.action), Some(Action::Previous));
        assert_eq!(next.map(|o| o.action), Some(Action::Next));
        assert_eq!(resolve(KeyCode::Left).map(|o| o.action), Some(Action::SeekBackward));
    }

    #[test]
    fn digits_select_tracks() {
        assert_eq!(resolve(KeyCode::Char('1')).map(|o| o.action), Some(Action::Select(0)));
        assert_eq!(resolve(KeyCode::Char('9')).map(|o| o.action), Some(Action::Select(8)));
        assert_eq!(resolve(KeyCode::Char('0')), None);
    }

    #[test]
    fn releases_and_control_chords_are_ignored() {
        let keymap = Keymap::new();
        let mut release = press(KeyCode::Char(' '), KeyModifiers::NONE);
        release.kind = KeyEventKind::Release;
        assert_eq!(keymap.resolve(release), None);
        assert_eq!(
            keymap.resolve(press(KeyCode::Char('n'), KeyModifiers::CONTROL)),
            None
        );
    }
}
