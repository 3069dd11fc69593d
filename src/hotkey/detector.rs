//! Chord detector
//!
//! A pure state machine fed one raw key event at a time. It tracks the
//! left/right variants of the trigger modifier plus a latch on the
//! action key, and emits debounced chord signals. The latch is what
//! makes OS key-repeat harmless: a held action key delivers a stream of
//! down events, but only the first one fires.
//!
//! `feed` runs on the key-event reader's thread. It must stay short,
//! never block, and never panic.

use super::{HotkeyEvent, KeyEventKind, RawKeyEvent};
use crate::config::ChordMode;

/// The key combination that arms capture: an action key plus either
/// variant of a trigger modifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Chord {
    pub action: u16,
    pub left_modifier: u16,
    pub right_modifier: u16,
}

#[derive(Debug, Default)]
struct ModifierState {
    left_down: bool,
    right_down: bool,
    latched: bool,
}

/// Debounced chord detector, hold-mode or tap-mode
pub struct HotkeyDetector {
    chord: Chord,
    mode: ChordMode,
    state: ModifierState,
}

impl HotkeyDetector {
    pub fn new(chord: Chord, mode: ChordMode) -> Self {
        Self {
            chord,
            mode,
            state: ModifierState::default(),
        }
    }

    pub fn mode(&self) -> ChordMode {
        self.mode
    }

    /// Update modifier state from one raw event and return the chord
    /// signal it produced, if any.
    pub fn feed(&mut self, event: RawKeyEvent) -> Option<HotkeyEvent> {
        let down = event.kind == KeyEventKind::Down;
        let up = event.kind == KeyEventKind::Up;

        if event.code == self.chord.left_modifier {
            if down {
                self.state.left_down = true;
            } else if up {
                self.state.left_down = false;
            }
        } else if event.code == self.chord.right_modifier {
            if down {
                self.state.right_down = true;
            } else if up {
                self.state.right_down = false;
            }
        }

        if event.code == self.chord.action {
            let modifier_held = self.state.left_down || self.state.right_down;

            match self.mode {
                ChordMode::Hold => {
                    if down && modifier_held && !self.state.latched {
                        self.state.latched = true;
                        return Some(HotkeyEvent::Pressed);
                    }
                    if up && self.state.latched {
                        self.state.latched = false;
                        return Some(HotkeyEvent::Released);
                    }
                }
                ChordMode::Tap => {
                    if down && modifier_held && !self.state.latched {
                        self.state.latched = true;
                        return Some(HotkeyEvent::Triggered);
                    }
                    // The latch clears on the action key's up-transition
                    // so key-repeat can never re-fire the trigger.
                    if up {
                        self.state.latched = false;
                    }
                }
            }
            return None;
        }

        // Hold-mode: a modifier released while the action key is still
        // latched synthesizes the release so the chord cannot stick.
        if self.mode == ChordMode::Hold
            && self.state.latched
            && up
            && (event.code == self.chord.left_modifier || event.code == self.chord.right_modifier)
        {
            self.state.latched = false;
            return Some(HotkeyEvent::Released);
        }

        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const ACTION: u16 = 21; // KEY_Y
    const LMETA: u16 = 125;
    const RMETA: u16 = 126;

    fn chord() -> Chord {
        Chord {
            action: ACTION,
            left_modifier: LMETA,
            right_modifier: RMETA,
        }
    }

    fn down(code: u16) -> RawKeyEvent {
        RawKeyEvent {
            code,
            kind: KeyEventKind::Down,
        }
    }

    fn up(code: u16) -> RawKeyEvent {
        RawKeyEvent {
            code,
            kind: KeyEventKind::Up,
        }
    }

    #[test]
    fn test_hold_mode_press_and_release() {
        let mut det = HotkeyDetector::new(chord(), ChordMode::Hold);

        assert_eq!(det.feed(down(LMETA)), None);
        assert_eq!(det.feed(down(ACTION)), Some(HotkeyEvent::Pressed));
        assert_eq!(det.feed(up(ACTION)), Some(HotkeyEvent::Released));
        assert_eq!(det.feed(up(LMETA)), None);
    }

    #[test]
    fn test_no_trigger_without_modifier() {
        let mut det = HotkeyDetector::new(chord(), ChordMode::Hold);
        assert_eq!(det.feed(down(ACTION)), None);
        assert_eq!(det.feed(up(ACTION)), None);
    }

    #[test]
    fn test_either_modifier_satisfies_chord() {
        let mut det = HotkeyDetector::new(chord(), ChordMode::Hold);
        assert_eq!(det.feed(down(RMETA)), None);
        assert_eq!(det.feed(down(ACTION)), Some(HotkeyEvent::Pressed));
    }

    #[test]
    fn test_key_repeat_fires_exactly_once() {
        let mut det = HotkeyDetector::new(chord(), ChordMode::Tap);
        det.feed(down(LMETA));

        // One initial down followed by synthetic repeat downs, no up
        assert_eq!(det.feed(down(ACTION)), Some(HotkeyEvent::Triggered));
        for _ in 0..50 {
            assert_eq!(det.feed(down(ACTION)), None);
        }
        for _ in 0..50 {
            assert_eq!(
                det.feed(RawKeyEvent {
                    code: ACTION,
                    kind: KeyEventKind::Repeat,
                }),
                None
            );
        }

        // After the up transition the chord can fire again
        assert_eq!(det.feed(up(ACTION)), None);
        assert_eq!(det.feed(down(ACTION)), Some(HotkeyEvent::Triggered));
    }

    #[test]
    fn test_hold_mode_repeat_does_not_refire() {
        let mut det = HotkeyDetector::new(chord(), ChordMode::Hold);
        det.feed(down(LMETA));

        assert_eq!(det.feed(down(ACTION)), Some(HotkeyEvent::Pressed));
        for _ in 0..10 {
            assert_eq!(det.feed(down(ACTION)), None);
        }
        assert_eq!(det.feed(up(ACTION)), Some(HotkeyEvent::Released));
    }

    #[test]
    fn test_modifier_release_synthesizes_release() {
        let mut det = HotkeyDetector::new(chord(), ChordMode::Hold);
        det.feed(down(LMETA));
        assert_eq!(det.feed(down(ACTION)), Some(HotkeyEvent::Pressed));

        // Modifier goes up while the action key is still held
        assert_eq!(det.feed(up(LMETA)), Some(HotkeyEvent::Released));

        // The later action-key up must not produce a second release
        assert_eq!(det.feed(up(ACTION)), None);
    }

    #[test]
    fn test_tap_mode_ignores_modifier_release() {
        let mut det = HotkeyDetector::new(chord(), ChordMode::Tap);
        det.feed(down(LMETA));
        assert_eq!(det.feed(down(ACTION)), Some(HotkeyEvent::Triggered));

        // Tap-mode's latch clears only on the action key's up-transition
        assert_eq!(det.feed(up(LMETA)), None);
        assert_eq!(det.feed(down(ACTION)), None);
        assert_eq!(det.feed(up(ACTION)), None);
    }

    #[test]
    fn test_modifier_pressed_after_action_does_not_fire() {
        let mut det = HotkeyDetector::new(chord(), ChordMode::Hold);

        // Action key held first, then the modifier: no signal until the
        // action key goes down again with the modifier already held
        assert_eq!(det.feed(down(ACTION)), None);
        assert_eq!(det.feed(down(LMETA)), None);
        assert_eq!(det.feed(up(ACTION)), None);
        assert_eq!(det.feed(down(ACTION)), Some(HotkeyEvent::Pressed));
    }
}
