//! Decide whether a raw keyboard event is let through or swallowed.
//!
//! While the keyboard is blocked every key-down, key-up and modifier change is run
//! through [`AllowList::classify`]. The decision is a pure function of the event's
//! kind, key code and modifier flags: the same event always gets the same answer, and
//! nothing here holds state, so an [`AllowList`] can be evaluated from whichever
//! thread the platform delivers events on.
//!
//! The default allow-list keeps a handful of shortcuts working so the user is never
//! locked out of the machine:
//!
//! 1. modifier-only changes (pressing or releasing Command, Control, Alt, Shift),
//! 2. Command together with one of the [`SafetyKey`]s,
//! 3. anything pressed while Command and Alt are both held (force quit),
//! 4. anything pressed while Command and Control are both held.
//!
//! Everything else is [`Decision::Block`]ed.

use std::{fmt::Display, ops::BitOr};

/// A platform virtual key code, as reported by the operating system's event source.
///
/// On macOS this is the `kVK_*` value of the key, on Windows the `VK_*` value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct KeyCode(pub u32);

/// The kind of a keyboard event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    /// A key was pressed.
    KeyDown,
    /// A key was released.
    KeyUp,
    /// Only the modifier state changed; no character key is involved.
    ModifiersChanged,
}

/// The set of modifier keys held while an event was generated.
///
/// Combine flags with `|`:
///
/// ```
/// use keyboard_cleaner::policy::Modifiers;
///
/// let held = Modifiers::COMMAND | Modifiers::ALT;
/// assert!(held.contains(Modifiers::ALT));
/// assert!(!held.contains(Modifiers::CONTROL));
/// ```
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct Modifiers(u8);

impl Modifiers {
    pub const NONE: Modifiers = Modifiers(0);
    /// Command on macOS, the Windows key on Windows.
    pub const COMMAND: Modifiers = Modifiers(1 << 0);
    pub const CONTROL: Modifiers = Modifiers(1 << 1);
    /// Option on macOS.
    pub const ALT: Modifiers = Modifiers(1 << 2);
    pub const SHIFT: Modifiers = Modifiers(1 << 3);

    /// Returns the flags held in either `self` or `other`.
    pub const fn union(self, other: Modifiers) -> Modifiers {
        Modifiers(self.0 | other.0)
    }

    /// Returns `true` if every flag in `other` is also held in `self`.
    pub const fn contains(self, other: Modifiers) -> bool {
        self.0 & other.0 == other.0
    }

    pub const fn is_empty(self) -> bool {
        self.0 == 0
    }
}

impl BitOr for Modifiers {
    type Output = Modifiers;

    fn bitor(self, rhs: Modifiers) -> Modifiers {
        self.union(rhs)
    }
}

/// A single keyboard event as seen by the interceptor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct KeyEvent {
    pub kind: EventKind,
    /// The key involved, if the platform reports one.
    pub key_code: Option<KeyCode>,
    pub modifiers: Modifiers,
}

impl KeyEvent {
    pub fn key_down(key_code: KeyCode, modifiers: Modifiers) -> KeyEvent {
        KeyEvent {
            kind: EventKind::KeyDown,
            key_code: Some(key_code),
            modifiers,
        }
    }

    pub fn key_up(key_code: KeyCode, modifiers: Modifiers) -> KeyEvent {
        KeyEvent {
            kind: EventKind::KeyUp,
            key_code: Some(key_code),
            modifiers,
        }
    }

    pub fn modifiers_changed(modifiers: Modifiers) -> KeyEvent {
        KeyEvent {
            kind: EventKind::ModifiersChanged,
            key_code: None,
            modifiers,
        }
    }
}

/// Keys that stay usable together with Command while the keyboard is blocked.
///
/// Each variant names what the shortcut does; [`SafetyKey::key_code`] maps it onto the
/// physical key for the current platform (Q, Tab, Space and Escape).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SafetyKey {
    /// Quit the frontmost application.
    Quit,
    /// Switch to another application.
    SwitchApplication,
    /// Open the launcher or search field.
    OpenLauncher,
    /// Cancel / escape.
    Cancel,
}

#[cfg(not(windows))]
mod key_table {
    // kVK_ANSI_Q, kVK_Tab, kVK_Space, kVK_Escape
    pub const QUIT: u32 = 12;
    pub const SWITCH_APPLICATION: u32 = 48;
    pub const OPEN_LAUNCHER: u32 = 49;
    pub const CANCEL: u32 = 53;
}

#[cfg(windows)]
mod key_table {
    // VK_Q, VK_TAB, VK_SPACE, VK_ESCAPE
    pub const QUIT: u32 = 0x51;
    pub const SWITCH_APPLICATION: u32 = 0x09;
    pub const OPEN_LAUNCHER: u32 = 0x20;
    pub const CANCEL: u32 = 0x1B;
}

impl SafetyKey {
    pub const ALL: [SafetyKey; 4] = [
        SafetyKey::Quit,
        SafetyKey::SwitchApplication,
        SafetyKey::OpenLauncher,
        SafetyKey::Cancel,
    ];

    /// Returns the virtual key code of this key on the current platform.
    pub const fn key_code(self) -> KeyCode {
        let code = match self {
            SafetyKey::Quit => key_table::QUIT,
            SafetyKey::SwitchApplication => key_table::SWITCH_APPLICATION,
            SafetyKey::OpenLauncher => key_table::OPEN_LAUNCHER,
            SafetyKey::Cancel => key_table::CANCEL,
        };
        KeyCode(code)
    }

    /// Looks up the safety key bound to `key_code` on the current platform.
    pub fn from_key_code(key_code: KeyCode) -> Option<SafetyKey> {
        SafetyKey::ALL
            .into_iter()
            .find(|key| key.key_code() == key_code)
    }
}

impl Display for SafetyKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            SafetyKey::Quit => "quit",
            SafetyKey::SwitchApplication => "switch application",
            SafetyKey::OpenLauncher => "open launcher",
            SafetyKey::Cancel => "cancel",
        };
        write!(f, "{}", s)
    }
}

/// The outcome of classifying one event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Decision {
    /// Deliver the event unchanged.
    Allow,
    /// Consume the event; no application receives it.
    Block,
}

impl Display for Decision {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Decision::Allow => "allow",
            Decision::Block => "block",
        };
        write!(f, "{}", s)
    }
}

const DEFAULT_SAFETY_KEYS: &[SafetyKey] = &SafetyKey::ALL;

const DEFAULT_COMBINATIONS: &[Modifiers] = &[
    Modifiers::COMMAND.union(Modifiers::ALT),
    Modifiers::COMMAND.union(Modifiers::CONTROL),
];

/// The immutable set of rules that lets some events through while blocking.
///
/// The rule tables are `'static`, so an `AllowList` is `Copy` and can be handed to the
/// event-delivery thread as is.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AllowList {
    safety_keys: &'static [SafetyKey],
    combinations: &'static [Modifiers],
}

impl AllowList {
    /// Creates an allow-list from its two rule tables.
    ///
    /// # Arguments
    /// - `safety_keys`: keys allowed while Command is held.
    /// - `combinations`: modifier sets; any key event holding all flags of one of
    ///   them is allowed. Empty sets are ignored.
    pub const fn new(
        safety_keys: &'static [SafetyKey],
        combinations: &'static [Modifiers],
    ) -> AllowList {
        AllowList {
            safety_keys,
            combinations,
        }
    }

    /// Classifies a single event. The first matching rule wins.
    pub fn classify(&self, event: &KeyEvent) -> Decision {
        if event.kind == EventKind::ModifiersChanged {
            return Decision::Allow;
        }

        if event.modifiers.contains(Modifiers::COMMAND)
            && event
                .key_code
                .and_then(SafetyKey::from_key_code)
                .is_some_and(|key| self.safety_keys.contains(&key))
        {
            return Decision::Allow;
        }

        let held = event.modifiers;
        if self
            .combinations
            .iter()
            .any(|combination| !combination.is_empty() && held.contains(*combination))
        {
            return Decision::Allow;
        }

        Decision::Block
    }
}

impl Default for AllowList {
    fn default() -> Self {
        AllowList::new(DEFAULT_SAFETY_KEYS, DEFAULT_COMBINATIONS)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[cfg(not(windows))]
    const KEY_A: KeyCode = KeyCode(0);
    #[cfg(windows)]
    const KEY_A: KeyCode = KeyCode(0x41);

    fn classify(event: KeyEvent) -> Decision {
        AllowList::default().classify(&event)
    }

    #[test]
    fn modifier_only_change_is_allowed() {
        assert_eq!(classify(KeyEvent::modifiers_changed(Modifiers::NONE)), Decision::Allow);
        assert_eq!(
            classify(KeyEvent::modifiers_changed(Modifiers::SHIFT | Modifiers::CONTROL)),
            Decision::Allow
        );
    }

    #[test]
    fn command_with_safety_key_is_allowed() {
        for key in SafetyKey::ALL {
            let code = key.key_code();
            let down = KeyEvent::key_down(code, Modifiers::COMMAND);
            let up = KeyEvent::key_up(code, Modifiers::COMMAND);
            assert_eq!(classify(down), Decision::Allow, "{key}");
            assert_eq!(classify(up), Decision::Allow, "{key}");
        }
    }

    #[test]
    fn command_with_other_modifiers_and_safety_key_is_allowed() {
        let event = KeyEvent::key_down(
            SafetyKey::Quit.key_code(),
            Modifiers::COMMAND | Modifiers::SHIFT,
        );
        assert_eq!(classify(event), Decision::Allow);
    }

    #[test]
    fn safety_key_without_command_is_blocked() {
        for key in SafetyKey::ALL {
            let code = key.key_code();
            let bare = KeyEvent::key_down(code, Modifiers::NONE);
            let control = KeyEvent::key_down(code, Modifiers::CONTROL);
            assert_eq!(classify(bare), Decision::Block, "{key}");
            assert_eq!(classify(control), Decision::Block, "{key}");
        }
    }

    #[test]
    fn command_with_ordinary_key_is_blocked() {
        assert_eq!(classify(KeyEvent::key_down(KEY_A, Modifiers::COMMAND)), Decision::Block);
    }

    #[test]
    fn command_alt_combination_is_allowed() {
        let event = KeyEvent::key_down(KEY_A, Modifiers::COMMAND | Modifiers::ALT);
        assert_eq!(classify(event), Decision::Allow);
    }

    #[test]
    fn command_control_combination_is_allowed() {
        let held = Modifiers::COMMAND | Modifiers::CONTROL | Modifiers::SHIFT;
        let event = KeyEvent::key_up(KEY_A, held);
        assert_eq!(classify(event), Decision::Allow);
    }

    #[test]
    fn control_alt_without_command_is_blocked() {
        let event = KeyEvent::key_down(KEY_A, Modifiers::CONTROL | Modifiers::ALT);
        assert_eq!(classify(event), Decision::Block);
    }

    #[test]
    fn plain_letter_is_blocked() {
        assert_eq!(classify(KeyEvent::key_down(KEY_A, Modifiers::NONE)), Decision::Block);
        assert_eq!(classify(KeyEvent::key_up(KEY_A, Modifiers::SHIFT)), Decision::Block);
    }

    #[test]
    fn key_event_without_key_code_is_blocked() {
        let event = KeyEvent {
            kind: EventKind::KeyDown,
            key_code: None,
            modifiers: Modifiers::COMMAND,
        };
        assert_eq!(classify(event), Decision::Block);
    }

    #[test]
    fn classification_is_deterministic() {
        let policy = AllowList::default();
        let events = [
            KeyEvent::key_down(KEY_A, Modifiers::NONE),
            KeyEvent::key_down(SafetyKey::Cancel.key_code(), Modifiers::COMMAND),
            KeyEvent::modifiers_changed(Modifiers::ALT),
            KeyEvent::key_up(KEY_A, Modifiers::COMMAND | Modifiers::ALT),
        ];
        for event in events {
            let first = policy.classify(&event);
            for _ in 0..100 {
                assert_eq!(policy.classify(&event), first);
            }
        }
    }

    #[test]
    fn custom_allow_list_restricts_rules() {
        static ONLY_QUIT: [SafetyKey; 1] = [SafetyKey::Quit];
        let policy = AllowList::new(&ONLY_QUIT, &[]);

        let quit = KeyEvent::key_down(SafetyKey::Quit.key_code(), Modifiers::COMMAND);
        let switch =
            KeyEvent::key_down(SafetyKey::SwitchApplication.key_code(), Modifiers::COMMAND);
        let force_quit = KeyEvent::key_down(KEY_A, Modifiers::COMMAND | Modifiers::ALT);

        assert_eq!(policy.classify(&quit), Decision::Allow);
        assert_eq!(policy.classify(&switch), Decision::Block);
        assert_eq!(policy.classify(&force_quit), Decision::Block);
    }

    #[test]
    fn empty_combination_does_not_allow_everything() {
        static EMPTY: [Modifiers; 1] = [Modifiers::NONE];
        let policy = AllowList::new(&[], &EMPTY);
        assert_eq!(policy.classify(&KeyEvent::key_down(KEY_A, Modifiers::NONE)), Decision::Block);
    }

    #[test]
    fn safety_key_lookup_round_trips_platform_codes() {
        for key in SafetyKey::ALL {
            assert_eq!(SafetyKey::from_key_code(key.key_code()), Some(key));
        }
        assert_eq!(SafetyKey::from_key_code(KEY_A), None);
    }
}
