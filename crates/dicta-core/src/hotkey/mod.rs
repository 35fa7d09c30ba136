//! Push-to-talk chord detection.
//!
//! `Chord` describes the required key set ("ctrl+shift"),
//! `ChordTracker` turns a stream of raw key events into exactly-once
//! press/release edges, and `HotkeyMonitor` feeds the tracker from a
//! global rdev listener.

mod monitor;

pub use monitor::HotkeyMonitor;

use anyhow::{Result, bail};
use rdev::Key;
use std::collections::HashSet;

/// A set of keys that must be simultaneously held to arm recording.
///
/// Required keys are stored in canonical form (left variants); the
/// tracker maps right-hand variants onto them.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Chord {
    required: HashSet<Key>,
}

/// Map physical left/right variants onto one canonical logical key.
fn normalize(key: Key) -> Key {
    match key {
        Key::ControlRight => Key::ControlLeft,
        Key::ShiftRight => Key::ShiftLeft,
        Key::MetaRight => Key::MetaLeft,
        Key::AltGr => Key::Alt,
        other => other,
    }
}

/// The other physical variant of a left/right modifier, if any.
fn partner(key: Key) -> Option<Key> {
    match key {
        Key::ControlLeft => Some(Key::ControlRight),
        Key::ControlRight => Some(Key::ControlLeft),
        Key::ShiftLeft => Some(Key::ShiftRight),
        Key::ShiftRight => Some(Key::ShiftLeft),
        Key::MetaLeft => Some(Key::MetaRight),
        Key::MetaRight => Some(Key::MetaLeft),
        Key::Alt => Some(Key::AltGr),
        Key::AltGr => Some(Key::Alt),
        _ => None,
    }
}

fn parse_token(token: &str) -> Result<Key> {
    let key = match token {
        "ctrl" | "control" => Key::ControlLeft,
        "shift" => Key::ShiftLeft,
        "alt" => Key::Alt,
        "super" | "meta" | "win" | "cmd" => Key::MetaLeft,
        "space" => Key::Space,
        "tab" => Key::Tab,
        "a" => Key::KeyA,
        "b" => Key::KeyB,
        "c" => Key::KeyC,
        "d" => Key::KeyD,
        "e" => Key::KeyE,
        "f" => Key::KeyF,
        "g" => Key::KeyG,
        "h" => Key::KeyH,
        "i" => Key::KeyI,
        "j" => Key::KeyJ,
        "k" => Key::KeyK,
        "l" => Key::KeyL,
        "m" => Key::KeyM,
        "n" => Key::KeyN,
        "o" => Key::KeyO,
        "p" => Key::KeyP,
        "q" => Key::KeyQ,
        "r" => Key::KeyR,
        "s" => Key::KeyS,
        "t" => Key::KeyT,
        "u" => Key::KeyU,
        "v" => Key::KeyV,
        "w" => Key::KeyW,
        "x" => Key::KeyX,
        "y" => Key::KeyY,
        "z" => Key::KeyZ,
        other => bail!("Unknown key in hotkey: '{other}'"),
    };
    Ok(key)
}

impl Chord {
    /// Parse a chord like "ctrl+shift" or "ctrl+alt+d".
    pub fn parse(spec: &str) -> Result<Self> {
        let mut required = HashSet::new();
        for token in spec.split('+') {
            let token = token.trim().to_lowercase();
            if token.is_empty() {
                bail!("Empty key in hotkey '{spec}'");
            }
            required.insert(normalize(parse_token(&token)?));
        }
        if required.is_empty() {
            bail!("Hotkey '{spec}' contains no keys");
        }
        Ok(Self { required })
    }
}

impl std::str::FromStr for Chord {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        Chord::parse(s)
    }
}

/// An exactly-once transition of the chord-active condition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChordEdge {
    Pressed,
    Released,
}

/// Edge detector over the stream of raw key events.
///
/// Chord-active is level-triggered (re-evaluated on every event: the
/// normalized pressed set must be a superset of the required set) but
/// edges are emitted exactly once per transition, so holding the
/// chord does not repeat the press.
#[derive(Debug)]
pub struct ChordTracker {
    required: HashSet<Key>,
    pressed: HashSet<Key>,
    active: bool,
}

impl ChordTracker {
    pub fn new(chord: Chord) -> Self {
        Self {
            required: chord.required,
            pressed: HashSet::new(),
            active: false,
        }
    }

    fn is_satisfied(&self) -> bool {
        let normalized: HashSet<Key> = self.pressed.iter().map(|&k| normalize(k)).collect();
        self.required.is_subset(&normalized)
    }

    /// Feed a key-down event. Returns `Some(Pressed)` on the
    /// inactive-to-active edge.
    pub fn key_down(&mut self, key: Key) -> Option<ChordEdge> {
        self.pressed.insert(key);
        if !self.active && self.is_satisfied() {
            self.active = true;
            return Some(ChordEdge::Pressed);
        }
        None
    }

    /// Feed a key-up event. Returns `Some(Released)` when a required
    /// key (either physical variant) leaves an active chord.
    pub fn key_up(&mut self, key: Key) -> Option<ChordEdge> {
        let was_active = self.active;
        self.pressed.remove(&key);
        // A right-variant release must also clear a chord that was
        // satisfied by the left variant, and vice versa.
        if let Some(other) = partner(key) {
            self.pressed.remove(&other);
        }
        if was_active && self.required.contains(&normalize(key)) {
            self.active = false;
            return Some(ChordEdge::Released);
        }
        None
    }

    /// Forget all pressed keys and the active flag without emitting
    /// edges. Called before a synthetic paste keystroke so its
    /// modifier events cannot re-trigger the chord.
    pub fn reset(&mut self) {
        self.pressed.clear();
        self.active = false;
    }

    pub fn is_active(&self) -> bool {
        self.active
    }
}
