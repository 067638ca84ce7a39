/// A single note event in a piano sequence.
use serde::{Deserialize, Serialize};

/// Default velocity for newly created notes.
const DEFAULT_VELOCITY: u8 = 100;

/// A note keyed by a stable id.
///
/// Positions and lengths are in ticks.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Note {
    pub id: u64,
    /// MIDI key number.
    pub key: i32,
    pub beat: u32,
    pub length: u32,
    pub velocity: u8,
}

impl Note {
    pub fn new(id: u64, key: i32, beat: u32, length: u32) -> Self {
        Self {
            id,
            key,
            beat,
            length,
            velocity: DEFAULT_VELOCITY,
        }
    }

    pub fn with_velocity(mut self, velocity: u8) -> Self {
        self.velocity = velocity;
        self
    }

    /// Copy of this note moved by `ticks` and `keys`, saturating at the
    /// bounds of each field.
    pub fn shifted(&self, ticks: i64, keys: i32) -> Self {
        let beat = i64::from(self.beat)
            .saturating_add(ticks)
            .clamp(0, i64::from(u32::MAX)) as u32;
        Self {
            beat,
            key: self.key.saturating_add(keys),
            ..self.clone()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_uses_default_velocity() {
        let note = Note::new(1, 60, 0, 96);
        assert_eq!(note.velocity, 100);
        assert_eq!(note.with_velocity(20).velocity, 20);
    }

    #[test]
    fn test_shifted_keeps_id_and_length() {
        let note = Note::new(3, 60, 96, 48);
        let moved = note.shifted(24, -2);
        assert_eq!(moved.id, 3);
        assert_eq!(moved.beat, 120);
        assert_eq!(moved.key, 58);
        assert_eq!(moved.length, 48);
    }

    #[test]
    fn test_shifted_clamps_at_zero() {
        let note = Note::new(1, 60, 10, 48);
        assert_eq!(note.shifted(-100, 0).beat, 0);
    }

    #[test]
    fn test_shifted_saturates_on_extreme_offsets() {
        let note = Note::new(1, i32::MAX, u32::MAX, 48);
        let moved = note.shifted(i64::MAX, 1);
        assert_eq!(moved.key, i32::MAX);
        assert_eq!(moved.beat, u32::MAX);
        assert_eq!(Note::new(1, i32::MIN, 0, 48).shifted(i64::MIN, -1).key, i32::MIN);
    }
}
