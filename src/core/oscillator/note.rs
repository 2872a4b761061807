use super::envelope::is_released;

/// Dense key index, `0..key_count`.
pub type KeyId = usize;

/// A single sounding instance of a key press.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Note {
    pub key: KeyId,
    /// Time of the most recent trigger.
    pub on_time: f64,
    /// Time of the release, `None` while the key is held.
    pub off_time: Option<f64>,
    /// Index of the voice that renders this note.
    pub channel: usize,
}

impl Note {
    pub fn new(key: KeyId, on_time: f64, channel: usize) -> Self {
        Self {
            key,
            on_time,
            off_time: None,
            channel,
        }
    }

    /// Key is held: never released, or triggered again after the last release.
    pub fn is_sounding(&self) -> bool {
        !self.is_released()
    }

    pub fn is_released(&self) -> bool {
        is_released(self.on_time, self.off_time)
    }
}
