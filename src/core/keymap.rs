use anyhow::{bail, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::core::oscillator::KeyId;

/// Two-row piano layout: bottom letter row for naturals, the row above for sharps.
pub const DEFAULT_LAYOUT: &str = "zsxcfvgbnjmk,l./";

/// Fixed lookup from keyboard symbols to dense key ids.
#[derive(Debug, Clone)]
pub struct KeyMap {
    keys: HashMap<char, KeyId>,
    len: usize,
}

impl KeyMap {
    /// Build a map where the n-th symbol of `layout` becomes key id `n`.
    /// Symbols are case-insensitive. Digits are reserved for voice selection.
    pub fn from_layout(layout: &str) -> Result<Self> {
        let mut keys = HashMap::new();
        for (id, symbol) in layout.chars().enumerate() {
            if symbol.is_ascii_digit() {
                bail!("key layout {layout:?} uses digit {symbol:?}, which selects voices");
            }
            let symbol = symbol.to_ascii_lowercase();
            if keys.insert(symbol, id).is_some() {
                bail!("key layout {layout:?} maps {symbol:?} twice");
            }
        }
        if keys.is_empty() {
            bail!("key layout is empty");
        }

        let len = keys.len();
        Ok(Self { keys, len })
    }

    /// Key id for `symbol`, or `None` for keys that play nothing.
    pub fn lookup(&self, symbol: char) -> Option<KeyId> {
        self.keys.get(&symbol.to_ascii_lowercase()).copied()
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }
}

impl Default for KeyMap {
    fn default() -> Self {
        let keys: HashMap<char, KeyId> = DEFAULT_LAYOUT
            .chars()
            .enumerate()
            .map(|(id, c)| (c, id))
            .collect();
        let len = keys.len();
        Self { keys, len }
    }
}

/// Equal-tempered scale anchored at key id 0.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Tuning {
    pub base_frequency: f64,
}

impl Tuning {
    pub const fn new(base_frequency: f64) -> Self {
        Self { base_frequency }
    }

    /// Frequency of `key` shifted by `semitones`.
    pub fn frequency(&self, key: KeyId, semitones: i32) -> f64 {
        let steps = key as f64 + semitones as f64;
        self.base_frequency * 2.0f64.powf(steps / 12.0)
    }
}

impl Default for Tuning {
    fn default() -> Self {
        Self::new(220.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_layout_has_sixteen_dense_keys() {
        let map = KeyMap::default();
        assert_eq!(map.len(), 16);
        assert_eq!(map.lookup('z'), Some(0));
        assert_eq!(map.lookup('Z'), Some(0));
        assert_eq!(map.lookup('/'), Some(15));
        assert_eq!(map.lookup('q'), None);
    }

    #[test]
    fn layout_rejects_duplicates_and_digits() {
        assert!(KeyMap::from_layout("zxZ").is_err());
        assert!(KeyMap::from_layout("").is_err());
        assert!(KeyMap::from_layout("zx3c").is_err());
        assert_eq!(KeyMap::from_layout("qwe").unwrap().lookup('e'), Some(2));
    }

    #[test]
    fn octave_doubles_frequency() {
        let tuning = Tuning::new(220.0);
        assert!((tuning.frequency(0, 0) - 220.0).abs() < 1e-9);
        assert!((tuning.frequency(0, 12) - 440.0).abs() < 1e-9);
        assert!((tuning.frequency(12, 12) - 880.0).abs() < 1e-9);
        assert!((tuning.frequency(3, 0) - 261.6255653).abs() < 1e-6);
    }
}
