/// A raw key transition as delivered by the windowing layer.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct KeyEvent {
    pub symbol: char,
    pub pressed: bool,
    /// Seconds on the engine clock when the transition happened.
    pub timestamp: f64,
}

/// Message types for communication between the input thread and the engine
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum InputEvent {
    Key(KeyEvent),
    /// Select the voice used by subsequent key-downs.
    Channel(usize),
    /// Release every sounding note.
    Panic { timestamp: f64 },
    Quit,
}

impl InputEvent {
    pub fn key_down(symbol: char, timestamp: f64) -> Self {
        InputEvent::Key(KeyEvent {
            symbol,
            pressed: true,
            timestamp,
        })
    }

    pub fn key_up(symbol: char, timestamp: f64) -> Self {
        InputEvent::Key(KeyEvent {
            symbol,
            pressed: false,
            timestamp,
        })
    }
}
