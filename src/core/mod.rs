pub mod audio;
pub mod clock;
pub mod keymap;
pub mod oscillator;
pub mod scheduler;
pub mod synth;
pub mod voice;

pub use scheduler::{Scheduler, SchedulerConfig, TickReport};
pub use synth::{Mixer, SharedNotePool};
