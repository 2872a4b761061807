pub mod mixer;
pub mod pool;

pub use mixer::Mixer;
pub use pool::{NoteHandle, NotePool, SharedNotePool, Trigger};
