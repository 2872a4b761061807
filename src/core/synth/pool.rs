use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use crate::core::oscillator::{KeyId, Note};

/// Stable reference to a pool slot. Goes stale once the slot is freed,
/// even if a new note is later allocated into the same index.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct NoteHandle {
    index: usize,
    generation: u32,
}

impl NoteHandle {
    fn new(index: usize, generation: u32) -> Self {
        Self { index, generation }
    }

    pub fn index(&self) -> usize {
        self.index
    }
}

/// Result of a key-down.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Trigger {
    /// A new note took a free slot.
    Started(NoteHandle),
    /// A releasing note for the key was re-entered into its attack.
    Retriggered(NoteHandle),
    /// The key already has a sounding note (keyboard auto-repeat).
    Ignored,
    /// Every slot is taken; the key-down is discarded.
    Dropped,
}

#[derive(Debug, Clone, Default)]
struct Slot {
    generation: u32,
    note: Option<Note>,
}

/// Fixed-capacity table of live notes, at most one per key.
#[derive(Debug, Clone)]
pub struct NotePool {
    slots: Vec<Slot>,
    live: usize,
}

impl NotePool {
    pub fn new(capacity: usize) -> Self {
        Self {
            slots: vec![Slot::default(); capacity],
            live: 0,
        }
    }

    pub fn capacity(&self) -> usize {
        self.slots.len()
    }

    pub fn len(&self) -> usize {
        self.live
    }

    pub fn is_empty(&self) -> bool {
        self.live == 0
    }

    /// Live note for `key`, if any.
    pub fn find(&self, key: KeyId) -> Option<(NoteHandle, &Note)> {
        self.iter().find(|(_, note)| note.key == key)
    }

    pub fn get(&self, handle: NoteHandle) -> Option<&Note> {
        let slot = self.slots.get(handle.index)?;
        if slot.generation != handle.generation {
            return None;
        }
        slot.note.as_ref()
    }

    /// Start, retrigger or ignore a note for `key` at `time`.
    pub fn trigger(&mut self, key: KeyId, time: f64, channel: usize) -> Trigger {
        if let Some(index) = self.index_of(key) {
            let slot = &mut self.slots[index];
            let handle = NoteHandle::new(index, slot.generation);
            return match slot.note.as_mut() {
                Some(note) if note.is_released() => {
                    // held again, even when the release shares this timestamp
                    note.on_time = time;
                    note.off_time = None;
                    Trigger::Retriggered(handle)
                }
                _ => Trigger::Ignored,
            };
        }

        let Some(index) = self.slots.iter().position(|slot| slot.note.is_none()) else {
            return Trigger::Dropped;
        };
        let slot = &mut self.slots[index];
        slot.note = Some(Note::new(key, time, channel));
        self.live += 1;
        Trigger::Started(NoteHandle::new(index, slot.generation))
    }

    /// Mark the sounding note for `key` as released at `time`.
    /// Returns false, leaving the pool untouched, if there is nothing to release.
    pub fn release(&mut self, key: KeyId, time: f64) -> bool {
        let Some(index) = self.index_of(key) else {
            return false;
        };
        match self.slots[index].note.as_mut() {
            Some(note) if note.is_sounding() => {
                note.off_time = Some(time);
                true
            }
            _ => false,
        }
    }

    /// Release every sounding note. Returns how many were released.
    pub fn release_all(&mut self, time: f64) -> usize {
        let mut released = 0;
        for note in self.slots.iter_mut().filter_map(|slot| slot.note.as_mut()) {
            if note.is_sounding() {
                note.off_time = Some(time);
                released += 1;
            }
        }
        released
    }

    /// Free a finished note. Refuses stale handles and notes that were
    /// never released, so a held note cannot be dropped by mistake.
    pub fn reap(&mut self, handle: NoteHandle) -> Option<Note> {
        let slot = self.slots.get_mut(handle.index)?;
        if slot.generation != handle.generation {
            return None;
        }
        match slot.note {
            Some(note) if note.is_released() => {
                slot.note = None;
                slot.generation = slot.generation.wrapping_add(1);
                self.live -= 1;
                Some(note)
            }
            _ => None,
        }
    }

    /// Drop every note immediately.
    pub fn clear(&mut self) {
        for slot in &mut self.slots {
            if slot.note.take().is_some() {
                slot.generation = slot.generation.wrapping_add(1);
            }
        }
        self.live = 0;
    }

    /// Live notes in slot order.
    pub fn iter(&self) -> impl Iterator<Item = (NoteHandle, &Note)> + '_ {
        self.slots.iter().enumerate().filter_map(|(index, slot)| {
            slot.note
                .as_ref()
                .map(|note| (NoteHandle::new(index, slot.generation), note))
        })
    }

    fn index_of(&self, key: KeyId) -> Option<usize> {
        self.slots
            .iter()
            .position(|slot| matches!(slot.note, Some(note) if note.key == key))
    }
}

/// The note pool shared between the input dispatcher and the mixer.
#[derive(Debug, Clone)]
pub struct SharedNotePool {
    inner: Arc<Mutex<NotePool>>,
}

impl SharedNotePool {
    pub fn new(capacity: usize) -> Self {
        Self {
            inner: Arc::new(Mutex::new(NotePool::new(capacity))),
        }
    }

    /// Lock the pool. A panic elsewhere while holding the lock leaves only
    /// plain note data behind, so a poisoned lock is recovered.
    pub fn lock(&self) -> MutexGuard<'_, NotePool> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn trigger(&self, key: KeyId, time: f64, channel: usize) -> Trigger {
        self.lock().trigger(key, time, channel)
    }

    pub fn release(&self, key: KeyId, time: f64) -> bool {
        self.lock().release(key, time)
    }

    pub fn release_all(&self, time: f64) -> usize {
        self.lock().release_all(time)
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn trigger_takes_first_free_slot() {
        let mut pool = NotePool::new(4);
        assert!(matches!(pool.trigger(7, 0.0, 0), Trigger::Started(h) if h.index() == 0));
        assert!(matches!(pool.trigger(2, 0.0, 1), Trigger::Started(h) if h.index() == 1));
        assert_eq!(pool.len(), 2);
        assert_eq!(pool.find(2).map(|(_, n)| n.channel), Some(1));
    }

    #[test]
    fn one_note_per_key() {
        let mut pool = NotePool::new(4);
        pool.trigger(3, 0.0, 0);
        assert_eq!(pool.trigger(3, 0.1, 0), Trigger::Ignored);
        assert_eq!(pool.len(), 1);
        assert_eq!(pool.find(3).map(|(_, n)| n.on_time), Some(0.0));
    }

    #[test]
    fn release_is_idempotent() {
        let mut pool = NotePool::new(2);
        pool.trigger(1, 0.0, 0);
        assert!(pool.release(1, 0.5));
        assert!(!pool.release(1, 0.9));
        assert_eq!(pool.find(1).map(|(_, n)| n.off_time), Some(Some(0.5)));
        assert!(!pool.release(9, 1.0));
    }

    #[test]
    fn retrigger_reuses_slot_mid_release() {
        let mut pool = NotePool::new(2);
        let Trigger::Started(first) = pool.trigger(4, 0.0, 0) else {
            panic!("not started")
        };
        pool.release(4, 0.5);
        let Trigger::Retriggered(again) = pool.trigger(4, 0.6, 1) else {
            panic!("not retriggered")
        };
        assert_eq!(first, again);
        let note = pool.get(again).unwrap();
        assert_eq!(note.on_time, 0.6);
        assert!(note.is_sounding());
        // channel is kept from the original key-down
        assert_eq!(note.channel, 0);
    }

    #[test]
    fn restrike_at_release_instant_is_held() {
        let mut pool = NotePool::new(2);
        pool.trigger(4, 0.0, 0);
        pool.release(4, 1.0);
        assert!(matches!(pool.trigger(4, 1.0, 0), Trigger::Retriggered(_)));

        let (handle, note) = pool.find(4).unwrap();
        assert!(note.is_sounding());
        assert_eq!(note.off_time, None);
        assert!(pool.reap(handle).is_none());
        // a second key-down is auto-repeat, not another retrigger
        assert_eq!(pool.trigger(4, 1.0, 0), Trigger::Ignored);
    }

    #[test]
    fn full_pool_drops_extra_triggers() {
        let mut pool = NotePool::new(2);
        pool.trigger(0, 0.0, 0);
        pool.trigger(1, 0.0, 0);
        let before: Vec<Note> = pool.iter().map(|(_, n)| *n).collect();
        assert_eq!(pool.trigger(2, 0.1, 0), Trigger::Dropped);
        let after: Vec<Note> = pool.iter().map(|(_, n)| *n).collect();
        assert_eq!(before, after);
    }

    #[test]
    fn reap_only_released_notes() {
        let mut pool = NotePool::new(2);
        let Trigger::Started(handle) = pool.trigger(0, 0.0, 0) else {
            panic!("not started")
        };
        assert!(pool.reap(handle).is_none());
        pool.release(0, 1.0);
        assert!(pool.reap(handle).is_some());
        assert!(pool.is_empty());
    }

    #[test]
    fn stale_handles_do_not_touch_reused_slots() {
        let mut pool = NotePool::new(1);
        let Trigger::Started(old) = pool.trigger(0, 0.0, 0) else {
            panic!("not started")
        };
        pool.release(0, 0.1);
        pool.reap(old);

        let Trigger::Started(new) = pool.trigger(5, 0.2, 0) else {
            panic!("not started")
        };
        assert_eq!(old.index(), new.index());
        pool.release(5, 0.3);
        assert!(pool.get(old).is_none());
        assert!(pool.reap(old).is_none());
        assert_eq!(pool.len(), 1);
    }

    #[test]
    fn release_all_and_clear() {
        let mut pool = NotePool::new(4);
        pool.trigger(0, 0.0, 0);
        pool.trigger(1, 0.0, 0);
        pool.release(1, 0.2);
        assert_eq!(pool.release_all(0.5), 1);
        assert!(pool.iter().all(|(_, n)| n.is_released()));
        pool.clear();
        assert!(pool.is_empty());
        assert_eq!(pool.iter().count(), 0);
    }

    #[test]
    fn shared_pool_serialises_access() {
        let pool = SharedNotePool::new(16);
        let threads: Vec<_> = (0..4)
            .map(|t| {
                let pool = pool.clone();
                std::thread::spawn(move || {
                    for k in 0..4 {
                        pool.trigger(t * 4 + k, 0.0, 0);
                    }
                })
            })
            .collect();
        for thread in threads {
            thread.join().unwrap();
        }
        assert_eq!(pool.len(), 16);
    }
}
