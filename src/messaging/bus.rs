use crossbeam_channel::{unbounded, Receiver, Sender};
use log::{debug, info, trace};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use super::{InputEvent, KeyEvent};
use crate::core::keymap::KeyMap;
use crate::core::synth::{SharedNotePool, Trigger};

/// MessageBus carries input events to the note pool. Events are queued by
/// any thread and applied only when the scheduler calls
/// [`MessageBus::process_messages`].
pub struct MessageBus {
    sender: Sender<InputEvent>,
    receiver: Receiver<InputEvent>,
    pool: SharedNotePool,
    keymap: KeyMap,
    channel: usize,
    channels: usize,
    quit: Arc<AtomicBool>,
}

impl MessageBus {
    /// Create a new message bus feeding `pool`. `channels` is the number
    /// of selectable voices.
    pub fn new(pool: SharedNotePool, keymap: KeyMap, channels: usize) -> Self {
        let (sender, receiver) = unbounded();

        MessageBus {
            sender,
            receiver,
            pool,
            keymap,
            channel: 0,
            channels: channels.max(1),
            quit: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Get a sender that can be cloned and passed to the input thread
    pub fn sender(&self) -> Sender<InputEvent> {
        self.sender.clone()
    }

    /// Flag set once a quit event has been processed. Other threads may
    /// also set it to stop the scheduler.
    pub fn quit_flag(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.quit)
    }

    pub fn should_quit(&self) -> bool {
        self.quit.load(Ordering::Acquire)
    }

    pub fn channel(&self) -> usize {
        self.channel
    }

    pub fn pool(&self) -> &SharedNotePool {
        &self.pool
    }

    /// Apply up to `max_messages` pending events. Timestamps later than
    /// `now` are clamped to `now`. Returns how many events were handled.
    pub fn process_messages(&mut self, now: f64, max_messages: usize) -> usize {
        let mut count = 0;

        while count < max_messages {
            let Ok(event) = self.receiver.try_recv() else {
                break;
            };
            count += 1;
            self.handle_message(event, now);
        }
        count
    }

    fn handle_message(&mut self, event: InputEvent, now: f64) {
        match event {
            InputEvent::Key(key) => self.handle_key(key, now),
            InputEvent::Channel(channel) => {
                self.channel = channel.min(self.channels - 1);
                info!("voice channel {} selected", self.channel);
            }
            InputEvent::Panic { timestamp } => {
                let released = self.pool.release_all(clamp_time(timestamp, now));
                info!("released {released} notes");
            }
            InputEvent::Quit => {
                info!("quit requested");
                self.quit.store(true, Ordering::Release);
            }
        }
    }

    fn handle_key(&mut self, event: KeyEvent, now: f64) {
        let Some(key) = self.keymap.lookup(event.symbol) else {
            trace!("ignoring unmapped key {:?}", event.symbol);
            return;
        };
        let time = clamp_time(event.timestamp, now);

        if event.pressed {
            match self.pool.trigger(key, time, self.channel) {
                Trigger::Started(handle) => {
                    trace!("key {key} started in slot {} at {time:.4}s", handle.index())
                }
                Trigger::Retriggered(_) => trace!("key {key} retriggered at {time:.4}s"),
                Trigger::Ignored => {}
                Trigger::Dropped => debug!("note pool full, dropped key {key}"),
            }
        } else if self.pool.release(key, time) {
            trace!("key {key} released at {time:.4}s");
        }
    }
}

fn clamp_time(timestamp: f64, now: f64) -> f64 {
    if timestamp.is_finite() {
        timestamp.min(now)
    } else {
        now
    }
}
