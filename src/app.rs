use crossbeam_channel::Sender;

use log::warn;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use crate::core::clock::{Clock, SystemClock};
use crate::core::voice::Instrument;
use crate::messaging::{InputEvent, KeyEvent};

/// Window that turns keyboard input into engine events. It never touches
/// the note pool directly; everything goes through the message bus.
pub struct KeyboardApp {
    events: Sender<InputEvent>,
    clock: SystemClock,
    quit: Arc<AtomicBool>,
    layout: String,
    instruments: Vec<Instrument>,
    channel: usize,
    focused: bool,
}

impl KeyboardApp {
    pub fn new(
        events: Sender<InputEvent>,
        clock: SystemClock,
        quit: Arc<AtomicBool>,
        layout: String,
        instruments: Vec<Instrument>,
    ) -> Self {
        Self {
            events,
            clock,
            quit,
            layout,
            instruments,
            channel: 0,
            focused: true,
        }
    }

    fn send(&self, event: InputEvent) {
        if self.events.send(event).is_err() {
            warn!("engine stopped, dropping {event:?}");
        }
    }

    fn handle_input(&mut self, ctx: &egui::Context) {
        let (events, focused) = ctx.input(|i| (i.events.clone(), i.focused));
        let now = self.clock.now();

        // key-ups are lost while unfocused, so let go of everything
        if self.focused && !focused {
            self.send(InputEvent::Panic { timestamp: now });
        }
        self.focused = focused;

        for event in events {
            let egui::Event::Key { key, pressed, repeat, .. } = event else {
                continue;
            };
            if repeat {
                continue;
            }

            match key {
                egui::Key::Escape if pressed => {
                    self.send(InputEvent::Quit);
                    self.quit.store(true, Ordering::Release);
                }
                egui::Key::Space if pressed => self.send(InputEvent::Panic { timestamp: now }),
                _ => match key_symbol(key) {
                    Some(digit @ '1'..='9') => {
                        if pressed {
                            let last = self.instruments.len().saturating_sub(1);
                            let channel = (digit as usize - '1' as usize).min(last);
                            self.channel = channel;
                            self.send(InputEvent::Channel(channel));
                        }
                    }
                    Some(symbol) => self.send(InputEvent::Key(KeyEvent {
                        symbol,
                        pressed,
                        timestamp: now,
                    })),
                    None => {}
                },
            }
        }
    }
}

impl eframe::App for KeyboardApp {
    fn update(&mut self, ctx: &egui::Context, _frame: &mut eframe::Frame) {
        self.handle_input(ctx);

        let mut selected = None;
        egui::CentralPanel::default().show(ctx, |ui| {
            ui.heading("keysynth");
            ui.separator();
            ui.label(format!("Play: {}", self.layout));
            ui.horizontal(|ui| {
                ui.label("Voice:");
                for (index, instrument) in self.instruments.iter().enumerate() {
                    let text = format!("{} {:?}", index + 1, instrument);
                    if ui.selectable_label(index == self.channel, text).clicked() {
                        selected = Some(index);
                    }
                }
            });
            ui.label("Space releases all notes, Esc quits.");
        });

        if let Some(channel) = selected {
            self.channel = channel;
            self.send(InputEvent::Channel(channel));
        }

        if self.quit.load(Ordering::Acquire) {
            ctx.send_viewport_cmd(egui::ViewportCommand::Close);
        }

        // Always request a repaint so key events are polled promptly
        ctx.request_repaint();
    }
}

/// Character a key produces on a US layout, for the keys the engine cares about.
pub fn key_symbol(key: egui::Key) -> Option<char> {
    match key {
        egui::Key::Comma => Some(','),
        egui::Key::Period => Some('.'),
        egui::Key::Slash => Some('/'),
        egui::Key::Semicolon => Some(';'),
        _ => {
            let mut chars = key.name().chars();
            match (chars.next(), chars.next()) {
                (Some(c), None) if c.is_ascii_alphanumeric() => Some(c.to_ascii_lowercase()),
                _ => None,
            }
        }
    }
}
