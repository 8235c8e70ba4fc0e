// Listener registry - observers of metronome events
//
// Two kinds of subscribers:
// - the legacy single-slot callbacks (`on_beat`, `on_time_update`), where the
//   last registration replaces the previous one
// - any number of event observers identified by a `ListenerId`

use super::event::MetronomeEvent;

pub type BeatCallback = Box<dyn FnMut(u32, bool) + Send>;
pub type TimeUpdateCallback = Box<dyn FnMut(f64) + Send>;
pub type EventListener = Box<dyn FnMut(&MetronomeEvent) + Send>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ListenerId(u64);

#[derive(Default)]
pub struct Listeners {
    on_beat: Option<BeatCallback>,
    on_time_update: Option<TimeUpdateCallback>,
    observers: Vec<(ListenerId, EventListener)>,
    next_id: u64,
}

impl Listeners {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_on_beat(&mut self, callback: BeatCallback) {
        self.on_beat = Some(callback);
    }

    pub fn set_on_time_update(&mut self, callback: TimeUpdateCallback) {
        self.on_time_update = Some(callback);
    }

    pub fn subscribe(&mut self, listener: EventListener) -> ListenerId {
        let id = ListenerId(self.next_id);
        self.next_id += 1;
        self.observers.push((id, listener));
        id
    }

    /// Returns false if the id was not registered
    pub fn unsubscribe(&mut self, id: ListenerId) -> bool {
        let before = self.observers.len();
        self.observers.retain(|(other, _)| *other != id);
        self.observers.len() != before
    }

    /// Deliver an event to every matching subscriber
    pub fn emit(&mut self, event: &MetronomeEvent) {
        match event {
            MetronomeEvent::Beat(beat) => {
                if let Some(callback) = self.on_beat.as_mut() {
                    callback(beat.beat_in_measure, beat.accent);
                }
            }
            MetronomeEvent::TimeUpdate { elapsed } => {
                if let Some(callback) = self.on_time_update.as_mut() {
                    callback(*elapsed);
                }
            }
            _ => {}
        }

        for (_, listener) in self.observers.iter_mut() {
            listener(event);
        }
    }
}

impl std::fmt::Debug for Listeners {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Listeners")
            .field("on_beat", &self.on_beat.is_some())
            .field("on_time_update", &self.on_time_update.is_some())
            .field("observers", &self.observers.len())
            .finish()
    }
}
