// Messaging - scheduler → host notifications

pub mod channels;
pub mod event;
pub mod listeners;

pub use channels::{EventConsumer, EventProducer, create_event_channel, drain_events};
pub use event::{BeatEvent, MetronomeEvent, StopReason};
pub use listeners::{ListenerId, Listeners};
