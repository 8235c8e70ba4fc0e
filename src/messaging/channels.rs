// Communication channels lock-free

use crate::messaging::event::MetronomeEvent;
use ringbuf::{HeapRb, traits::Split};

pub type EventProducer = ringbuf::HeapProd<MetronomeEvent>;
pub type EventConsumer = ringbuf::HeapCons<MetronomeEvent>;

pub fn create_event_channel(capacity: usize) -> (EventProducer, EventConsumer) {
    let rb = HeapRb::<MetronomeEvent>::new(capacity.max(1));
    rb.split()
}

/// Drain everything currently queued
pub fn drain_events(consumer: &mut EventConsumer) -> Vec<MetronomeEvent> {
    let mut events = Vec::new();
    while let Some(event) = ringbuf::traits::Consumer::try_pop(consumer) {
        events.push(event);
    }
    events
}
