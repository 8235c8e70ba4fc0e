// Audio module - click sinks, the CPAL backend and offline rendering

pub mod click;
pub mod engine;
pub mod export;
pub mod parameters;
pub mod sink;
pub mod timing;
pub mod virtual_sink;

pub use click::{ClickRenderer, ClickSound, ClickVoice};
pub use engine::CpalClickSink;
pub use export::{ExportSummary, OfflineRenderer, OfflineSink};
pub use sink::{ClickSink, ClickType};
pub use timing::AudioTiming;
pub use virtual_sink::{ManualClock, ScheduledClick, VirtualSink};
