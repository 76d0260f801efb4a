pub mod bus;
pub mod combat_log;
pub mod config;
pub mod correlator;
pub mod detector;
pub mod engine;
pub mod pipeline;
pub mod runtime;
pub mod storage;
pub mod summary;

// Re-exports for convenience
pub use bus::{AmountFact, BusMessage, CombatStateChanged, EventBus, MessageKind, Subscriber, SubscriberError};
pub use combat_log::{CombatEvent, RawEvent, RawEventError, UnitFlags};
pub use config::{ConfigError, default_config_path, load_config, load_or_default, save_config};
pub use correlator::TimestampCorrelator;
pub use detector::{DetectorState, HostContext, Session, SessionDetector, StaticHost, TrackingPolicy};
pub use engine::{ConsumerScope, MetricSnapshot, RateEngine};
pub use pipeline::Pipeline;
pub use runtime::{ConsumerId, ManualClock, ManualScheduler, Scheduler, SharedScheduler, SystemClock};
pub use storage::{MemoryStore, SessionStore};
pub use summary::{SessionSummary, SourceTotals};
