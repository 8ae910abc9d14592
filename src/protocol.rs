// author: kodeholic (powered by Claude)

pub mod event;
pub mod relay;
pub mod signal;

pub use event::{ClientEvent, ServerEvent, SourceDescriptor, SourceKind};
pub use relay::{ws_handler, AppState};
pub use signal::SignalPayload;
