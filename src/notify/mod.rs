//! Chat-facing side of the monitor: message text, delivery and user commands.

pub mod announcer;
pub mod commands;
pub mod dispatcher;
pub mod format;

pub use announcer::Announcer;
pub use commands::CommandHandler;
pub use dispatcher::{Dispatcher, NotifySink, WebhookSink};
pub use format::MessageFormatter;
