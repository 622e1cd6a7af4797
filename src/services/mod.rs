pub mod reaper;
pub mod run_lock;
pub mod templates;

pub use reaper::{ReaperConfig, StaleReaper};
pub use run_lock::{RunLock, RunLockError};
pub use templates::{MessageContext, MessageTemplates, TemplateError};
