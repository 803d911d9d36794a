//! Service modules for dispatch and rendering

pub mod dispatcher;
pub mod pairing;
pub mod report_renderer;

// Re-export service types
pub use dispatcher::MessageDispatcher;
pub use pairing::PairingCodeProvider;
pub use report_renderer::{MonthlyStats, ReportLine};
