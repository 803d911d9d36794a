//! Session lifecycle and bulk workflow management

pub mod orchestrator;
pub mod reports;
pub mod session;
pub mod traits;

pub use orchestrator::BookingOrchestrator;
pub use reports::ReportPeriod;
pub use session::{ConnectionManager, SessionState};
pub use traits::MessageSender;
