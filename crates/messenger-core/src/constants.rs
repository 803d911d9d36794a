/// Messaging service constants

/// Upper bound of retained audit log entries
pub const EVENT_LOG_CAPACITY: usize = 100;

/// Minimum number of digits a recipient address must keep after normalization
pub const MIN_ADDRESS_DIGITS: usize = 10;

/// Suffix appended to bare numbers to form a protocol address
pub const DEFAULT_ADDRESS_SUFFIX: &str = "@s.whatsapp.net";

/// Numbers with this prefix and exact length skip the registration lookup
pub const DEFAULT_SYNTHETIC_PREFIX: &str = "5511";
pub const DEFAULT_SYNTHETIC_LENGTH: usize = 13;

/// Recipient of aggregate reports
pub const DEFAULT_OPERATOR_ADDRESS: &str = "5511998761833";

pub const DEFAULT_BUSINESS_NAME: &str = "Barbearia Nativa";

/// Number of busiest days listed in the monthly report
pub const TOP_DAYS_LIMIT: usize = 5;
