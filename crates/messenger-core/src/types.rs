//! Domain records consumed by the messaging workflows

use serde::{de, Deserialize, Deserializer, Serialize, Serializer};
use serde_json::{Map, Value};
use chrono::{DateTime, Local, NaiveDate, SecondsFormat, Utc};
use std::fmt;

/// Lifecycle status of a booking.
///
/// Stored as a free-form string; labels this service does not know are kept
/// verbatim so a whole-collection rewrite never loses them.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum BookingStatus {
    Pending,
    /// Created by the booking form, not yet handled
    Scheduled,
    Confirmed,
    Cancelled,
    Other(String),
}

impl BookingStatus {
    pub fn as_str(&self) -> &str {
        match self {
            Self::Pending => "pending",
            Self::Scheduled => "scheduled",
            Self::Confirmed => "confirmed",
            Self::Cancelled => "cancelled",
            Self::Other(label) => label,
        }
    }

    /// Pending and scheduled bookings still wait for a confirmation
    pub fn is_open(&self) -> bool {
        matches!(self, Self::Pending | Self::Scheduled)
    }
}

impl From<String> for BookingStatus {
    fn from(label: String) -> Self {
        match label.trim().to_lowercase().as_str() {
            "pending" | "pendente" => Self::Pending,
            "scheduled" | "agendado" => Self::Scheduled,
            "confirmed" | "confirmado" => Self::Confirmed,
            "cancelled" | "canceled" | "cancelado" => Self::Cancelled,
            _ => Self::Other(label),
        }
    }
}

impl From<BookingStatus> for String {
    fn from(status: BookingStatus) -> Self {
        match status {
            BookingStatus::Other(label) => label,
            known => known.as_str().to_string(),
        }
    }
}

impl fmt::Display for BookingStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Key spelling a booking record was written with
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FieldNaming {
    #[default]
    English,
    /// Portuguese keys and status labels of the booking form
    Legacy,
}

impl BookingStatus {
    /// Label to store for this status in a record of the given naming
    pub fn label(&self, naming: FieldNaming) -> &str {
        match (naming, self) {
            (FieldNaming::Legacy, Self::Pending) => "pendente",
            (FieldNaming::Legacy, Self::Scheduled) => "Agendado",
            (FieldNaming::Legacy, Self::Confirmed) => "confirmado",
            (FieldNaming::Legacy, Self::Cancelled) => "cancelado",
            (_, status) => status.as_str(),
        }
    }
}

/// Accepted keys of one typed booking field
struct FieldKeys {
    english: &'static str,
    legacy: &'static [&'static str],
}

impl FieldKeys {
    /// Key already present in `record`, if any
    fn find(&self, record: &Map<String, Value>) -> Option<&'static str> {
        std::iter::once(self.english)
            .chain(self.legacy.iter().copied())
            .find(|key| record.contains_key(*key))
    }

    fn get<'a>(&self, record: &'a Map<String, Value>) -> Option<&'a Value> {
        self.find(record).and_then(|key| record.get(key))
    }

    fn name(&self, naming: FieldNaming) -> &'static str {
        match naming {
            FieldNaming::English => self.english,
            FieldNaming::Legacy => self.legacy.first().copied().unwrap_or(self.english),
        }
    }

    fn is_legacy_in(&self, record: &Map<String, Value>) -> bool {
        self.legacy.iter().any(|key| record.contains_key(*key))
    }
}

const ID: FieldKeys = FieldKeys { english: "id", legacy: &[] };
const CLIENT_ID: FieldKeys = FieldKeys { english: "client_id", legacy: &["cliente_id"] };
const SERVICE_ID: FieldKeys = FieldKeys { english: "service_id", legacy: &["servico_id"] };
const DATE: FieldKeys = FieldKeys { english: "date", legacy: &["data_agendamento"] };
const TIME_SLOT: FieldKeys = FieldKeys { english: "time_slot", legacy: &["horario", "horario_agendamento"] };
const STATUS: FieldKeys = FieldKeys { english: "status", legacy: &[] };
const CONFIRMED_AT: FieldKeys = FieldKeys { english: "confirmed_at", legacy: &["confirmado_em"] };
const CANCELLED_AT: FieldKeys = FieldKeys { english: "cancelled_at", legacy: &["cancelado_em"] };
const CANCELLATION_REASON: FieldKeys = FieldKeys { english: "cancellation_reason", legacy: &["motivo_cancelamento"] };

/// Appointment record from the bookings collection.
///
/// The JSON object a booking was read from is kept. Writing it back only
/// touches the fields that changed since, under the key and status label
/// spelling the record already used, so records owned by the booking form
/// survive a whole-collection rewrite unchanged.
#[derive(Debug, Clone, PartialEq)]
pub struct Booking {
    pub id: i64,
    pub client_id: i64,
    pub service_id: i64,
    /// Calendar date as `YYYY-MM-DD`
    pub date: String,
    pub time_slot: String,
    pub status: BookingStatus,
    pub confirmed_at: Option<DateTime<Utc>>,
    pub cancelled_at: Option<DateTime<Utc>>,
    pub cancellation_reason: Option<String>,
    naming: FieldNaming,
    source: Map<String, Value>,
    /// Record that could not be read; written back exactly as found
    unreadable: Option<Value>,
}

impl Booking {
    /// New pending booking with English keys
    pub fn new(id: i64, client_id: i64, service_id: i64, date: &str, time_slot: &str) -> Self {
        Self {
            id,
            client_id,
            service_id,
            date: date.to_string(),
            time_slot: time_slot.to_string(),
            status: BookingStatus::Pending,
            confirmed_at: None,
            cancelled_at: None,
            cancellation_reason: None,
            naming: FieldNaming::English,
            source: Map::new(),
            unreadable: None,
        }
    }

    /// Placeholder for a stored record that failed to parse.
    ///
    /// It is dated nowhere, so no flow or listing selects it, and the whole
    /// collection rewrite stores it unchanged.
    pub fn unreadable(raw: Value) -> Self {
        let id = raw.get("id").and_then(Value::as_i64).unwrap_or_default();
        Self {
            date: String::new(),
            status: BookingStatus::Other(String::new()),
            unreadable: Some(raw),
            ..Self::new(id, 0, 0, "", "")
        }
    }

    pub fn is_unreadable(&self) -> bool {
        self.unreadable.is_some()
    }

    fn from_source(source: Map<String, Value>) -> std::result::Result<Self, String> {
        let int = |keys: &FieldKeys| {
            keys.get(&source)
                .and_then(|v| v.as_i64().or_else(|| v.as_str().and_then(|s| s.trim().parse().ok())))
                .ok_or_else(|| format!("booking field `{}` missing or not an integer", keys.english))
        };
        let text = |keys: &FieldKeys| keys.get(&source).and_then(Value::as_str).map(str::to_string);
        let timestamp = |keys: &FieldKeys| {
            keys.get(&source)
                .and_then(Value::as_str)
                .and_then(|s| DateTime::parse_from_rfc3339(s).ok())
                .map(|dt| dt.with_timezone(&Utc))
        };

        let naming = if [&CLIENT_ID, &SERVICE_ID, &DATE, &TIME_SLOT].iter().any(|k| k.is_legacy_in(&source)) {
            FieldNaming::Legacy
        } else {
            FieldNaming::English
        };

        Ok(Self {
            id: int(&ID)?,
            client_id: int(&CLIENT_ID)?,
            service_id: int(&SERVICE_ID)?,
            date: text(&DATE).ok_or("booking field `date` missing")?,
            time_slot: text(&TIME_SLOT).unwrap_or_default(),
            status: text(&STATUS).ok_or("booking field `status` missing")?.into(),
            confirmed_at: timestamp(&CONFIRMED_AT),
            cancelled_at: timestamp(&CANCELLED_AT),
            cancellation_reason: text(&CANCELLATION_REASON),
            naming,
            source,
            unreadable: None,
        })
    }

    /// The record as it should be stored now
    fn to_source(&self) -> Map<String, Value> {
        let read = Self::from_source(self.source.clone()).ok();
        let mut record = self.source.clone();

        let mut put = |keys: &FieldKeys, changed: bool, value: Option<Value>| {
            if !changed {
                return;
            }
            let key = keys.find(&record).unwrap_or(keys.name(self.naming)).to_string();
            match value {
                Some(value) => {
                    record.insert(key, value);
                }
                None => {
                    record.remove(&key);
                }
            }
        };
        let stamp = |at: &Option<DateTime<Utc>>| {
            at.map(|dt| Value::String(dt.to_rfc3339_opts(SecondsFormat::Millis, true)))
        };

        put(&ID, read.as_ref().map_or(true, |r| r.id != self.id), Some(self.id.into()));
        put(&CLIENT_ID, read.as_ref().map_or(true, |r| r.client_id != self.client_id), Some(self.client_id.into()));
        put(&SERVICE_ID, read.as_ref().map_or(true, |r| r.service_id != self.service_id), Some(self.service_id.into()));
        put(&DATE, read.as_ref().map_or(true, |r| r.date != self.date), Some(self.date.clone().into()));
        put(&TIME_SLOT, read.as_ref().map_or(true, |r| r.time_slot != self.time_slot), Some(self.time_slot.clone().into()));
        put(
            &STATUS,
            read.as_ref().map_or(true, |r| r.status != self.status),
            Some(self.status.label(self.naming).into()),
        );
        put(&CONFIRMED_AT, read.as_ref().map_or(true, |r| r.confirmed_at != self.confirmed_at), stamp(&self.confirmed_at));
        put(&CANCELLED_AT, read.as_ref().map_or(true, |r| r.cancelled_at != self.cancelled_at), stamp(&self.cancelled_at));
        put(
            &CANCELLATION_REASON,
            read.as_ref().map_or(true, |r| r.cancellation_reason != self.cancellation_reason),
            self.cancellation_reason.clone().map(Value::String),
        );

        record
    }

    pub fn naming(&self) -> FieldNaming {
        self.naming
    }

    /// Raw value of any stored field, including ones this service does not model
    pub fn field(&self, key: &str) -> Option<&Value> {
        self.source.get(key)
    }

    /// Parsed booking date; `None` when the stored value is malformed
    pub fn date_naive(&self) -> Option<NaiveDate> {
        NaiveDate::parse_from_str(self.date.trim(), "%Y-%m-%d").ok()
    }

    pub fn is_on(&self, day: NaiveDate) -> bool {
        self.date_naive() == Some(day)
    }

    pub fn mark_confirmed(&mut self, at: DateTime<Utc>) {
        self.status = BookingStatus::Confirmed;
        self.confirmed_at = Some(at);
    }

    pub fn mark_cancelled(&mut self, at: DateTime<Utc>, reason: &str) {
        self.status = BookingStatus::Cancelled;
        self.cancelled_at = Some(at);
        self.cancellation_reason = Some(reason.to_string());
    }
}

impl Serialize for Booking {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        if let Some(raw) = &self.unreadable {
            return raw.serialize(serializer);
        }
        self.to_source().serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for Booking {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let source = Map::<String, Value>::deserialize(deserializer)?;
        Self::from_source(source).map_err(de::Error::custom)
    }
}

/// Customer record (read-only here)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Client {
    pub id: i64,
    #[serde(alias = "nome")]
    pub name: String,
    #[serde(alias = "telefone", default)]
    pub phone: Option<String>,
}

impl Client {
    /// Phone number when present and not blank
    pub fn phone_address(&self) -> Option<&str> {
        self.phone.as_deref().map(str::trim).filter(|p| !p.is_empty())
    }
}

/// Service offered by the business (read-only here)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Service {
    pub id: i64,
    #[serde(alias = "nome")]
    pub name: String,
}

/// Source of "today" and "now" for the workflows
pub trait Clock: Send + Sync {
    fn today(&self) -> NaiveDate;
    fn now(&self) -> DateTime<Utc>;
}

/// Wall clock in the machine's local time zone
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn today(&self) -> NaiveDate {
        Local::now().date_naive()
    }

    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Clock pinned to a single day, for tests and replays
#[derive(Debug, Clone, Copy)]
pub struct FixedClock {
    pub day: NaiveDate,
}

impl Clock for FixedClock {
    fn today(&self) -> NaiveDate {
        self.day
    }

    fn now(&self) -> DateTime<Utc> {
        self.day
            .and_hms_opt(12, 0, 0)
            .map(|dt| dt.and_utc())
            .unwrap_or_else(Utc::now)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const LEGACY: &str = r#"{
        "id": 3,
        "cliente_id": 10,
        "servico_id": 2,
        "colaborador_id": 5,
        "data_agendamento": "2026-10-14",
        "horario": "09:30",
        "status": "pendente",
        "criado_em": "2026-10-01T10:00:00.000Z"
    }"#;

    #[test]
    fn test_booking_reads_legacy_keys_and_keeps_extras() {
        let booking: Booking = serde_json::from_str(LEGACY).unwrap();
        assert_eq!(booking.client_id, 10);
        assert_eq!(booking.time_slot, "09:30");
        assert_eq!(booking.status, BookingStatus::Pending);
        assert_eq!(booking.naming(), FieldNaming::Legacy);
        assert_eq!(booking.field("colaborador_id"), Some(&Value::from(5)));
    }

    #[test]
    fn test_untouched_booking_is_written_back_verbatim() {
        let original: Value = serde_json::from_str(LEGACY).unwrap();
        let booking: Booking = serde_json::from_value(original.clone()).unwrap();

        let written = serde_json::to_value(&booking).unwrap();
        assert_eq!(serde_json::to_string(&written).unwrap(), serde_json::to_string(&original).unwrap());
    }

    #[test]
    fn test_changed_booking_keeps_legacy_spelling() {
        let mut booking: Booking = serde_json::from_str(LEGACY).unwrap();
        let at = "2026-10-14T12:00:00Z".parse::<DateTime<Utc>>().unwrap();
        booking.mark_cancelled(at, "Chuva");

        let written = serde_json::to_value(&booking).unwrap();
        assert_eq!(written["status"], "cancelado");
        assert_eq!(written["cancelado_em"], "2026-10-14T12:00:00.000Z");
        assert_eq!(written["motivo_cancelamento"], "Chuva");
        assert_eq!(written["data_agendamento"], "2026-10-14");
        assert!(written.get("cancelled_at").is_none());
        assert!(written.get("date").is_none());
    }

    #[test]
    fn test_numeric_string_ids_are_read_and_kept() {
        let json = r#"{"id":7,"cliente_id":"2","servico_id":1,"data_agendamento":"2026-10-14","status":"pendente"}"#;
        let booking: Booking = serde_json::from_str(json).unwrap();
        assert_eq!(booking.client_id, 2);

        let written = serde_json::to_value(&booking).unwrap();
        assert_eq!(written["cliente_id"], "2");
    }

    #[test]
    fn test_unreadable_booking_is_never_selected_and_written_verbatim() {
        let raw = serde_json::json!({"id": 9, "cliente_id": 1, "horario": "10:00", "status": "pendente"});
        let booking = Booking::unreadable(raw.clone());

        assert!(booking.is_unreadable());
        assert!(booking.date_naive().is_none());
        assert!(!booking.status.is_open());
        assert_eq!(serde_json::to_value(&booking).unwrap(), raw);
    }

    #[test]
    fn test_new_booking_uses_english_keys() {
        let mut booking = Booking::new(1, 2, 3, "2026-10-14", "10:00");
        booking.mark_confirmed("2026-10-14T12:00:00Z".parse().unwrap());

        let written = serde_json::to_value(&booking).unwrap();
        assert_eq!(written["client_id"], 2);
        assert_eq!(written["status"], "confirmed");
        assert!(written.get("cancelled_at").is_none());

        let reread: Booking = serde_json::from_value(written).unwrap();
        assert_eq!(reread.confirmed_at, booking.confirmed_at);
    }

    #[test]
    fn test_unknown_status_survives_rewrite() {
        let status = BookingStatus::from("No-show".to_string());
        assert_eq!(status, BookingStatus::Other("No-show".to_string()));
        assert_eq!(String::from(status), "No-show");
        assert!(BookingStatus::from("Agendado".to_string()).is_open());
    }

    #[test]
    fn test_malformed_date_is_never_on_a_day() {
        let booking: Booking = serde_json::from_str(
            r#"{"id":1,"client_id":1,"service_id":1,"date":"14/10/2026","status":"pending"}"#
        ).unwrap();
        let day = NaiveDate::from_ymd_opt(2026, 10, 14).unwrap();
        assert!(booking.date_naive().is_none());
        assert!(!booking.is_on(day));
    }

    #[test]
    fn test_client_blank_phone_is_absent() {
        let client = Client { id: 1, name: "Ana".to_string(), phone: Some("  ".to_string()) };
        assert!(client.phone_address().is_none());
    }
}
