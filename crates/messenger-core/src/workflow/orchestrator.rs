//! Bulk booking workflows: confirmations, cancellations and operator reports

use super::reports::{count_statuses, monthly_stats, ReportPeriod};
use super::traits::MessageSender;
use crate::config::MessengerConfig;
use crate::constants::TOP_DAYS_LIMIT;
use crate::error::{MessengerError, Result};
use crate::services::report_renderer::{
    format_date, render_daily, render_monthly, render_weekly, ReportLine, MISSING_SERVICE,
};
use crate::store::{EventLog, MessageTemplates, RecordStore, TemplateValues};
use crate::types::{Booking, BookingStatus, Client, Clock, Service};
use chrono::NaiveDate;
use messenger_types::{
    CancellationOutcome, ConfirmationOutcome, ItemResult, ReportSummary, ReportWindow,
};
use std::collections::HashMap;
use std::sync::Arc;

const NO_PHONE_REASON: &str = "Client not found or has no phone";

/// Which customer message a bulk flow sends
enum Notice<'a> {
    Confirmation,
    Cancellation { reason: &'a str },
}

/// Clients and services indexed by id for one batch
struct Directory {
    clients: HashMap<i64, Client>,
    services: HashMap<i64, Service>,
}

impl Directory {
    fn load(records: &dyn RecordStore) -> Result<Self> {
        Ok(Self {
            clients: records.read_clients()?.into_iter().map(|c| (c.id, c)).collect(),
            services: records.read_services()?.into_iter().map(|s| (s.id, s)).collect(),
        })
    }

    fn service_name(&self, id: i64) -> Option<&str> {
        self.services.get(&id).map(|s| s.name.as_str())
    }

    fn report_line(&self, booking: &Booking, fallback: NaiveDate) -> ReportLine {
        ReportLine {
            date: booking.date_naive().unwrap_or(fallback),
            time: booking.time_slot.clone(),
            status: booking.status.clone(),
            client_name: self.clients.get(&booking.client_id).map(|c| c.name.clone()),
            service_name: self.service_name(booking.service_id).map(str::to_string),
        }
    }
}

/// Turns the day's bookings into outbound messages.
///
/// Items are dispatched one after another; a failed item never stops the
/// batch. The bookings collection is written once after the batch, and a
/// failed write does not undo messages already sent.
pub struct BookingOrchestrator<S: MessageSender> {
    sender: Arc<S>,
    records: Arc<dyn RecordStore>,
    clock: Arc<dyn Clock>,
    templates: MessageTemplates,
    events: Arc<EventLog>,
    business_name: String,
    operator_address: String,
}

impl<S: MessageSender> BookingOrchestrator<S> {
    pub fn new(
        sender: Arc<S>,
        records: Arc<dyn RecordStore>,
        clock: Arc<dyn Clock>,
        templates: MessageTemplates,
        events: Arc<EventLog>,
        config: &MessengerConfig,
    ) -> Self {
        Self {
            sender,
            records,
            clock,
            templates,
            events,
            business_name: config.business.name.clone(),
            operator_address: config.business.operator_address.clone(),
        }
    }

    async fn ensure_connected(&self, action: &str) -> Result<()> {
        if self.sender.is_connected().await {
            return Ok(());
        }
        let error = MessengerError::NotConnected;
        self.events.error(format!("Cannot {}: {}", action, error));
        Err(error)
    }

    /// Send a confirmation request for every open booking dated today
    pub async fn run_confirmation_flow(&self) -> Result<ConfirmationOutcome> {
        self.ensure_connected("send confirmations").await?;

        let today = self.clock.today();
        let mut bookings = self.records.read_bookings()?;
        let targets: Vec<usize> = bookings
            .iter()
            .enumerate()
            .filter(|(_, b)| b.is_on(today) && b.status.is_open())
            .map(|(i, _)| i)
            .collect();

        if targets.is_empty() {
            self.events.info("No bookings to confirm today");
            return Ok(ConfirmationOutcome { sent_count: 0, total: 0, results: Vec::new(), persistence_error: None });
        }

        let directory = Directory::load(self.records.as_ref())?;
        let mut results = Vec::with_capacity(targets.len());
        let mut sent_count = 0;

        for index in targets.iter().copied() {
            let result = self.notify(&bookings[index], &directory, Notice::Confirmation).await;
            if result.is_sent() {
                bookings[index].mark_confirmed(self.clock.now());
                sent_count += 1;
            }
            results.push(result);
        }

        let persistence_error = self.persist(&bookings, sent_count);
        self.events.success(format!("Confirmations sent: {}/{}", sent_count, targets.len()));

        Ok(ConfirmationOutcome {
            sent_count,
            total: targets.len(),
            results,
            persistence_error,
        })
    }

    /// Notify and cancel every booking still standing today
    pub async fn run_cancellation_flow(&self, reason: &str) -> Result<CancellationOutcome> {
        self.ensure_connected("cancel bookings").await?;

        let reason = reason.trim();
        if reason.is_empty() {
            let error = MessengerError::MissingReason;
            self.events.error(format!("Cannot cancel bookings: {}", error));
            return Err(error);
        }

        let today = self.clock.today();
        let mut bookings = self.records.read_bookings()?;
        let targets: Vec<usize> = bookings
            .iter()
            .enumerate()
            .filter(|(_, b)| b.is_on(today) && (b.status.is_open() || b.status == BookingStatus::Confirmed))
            .map(|(i, _)| i)
            .collect();

        if targets.is_empty() {
            self.events.info("No bookings to cancel today");
            return Ok(CancellationOutcome { cancelled_count: 0, total: 0, results: Vec::new(), persistence_error: None });
        }

        let directory = Directory::load(self.records.as_ref())?;
        let mut results = Vec::with_capacity(targets.len());
        let mut cancelled_count = 0;

        for index in targets.iter().copied() {
            let result = self.notify(&bookings[index], &directory, Notice::Cancellation { reason }).await;
            if result.is_sent() {
                bookings[index].mark_cancelled(self.clock.now(), reason);
                cancelled_count += 1;
            }
            results.push(result);
        }

        let persistence_error = self.persist(&bookings, cancelled_count);
        self.events.warning(format!("Bookings cancelled: {}/{} ({})", cancelled_count, targets.len(), reason));

        Ok(CancellationOutcome {
            cancelled_count,
            total: targets.len(),
            results,
            persistence_error,
        })
    }

    /// Render and send one customer message; every failure becomes a `Failed` item
    async fn notify(&self, booking: &Booking, directory: &Directory, notice: Notice<'_>) -> ItemResult {
        let Some((client, phone)) = directory
            .clients
            .get(&booking.client_id)
            .and_then(|c| c.phone_address().map(|p| (c, p)))
        else {
            self.events.warning(format!("Booking {}: {}", booking.id, NO_PHONE_REASON.to_lowercase()));
            return ItemResult::Failed {
                booking_id: booking.id,
                reason: NO_PHONE_REASON.to_string(),
            };
        };

        let date = booking.date_naive().map(format_date).unwrap_or_else(|| booking.date.clone());
        let mut values = TemplateValues {
            name: &client.name,
            date: &date,
            time: &booking.time_slot,
            service: directory.service_name(booking.service_id).unwrap_or(MISSING_SERVICE),
            reason: "",
            business: &self.business_name,
        };

        let body = match notice {
            Notice::Confirmation => self.templates.render_confirmation(&values),
            Notice::Cancellation { reason } => {
                values.reason = reason;
                self.templates.render_cancellation(&values)
            }
        };

        match self.sender.send(phone, &body).await {
            Ok(receipt) => ItemResult::Sent {
                booking_id: booking.id,
                recipient: receipt.recipient,
            },
            Err(e) => ItemResult::Failed {
                booking_id: booking.id,
                reason: e.to_string(),
            },
        }
    }

    /// Write the collection when anything changed; a failure is reported, not raised
    fn persist(&self, bookings: &[Booking], changed: usize) -> Option<String> {
        if changed == 0 {
            return None;
        }
        match self.records.write_bookings(bookings) {
            Ok(()) => None,
            Err(e) => {
                self.events.error(format!("Messages were sent but bookings could not be saved: {}", e));
                Some(e.to_string())
            }
        }
    }

    /// Aggregate bookings in the window and send the report to the operator
    pub async fn run_report(&self, window: ReportWindow) -> Result<ReportSummary> {
        self.ensure_connected("send report").await?;

        let period = ReportPeriod::containing(window, self.clock.today());
        let bookings = self.records.read_bookings()?;
        let selected = period.select(&bookings);
        let counts = count_statuses(&selected);

        let body = match window {
            ReportWindow::Daily | ReportWindow::Weekly => {
                let directory = Directory::load(self.records.as_ref())?;
                let lines: Vec<ReportLine> = selected
                    .iter()
                    .map(|b| directory.report_line(b, period.start))
                    .collect();
                if window == ReportWindow::Daily {
                    render_daily(period.start, &counts, &lines, &self.business_name)
                } else {
                    render_weekly(period.start, period.end, &counts, &lines, &self.business_name)
                }
            }
            ReportWindow::Monthly => {
                let stats = monthly_stats(&period, &selected, &counts, TOP_DAYS_LIMIT);
                render_monthly(period.start, &counts, &stats, &self.business_name)
            }
        };

        self.sender.send(&self.operator_address, &body).await?;
        self.events.success(format!("{} report sent ({} bookings)", window, counts.total));

        Ok(ReportSummary {
            window,
            label: period.label(),
            counts,
        })
    }

    /// Every booking dated today, whatever its status
    pub fn todays_bookings(&self) -> Result<Vec<Booking>> {
        let today = self.clock.today();
        Ok(self.records.read_bookings()?.into_iter().filter(|b| b.is_on(today)).collect())
    }

    /// Bookings dated today that still wait for a confirmation
    pub fn pending_today(&self) -> Result<Vec<Booking>> {
        Ok(self.todays_bookings()?.into_iter().filter(|b| b.status.is_open()).collect())
    }

    pub fn today(&self) -> NaiveDate {
        self.clock.today()
    }
}
