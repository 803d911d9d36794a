//! Text bodies for the operator reports

use crate::types::BookingStatus;
use chrono::{Datelike, NaiveDate};
use messenger_types::StatusCounts;
use std::fmt::Write;

pub const MISSING_CLIENT: &str = "Cliente não encontrado";
pub const MISSING_SERVICE: &str = "Serviço não especificado";

const MONTHS: [&str; 12] = [
    "janeiro", "fevereiro", "março", "abril", "maio", "junho",
    "julho", "agosto", "setembro", "outubro", "novembro", "dezembro",
];

/// One booking as it appears in a report
#[derive(Debug, Clone, PartialEq)]
pub struct ReportLine {
    pub date: NaiveDate,
    pub time: String,
    pub status: BookingStatus,
    pub client_name: Option<String>,
    pub service_name: Option<String>,
}

/// Figures only the monthly report carries
#[derive(Debug, Clone, PartialEq)]
pub struct MonthlyStats {
    /// Percentages, rounded
    pub confirmation_rate: u32,
    pub cancellation_rate: u32,
    pub average_per_day: u32,
    /// Busiest days, busiest first
    pub top_days: Vec<(NaiveDate, usize)>,
}

pub fn status_marker(status: &BookingStatus) -> &'static str {
    match status {
        BookingStatus::Confirmed => "✅",
        BookingStatus::Cancelled => "❌",
        _ => "⏳",
    }
}

/// `dd/mm/yyyy`
pub fn format_date(date: NaiveDate) -> String {
    date.format("%d/%m/%Y").to_string()
}

/// e.g. `outubro de 2026`
pub fn month_label(date: NaiveDate) -> String {
    format!("{} de {}", MONTHS[date.month0() as usize], date.year())
}

fn push_summary(text: &mut String, counts: &StatusCounts) {
    let _ = write!(
        text,
        "\n\n📈 RESUMO GERAL:\n\
         • Total de agendamentos: {}\n\
         • Pendentes: {}\n\
         • Confirmados: {}\n\
         • Cancelados: {}",
        counts.total, counts.pending, counts.confirmed, counts.cancelled
    );
}

fn push_line(text: &mut String, line: &ReportLine) {
    let _ = write!(
        text,
        "\n{} {} - {} ({})",
        status_marker(&line.status),
        line.time,
        line.client_name.as_deref().unwrap_or(MISSING_CLIENT),
        line.service_name.as_deref().unwrap_or(MISSING_SERVICE),
    );
}

fn push_footer(text: &mut String, business: &str) {
    let _ = write!(text, "\n\n{} - Sistema Automático", business);
}

pub fn render_daily(day: NaiveDate, counts: &StatusCounts, lines: &[ReportLine], business: &str) -> String {
    let mut text = format!("📊 RELATÓRIO DIÁRIO - {}", format_date(day));
    push_summary(&mut text, counts);

    text.push_str("\n\n📋 AGENDAMENTOS DO DIA:");
    if lines.is_empty() {
        text.push_str("\n• Nenhum agendamento para hoje");
    }
    for line in lines {
        push_line(&mut text, line);
    }

    push_footer(&mut text, business);
    text
}

/// `lines` must be ordered by date; each day gets its own section
pub fn render_weekly(
    start: NaiveDate,
    end: NaiveDate,
    counts: &StatusCounts,
    lines: &[ReportLine],
    business: &str,
) -> String {
    let mut text = format!("📊 RELATÓRIO SEMANAL - {} a {}", format_date(start), format_date(end));
    push_summary(&mut text, counts);

    text.push_str("\n\n📅 AGENDAMENTOS POR DIA:");
    if lines.is_empty() {
        text.push_str("\n• Nenhum agendamento nesta semana");
    }

    let mut rest = lines;
    while let Some(first) = rest.first() {
        let day_len = rest.iter().take_while(|l| l.date == first.date).count();
        let (day, tail) = rest.split_at(day_len);
        let _ = write!(text, "\n\n📅 {} ({} agendamentos):", format_date(first.date), day.len());
        for line in day {
            push_line(&mut text, line);
        }
        rest = tail;
    }

    push_footer(&mut text, business);
    text
}

pub fn render_monthly(month: NaiveDate, counts: &StatusCounts, stats: &MonthlyStats, business: &str) -> String {
    let mut text = format!("📊 RELATÓRIO MENSAL - {}", month_label(month));
    push_summary(&mut text, counts);

    let _ = write!(
        text,
        "\n\n📊 ESTATÍSTICAS:\n\
         • Taxa de confirmação: {}%\n\
         • Taxa de cancelamento: {}%\n\
         • Média de agendamentos por dia: {}",
        stats.confirmation_rate, stats.cancellation_rate, stats.average_per_day
    );

    if !stats.top_days.is_empty() {
        let _ = write!(text, "\n\n📅 TOP {} DIAS COM MAIS AGENDAMENTOS:", stats.top_days.len());
        for (index, (day, count)) in stats.top_days.iter().enumerate() {
            let _ = write!(text, "\n{}. {}: {} agendamentos", index + 1, format_date(*day), count);
        }
    }

    push_footer(&mut text, business);
    text
}

#[cfg(test)]
mod tests {
    use super::*;

    fn day(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 10, d).unwrap()
    }

    fn line(d: u32, time: &str, status: BookingStatus, client: Option<&str>) -> ReportLine {
        ReportLine {
            date: day(d),
            time: time.to_string(),
            status,
            client_name: client.map(str::to_string),
            service_name: None,
        }
    }

    #[test]
    fn test_markers() {
        assert_eq!(status_marker(&BookingStatus::Confirmed), "✅");
        assert_eq!(status_marker(&BookingStatus::Cancelled), "❌");
        assert_eq!(status_marker(&BookingStatus::Scheduled), "⏳");
        assert_eq!(status_marker(&BookingStatus::Other("no-show".to_string())), "⏳");
    }

    #[test]
    fn test_daily_uses_placeholders() {
        let counts = StatusCounts { total: 1, pending: 0, confirmed: 1, cancelled: 0 };
        let text = render_daily(day(14), &counts, &[line(14, "09:00", BookingStatus::Confirmed, None)], "Loja");

        assert!(text.starts_with("📊 RELATÓRIO DIÁRIO - 14/10/2026"));
        assert!(text.contains("✅ 09:00 - Cliente não encontrado (Serviço não especificado)"));
        assert!(text.ends_with("Loja - Sistema Automático"));
    }

    #[test]
    fn test_empty_daily() {
        let text = render_daily(day(14), &StatusCounts::default(), &[], "Loja");
        assert!(text.contains("Nenhum agendamento para hoje"));
        assert!(text.contains("Total de agendamentos: 0"));
    }

    #[test]
    fn test_weekly_groups_by_day() {
        let lines = vec![
            line(12, "10:00", BookingStatus::Pending, Some("Ana")),
            line(12, "11:00", BookingStatus::Cancelled, Some("Bia")),
            line(15, "09:00", BookingStatus::Confirmed, Some("Caio")),
        ];
        let counts = StatusCounts { total: 3, pending: 1, confirmed: 1, cancelled: 1 };
        let text = render_weekly(day(11), day(17), &counts, &lines, "Loja");

        assert!(text.contains("11/10/2026 a 17/10/2026"));
        assert!(text.contains("📅 12/10/2026 (2 agendamentos):\n⏳ 10:00 - Ana"));
        assert!(text.contains("📅 15/10/2026 (1 agendamentos):\n✅ 09:00 - Caio"));
    }

    #[test]
    fn test_monthly_lists_top_days() {
        let stats = MonthlyStats {
            confirmation_rate: 50,
            cancellation_rate: 25,
            average_per_day: 1,
            top_days: vec![(day(5), 5), (day(3), 4)],
        };
        let counts = StatusCounts { total: 8, pending: 2, confirmed: 4, cancelled: 2 };
        let text = render_monthly(day(1), &counts, &stats, "Loja");

        assert!(text.starts_with("📊 RELATÓRIO MENSAL - outubro de 2026"));
        assert!(text.contains("Taxa de confirmação: 50%"));
        assert!(text.contains("\n1. 05/10/2026: 5 agendamentos\n2. 03/10/2026: 4 agendamentos"));
    }
}
