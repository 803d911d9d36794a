//! Customer message templates with `{placeholder}` substitution

use super::json_file::{read_json, write_json_atomic};
use crate::error::Result;
use once_cell::sync::Lazy;
use regex::{Captures, Regex};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Values substituted into a template
#[derive(Debug, Clone, Default)]
pub struct TemplateValues<'a> {
    pub name: &'a str,
    pub date: &'a str,
    pub time: &'a str,
    pub service: &'a str,
    pub reason: &'a str,
    pub business: &'a str,
}

/// Templates for booking messages sent to customers
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MessageTemplates {
    #[serde(default = "default_confirmation")]
    pub confirmation: String,
    #[serde(default = "default_cancellation")]
    pub cancellation: String,
    /// Same-day reminder; no flow sends it yet
    #[serde(default = "default_reminder")]
    pub reminder: String,
}

impl Default for MessageTemplates {
    fn default() -> Self {
        Self {
            confirmation: default_confirmation(),
            cancellation: default_cancellation(),
            reminder: default_reminder(),
        }
    }
}

fn default_confirmation() -> String {
    "Olá {name}!\n\n\
     Confirmação de agendamento:\n\n\
     📅 Data: {date}\n\
     ⏰ Horário: {time}\n\
     ✂️ Serviço: {service}\n\n\
     Por favor, confirme sua presença respondendo esta mensagem.\n\n\
     {business}"
        .to_string()
}

fn default_cancellation() -> String {
    "Olá {name}!\n\n\
     Infelizmente precisamos cancelar seu agendamento:\n\n\
     📅 Data: {date}\n\
     ⏰ Horário: {time}\n\
     ✂️ Serviço: {service}\n\n\
     Motivo: {reason}\n\n\
     Pedimos desculpas pelo inconveniente. Entre em contato para reagendar.\n\n\
     {business}"
        .to_string()
}

fn default_reminder() -> String {
    "Olá {name}! Lembrete: você tem um agendamento hoje às {time} para {service}".to_string()
}

impl MessageTemplates {
    /// Load templates from `path`, writing the defaults there when the file is absent
    pub fn load_or_init<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        match read_json::<Self>(path)? {
            Some(templates) => Ok(templates),
            None => {
                let templates = Self::default();
                write_json_atomic(path, &templates)?;
                log::info!("Wrote default message templates to {}", path.display());
                Ok(templates)
            }
        }
    }

    pub fn render_confirmation(&self, values: &TemplateValues<'_>) -> String {
        render(&self.confirmation, values)
    }

    pub fn render_cancellation(&self, values: &TemplateValues<'_>) -> String {
        render(&self.cancellation, values)
    }
}

static PLACEHOLDER: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\{([a-z]+)\}").expect("Failed to compile placeholder regex"));

/// Substitute placeholders in one pass, so substituted values are never expanded again.
/// The Portuguese names of older template files are accepted too; unknown
/// placeholders are left as written.
pub fn render(template: &str, values: &TemplateValues<'_>) -> String {
    PLACEHOLDER
        .replace_all(template, |caps: &Captures<'_>| {
            let value = match &caps[1] {
                "name" | "nome" => values.name,
                "date" | "data" => values.date,
                "time" | "horario" => values.time,
                "service" | "servico" => values.service,
                "reason" | "motivo" => values.reason,
                "business" => values.business,
                _ => return caps[0].to_string(),
            };
            value.to_string()
        })
        .into_owned()
}
