//! Pairing challenge to display artifact conversion

use crate::error::{MessengerError, Result};
use base64::{engine::general_purpose::STANDARD, Engine};
use qrcode::render::svg;
use qrcode::QrCode;
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

/// Length of a typed link code as issued by the platform
const LINK_CODE_LENGTH: usize = 8;

const DATA_URL_PREFIX: &str = "data:image/svg+xml;base64,";

/// Smallest edge of the rendered scan code, in pixels
const QR_MIN_SIZE: u32 = 256;

/// Holds the latest display-ready pairing artifact
#[derive(Debug, Default)]
pub struct PairingCodeProvider {
    current: RwLock<Option<String>>,
}

impl PairingCodeProvider {
    pub fn new() -> Self {
        Self::default()
    }

    fn read(&self) -> RwLockReadGuard<'_, Option<String>> {
        self.current.read().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn write(&self) -> RwLockWriteGuard<'_, Option<String>> {
        self.current.write().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Convert and store a challenge.
    ///
    /// When conversion fails the raw challenge is stored instead and the error
    /// is returned so the caller can log it.
    pub fn accept(&self, challenge: &str) -> Result<String> {
        match render_artifact(challenge) {
            Ok(artifact) => {
                *self.write() = Some(artifact.clone());
                Ok(artifact)
            }
            Err(e) => {
                *self.write() = Some(challenge.to_string());
                Err(e)
            }
        }
    }

    pub fn current(&self) -> Option<String> {
        self.read().clone()
    }

    pub fn has_artifact(&self) -> bool {
        self.read().is_some()
    }

    pub fn clear(&self) {
        *self.write() = None;
    }
}

/// Render a raw challenge for display.
///
/// Short link codes are grouped as `ABCD-EFGH`; longer scan payloads are drawn
/// as a QR code and returned as an SVG data URL an `<img>` tag can show.
pub fn render_artifact(challenge: &str) -> Result<String> {
    let challenge = challenge.trim();
    if challenge.is_empty() {
        return Err(MessengerError::Transport("Empty pairing challenge".to_string()));
    }

    if challenge.len() == LINK_CODE_LENGTH && challenge.chars().all(|c| c.is_ascii_alphanumeric()) {
        let upper = challenge.to_ascii_uppercase();
        let (head, tail) = upper.split_at(LINK_CODE_LENGTH / 2);
        return Ok(format!("{}-{}", head, tail));
    }

    let code = QrCode::new(challenge.as_bytes())
        .map_err(|e| MessengerError::Transport(format!("Pairing payload cannot be drawn as a QR code: {}", e)))?;
    let image = code
        .render::<svg::Color<'_>>()
        .min_dimensions(QR_MIN_SIZE, QR_MIN_SIZE)
        .build();

    Ok(format!("{}{}", DATA_URL_PREFIX, STANDARD.encode(image.as_bytes())))
}
