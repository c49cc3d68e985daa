//! ALFA BioCrypt - Scan Prompt
//!
//! UI-agnostic status model for a scan dialog. A front end feeds it scan events
//! and polls `tick`; it never owns authentication logic.

use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};

use super::{ScanEvent, ScanOutcome};

/// Prompt texts and timings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PromptConfig {
    pub title: String,
    pub scan_text: String,
    pub success_text: String,
    pub failed_text: String,
    /// Transient statuses revert to `scan_text` after this long
    pub error_timeout_ms: u64,
    /// Pause between a match and completing the operation
    pub success_delay_ms: u64,
}

impl Default for PromptConfig {
    fn default() -> Self {
        Self {
            title: "Fingerprint Dialog".into(),
            scan_text: "Touch sensor".into(),
            success_text: "Fingerprint recognised".into(),
            failed_text: "Fingerprint not recognized. Try again".into(),
            error_timeout_ms: 1600,
            success_delay_ms: 1300,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PromptIcon {
    Fingerprint,
    Success,
    Error,
}

/// What the prompt shows right now
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PromptStatus {
    pub icon: PromptIcon,
    pub text: String,
}

/// Scan Prompt
#[derive(Debug, Clone)]
pub struct ScanPrompt {
    config: PromptConfig,
    status: PromptStatus,
    reset_at: Option<Instant>,
}

impl ScanPrompt {
    pub fn new(config: PromptConfig) -> Self {
        let status = PromptStatus {
            icon: PromptIcon::Fingerprint,
            text: config.scan_text.clone(),
        };
        Self {
            config,
            status,
            reset_at: None,
        }
    }

    pub fn title(&self) -> &str {
        &self.config.title
    }

    pub fn status(&self) -> &PromptStatus {
        &self.status
    }

    pub fn success_delay(&self) -> Duration {
        Duration::from_millis(self.config.success_delay_ms)
    }

    /// Update the status for `event` observed at `now`
    pub fn apply(&mut self, event: &ScanEvent, now: Instant) {
        match event {
            ScanEvent::Started { .. } => self.reset(),
            ScanEvent::Outcome(ScanOutcome::Matched) => {
                self.show(PromptIcon::Success, self.config.success_text.clone());
                self.reset_at = None;
            }
            ScanEvent::Outcome(ScanOutcome::NoMatch) => {
                self.show(PromptIcon::Error, self.config.failed_text.clone());
                self.schedule_reset(now);
            }
            ScanEvent::Outcome(ScanOutcome::RecoverableError(message))
            | ScanEvent::Outcome(ScanOutcome::UnrecoverableError(message)) => {
                self.show(PromptIcon::Error, message.clone());
                self.schedule_reset(now);
            }
            ScanEvent::Outcome(ScanOutcome::Cancelled) => self.reset_at = None,
        }
    }

    /// Clear an expired transient status; returns `true` if the status changed
    pub fn tick(&mut self, now: Instant) -> bool {
        match self.reset_at {
            Some(deadline) if now >= deadline => {
                self.reset();
                true
            }
            _ => false,
        }
    }

    fn show(&mut self, icon: PromptIcon, text: String) {
        self.status = PromptStatus { icon, text };
    }

    fn schedule_reset(&mut self, now: Instant) {
        self.reset_at = Some(now + Duration::from_millis(self.config.error_timeout_ms));
    }

    fn reset(&mut self) {
        self.status = PromptStatus {
            icon: PromptIcon::Fingerprint,
            text: self.config.scan_text.clone(),
        };
        self.reset_at = None;
    }
}

impl Default for ScanPrompt {
    fn default() -> Self {
        Self::new(PromptConfig::default())
    }
}
