//! Outbound notices to the authority receiving an escalation.
//!
//! Delivery is fire-and-forget: a notifier error is logged by the caller and
//! never unwinds the escalation.

use crate::types::{ComplaintId, DepartmentId, Level, OfficerId};
use serde::{Deserialize, Serialize};
use std::sync::mpsc::Sender;
use std::sync::Mutex;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NoticeKind {
    Escalation,
    Reminder,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EscalationNotice {
    pub kind: NoticeKind,
    pub complaint_id: ComplaintId,
    pub complaint_number: String,
    pub department_id: Option<DepartmentId>,
    /// `None` when the role is vacant; the department is still notified.
    pub officer_id: Option<OfficerId>,
    pub level: Level,
    pub reason: String,
}

pub trait Notifier: Send + Sync {
    fn notify(&self, notice: &EscalationNotice) -> anyhow::Result<()>;
}

/// Writes notices to the log. The default when no delivery channel is wired.
#[derive(Debug, Default)]
pub struct LogNotifier;

impl Notifier for LogNotifier {
    fn notify(&self, notice: &EscalationNotice) -> anyhow::Result<()> {
        log::info!(
            "notify: {:?} {} -> dept={} officer={} ({})",
            notice.kind,
            notice.complaint_number,
            notice.department_id.as_deref().unwrap_or("-"),
            notice.officer_id.as_deref().unwrap_or("vacant"),
            notice.reason,
        );
        Ok(())
    }
}

/// Hands notices to a worker over a channel. `notify` never blocks.
pub struct ChannelNotifier {
    tx: Mutex<Sender<EscalationNotice>>,
}

impl ChannelNotifier {
    pub fn new(tx: Sender<EscalationNotice>) -> Self {
        Self { tx: Mutex::new(tx) }
    }
}

impl Notifier for ChannelNotifier {
    fn notify(&self, notice: &EscalationNotice) -> anyhow::Result<()> {
        let tx = self
            .tx
            .lock()
            .map_err(|_| anyhow::anyhow!("notification channel lock poisoned"))?;
        tx.send(notice.clone())
            .map_err(|_| anyhow::anyhow!("notification worker has shut down"))
    }
}
