//! Engine configuration.
//!
//! Loaded from `data/engine_config.json`, then overlaid by environment
//! variables. In tests, use `EngineConfig::default_test()`.

use crate::types::{Level, MAX_ESCALATION_LEVEL};
use serde::{Deserialize, Serialize};
use std::time::Duration;

pub const ENV_TEST_SLA_MINUTES: &str = "ESCALATION_TEST_SLA_MINUTES";
pub const ENV_DRY_RUN: &str = "ESCALATION_DRY_RUN";
pub const ENV_DRY_RUN_SLA_MINUTES: &str = "ESCALATION_DRY_RUN_SLA_MINUTES";
pub const ENV_INTERVAL_SECS: &str = "ESCALATION_INTERVAL_SECS";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Seconds between cycles. Hourly in production, a minute in pilots.
    pub cycle_interval_secs: u64,
    /// Replaces every rule's SLA verbatim (pilot/test environments).
    pub test_mode_sla_minutes: Option<i64>,
    /// Evaluate but never write.
    pub dry_run: bool,
    /// SLA replacement that only applies while `dry_run` is on.
    pub dry_run_sla_override_minutes: Option<i64>,
    /// Window in which a repeat escalation at the same level is suppressed.
    pub idempotency_cooldown_minutes: i64,
    pub max_escalation_level: Level,
    /// Statement deadline for processing a single candidate.
    pub candidate_timeout_secs: u64,
    /// Pilot policy: escalate with a vacant assignee when no officer resolves.
    pub escalate_without_authority: bool,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            cycle_interval_secs: 3600,
            test_mode_sla_minutes: None,
            dry_run: false,
            dry_run_sla_override_minutes: None,
            idempotency_cooldown_minutes: 60,
            max_escalation_level: MAX_ESCALATION_LEVEL,
            candidate_timeout_secs: 30,
            escalate_without_authority: true,
        }
    }
}

impl EngineConfig {
    /// Load from the data/ directory and apply environment overrides.
    pub fn load(data_dir: &str) -> anyhow::Result<Self> {
        let path = format!("{data_dir}/engine_config.json");
        let content = std::fs::read_to_string(&path)
            .map_err(|e| anyhow::anyhow!("Cannot read {path}: {e}"))?;
        let mut config: EngineConfig = serde_json::from_str(&content)?;
        config.apply_env(|key| std::env::var(key).ok())?;
        config.validate()?;
        Ok(config)
    }

    /// Config with hardcoded defaults for use in tests.
    pub fn default_test() -> Self {
        Self {
            cycle_interval_secs: 60,
            candidate_timeout_secs: 5,
            ..Self::default()
        }
    }

    /// Overlay environment variables. `lookup` is `std::env::var` in
    /// production; tests pass a map.
    pub fn apply_env<F>(&mut self, lookup: F) -> anyhow::Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(v) = lookup(ENV_TEST_SLA_MINUTES) {
            self.test_mode_sla_minutes = parse_minutes(ENV_TEST_SLA_MINUTES, &v)?;
        }
        if let Some(v) = lookup(ENV_DRY_RUN) {
            self.dry_run = matches!(v.trim().to_ascii_lowercase().as_str(), "1" | "true" | "yes");
        }
        if let Some(v) = lookup(ENV_DRY_RUN_SLA_MINUTES) {
            self.dry_run_sla_override_minutes = parse_minutes(ENV_DRY_RUN_SLA_MINUTES, &v)?;
        }
        if let Some(v) = lookup(ENV_INTERVAL_SECS) {
            self.cycle_interval_secs = v
                .trim()
                .parse()
                .map_err(|e| anyhow::anyhow!("{ENV_INTERVAL_SECS}={v}: {e}"))?;
        }
        Ok(())
    }

    pub fn validate(&self) -> anyhow::Result<()> {
        if self.cycle_interval_secs == 0 {
            anyhow::bail!("cycle_interval_secs must be positive");
        }
        if self.idempotency_cooldown_minutes < 0 {
            anyhow::bail!("idempotency_cooldown_minutes must not be negative");
        }
        if self.max_escalation_level > MAX_ESCALATION_LEVEL {
            anyhow::bail!(
                "max_escalation_level {} exceeds the L3 ceiling ({MAX_ESCALATION_LEVEL})",
                self.max_escalation_level
            );
        }
        Ok(())
    }

    pub fn cycle_interval(&self) -> Duration {
        Duration::from_secs(self.cycle_interval_secs)
    }

    pub fn candidate_timeout(&self) -> Duration {
        Duration::from_secs(self.candidate_timeout_secs)
    }

    /// The SLA replacement in force, if any, and the mode it came from.
    /// Zero minutes counts as unset.
    pub fn sla_override(&self) -> Option<(SlaOverride, i64)> {
        if let Some(m) = self.test_mode_sla_minutes.filter(|m| *m > 0) {
            return Some((SlaOverride::TestMode, m));
        }
        if self.dry_run {
            if let Some(m) = self.dry_run_sla_override_minutes.filter(|m| *m > 0) {
                return Some((SlaOverride::DryRun, m));
            }
        }
        None
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SlaOverride {
    TestMode,
    DryRun,
}

impl SlaOverride {
    pub fn label(&self) -> &'static str {
        match self {
            Self::TestMode => "test mode",
            Self::DryRun => "dry-run",
        }
    }
}

/// Empty means "unset"; anything else must be a non-negative integer.
fn parse_minutes(key: &str, value: &str) -> anyhow::Result<Option<i64>> {
    let value = value.trim();
    if value.is_empty() {
        return Ok(None);
    }
    let minutes: i64 = value
        .parse()
        .map_err(|e| anyhow::anyhow!("{key}={value}: {e}"))?;
    if minutes < 0 {
        anyhow::bail!("{key} must not be negative");
    }
    Ok(Some(minutes))
}
