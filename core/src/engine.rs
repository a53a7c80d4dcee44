//! The escalation engine: the per-cycle driver.
//!
//! CYCLE ORDER (fixed):
//!   1. Load and compile active rules once.        (failure aborts the cycle)
//!   2. Load every non-terminal candidate once.    (failure aborts the cycle)
//!   3. Run the executor over each candidate, sequentially, each under its
//!      own statement deadline.
//!   4. Record a cycle_completed metric (best effort, skipped in dry-run).
//!
//! RULES:
//!   - One candidate's failure never stops the batch.
//!   - Rules are not re-read mid-cycle.
//!   - No distributed lock: run one engine per database. The idempotency
//!     cooldown and the compare-and-swap write are the only guards.

use crate::{
    clock::{Clock, SystemClock},
    config::EngineConfig,
    error::{EngineError, EngineResult},
    event::EngineEvent,
    executor::EscalationExecutor,
    notification::{LogNotifier, Notifier},
    outcome::{CandidateResult, CycleStats, Outcome},
    rule::{compile_rules, EscalationRule, RuleCatalog},
    store::Store,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Granularity at which the loop notices a stop request while sleeping.
const STOP_POLL: Duration = Duration::from_millis(250);

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CycleReport {
    pub cycle: u64,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub stats: CycleStats,
    pub results: Vec<CandidateResult>,
}

impl CycleReport {
    pub fn result_for(&self, complaint_id: &str) -> Option<&CandidateResult> {
        self.results.iter().find(|r| r.complaint_id == complaint_id)
    }
}

pub struct EscalationEngine {
    store: Store,
    config: EngineConfig,
    notifier: Arc<dyn Notifier>,
    clock: Arc<dyn Clock>,
    cycle: AtomicU64,
}

impl EscalationEngine {
    pub fn new(store: Store, config: EngineConfig) -> Self {
        Self {
            store,
            config,
            notifier: Arc::new(LogNotifier),
            clock: Arc::new(SystemClock),
            cycle: AtomicU64::new(0),
        }
    }

    #[must_use]
    pub fn with_notifier(mut self, notifier: Arc<dyn Notifier>) -> Self {
        self.notifier = notifier;
        self
    }

    #[must_use]
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn store(&self) -> &Store {
        &self.store
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Upsert every rule in the catalog. Returns how many were written.
    pub fn sync_rule_catalog(&self, catalog: &RuleCatalog) -> EngineResult<usize> {
        let now = self.clock.now();
        for def in &catalog.rules {
            self.store.upsert_rule(&def.clone().into_row(), now)?;
        }
        log::info!("escalation: synced {} rules from catalog", catalog.rules.len());
        Ok(catalog.rules.len())
    }

    /// Active rules with parsed conditions. Unparseable rules are dropped.
    pub fn load_rules(&self) -> EngineResult<Vec<EscalationRule>> {
        Ok(compile_rules(self.store.list_active_rules()?))
    }

    /// Run one cycle now and return every candidate's result.
    ///
    /// Safe to call on demand between scheduled cycles; the idempotency
    /// cooldown keeps a back-to-back run from escalating twice.
    pub fn run_cycle(&self) -> EngineResult<CycleReport> {
        let cycle = self.cycle.fetch_add(1, Ordering::Relaxed) + 1;
        let started_at = self.clock.now();

        let rules = self.load_rules().map_err(|e| {
            log::error!("cycle={cycle} escalation: cannot load rules, aborting cycle: {e}");
            e
        })?;
        let candidates = self.store.list_escalation_candidates().map_err(|e| {
            log::error!("cycle={cycle} escalation: cannot load candidates, aborting cycle: {e}");
            e
        })?;
        log::info!(
            "cycle={cycle} escalation: {} active rules, {} candidates{}",
            rules.len(),
            candidates.len(),
            if self.config.dry_run { " [dry-run]" } else { "" },
        );

        let executor = EscalationExecutor::new(&self.store, &self.config, self.notifier.as_ref());
        let mut stats = CycleStats::default();
        let mut results = Vec::with_capacity(candidates.len());

        for candidate in &candidates {
            let now = self.clock.now();
            let deadline = Instant::now() + self.config.candidate_timeout();
            let result = self
                .store
                .with_deadline(deadline, |_| executor.process(candidate, &rules, now))
                .unwrap_or_else(|e| {
                    log::error!(
                        "cycle={cycle} escalation: complaint {} ({}) failed: {e}",
                        candidate.complaint_number,
                        candidate.complaint_id
                    );
                    CandidateResult {
                        complaint_id: candidate.complaint_id.clone(),
                        complaint_number: candidate.complaint_number.clone(),
                        outcome: Outcome::Failed {
                            error: e.to_string(),
                        },
                        reason: format!("Processing failed: {e}"),
                    }
                });
            stats.record(&result.outcome);
            results.push(result);
        }

        let finished_at = self.clock.now();
        log::info!(
            "cycle={cycle} escalation: processed={} escalated={} reminders={} skipped={} failed={}",
            stats.processed,
            stats.escalated,
            stats.reminders,
            stats.skipped,
            stats.failed,
        );
        if !self.config.dry_run {
            self.record_cycle_metric(cycle, &stats, finished_at);
        }

        Ok(CycleReport {
            cycle,
            started_at,
            finished_at,
            stats,
            results,
        })
    }

    /// Run cycles every `cycle_interval_secs` until `stop` is set or
    /// `max_cycles` have run. A failed cycle is retried at the next tick.
    pub fn run_loop(&self, stop: &AtomicBool, max_cycles: Option<u64>) {
        let interval = self.config.cycle_interval();
        log::info!("escalation: loop started, interval {}s", interval.as_secs());
        let mut completed = 0u64;

        while !stop.load(Ordering::Relaxed) {
            if let Err(e) = self.run_cycle() {
                log::error!("escalation: cycle failed, retrying next tick: {e}");
            }
            completed += 1;
            if max_cycles.is_some_and(|max| completed >= max) {
                break;
            }

            let wake = Instant::now() + interval;
            while !stop.load(Ordering::Relaxed) {
                let now = Instant::now();
                if now >= wake {
                    break;
                }
                std::thread::sleep(STOP_POLL.min(wake - now));
            }
        }
        log::info!("escalation: loop stopped after {completed} cycles");
    }

    fn record_cycle_metric(&self, cycle: u64, stats: &CycleStats, now: DateTime<Utc>) {
        let event = EngineEvent::CycleCompleted {
            cycle,
            processed: stats.processed,
            escalated: stats.escalated,
            reminders: stats.reminders,
            skipped: stats.skipped,
            failed: stats.failed,
        };
        let recorded = serde_json::to_value(&event)
            .map_err(EngineError::from)
            .and_then(|metadata| self.store.record_metric(event.name(), None, &metadata, now));
        if let Err(e) = recorded {
            log::warn!("cycle={cycle} escalation: cycle metric not recorded: {e}");
        }
    }
}
