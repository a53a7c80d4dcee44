//! Authority resolution: who receives a complaint at the next level.
//!
//! Seniority is encoded in the officer code (`PWD-BLR-L2-007`), not in a
//! hierarchy table. Resolution is two-tier:
//!   1. an active officer in the department/location carrying the tier marker
//!   2. any active officer in the department/location (pilot safeguard)
//! When the location finds nobody, both tiers are retried keyed by pincode.
//! Finding nobody is an answer, not an error; the executor decides policy.

use crate::{
    error::EngineResult,
    store::Store,
    types::{level_label, DepartmentId, Level, LocationId, OfficerId},
};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Officer {
    pub officer_id: OfficerId,
    pub officer_code: String,
    pub name: String,
    pub department_id: DepartmentId,
    pub location_id: Option<LocationId>,
    pub is_active: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResolutionTier {
    /// Matched the tier marker in the officer code.
    LevelPattern,
    /// Fell back to any active officer in the department/location.
    AnyActive,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedAuthority {
    pub officer_id: OfficerId,
    pub tier: ResolutionTier,
}

pub struct AuthorityResolver<'a> {
    store: &'a Store,
}

impl<'a> AuthorityResolver<'a> {
    pub fn new(store: &'a Store) -> Self {
        Self { store }
    }

    /// Like `resolve`, then retries both tiers with the complaint's pincode as
    /// the location key.
    pub fn resolve_with_pincode(
        &self,
        department_id: &str,
        location_id: Option<&str>,
        pincode: Option<&str>,
        current_level: Level,
    ) -> EngineResult<Option<ResolvedAuthority>> {
        if let Some(found) = self.resolve(department_id, location_id, current_level)? {
            return Ok(Some(found));
        }
        match (location_id, pincode) {
            (Some(location), Some(pin)) if location != pin => {
                let found = self.resolve(department_id, Some(pin), current_level)?;
                if let Some(a) = &found {
                    log::info!(
                        "escalation: authority {} for {department_id} found by pincode {pin}",
                        a.officer_id
                    );
                }
                Ok(found)
            }
            _ => Ok(None),
        }
    }

    /// Find the authority for a complaint currently at `current_level`.
    /// The target tier is `current_level + 1`.
    pub fn resolve(
        &self,
        department_id: &str,
        location_id: Option<&str>,
        current_level: Level,
    ) -> EngineResult<Option<ResolvedAuthority>> {
        let tier = level_label(current_level.saturating_add(1));

        if let Some(officer_id) =
            self.store
                .find_active_officer_by_tier(department_id, location_id, &tier)?
        {
            return Ok(Some(ResolvedAuthority {
                officer_id,
                tier: ResolutionTier::LevelPattern,
            }));
        }

        if let Some(officer_id) = self.store.find_any_active_officer(department_id, location_id)? {
            log::info!(
                "escalation: no {tier} officer in {department_id}/{}; falling back to active officer {officer_id}",
                location_id.unwrap_or("*"),
            );
            return Ok(Some(ResolvedAuthority {
                officer_id,
                tier: ResolutionTier::AnyActive,
            }));
        }

        Ok(None)
    }
}
