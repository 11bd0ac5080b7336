//! API response and query types.
//!
//! Ledger field names follow the ledger CSV columns.

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

use crate::sim::controller::Strategy;
use crate::sim::kpi::{KpiReport, SiteImpact};
use crate::sim::recorder::Record;
use crate::sim::types::StepResult;

/// Run overview: strategy, KPIs, site impact, and the last committed step.
#[derive(Debug, Serialize)]
pub struct StateResponse {
    pub strategy: Strategy,
    /// Committed steps.
    pub steps: usize,
    pub dt_hours: f64,
    pub kpi: KpiReport,
    pub site_impact: SiteImpact,
    /// Most recent step result; `None` for an empty run.
    pub latest_step: Option<StepResult>,
}

/// Flat ledger record, one per entity and timestep.
///
/// Maps the nested `Record::entity` to `entity` (kind) and `id` columns.
#[derive(Debug, Serialize)]
pub struct LedgerRecord {
    /// `site`, `charger` or `vehicle`.
    pub entity: &'static str,
    pub id: String,
    pub timestep: usize,
    pub timestamp: NaiveDateTime,
    pub power_kw: f64,
    pub soc_kwh: Option<f64>,
    pub cost: f64,
    pub emissions_g: f64,
}

impl From<&Record> for LedgerRecord {
    fn from(r: &Record) -> Self {
        Self {
            entity: r.entity.kind(),
            id: r.entity.id().to_string(),
            timestep: r.timestep,
            timestamp: r.timestamp,
            power_kw: r.power_kw,
            soc_kwh: r.soc_kwh,
            cost: r.cost,
            emissions_g: r.emissions_g,
        }
    }
}

/// Optional inclusive timestep range.
#[derive(Debug, Deserialize)]
pub struct RangeQuery {
    /// Start timestep (inclusive).
    pub from: Option<usize>,
    /// End timestep (inclusive).
    pub to: Option<usize>,
}

impl RangeQuery {
    /// Resolved `(from, to)`, or an error message when `from > to`.
    pub fn bounds(&self) -> Result<(usize, usize), String> {
        let from = self.from.unwrap_or(0);
        let to = self.to.unwrap_or(usize::MAX);
        if from > to {
            return Err(format!("`from` ({from}) must be <= `to` ({to})"));
        }
        Ok((from, to))
    }
}

/// Ledger filters: entity kind, entity id and timestep range.
#[derive(Debug, Deserialize)]
pub struct LedgerQuery {
    pub entity: Option<String>,
    pub id: Option<String>,
    pub from: Option<usize>,
    pub to: Option<usize>,
}

impl LedgerQuery {
    pub fn range(&self) -> RangeQuery {
        RangeQuery {
            from: self.from,
            to: self.to,
        }
    }

    /// Whether `record` passes the entity filters.
    pub fn matches(&self, record: &Record) -> bool {
        self.entity
            .as_deref()
            .is_none_or(|kind| kind == record.entity.kind())
            && self
                .id
                .as_deref()
                .is_none_or(|id| id == record.entity.id())
    }
}

/// Error response body for 400-class errors.
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    /// Human-readable error message.
    pub error: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sim::recorder::Entity;
    use chrono::NaiveDate;

    fn record(entity: Entity) -> Record {
        Record {
            entity,
            timestep: 5,
            timestamp: NaiveDate::from_ymd_opt(2024, 1, 1)
                .unwrap()
                .and_hms_opt(5, 0, 0)
                .unwrap(),
            power_kw: 7.0,
            soc_kwh: Some(24.0),
            cost: 1.4,
            emissions_g: 700.0,
        }
    }

    #[test]
    fn ledger_record_flattens_entity() {
        let r = record(Entity::Vehicle("EV_1".into()));
        let flat = LedgerRecord::from(&r);
        assert_eq!(flat.entity, "vehicle");
        assert_eq!(flat.id, "EV_1");
        assert_eq!(flat.timestep, 5);
        assert_eq!(flat.soc_kwh, Some(24.0));
    }

    #[test]
    fn range_rejects_inverted_bounds() {
        let q = RangeQuery {
            from: Some(10),
            to: Some(5),
        };
        assert!(q.bounds().is_err());
        let open = RangeQuery { from: None, to: None };
        assert_eq!(open.bounds(), Ok((0, usize::MAX)));
    }

    #[test]
    fn ledger_query_filters_by_kind_and_id() {
        let q = LedgerQuery {
            entity: Some("vehicle".into()),
            id: Some("EV_1".into()),
            from: None,
            to: None,
        };
        assert!(q.matches(&record(Entity::Vehicle("EV_1".into()))));
        assert!(!q.matches(&record(Entity::Vehicle("EV_2".into()))));
        assert!(!q.matches(&record(Entity::Charger("EV_1".into()))));
    }
}
