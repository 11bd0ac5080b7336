//! Append-only per-entity, per-timestep ledger.

use std::collections::BTreeMap;
use std::fmt;

use chrono::NaiveDateTime;
use serde::Serialize;

use crate::error::{Result, SimError};

/// Something the ledger keeps a timeseries for.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(tag = "kind", content = "id", rename_all = "snake_case")]
pub enum Entity {
    Site,
    Charger(String),
    Vehicle(String),
}

impl Entity {
    pub fn kind(&self) -> &'static str {
        match self {
            Entity::Site => "site",
            Entity::Charger(_) => "charger",
            Entity::Vehicle(_) => "vehicle",
        }
    }

    pub fn id(&self) -> &str {
        match self {
            Entity::Site => "site",
            Entity::Charger(id) | Entity::Vehicle(id) => id,
        }
    }
}

impl fmt::Display for Entity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.kind(), self.id())
    }
}

/// Metrics of one entity over one timestep.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Record {
    pub entity: Entity,
    pub timestep: usize,
    pub timestamp: NaiveDateTime,
    /// Power drawn from the grid (kW).
    pub power_kw: f64,
    /// State of charge after the step; vehicles only.
    pub soc_kwh: Option<f64>,
    /// Incremental energy cost of the step.
    pub cost: f64,
    /// Incremental emissions of the step (gCO2).
    pub emissions_g: f64,
}

/// Ledger of [`Record`]s in commit order.
///
/// Each entity's records are strictly increasing in timestep: once a step is
/// written for an entity, nothing at or before it can be written again.
#[derive(Debug, Clone, Default)]
pub struct TimeseriesRecorder {
    records: Vec<Record>,
    last_written: BTreeMap<Entity, usize>,
}

impl TimeseriesRecorder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a record.
    ///
    /// # Errors
    ///
    /// Returns [`SimError::LedgerConflict`] if the entity already has a record
    /// at or after `record.timestep`, or if the timestep is older than the
    /// newest record in the ledger.
    pub fn append(&mut self, record: Record) -> Result<()> {
        let conflict = self
            .last_written
            .get(&record.entity)
            .is_some_and(|&last| last >= record.timestep)
            || self
                .records
                .last()
                .is_some_and(|newest| newest.timestep > record.timestep);
        if conflict {
            return Err(SimError::LedgerConflict {
                entity: record.entity.to_string(),
                timestep: record.timestep,
            });
        }
        self.last_written
            .insert(record.entity.clone(), record.timestep);
        self.records.push(record);
        Ok(())
    }

    /// All records in commit order.
    pub fn records(&self) -> &[Record] {
        &self.records
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Records with `from <= timestep < to`.
    pub fn range(&self, from: usize, to: usize) -> &[Record] {
        let lo = self.records.partition_point(|r| r.timestep < from);
        let hi = self.records.partition_point(|r| r.timestep < to).max(lo);
        &self.records[lo..hi]
    }

    /// Timeseries of one entity.
    pub fn series<'a>(&'a self, entity: &'a Entity) -> impl Iterator<Item = &'a Record> + 'a {
        self.records.iter().filter(move |r| &r.entity == entity)
    }

    /// Record of `entity` at `timestep`.
    pub fn get(&self, entity: &Entity, timestep: usize) -> Option<&Record> {
        self.range(timestep, timestep + 1)
            .iter()
            .find(|r| &r.entity == entity)
    }

    /// Entities with at least one record.
    pub fn entities(&self) -> impl Iterator<Item = &Entity> {
        self.last_written.keys()
    }

    /// Newest committed timestep.
    pub fn last_timestep(&self) -> Option<usize> {
        self.records.last().map(|r| r.timestep)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn record(entity: Entity, timestep: usize) -> Record {
        Record {
            entity,
            timestep,
            timestamp: NaiveDate::from_ymd_opt(2024, 1, 1)
                .unwrap()
                .and_hms_opt(0, 0, 0)
                .unwrap(),
            power_kw: 1.0,
            soc_kwh: None,
            cost: 0.1,
            emissions_g: 10.0,
        }
    }

    fn ev(id: &str) -> Entity {
        Entity::Vehicle(id.to_string())
    }

    #[test]
    fn append_keeps_commit_order() {
        let mut rec = TimeseriesRecorder::new();
        rec.append(record(Entity::Site, 0)).unwrap();
        rec.append(record(ev("A"), 0)).unwrap();
        rec.append(record(Entity::Site, 1)).unwrap();
        assert_eq!(rec.len(), 3);
        assert_eq!(rec.last_timestep(), Some(1));
        assert_eq!(rec.series(&Entity::Site).count(), 2);
    }

    #[test]
    fn duplicate_timestep_is_conflict() {
        let mut rec = TimeseriesRecorder::new();
        rec.append(record(ev("A"), 0)).unwrap();
        let err = rec.append(record(ev("A"), 0)).unwrap_err();
        assert!(matches!(err, SimError::LedgerConflict { timestep: 0, .. }));
        assert_eq!(rec.len(), 1);
    }

    #[test]
    fn writing_into_the_past_is_conflict() {
        let mut rec = TimeseriesRecorder::new();
        rec.append(record(ev("A"), 2)).unwrap();
        assert!(rec.append(record(ev("B"), 1)).is_err());
        assert!(rec.append(record(ev("B"), 2)).is_ok());
    }

    #[test]
    fn range_and_get() {
        let mut rec = TimeseriesRecorder::new();
        for t in 0..4 {
            rec.append(record(Entity::Site, t)).unwrap();
            rec.append(record(ev("A"), t)).unwrap();
        }
        assert_eq!(rec.range(1, 3).len(), 4);
        assert!(rec.range(3, 1).is_empty());
        assert_eq!(rec.get(&ev("A"), 2).map(|r| r.timestep), Some(2));
        assert!(rec.get(&ev("B"), 2).is_none());
    }

    #[test]
    fn entity_display() {
        assert_eq!(Entity::Site.to_string(), "site:site");
        assert_eq!(Entity::Charger("C1".into()).to_string(), "charger:C1");
    }
}
