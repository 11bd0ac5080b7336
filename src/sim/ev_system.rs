//! The simulable site: chargers, vehicle roster, schedule and controller.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::ops::ControlFlow;

use tracing::{debug, info, instrument, warn};

use crate::devices::charger::{Charger, ChargerSpec};
use crate::devices::vehicle::{ConnectionState, Vehicle, VehicleSpec};
use crate::error::{Result, SimError};

use super::clock::Clock;
use super::controller::{ChargeRequest, Controller, Strategy};
use super::kpi::{KpiReport, SiteImpact};
use super::recorder::{Entity, Record, TimeseriesRecorder};
use super::schedule::Schedule;
use super::site_meter::SiteMeter;
use super::types::{StepResult, UnmetTarget, VehicleSummary};

/// Immutable description of one simulation setup.
///
/// An `EvSystem` never changes while it runs: all mutable state (battery
/// levels, charger assignments, the ledger) lives in a [`SimContext`]. Any
/// number of contexts can be run against the same system independently.
#[derive(Debug, Clone)]
pub struct EvSystem {
    schedule: Schedule,
    vehicles: Vec<VehicleSpec>,
    chargers: Vec<ChargerSpec>,
    controller: Controller,
    /// Vehicle indices ordered by (arrival, id).
    arrival_order: Vec<usize>,
    /// Chargers some vehicle is pinned to; the shared pool skips them.
    reserved: HashSet<String>,
    /// Physical cars, ordered by id; the ledger keeps one series per car.
    cars: Vec<CarSessions>,
}

/// A physical car and the indices of its sessions, ordered by arrival.
#[derive(Debug, Clone)]
struct CarSessions {
    id: String,
    sessions: Vec<usize>,
}

/// Mutable state of one run.
#[derive(Debug, Clone)]
pub struct SimContext {
    vehicles: Vec<Vehicle>,
    chargers: Vec<Charger>,
    charger_index: HashMap<String, usize>,
    vehicle_index: HashMap<String, usize>,
    recorder: TimeseriesRecorder,
    steps: Vec<StepResult>,
    unmet: Vec<UnmetTarget>,
    meter: SiteMeter,
    /// Per car, the position in `CarSessions::sessions` of its latest
    /// session that has arrived (or its first, before any arrival).
    car_cursor: Vec<usize>,
    next_step: usize,
}

impl SimContext {
    /// Next timestep to simulate.
    pub fn next_step(&self) -> usize {
        self.next_step
    }

    pub fn vehicles(&self) -> &[Vehicle] {
        &self.vehicles
    }

    pub fn vehicle(&self, id: &str) -> Option<&Vehicle> {
        self.vehicle_index.get(id).map(|&i| &self.vehicles[i])
    }

    pub fn chargers(&self) -> &[Charger] {
        &self.chargers
    }

    pub fn recorder(&self) -> &TimeseriesRecorder {
        &self.recorder
    }

    /// Site-level results of every committed step.
    pub fn steps(&self) -> &[StepResult] {
        &self.steps
    }

    /// Vehicles that have departed below target so far.
    pub fn unmet_targets(&self) -> &[UnmetTarget] {
        &self.unmet
    }
}

/// Everything a finished run produced.
#[derive(Debug, Clone)]
pub struct RunOutcome {
    pub strategy: Strategy,
    pub dt_hours: f64,
    pub steps: Vec<StepResult>,
    pub recorder: TimeseriesRecorder,
    pub vehicles: Vec<VehicleSummary>,
    pub unmet_targets: Vec<UnmetTarget>,
    pub kpi: KpiReport,
    pub site_impact: SiteImpact,
}

impl EvSystem {
    /// Builds a system from a validated schedule, a vehicle roster and chargers.
    ///
    /// # Errors
    ///
    /// Returns [`SimError::InvalidInput`] for invalid vehicle or charger
    /// parameters, duplicate ids, a vehicle pinned to an unknown charger,
    /// two sessions pinned to the same charger with overlapping windows, or
    /// two sessions of one car that overlap or disagree on battery size.
    pub fn new(
        schedule: Schedule,
        vehicles: Vec<VehicleSpec>,
        chargers: Vec<ChargerSpec>,
        strategy: Strategy,
    ) -> Result<Self> {
        let reserved = Self::validate_roster(&vehicles, &chargers)?;
        let cars = Self::group_cars(&vehicles)?;

        let mut arrival_order: Vec<usize> = (0..vehicles.len()).collect();
        arrival_order.sort_by(|&a, &b| {
            vehicles[a]
                .arrival
                .cmp(&vehicles[b].arrival)
                .then_with(|| vehicles[a].id.cmp(&vehicles[b].id))
        });

        Ok(Self {
            schedule,
            vehicles,
            chargers,
            controller: Controller::new(strategy),
            arrival_order,
            reserved,
            cars,
        })
    }

    /// Groups sessions by car and checks that each car is in one place at
    /// a time with one battery.
    fn group_cars(vehicles: &[VehicleSpec]) -> Result<Vec<CarSessions>> {
        let mut by_car: BTreeMap<&str, Vec<usize>> = BTreeMap::new();
        for (i, v) in vehicles.iter().enumerate() {
            by_car.entry(v.car_id()).or_default().push(i);
        }

        let mut cars = Vec::with_capacity(by_car.len());
        for (id, mut sessions) in by_car {
            sessions.sort_by_key(|&i| (vehicles[i].arrival, vehicles[i].departure));
            for pair in sessions.windows(2) {
                let (a, b) = (&vehicles[pair[0]], &vehicles[pair[1]]);
                if b.arrival < a.departure {
                    return Err(SimError::invalid_input(
                        format!("car[{id}]"),
                        format!("sessions {} and {} overlap", a.id, b.id),
                    ));
                }
                if a.battery_capacity_kwh != b.battery_capacity_kwh {
                    return Err(SimError::invalid_input(
                        format!("car[{id}].battery_capacity_kwh"),
                        format!(
                            "sessions {} and {} differ ({} vs {})",
                            a.id, b.id, a.battery_capacity_kwh, b.battery_capacity_kwh
                        ),
                    ));
                }
            }
            cars.push(CarSessions {
                id: id.to_string(),
                sessions,
            });
        }
        Ok(cars)
    }

    /// Checks ids, pinned chargers and pinned-session overlaps; returns the
    /// ids of chargers reserved by pinned sessions.
    fn validate_roster(
        vehicles: &[VehicleSpec],
        chargers: &[ChargerSpec],
    ) -> Result<HashSet<String>> {
        let mut charger_ids = HashSet::new();
        for c in chargers {
            c.validate()?;
            if !charger_ids.insert(c.id.as_str()) {
                return Err(SimError::invalid_input(
                    "chargers",
                    format!("duplicate charger id {}", c.id),
                ));
            }
        }

        let mut vehicle_ids = HashSet::new();
        let mut pinned: HashMap<&str, Vec<&VehicleSpec>> = HashMap::new();
        for v in vehicles {
            Vehicle::from_spec(v)?;
            if !vehicle_ids.insert(v.id.as_str()) {
                return Err(SimError::invalid_input(
                    "vehicles",
                    format!("duplicate vehicle id {}", v.id),
                ));
            }
            if let Some(cid) = v.charger.as_deref() {
                if !charger_ids.contains(cid) {
                    return Err(SimError::invalid_input(
                        format!("vehicle[{}].charger", v.id),
                        format!("unknown charger {cid}"),
                    ));
                }
                pinned.entry(cid).or_default().push(v);
            }
        }

        for (cid, sessions) in &mut pinned {
            sessions.sort_by_key(|v| v.arrival);
            for pair in sessions.windows(2) {
                if pair[1].arrival < pair[0].departure {
                    return Err(SimError::invalid_input(
                        format!("charger[{cid}]"),
                        format!(
                            "sessions {} and {} overlap",
                            pair[0].id, pair[1].id
                        ),
                    ));
                }
            }
        }
        Ok(pinned.keys().map(|k| k.to_string()).collect())
    }

    pub fn schedule(&self) -> &Schedule {
        &self.schedule
    }

    pub fn vehicle_specs(&self) -> &[VehicleSpec] {
        &self.vehicles
    }

    /// Ids of the physical cars, in ledger order.
    pub fn car_ids(&self) -> impl Iterator<Item = &str> {
        self.cars.iter().map(|c| c.id.as_str())
    }

    pub fn charger_specs(&self) -> &[ChargerSpec] {
        &self.chargers
    }

    pub fn strategy(&self) -> Strategy {
        self.controller.strategy()
    }

    /// Same setup under another strategy.
    pub fn with_strategy(&self, strategy: Strategy) -> Self {
        Self {
            controller: Controller::new(strategy),
            ..self.clone()
        }
    }

    /// Summed charger ratings (kW).
    pub fn installed_capacity_kw(&self) -> f64 {
        self.chargers.iter().fold(0.0, |acc, c| acc + c.rating_kw)
    }

    /// Total charger capital cost.
    pub fn capital_cost(&self) -> f64 {
        self.chargers.iter().fold(0.0, |acc, c| acc + c.capital_cost)
    }

    /// Total charger maintenance per year.
    pub fn annual_maintenance_cost(&self) -> f64 {
        self.chargers
            .iter()
            .fold(0.0, |acc, c| acc + c.annual_maintenance_cost())
    }

    /// Shortest charger lifetime in years, if there are chargers.
    pub fn lifetime_years(&self) -> Option<u32> {
        self.chargers.iter().map(|c| c.lifetime_years).min()
    }

    /// Fresh run state: every vehicle unconnected at its initial state of charge.
    ///
    /// # Errors
    ///
    /// Propagates vehicle and charger construction errors.
    pub fn new_context(&self) -> Result<SimContext> {
        let vehicles = self
            .vehicles
            .iter()
            .map(Vehicle::from_spec)
            .collect::<Result<Vec<_>>>()?;
        let chargers = self
            .chargers
            .iter()
            .cloned()
            .map(Charger::new)
            .collect::<Result<Vec<_>>>()?;
        let vehicle_index = vehicles
            .iter()
            .enumerate()
            .map(|(i, v)| (v.id().to_string(), i))
            .collect();
        let charger_index = chargers
            .iter()
            .enumerate()
            .map(|(i, c)| (c.id().to_string(), i))
            .collect();

        Ok(SimContext {
            vehicles,
            chargers,
            charger_index,
            vehicle_index,
            recorder: TimeseriesRecorder::new(),
            steps: Vec::with_capacity(self.schedule.len()),
            unmet: Vec::new(),
            meter: SiteMeter::new(),
            car_cursor: vec![0; self.cars.len()],
            next_step: 0,
        })
    }

    /// Simulates timestep `t` on `ctx` and commits its records.
    ///
    /// Departures are resolved first, then arrivals take a charger (their
    /// pinned one, or the first free unreserved one), standby loss is
    /// applied, the controller allocates power, and chargers deliver it.
    ///
    /// # Errors
    ///
    /// * [`SimError::OutOfOrder`] if `t` is not the context's next step.
    /// * [`SimError::ScheduleMismatch`] if the schedule does not cover `t`.
    /// * [`SimError::AlreadyOccupied`] / [`SimError::NotConnected`] on a broken
    ///   charger assignment.
    pub fn step(&self, ctx: &mut SimContext, t: usize) -> Result<StepResult> {
        if t != ctx.next_step {
            return Err(SimError::OutOfOrder {
                expected: ctx.next_step,
                got: t,
            });
        }
        let row = self.schedule.row(t).ok_or(SimError::ScheduleMismatch {
            requested: t + 1,
            available: self.schedule.len(),
        })?;
        let dt = self.schedule.dt_hours();

        self.resolve_departures(ctx, t);
        let waiting = self.resolve_arrivals(ctx, t)?;

        let mut requests = Vec::new();
        for v in ctx.vehicles.iter_mut().filter(|v| v.is_connected()) {
            v.battery_mut().apply_standby_loss(dt);
            let Some(cid) = v.charger() else { continue };
            let Some(&ci) = ctx.charger_index.get(cid) else {
                continue;
            };
            let charger = &ctx.chargers[ci];
            requests.push(ChargeRequest {
                charger_id: charger.id().to_string(),
                vehicle_id: v.id().to_string(),
                rate_limit_kw: charger.rating_kw().min(v.battery().max_charge_kw()),
                need_kwh: v.energy_need_kwh(),
                efficiency: v.battery().efficiency(),
                arrival: v.arrival(),
                departure: v.departure(),
            });
        }

        let allocations = self.controller.allocate(t, &self.schedule, &requests);

        ctx.meter.reset(row.demand_limit_kw, row.other_site_load_kw);
        let mut charger_draw: HashMap<&str, (f64, f64)> = HashMap::new();
        let mut car_draw: HashMap<String, f64> = HashMap::new();
        let mut ev_cost = 0.0;
        let mut ev_emissions_g = 0.0;
        let mut charging = 0;

        for alloc in &allocations {
            let (Some(&ci), Some(&vi)) = (
                ctx.charger_index.get(&alloc.charger_id),
                ctx.vehicle_index.get(&alloc.vehicle_id),
            ) else {
                return Err(SimError::NotConnected {
                    charger: alloc.charger_id.clone(),
                    vehicle: alloc.vehicle_id.clone(),
                });
            };
            let vehicle = &mut ctx.vehicles[vi];
            let stored_kwh = ctx.chargers[ci].deliver(vehicle, alloc.power_kw, dt)?;
            let drawn_kwh = stored_kwh / vehicle.battery().efficiency();
            vehicle.record_step(stored_kwh, drawn_kwh);

            let drawn_kw = if dt > 0.0 { drawn_kwh / dt } else { 0.0 };
            if drawn_kwh > 0.0 {
                charging += 1;
            }
            ctx.meter.add_ev_kw(drawn_kw);
            ev_cost += drawn_kwh * row.price_per_kwh;
            ev_emissions_g += drawn_kwh * row.emission_factor_g_per_kwh;
            charger_draw.insert(ctx.chargers[ci].id(), (drawn_kw, drawn_kwh));
            *car_draw.entry(vehicle.car_id().to_string()).or_default() += drawn_kw;
        }

        let within_demand_limit = ctx.meter.within_limit();
        if !within_demand_limit && self.strategy().respects_demand_limit() {
            warn!(
                timestep = t,
                site_kw = ctx.meter.total_kw(),
                limit_kw = row.demand_limit_kw,
                "site load above demand limit"
            );
        }

        let result = StepResult {
            timestep: t,
            timestamp: row.timestamp,
            demand_limit_kw: row.demand_limit_kw,
            other_site_load_kw: row.other_site_load_kw,
            ev_load_kw: ctx.meter.ev_load_kw(),
            site_load_kw: ctx.meter.total_kw(),
            headroom_kw: row.headroom_kw(),
            price_per_kwh: row.price_per_kwh,
            emission_factor_g_per_kwh: row.emission_factor_g_per_kwh,
            ev_cost,
            ev_emissions_g,
            connected_vehicles: requests.len(),
            charging_vehicles: charging,
            waiting_vehicles: waiting,
            within_demand_limit,
        };

        let site_kwh = result.site_load_kw * dt;
        let mut records = Vec::with_capacity(1 + ctx.chargers.len() + self.cars.len());
        records.push(Record {
            entity: Entity::Site,
            timestep: t,
            timestamp: row.timestamp,
            power_kw: result.site_load_kw,
            soc_kwh: None,
            cost: site_kwh * row.price_per_kwh,
            emissions_g: site_kwh * row.emission_factor_g_per_kwh,
        });
        for c in &ctx.chargers {
            let (kw, kwh) = charger_draw.get(c.id()).copied().unwrap_or((0.0, 0.0));
            records.push(Record {
                entity: Entity::Charger(c.id().to_string()),
                timestep: t,
                timestamp: row.timestamp,
                power_kw: kw,
                soc_kwh: None,
                cost: kwh * row.price_per_kwh,
                emissions_g: kwh * row.emission_factor_g_per_kwh,
            });
        }
        for (car, cursor) in self.cars.iter().zip(ctx.car_cursor.iter_mut()) {
            while car
                .sessions
                .get(*cursor + 1)
                .is_some_and(|&next| self.vehicles[next].arrival <= t)
            {
                *cursor += 1;
            }
            let v = &ctx.vehicles[car.sessions[*cursor]];
            let kw = car_draw.get(&car.id).copied().unwrap_or(0.0);
            let kwh = kw * dt;
            records.push(Record {
                entity: Entity::Vehicle(car.id.clone()),
                timestep: t,
                timestamp: row.timestamp,
                power_kw: kw,
                soc_kwh: Some(v.battery().state_of_charge()),
                cost: kwh * row.price_per_kwh,
                emissions_g: kwh * row.emission_factor_g_per_kwh,
            });
        }
        for record in records {
            ctx.recorder.append(record)?;
        }

        debug!(
            timestep = t,
            ev_kw = result.ev_load_kw,
            site_kw = result.site_load_kw,
            connected = result.connected_vehicles,
            waiting = result.waiting_vehicles,
            "step committed"
        );

        ctx.steps.push(result.clone());
        ctx.next_step += 1;
        Ok(result)
    }

    /// Departs every vehicle whose window has closed at `t`.
    fn resolve_departures(&self, ctx: &mut SimContext, t: usize) {
        for v in ctx.vehicles.iter_mut() {
            if v.state() == ConnectionState::Departed || v.departure() > t {
                continue;
            }
            if let Some(&ci) = v.charger().and_then(|cid| ctx.charger_index.get(cid)) {
                ctx.chargers[ci].disconnect();
            }
            if let Some(unmet) = v.depart(t) {
                warn!(
                    vehicle = %unmet.vehicle_id,
                    soc_kwh = unmet.soc_kwh,
                    target_kwh = unmet.target_kwh,
                    "vehicle departed below target"
                );
                ctx.unmet.push(unmet);
            } else {
                debug!(vehicle = v.id(), timestep = t, "vehicle departed");
            }
        }
    }

    /// Connects arriving vehicles and returns how many are still waiting.
    fn resolve_arrivals(&self, ctx: &mut SimContext, t: usize) -> Result<usize> {
        let mut waiting = 0;
        for &vi in &self.arrival_order {
            let vehicle = &ctx.vehicles[vi];
            if vehicle.state() != ConnectionState::Unconnected || !vehicle.is_connectable(t) {
                continue;
            }

            let slot = match vehicle.pinned_charger() {
                Some(cid) => ctx.charger_index.get(cid).copied(),
                None => ctx
                    .chargers
                    .iter()
                    .position(|c| c.is_free() && !self.reserved.contains(c.id())),
            };

            let Some(ci) = slot else {
                waiting += 1;
                if t == vehicle.arrival() {
                    warn!(vehicle = vehicle.id(), timestep = t, "no free charger, queueing");
                }
                continue;
            };

            ctx.chargers[ci].connect(&ctx.vehicles[vi])?;
            let charger_id = ctx.chargers[ci].id().to_string();
            ctx.vehicles[vi].connect(&charger_id);
            debug!(
                vehicle = ctx.vehicles[vi].id(),
                charger = %charger_id,
                timestep = t,
                "vehicle connected"
            );
        }
        Ok(waiting)
    }

    /// Steps `ctx` up to `horizon`, calling `on_step` after each committed step.
    ///
    /// Stops early when `on_step` breaks; the context can then be resumed
    /// with another call.
    ///
    /// # Errors
    ///
    /// Returns [`SimError::ScheduleMismatch`] before stepping if the schedule
    /// is shorter than `horizon`, and any error raised by [`EvSystem::step`].
    pub fn run_until(
        &self,
        ctx: &mut SimContext,
        horizon: usize,
        mut on_step: impl FnMut(&StepResult) -> ControlFlow<()>,
    ) -> Result<ControlFlow<()>> {
        self.schedule.ensure_covers(horizon)?;

        let mut clock = Clock::starting_at(ctx.next_step, horizon);
        let flow = clock.run_while(|t| match self.step(ctx, t) {
            Ok(result) => match on_step(&result) {
                ControlFlow::Continue(()) => ControlFlow::Continue(()),
                ControlFlow::Break(()) => ControlFlow::Break(Ok(())),
            },
            Err(e) => ControlFlow::Break(Err(e)),
        });

        match flow {
            ControlFlow::Continue(()) => Ok(ControlFlow::Continue(())),
            ControlFlow::Break(Ok(())) => {
                info!(stopped_at = ctx.next_step, "run stopped early");
                Ok(ControlFlow::Break(()))
            }
            ControlFlow::Break(Err(e)) => Err(e),
        }
    }

    /// Runs `horizon` steps on a fresh context and summarises the result.
    ///
    /// # Errors
    ///
    /// Returns [`SimError::ScheduleMismatch`] without simulating anything if
    /// the schedule is shorter than `horizon`; otherwise the first fatal step error.
    #[instrument(skip(self), fields(strategy = %self.strategy()))]
    pub fn run(&self, horizon: usize) -> Result<RunOutcome> {
        self.schedule.ensure_covers(horizon)?;
        info!(
            vehicles = self.vehicles.len(),
            chargers = self.chargers.len(),
            horizon,
            "starting run"
        );

        let mut ctx = self.new_context()?;
        let flow = self.run_until(&mut ctx, horizon, |_| ControlFlow::Continue(()))?;
        debug_assert!(flow.is_continue());
        let outcome = self.finish(ctx);

        info!(
            ev_energy_kwh = outcome.kpi.ev_energy_drawn_kwh,
            ev_cost = outcome.kpi.ev_cost,
            unmet = outcome.unmet_targets.len(),
            "run finished"
        );
        Ok(outcome)
    }

    /// Closes a run: vehicles still on site leave at the last simulated step
    /// and are checked against their targets.
    pub fn finish(&self, mut ctx: SimContext) -> RunOutcome {
        let end = ctx.next_step;
        for v in ctx.vehicles.iter_mut() {
            if let Some(&ci) = v.charger().and_then(|cid| ctx.charger_index.get(cid)) {
                ctx.chargers[ci].disconnect();
            }
            // vehicles that never arrived have nothing to report
            if v.arrival() >= end && v.state() == ConnectionState::Unconnected {
                continue;
            }
            if let Some(unmet) = v.depart(end) {
                warn!(
                    vehicle = %unmet.vehicle_id,
                    soc_kwh = unmet.soc_kwh,
                    target_kwh = unmet.target_kwh,
                    "vehicle below target at end of run"
                );
                ctx.unmet.push(unmet);
            }
        }

        let vehicles: Vec<VehicleSummary> = ctx
            .vehicles
            .iter()
            .map(|v| VehicleSummary {
                id: v.id().to_string(),
                energy_delivered_kwh: v.energy_stored_kwh(),
                energy_drawn_kwh: v.energy_drawn_kwh(),
                final_soc_kwh: v.battery().state_of_charge(),
                target_soc_kwh: v.target_soc_kwh(),
                target_met: v.target_met(),
            })
            .collect();

        let dt_hours = self.schedule.dt_hours();
        let kpi = KpiReport::from_results(&ctx.steps, &vehicles, &ctx.unmet, dt_hours);
        let site_impact = SiteImpact::from_results(
            &ctx.steps,
            dt_hours,
            self.capital_cost(),
            self.annual_maintenance_cost(),
        );

        RunOutcome {
            strategy: self.strategy(),
            dt_hours,
            steps: ctx.steps,
            recorder: ctx.recorder,
            vehicles,
            unmet_targets: ctx.unmet,
            kpi,
            site_impact,
        }
    }
}
