use std::collections::{HashMap, HashSet};
use std::time::Duration;

use chrono::Utc;
use tokio::sync::watch;
use tokio::time::{MissedTickBehavior, interval};
use tracing::{debug, info, warn};

use crate::metrics::{MetricStore, Series};
use crate::nest::{HvacState, Structure, Thermostat, ThermostatApi};

/// How far a single poll cycle got.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PollOutcome {
    Complete,
    StructuresFailed,
    DevicesFailed,
}

/// Fetches the thermostat snapshot and projects it onto the metric store.
pub struct Poller<A> {
    api: A,
    store: MetricStore,
    evict_stale: bool,
}

impl<A: ThermostatApi> Poller<A> {
    pub fn new(api: A, store: MetricStore) -> Self {
        Self {
            api,
            store,
            evict_stale: false,
        }
    }

    /// Remove series of structures and devices missing from a successful poll.
    pub fn with_evict_stale(mut self, evict_stale: bool) -> Self {
        self.evict_stale = evict_stale;
        self
    }

    /// Polls once right away, then every `period` until `shutdown` turns true
    /// or its sender is dropped.
    pub async fn run(&self, period: Duration, mut shutdown: watch::Receiver<bool>) {
        let mut ticker = interval(period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    let outcome = self.poll_once().await;
                    debug!(?outcome, "poll cycle finished");
                }
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        info!("poller stopped");
                        return;
                    }
                }
            }
        }
    }

    pub async fn poll_once(&self) -> PollOutcome {
        let structures = match self.api.fetch_structures().await {
            Ok(s) => s,
            Err(err) => {
                self.store.inc_fetch_errors();
                warn!("{err}");
                return PollOutcome::StructuresFailed;
            }
        };

        let structure_names = self.project_structures(&structures);

        let devices = match self.api.fetch_devices().await {
            Ok(d) => d,
            Err(err) => {
                self.store.inc_fetch_errors();
                warn!("{err}");
                return PollOutcome::DevicesFailed;
            }
        };

        let mut seen_devices = HashSet::new();
        for thermostat in devices.thermostats.values() {
            let structure = structure_names
                .get(&thermostat.structure_id)
                .map(String::as_str)
                .unwrap_or_default();
            self.project_thermostat(structure, thermostat);
            seen_devices.insert((structure.to_string(), thermostat.name.clone()));
        }

        self.store.mark_success(Utc::now().timestamp());

        if self.evict_stale {
            let seen_structures = structure_names.into_values().collect();
            let removed = self.store.retain(&seen_structures, &seen_devices);
            if removed > 0 {
                info!(removed, "evicted stale series");
            }
        }

        debug!(
            structures = structures.len(),
            thermostats = devices.thermostats.len(),
            "projected snapshot"
        );

        PollOutcome::Complete
    }

    /// Writes occupancy gauges and returns the structure id to name lookup
    /// for this cycle.
    fn project_structures(
        &self,
        structures: &HashMap<String, Structure>,
    ) -> HashMap<String, String> {
        let mut names = HashMap::with_capacity(structures.len());

        for (id, structure) in structures {
            names.insert(id.clone(), structure.name.clone());
            debug!(
                structure = %structure.name,
                away = structure.away.as_str(),
                "projected structure"
            );
            self.store.set(
                Series::StructureAway,
                &[structure.name.as_str()],
                structure.away.gauge_value(),
            );
        }

        names
    }

    fn project_thermostat(&self, structure: &str, t: &Thermostat) {
        let labels = [structure, t.name.as_str()];
        debug!(
            structure,
            device = %t.name,
            hvac_state = t.hvac_state.as_str(),
            "projected thermostat"
        );

        self.store.set(Series::AmbientTemperatureCelsius, &labels, t.ambient_temperature_c);
        self.store.set(Series::AmbientTemperatureFahrenheit, &labels, t.ambient_temperature_f);
        self.store.set(Series::TargetTemperatureCelsius, &labels, t.target_temperature_c);
        self.store.set(Series::TargetTemperatureFahrenheit, &labels, t.target_temperature_f);
        self.store.set(Series::Humidity, &labels, t.humidity);
        self.store.set(Series::HvacState, &labels, t.hvac_state.gauge_value());

        // Emergency heat is only reported while the system is idle; an active
        // system keeps whatever value was last written.
        if t.hvac_state == HvacState::Off {
            let emergency = if t.is_using_emergency_heat { 1.0 } else { 0.0 };
            self.store.set(Series::EmergencyHeatState, &labels, emergency);
        }
    }
}
