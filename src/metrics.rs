use std::collections::HashSet;
use std::sync::Arc;

use prometheus::proto::MetricFamily;
use prometheus::{Counter, Encoder, Gauge, GaugeVec, Opts, Registry, TextEncoder};

const STRUCTURE_LABELS: &[&str] = &["structure"];
const DEVICE_LABELS: &[&str] = &["structure", "device"];

const FETCH_ERRORS_NAME: &str = "nest_api_errors_total";
const LAST_SUCCESS_NAME: &str = "nest_last_successful_poll_timestamp_seconds";

/// Labeled gauge series published by the exporter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Series {
    StructureAway,
    AmbientTemperatureCelsius,
    AmbientTemperatureFahrenheit,
    TargetTemperatureCelsius,
    TargetTemperatureFahrenheit,
    Humidity,
    HvacState,
    EmergencyHeatState,
}

impl Series {
    pub const ALL: [Series; 8] = [
        Series::StructureAway,
        Series::AmbientTemperatureCelsius,
        Series::AmbientTemperatureFahrenheit,
        Series::TargetTemperatureCelsius,
        Series::TargetTemperatureFahrenheit,
        Series::Humidity,
        Series::HvacState,
        Series::EmergencyHeatState,
    ];

    // "celcius" matches the names already used by existing dashboards.
    pub fn name(&self) -> &'static str {
        match self {
            Series::StructureAway => "nest_structure_away",
            Series::AmbientTemperatureCelsius => "nest_thermostat_ambient_temperature_celcius",
            Series::AmbientTemperatureFahrenheit => {
                "nest_thermostat_ambient_temperature_fahrenheit"
            }
            Series::TargetTemperatureCelsius => "nest_thermostat_target_temperature_celcius",
            Series::TargetTemperatureFahrenheit => "nest_thermostat_target_temperature_fahrenheit",
            Series::Humidity => "nest_thermostat_humidity",
            Series::HvacState => "nest_thermostat_hvac_state",
            Series::EmergencyHeatState => "nest_thermostat_emergency_heat_state",
        }
    }

    pub fn help(&self) -> &'static str {
        match self {
            Series::StructureAway => "Away status (1=away 0=home 2=unknown)",
            Series::AmbientTemperatureCelsius | Series::AmbientTemperatureFahrenheit => {
                "Ambient temperature at the Nest thermostat"
            }
            Series::TargetTemperatureCelsius | Series::TargetTemperatureFahrenheit => {
                "Target temperature at the Nest thermostat"
            }
            Series::Humidity => "Humidity at the Nest thermostat",
            Series::HvacState => {
                "Whether HVAC system is actively 1=heating, -1=cooling or is 0=off"
            }
            Series::EmergencyHeatState => "Emergency Heat status 1=on 0=off",
        }
    }

    pub fn label_names(&self) -> &'static [&'static str] {
        match self {
            Series::StructureAway => STRUCTURE_LABELS,
            _ => DEVICE_LABELS,
        }
    }
}

struct Inner {
    registry: Registry,
    structure_away: GaugeVec,
    ambient_temperature_c: GaugeVec,
    ambient_temperature_f: GaugeVec,
    target_temperature_c: GaugeVec,
    target_temperature_f: GaugeVec,
    humidity: GaugeVec,
    hvac_state: GaugeVec,
    emergency_heat_state: GaugeVec,
    fetch_errors: Counter,
    last_success: Gauge,
}

/// Process-wide metric state shared by the poller (writer) and the scrape
/// handler (readers).
///
/// Every series is individually synchronized by the prometheus crate; nothing
/// makes a poll cycle atomic with respect to scrapes.
#[derive(Clone)]
pub struct MetricStore {
    inner: Arc<Inner>,
}

impl MetricStore {
    pub fn new() -> Result<Self, prometheus::Error> {
        let registry = Registry::new();

        let fetch_errors = Counter::new(FETCH_ERRORS_NAME, "Number of errors encountered")?;
        registry.register(Box::new(fetch_errors.clone()))?;

        let last_success = Gauge::new(
            LAST_SUCCESS_NAME,
            "Unix time of the last poll where both structures and devices were fetched",
        )?;
        registry.register(Box::new(last_success.clone()))?;

        let register = |series: Series| -> Result<GaugeVec, prometheus::Error> {
            let gauge = GaugeVec::new(
                Opts::new(series.name(), series.help()),
                series.label_names(),
            )?;
            registry.register(Box::new(gauge.clone()))?;
            Ok(gauge)
        };

        let structure_away = register(Series::StructureAway)?;
        let ambient_temperature_c = register(Series::AmbientTemperatureCelsius)?;
        let ambient_temperature_f = register(Series::AmbientTemperatureFahrenheit)?;
        let target_temperature_c = register(Series::TargetTemperatureCelsius)?;
        let target_temperature_f = register(Series::TargetTemperatureFahrenheit)?;
        let humidity = register(Series::Humidity)?;
        let hvac_state = register(Series::HvacState)?;
        let emergency_heat_state = register(Series::EmergencyHeatState)?;

        Ok(Self {
            inner: Arc::new(Inner {
                registry,
                structure_away,
                ambient_temperature_c,
                ambient_temperature_f,
                target_temperature_c,
                target_temperature_f,
                humidity,
                hvac_state,
                emergency_heat_state,
                fetch_errors,
                last_success,
            }),
        })
    }

    fn gauge(&self, series: Series) -> &GaugeVec {
        let inner = &self.inner;
        match series {
            Series::StructureAway => &inner.structure_away,
            Series::AmbientTemperatureCelsius => &inner.ambient_temperature_c,
            Series::AmbientTemperatureFahrenheit => &inner.ambient_temperature_f,
            Series::TargetTemperatureCelsius => &inner.target_temperature_c,
            Series::TargetTemperatureFahrenheit => &inner.target_temperature_f,
            Series::Humidity => &inner.humidity,
            Series::HvacState => &inner.hvac_state,
            Series::EmergencyHeatState => &inner.emergency_heat_state,
        }
    }

    /// Overwrites the sample of `series` for the given label values, in the
    /// order of [`Series::label_names`].
    pub fn set(&self, series: Series, labels: &[&str], value: f64) {
        debug_assert_eq!(labels.len(), series.label_names().len());
        self.gauge(series).with_label_values(labels).set(value);
    }

    /// Current value of a sample, `None` if it was never written (or evicted).
    pub fn get(&self, series: Series, labels: &[&str]) -> Option<f64> {
        let families = self.inner.registry.gather();
        let family = families.iter().find(|f| f.get_name() == series.name())?;
        let wanted: Vec<(&str, &str)> = series
            .label_names()
            .iter()
            .copied()
            .zip(labels.iter().copied())
            .collect();

        family
            .get_metric()
            .iter()
            .find(|m| {
                m.get_label().len() == wanted.len()
                    && wanted.iter().all(|(name, value)| {
                        m.get_label()
                            .iter()
                            .any(|l| l.get_name() == *name && l.get_value() == *value)
                    })
            })
            .map(|m| m.get_gauge().get_value())
    }

    pub fn inc_fetch_errors(&self) {
        self.inner.fetch_errors.inc();
    }

    pub fn fetch_errors(&self) -> f64 {
        self.inner.fetch_errors.get()
    }

    pub fn mark_success(&self, unix_seconds: i64) {
        self.inner.last_success.set(unix_seconds as f64);
    }

    pub fn last_success(&self) -> f64 {
        self.inner.last_success.get()
    }

    /// Removes every sample whose structure (or structure/device pair) is not
    /// in the given sets. Returns the number of samples removed.
    pub fn retain(
        &self,
        structures: &HashSet<String>,
        devices: &HashSet<(String, String)>,
    ) -> usize {
        let families = self.inner.registry.gather();
        let mut removed = 0;

        for series in Series::ALL {
            let Some(family) = families.iter().find(|f| f.get_name() == series.name()) else {
                continue;
            };

            for values in label_values(family, series.label_names()) {
                let keep = match values.as_slice() {
                    [structure] => structures.contains(structure),
                    [structure, device] => devices.contains(&(structure.clone(), device.clone())),
                    _ => true,
                };
                if keep {
                    continue;
                }

                let refs: Vec<&str> = values.iter().map(String::as_str).collect();
                if self.gauge(series).remove_label_values(&refs).is_ok() {
                    removed += 1;
                }
            }
        }

        removed
    }

    pub fn content_type(&self) -> &'static str {
        prometheus::TEXT_FORMAT
    }

    /// Serializes every registered series in the Prometheus text format.
    pub fn encode(&self) -> Result<String, prometheus::Error> {
        let mut buf = Vec::new();
        TextEncoder::new().encode(&self.inner.registry.gather(), &mut buf)?;
        String::from_utf8(buf).map_err(|e| prometheus::Error::Msg(e.to_string()))
    }
}

/// Label values of every sample in `family`, ordered like `names`.
fn label_values(family: &MetricFamily, names: &[&str]) -> Vec<Vec<String>> {
    family
        .get_metric()
        .iter()
        .map(|m| {
            names
                .iter()
                .map(|name| {
                    m.get_label()
                        .iter()
                        .find(|l| l.get_name() == *name)
                        .map(|l| l.get_value().to_string())
                        .unwrap_or_default()
                })
                .collect()
        })
        .collect()
}
