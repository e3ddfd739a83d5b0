use std::collections::HashMap;
use std::convert::Infallible;
use std::str::FromStr;

use serde::Deserialize;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(from = "Option<String>")]
pub enum HvacState {
    Heating,
    Cooling,
    #[default]
    Off,
}

impl HvacState {
    pub fn as_str(&self) -> &'static str {
        match self {
            HvacState::Heating => "heating",
            HvacState::Cooling => "cooling",
            HvacState::Off => "off",
        }
    }

    /// Value of the `nest_thermostat_hvac_state` gauge.
    pub fn gauge_value(&self) -> f64 {
        match self {
            HvacState::Heating => 1.0,
            HvacState::Cooling => -1.0,
            HvacState::Off => 0.0,
        }
    }
}

impl FromStr for HvacState {
    type Err = Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "heating" => Ok(HvacState::Heating),
            "cooling" => Ok(HvacState::Cooling),
            _ => Ok(HvacState::Off),
        }
    }
}

impl From<Option<String>> for HvacState {
    fn from(value: Option<String>) -> Self {
        match value {
            Some(s) => s.parse().unwrap_or_default(),
            None => HvacState::Off,
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Thermostat {
    #[serde(deserialize_with = "super::nullable::default_on_null")]
    pub device_id: String,

    #[serde(deserialize_with = "super::nullable::default_on_null")]
    pub name: String,

    #[serde(deserialize_with = "super::nullable::default_on_null")]
    pub structure_id: String,

    #[serde(deserialize_with = "super::nullable::default_on_null")]
    pub ambient_temperature_c: f64,

    #[serde(deserialize_with = "super::nullable::default_on_null")]
    pub ambient_temperature_f: f64,

    #[serde(deserialize_with = "super::nullable::default_on_null")]
    pub target_temperature_c: f64,

    #[serde(deserialize_with = "super::nullable::default_on_null")]
    pub target_temperature_f: f64,

    #[serde(deserialize_with = "super::nullable::default_on_null")]
    pub humidity: f64,

    pub hvac_state: HvacState,

    #[serde(deserialize_with = "super::nullable::default_on_null")]
    pub is_using_emergency_heat: bool,
}

/// Response of `GET /devices`. Device families other than thermostats are
/// not exported and are skipped during decoding.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Devices {
    #[serde(deserialize_with = "super::nullable::default_on_null")]
    pub thermostats: HashMap<String, Thermostat>,
}
