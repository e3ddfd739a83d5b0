use std::convert::Infallible;
use std::str::FromStr;

use serde::Deserialize;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(from = "Option<String>")]
pub enum Occupancy {
    Home,
    Away,
    #[default]
    Unknown,
}

impl Occupancy {
    pub fn as_str(&self) -> &'static str {
        match self {
            Occupancy::Home => "home",
            Occupancy::Away => "away",
            Occupancy::Unknown => "unknown",
        }
    }

    /// Value of the `nest_structure_away` gauge.
    pub fn gauge_value(&self) -> f64 {
        match self {
            Occupancy::Away => 1.0,
            Occupancy::Home => 0.0,
            Occupancy::Unknown => 2.0,
        }
    }
}

impl FromStr for Occupancy {
    type Err = Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "home" => Ok(Occupancy::Home),
            "away" => Ok(Occupancy::Away),
            _ => Ok(Occupancy::Unknown),
        }
    }
}

impl From<Option<String>> for Occupancy {
    fn from(value: Option<String>) -> Self {
        match value {
            Some(s) => s.parse().unwrap_or_default(),
            None => Occupancy::Unknown,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct Structure {
    #[serde(default, deserialize_with = "super::nullable::default_on_null")]
    pub structure_id: String,

    #[serde(default, deserialize_with = "super::nullable::default_on_null")]
    pub name: String,

    #[serde(default)]
    pub away: Occupancy,
}
