//! Prometheus exporter for Nest thermostats.
//!
//! A [`poller::Poller`] fetches structures and thermostats from the Nest API on
//! a fixed interval and writes them into a [`metrics::MetricStore`], which
//! [`server::serve`] exposes on `/metrics`.

pub mod metrics;
pub mod nest;
pub mod poller;
pub mod server;
