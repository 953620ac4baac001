//! Integration tests for the node store and the state controller

mod controller_flows;
mod path_resolution;
mod store_concurrency;
mod store_scenarios;
