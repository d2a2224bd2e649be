// Library for tests to access modules

pub mod aggregator;
pub mod auth;
pub mod backends;
pub mod config;
pub mod error;
pub mod models;
pub mod parsers;
pub mod ranking;
pub mod remote;
pub mod routes;
pub mod units;
