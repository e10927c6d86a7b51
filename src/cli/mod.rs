//! Command-line host for the wallet session

pub mod commands;
