//! Command-line host: applies a boundary list to a saved page and reports the result.
pub mod cli;
pub mod run;
pub mod settings;
