//! Simulation and estimation engine for the Collector.
//!
//! This crate owns the draw loop: repeated weighted draws from a fixed
//! population, each independently classified as special and, if so,
//! subjected to a retention trial, until every member has been retained
//! at least once.
//!
//! It performs no log or checkpoint I/O of its own. Persistence happens
//! behind the [`RunObserver`] trait, which the binary implements on top
//! of the event and store crates.
//!
//! # Modules
//!
//! - [`config`] -- Configuration loading from `collector-config.yaml` into
//!   strongly-typed structs.
//! - [`population`] -- Population loading, weighting, and validation.
//! - [`sampler`] -- Weighted sampler over the population.
//! - [`encounter`] -- The per-draw state machine.
//! - [`estimator`] -- Weighted coupon-collector completion estimate.
//! - [`simulation`] -- The owned simulation with its seeded generator.
//! - [`clock`] -- Cumulative elapsed time across sessions.
//! - [`operator`] -- Stop signal and end reasons.
//! - [`runner`] -- The draw loop and [`RunObserver`].
//! - [`report`] -- Final run statistics.
//!
//! [`RunObserver`]: runner::RunObserver

pub mod clock;
pub mod config;
pub mod encounter;
pub mod estimator;
pub mod operator;
pub mod population;
pub mod report;
pub mod runner;
pub mod sampler;
pub mod simulation;
