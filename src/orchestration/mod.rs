//! Orchestration layer for registry seeding
//!
//! This module provides the run sequence that ties the registry client,
//! token resolution and the npm CLI together.

pub mod seeder;

pub use seeder::{PackageAction, PackageOutcome, RegistrySeeder, RunReport, SeedOptions};
