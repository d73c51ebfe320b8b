//! Registry Seeder - the one-shot run sequence
//!
//! install credentials → wait → unpublish every fixture → publish every
//! fixture. The first error aborts the run; nothing is retried.

use crate::core::config::FixtureSet;
use crate::core::error::SeedError;
use crate::core::state_machine::{RunState, RunStateMachine, StateTransition};
use crate::core::traits::{PackageOperations, RegistryApi, UnpublishOutcome};
use crate::registry::tokens::{TokenResolver, TokenSource, held_token};
use crate::security::NpmrcInstaller;
use serde::Serialize;
use std::time::Duration;
use tracing::{error, info, warn};

/// What happened to a package during the run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PackageAction {
    Unpublished,
    NotPublished,
    Published,
}

/// One step of the run for one package
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PackageOutcome {
    pub package: String,
    pub owner: String,
    pub action: PackageAction,
}

/// Summary of a successful run
#[derive(Debug, Clone, Serialize)]
pub struct RunReport {
    pub outcomes: Vec<PackageOutcome>,
    pub tokens: Vec<(String, TokenSource)>,
    pub transitions: Vec<StateTransition>,
}

impl RunReport {
    pub fn published(&self) -> Vec<&str> {
        self.packages_with(PackageAction::Published)
    }

    fn packages_with(&self, action: PackageAction) -> Vec<&str> {
        self.outcomes
            .iter()
            .filter(|o| o.action == action)
            .map(|o| o.package.as_str())
            .collect()
    }
}

/// Seeding options
#[derive(Debug, Clone)]
pub struct SeedOptions {
    /// Fixed wait before the first registry request
    pub startup_delay: Duration,
}

/// Drives the run sequence against a registry and a package tool
pub struct RegistrySeeder<'a> {
    api: &'a dyn RegistryApi,
    packages: &'a dyn PackageOperations,
    credentials: Option<NpmrcInstaller>,
    options: SeedOptions,
}

impl<'a> RegistrySeeder<'a> {
    pub fn new(
        api: &'a dyn RegistryApi,
        packages: &'a dyn PackageOperations,
        options: SeedOptions,
    ) -> Self {
        Self {
            api,
            packages,
            credentials: None,
            options,
        }
    }

    /// Install `.npmrc` before anything else happens
    pub fn with_credentials(mut self, installer: NpmrcInstaller) -> Self {
        self.credentials = Some(installer);
        self
    }

    /// Run once over `fixtures`, updating held tokens in place
    pub async fn run(&self, fixtures: &mut FixtureSet) -> Result<RunReport, SeedError> {
        let mut machine = RunStateMachine::new();
        let mut report = RunReport {
            outcomes: Vec::new(),
            tokens: Vec::new(),
            transitions: Vec::new(),
        };

        match self.run_steps(&mut machine, fixtures, &mut report).await {
            Ok(()) => {
                report.transitions = machine.transitions().to_vec();
                Ok(report)
            }
            Err(err) => {
                error!(state = %machine.state(), code = err.code(), "seeding failed");
                if let Err(transition_err) = machine.fail(&err) {
                    warn!("{}", transition_err);
                }
                Err(err)
            }
        }
    }

    async fn run_steps(
        &self,
        machine: &mut RunStateMachine,
        fixtures: &mut FixtureSet,
        report: &mut RunReport,
    ) -> Result<(), SeedError> {
        if let Some(installer) = &self.credentials {
            installer.install().await?;
        }

        if !self.options.startup_delay.is_zero() {
            info!(
                "Wait {} sec until registry is up",
                self.options.startup_delay.as_secs()
            );
            tokio::time::sleep(self.options.startup_delay).await;
        }

        let resolver = TokenResolver::new(self.api);

        machine.transition(RunState::UnpublishAll)?;
        for user in fixtures.users.names() {
            let source = resolver.resolve(&mut fixtures.users, &user).await?;
            report.tokens.push((user.clone(), source));

            let owned = fixtures.packages_owned_by(&user);
            if owned.is_empty() {
                warn!(user = %user, "user owns no fixture package");
            }
            for package in owned {
                let token = held_token(&fixtures.users, &user)?;
                let action = match self.packages.unpublish(&token, &package).await? {
                    UnpublishOutcome::Removed => PackageAction::Unpublished,
                    UnpublishOutcome::NotFound => PackageAction::NotPublished,
                };
                report.outcomes.push(PackageOutcome {
                    package,
                    owner: user.clone(),
                    action,
                });
            }
        }

        machine.transition(RunState::PublishAll)?;
        for user in fixtures.users.names() {
            let source = resolver.resolve(&mut fixtures.users, &user).await?;
            report.tokens.push((user.clone(), source));

            for package in fixtures.packages_owned_by(&user) {
                let token = held_token(&fixtures.users, &user)?;
                self.packages.publish(&token, &package).await?;
                report.outcomes.push(PackageOutcome {
                    package,
                    owner: user.clone(),
                    action: PackageAction::Published,
                });
            }
        }

        machine.transition(RunState::DoneIdle)?;
        info!("DONE");
        Ok(())
    }
}
