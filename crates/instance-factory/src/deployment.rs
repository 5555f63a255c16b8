//! # Deployment
//!
//! Stands up a working system on a ledger: publish the base implementation
//! from a deployer account, then deploy a factory pointing at it.

use crate::adapters::{InMemoryEventLog, InMemoryLedger, SharedLedger};
use crate::config::{FactoryConfig, ServiceConfig};
use crate::domain::value_objects::Address;
use crate::errors::DeploymentError;
use crate::implementations::{ExampleContract, Implementation};
use crate::ports::outbound::EventLog;
use crate::service::FactoryService;
use std::sync::Arc;
use tracing::info;

/// Publish `logic` at `CREATE(deployer, nonce)`.
///
/// # Errors
///
/// [`DeploymentError::State`] if the derived address already hosts code.
pub async fn publish_implementation(
    ledger: &SharedLedger,
    deployer: Address,
    logic: Arc<dyn Implementation>,
) -> Result<Address, DeploymentError> {
    let name = logic.name();
    let address = ledger.write().await.publish(deployer, logic)?;
    info!(implementation = name, address = ?address, deployer = ?deployer, "Implementation published");
    Ok(address)
}

/// Deploy a factory from `deployer`.
///
/// # Errors
///
/// Config validation failures and ledger write failures.
pub async fn deploy_factory(
    ledger: &SharedLedger,
    events: Arc<dyn EventLog>,
    deployer: Address,
    config: FactoryConfig,
    service_config: ServiceConfig,
) -> Result<FactoryService, DeploymentError> {
    FactoryService::deploy(Arc::clone(ledger), events, deployer, config, service_config).await
}

/// A freshly bootstrapped system.
#[derive(Debug)]
pub struct DeployedSystem {
    /// Shared ledger.
    pub ledger: SharedLedger,
    /// Creation log.
    pub events: Arc<InMemoryEventLog>,
    /// Address of the published [`ExampleContract`].
    pub implementation: Address,
    /// The factory.
    pub factory: FactoryService,
}

/// Publish [`ExampleContract`] and deploy a factory using it as the base
/// implementation, both from `deployer`, on an empty ledger.
///
/// # Errors
///
/// [`DeploymentError::Config`] if an admin is the zero address.
pub async fn bootstrap(
    deployer: Address,
    admins: Vec<Address>,
    service_config: ServiceConfig,
) -> Result<DeployedSystem, DeploymentError> {
    let ledger = InMemoryLedger::new().into_shared();
    let events = Arc::new(InMemoryEventLog::new(
        service_config.event_channel_capacity,
    ));

    let implementation =
        publish_implementation(&ledger, deployer, Arc::new(ExampleContract::new())).await?;
    let factory = deploy_factory(
        &ledger,
        events.clone(),
        deployer,
        FactoryConfig::new(implementation).with_admins(admins),
        service_config,
    )
    .await?;

    Ok(DeployedSystem {
        ledger,
        events,
        implementation,
        factory,
    })
}
