//! Factory entry points.

use super::{LedgerGateway, ServiceStats};
use crate::adapters::{Journal, SharedLedger};
use crate::config::{FactoryConfig, ServiceConfig};
use crate::domain::entities::{Deployment, FactoryState, InstanceKind};
use crate::domain::governance::AdminSet;
use crate::domain::invariants::check_failure_atomicity_invariant;
use crate::domain::services::compute_contract_address;
use crate::domain::value_objects::{Address, Bytes, Salt};
use crate::engine::{CloneEngine, ProxyEngine};
use crate::errors::{DeploymentError, FactoryError};
use crate::events::FactoryEvent;
use crate::executor::Executor;
use crate::ports::inbound::FactoryApi;
use crate::ports::outbound::{EventLog, LedgerState};

use async_trait::async_trait;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{error, info, instrument, warn, Span};
use uuid::Uuid;

/// Code placed at the factory's own address.
pub const FACTORY_RUNTIME_CODE: &[u8] = b"\xfeinstance-factory.v1";

/// A deployed factory.
///
/// Holds the immutable factory record and handles to the shared ledger and
/// event log.
pub struct FactoryService {
    /// Immutable factory record.
    state: FactoryState,
    /// Shared ledger.
    ledger: SharedLedger,
    /// Creation log.
    events: Arc<dyn EventLog>,
    /// Clone creation.
    clone_engine: CloneEngine,
    /// Proxy creation.
    proxy_engine: ProxyEngine,
    /// Executor shared with the gateway.
    executor: Executor,
    /// Service configuration.
    config: ServiceConfig,
    /// Service statistics.
    stats: Arc<RwLock<ServiceStats>>,
}

impl std::fmt::Debug for FactoryService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FactoryService")
            .field("state", &self.state)
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl FactoryService {
    /// Deploy a factory at `CREATE(deployer, nonce)`.
    ///
    /// The base implementation is not required to exist yet; deployments
    /// fail with [`FactoryError::InvalidBaseImplementation`] until it does.
    #[instrument(skip_all, fields(deployer = ?deployer))]
    pub async fn deploy(
        ledger: SharedLedger,
        events: Arc<dyn EventLog>,
        deployer: Address,
        config: FactoryConfig,
        service_config: ServiceConfig,
    ) -> Result<Self, DeploymentError> {
        config.validate()?;
        service_config.validate()?;

        let address = {
            let mut guard = ledger.write().await;
            let address = compute_contract_address(deployer, guard.nonce(&deployer));
            guard.set_code(address, Bytes::from_slice(FACTORY_RUNTIME_CODE))?;
            guard.increment_nonce(deployer);
            address
        };

        info!(
            factory = ?address,
            base_implementation = ?config.base_implementation,
            admins = config.admins.len(),
            "Factory deployed"
        );

        let executor = Executor::new(service_config.max_call_depth);
        Ok(Self {
            state: FactoryState::new(
                address,
                config.base_implementation,
                AdminSet::new(config.admins),
            ),
            ledger,
            events,
            clone_engine: CloneEngine::new(executor),
            proxy_engine: ProxyEngine::new(executor),
            executor,
            config: service_config,
            stats: Arc::new(RwLock::new(ServiceStats::default())),
        })
    }

    /// Immutable factory record.
    #[must_use]
    pub fn state(&self) -> &FactoryState {
        &self.state
    }

    /// Factory-level admin set.
    #[must_use]
    pub fn admins(&self) -> &AdminSet {
        self.state.admins()
    }

    /// Service configuration.
    #[must_use]
    pub fn config(&self) -> &ServiceConfig {
        &self.config
    }

    /// The creation log.
    #[must_use]
    pub fn events(&self) -> Arc<dyn EventLog> {
        Arc::clone(&self.events)
    }

    /// The shared ledger.
    #[must_use]
    pub fn ledger(&self) -> SharedLedger {
        Arc::clone(&self.ledger)
    }

    /// Gateway for calls against instances, sharing this service's ledger,
    /// executor and statistics.
    #[must_use]
    pub fn gateway(&self) -> LedgerGateway {
        LedgerGateway::with_stats(self.ledger(), self.executor, Arc::clone(&self.stats))
    }

    /// Get current service statistics.
    pub async fn stats(&self) -> ServiceStats {
        self.stats.read().await.clone()
    }

    /// Create a clone of the base implementation at the address derived from
    /// `salt` and initialize it with `init_data`.
    #[instrument(
        skip_all,
        fields(factory = ?self.state.address(), caller = ?caller, salt = ?salt, correlation_id = tracing::field::Empty)
    )]
    pub async fn deploy_deterministic_clone(
        &self,
        caller: Address,
        salt: Salt,
        init_data: &[u8],
    ) -> Result<Address, FactoryError> {
        let correlation_id = Uuid::new_v4();
        Span::current().record("correlation_id", tracing::field::display(correlation_id));

        let result = self
            .transact(
                correlation_id,
                |state| {
                    self.clone_engine
                        .deploy(state, &self.state, caller, salt, init_data)
                },
                |deployment| FactoryEvent::CloneDeployed {
                    instance: deployment.instance,
                    salt: deployment.salt,
                },
            )
            .await;

        self.record(InstanceKind::Clone, &result).await;
        result.map(|deployment| deployment.instance)
    }

    /// Create an upgradable proxy administered by `admin` at the address
    /// derived from `salt` and initialize it through its delegate path.
    #[instrument(
        skip_all,
        fields(factory = ?self.state.address(), caller = ?caller, salt = ?salt, admin = ?admin, correlation_id = tracing::field::Empty)
    )]
    pub async fn deploy_deterministic_upgradable_proxy(
        &self,
        caller: Address,
        salt: Salt,
        admin: Address,
        init_data: &[u8],
    ) -> Result<Address, FactoryError> {
        let correlation_id = Uuid::new_v4();
        Span::current().record("correlation_id", tracing::field::display(correlation_id));

        let result = self
            .transact(
                correlation_id,
                |state| {
                    self.proxy_engine
                        .deploy(state, &self.state, caller, salt, admin, init_data)
                },
                |deployment| FactoryEvent::UpgradableProxyDeployed {
                    instance: deployment.instance,
                    salt: deployment.salt,
                },
            )
            .await;

        self.record(InstanceKind::UpgradableProxy, &result).await;
        result.map(|deployment| deployment.instance)
    }

    /// Run `op` on a journal over the ledger, commit it and append the event
    /// on success, discard everything on failure.
    async fn transact<F, E>(
        &self,
        correlation_id: Uuid,
        op: F,
        event: E,
    ) -> Result<Deployment, FactoryError>
    where
        F: FnOnce(&mut dyn LedgerState) -> Result<Deployment, FactoryError> + Send,
        E: FnOnce(&Deployment) -> FactoryEvent + Send,
    {
        let mut ledger = self.ledger.write().await;
        let events_before = self.events.len();
        let revision_before = ledger.revision();

        let outcome = {
            let mut journal = Journal::new(&*ledger);
            op(&mut journal).map(|deployment| (deployment, journal.into_changes()))
        };

        match outcome {
            Ok((deployment, changes)) => {
                let applied = ledger.apply(changes);
                let entry = self
                    .events
                    .append(self.state.address(), correlation_id, event(&deployment));
                info!(
                    instance = ?deployment.instance,
                    kind = ?deployment.kind,
                    sequence = entry.sequence,
                    applied,
                    "Instance deployed"
                );
                Ok(deployment)
            }
            Err(err) => {
                let applied = ledger.revision().saturating_sub(revision_before);
                if !check_failure_atomicity_invariant(applied, events_before, self.events.len()) {
                    error!(error = %err, applied, "Failed deployment left changes behind");
                }
                warn!(error = %err, "Deployment rejected");
                Err(err)
            }
        }
    }

    async fn record(&self, kind: InstanceKind, result: &Result<Deployment, FactoryError>) {
        let mut stats = self.stats.write().await;
        match result {
            Ok(_) => match kind {
                InstanceKind::Clone => stats.clones_deployed += 1,
                InstanceKind::UpgradableProxy => stats.proxies_deployed += 1,
                InstanceKind::Implementation => {}
            },
            Err(err) => {
                stats.failed_deployments += 1;
                match err {
                    FactoryError::Unauthorized { .. } => stats.rejected_unauthorized += 1,
                    FactoryError::AddressCollision(_) => stats.collisions += 1,
                    _ => {}
                }
            }
        }
    }
}

#[async_trait]
impl FactoryApi for FactoryService {
    fn factory_address(&self) -> Address {
        self.state.address()
    }

    fn base_implementation(&self) -> Address {
        self.state.base_implementation()
    }

    fn is_admin(&self, address: &Address) -> bool {
        self.state.admins().is_admin(address)
    }

    fn predict_clone_address(&self, salt: Salt) -> Address {
        CloneEngine::predict(&self.state, salt)
    }

    fn predict_proxy_address(&self, salt: Salt, admin: Address) -> Address {
        ProxyEngine::predict(&self.state, salt, admin)
    }

    async fn deploy_deterministic_clone(
        &self,
        caller: Address,
        salt: Salt,
        init_data: &[u8],
    ) -> Result<Address, FactoryError> {
        FactoryService::deploy_deterministic_clone(self, caller, salt, init_data).await
    }

    async fn deploy_deterministic_upgradable_proxy(
        &self,
        caller: Address,
        salt: Salt,
        admin: Address,
        init_data: &[u8],
    ) -> Result<Address, FactoryError> {
        FactoryService::deploy_deterministic_upgradable_proxy(self, caller, salt, admin, init_data)
            .await
    }
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::{InMemoryEventLog, InMemoryLedger};
    use crate::implementations::example::init_payload;
    use crate::implementations::ExampleContract;

    const DEPLOYER: Address = Address::new([0xde; 20]);
    const ADMIN: Address = Address::new([0xad; 20]);

    async fn setup(admins: Vec<Address>) -> FactoryService {
        let mut ledger = InMemoryLedger::new();
        let base = ledger.publish(DEPLOYER, Arc::new(ExampleContract)).unwrap();
        FactoryService::deploy(
            ledger.into_shared(),
            Arc::new(InMemoryEventLog::default()),
            DEPLOYER,
            FactoryConfig::new(base).with_admins(admins),
            ServiceConfig::default(),
        )
        .await
        .unwrap()
    }

    #[tokio::test]
    async fn test_factory_at_create_address() {
        let service = setup(vec![ADMIN]).await;
        // nonce 0 went to the base implementation
        assert_eq!(
            service.factory_address(),
            compute_contract_address(DEPLOYER, 1)
        );
        assert_eq!(
            service.base_implementation(),
            compute_contract_address(DEPLOYER, 0)
        );
        assert!(service.is_admin(&ADMIN));
    }

    #[tokio::test]
    async fn test_clone_emits_one_event() {
        let service = setup(vec![ADMIN]).await;
        let salt = Salt::new([3u8; 32]);

        let instance = service
            .deploy_deterministic_clone(ADMIN, salt, &init_payload(&[ADMIN]))
            .await
            .unwrap();

        let entries = service.events().entries();
        assert_eq!(entries.len(), 1);
        assert_eq!(
            entries[0].event,
            FactoryEvent::CloneDeployed { instance, salt }
        );
        assert_eq!(entries[0].factory, service.factory_address());
        assert_eq!(service.stats().await.clones_deployed, 1);
    }

    #[tokio::test]
    async fn test_failed_init_commits_nothing() {
        let service = setup(vec![ADMIN]).await;
        let salt = Salt::new([4u8; 32]);
        let target = service.predict_clone_address(salt);
        let revision = service.ledger().read().await.revision();

        let err = service
            .deploy_deterministic_clone(ADMIN, salt, &init_payload(&[Address::ZERO]))
            .await
            .unwrap_err();
        assert!(matches!(err, FactoryError::InitializationFailed { instance, .. } if instance == target));

        assert_eq!(service.ledger().read().await.revision(), revision);
        assert!(service.ledger().read().await.code(&target).is_empty());
        assert!(service.events().is_empty());
        assert_eq!(service.stats().await.failed_deployments, 1);

        // the salt is still usable
        service
            .deploy_deterministic_clone(ADMIN, salt, &init_payload(&[ADMIN]))
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_unauthorized_counts() {
        let service = setup(vec![ADMIN]).await;
        let intruder = Address::new([0x66; 20]);

        let err = service
            .deploy_deterministic_upgradable_proxy(intruder, Salt::default(), intruder, &[])
            .await
            .unwrap_err();
        assert_eq!(err, FactoryError::Unauthorized { caller: intruder });

        let stats = service.stats().await;
        assert_eq!(stats.rejected_unauthorized, 1);
        assert_eq!(stats.instances_deployed(), 0);
    }
}
