//! Calls against existing instances.

use super::ServiceStats;
use crate::adapters::{Journal, SharedLedger};
use crate::domain::abi::{Call, Token};
use crate::domain::instance::signatures;
use crate::domain::services::slots;
use crate::domain::value_objects::{Address, Bytes, StorageKey, StorageValue};
use crate::errors::ExecutionError;
use crate::executor::Executor;
use crate::ports::inbound::InstanceApi;
use crate::ports::outbound::LedgerState;

use async_trait::async_trait;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{debug, info, instrument, warn};

/// Entry point for calls into clones, proxies and implementations.
#[derive(Debug, Clone)]
pub struct LedgerGateway {
    ledger: SharedLedger,
    executor: Executor,
    stats: Arc<RwLock<ServiceStats>>,
}

impl LedgerGateway {
    /// Gateway with its own statistics.
    #[must_use]
    pub fn new(ledger: SharedLedger, executor: Executor) -> Self {
        Self::with_stats(ledger, executor, Arc::new(RwLock::new(ServiceStats::default())))
    }

    /// Gateway reporting into shared statistics.
    #[must_use]
    pub fn with_stats(
        ledger: SharedLedger,
        executor: Executor,
        stats: Arc<RwLock<ServiceStats>>,
    ) -> Self {
        Self {
            ledger,
            executor,
            stats,
        }
    }

    /// State-changing call, committed only on success.
    #[instrument(skip_all, fields(caller = ?caller, to = ?to, selector = ?call.selector))]
    pub async fn call(
        &self,
        caller: Address,
        to: Address,
        call: &Call,
    ) -> Result<Bytes, ExecutionError> {
        let mut ledger = self.ledger.write().await;
        let (out, changes) = {
            let mut journal = Journal::new(&*ledger);
            let out = self.executor.call(&mut journal, caller, to, call)?;
            (out, journal.into_changes())
        };
        let applied = ledger.apply(changes);
        debug!(applied, "Call committed");
        Ok(out)
    }

    /// Read-only call against the latest committed state.
    pub async fn static_call(
        &self,
        caller: Address,
        to: Address,
        call: &Call,
    ) -> Result<Bytes, ExecutionError> {
        let ledger = self.ledger.read().await;
        self.executor.static_call(&*ledger, caller, to, call)
    }

    /// Retarget `proxy` to `implementation` as `caller`.
    #[instrument(skip_all, fields(caller = ?caller, proxy = ?proxy, implementation = ?implementation))]
    pub async fn upgrade_to(
        &self,
        caller: Address,
        proxy: Address,
        implementation: Address,
    ) -> Result<(), ExecutionError> {
        let call = Call::new(signatures::UPGRADE_TO, &[Token::Address(implementation)]);
        let result = self.call(caller, proxy, &call).await.map(|_| ());
        self.record_upgrade(&result).await;
        result
    }

    /// Retarget `proxy` and run `then_call` against the new implementation.
    #[instrument(skip_all, fields(caller = ?caller, proxy = ?proxy, implementation = ?implementation))]
    pub async fn upgrade_to_and_call(
        &self,
        caller: Address,
        proxy: Address,
        implementation: Address,
        then_call: &Call,
    ) -> Result<Bytes, ExecutionError> {
        let call = Call::new(
            signatures::UPGRADE_TO_AND_CALL,
            &[
                Token::Address(implementation),
                Token::Bytes(then_call.calldata().into_vec()),
            ],
        );
        let result = self.call(caller, proxy, &call).await;
        self.record_upgrade(&result).await;
        result
    }

    /// Raw storage word.
    pub async fn storage_at(&self, address: Address, key: StorageKey) -> StorageValue {
        self.ledger.read().await.storage(&address, &key)
    }

    /// Code at `address`.
    pub async fn code_at(&self, address: Address) -> Bytes {
        self.ledger.read().await.code(&address)
    }

    /// Implementation pointer of a proxy.
    pub async fn implementation_of(&self, proxy: Address) -> Address {
        self.storage_at(proxy, slots::IMPLEMENTATION_SLOT)
            .await
            .to_address()
    }

    /// Admin of a proxy.
    pub async fn admin_of(&self, proxy: Address) -> Address {
        self.storage_at(proxy, slots::ADMIN_SLOT).await.to_address()
    }

    async fn record_upgrade<T>(&self, result: &Result<T, ExecutionError>) {
        match result {
            Ok(_) => {
                self.stats.write().await.upgrades += 1;
                info!("Proxy upgraded");
            }
            Err(ExecutionError::Unauthorized { caller }) => {
                self.stats.write().await.rejected_unauthorized += 1;
                warn!(caller = ?caller, "Unauthorized upgrade attempt");
            }
            Err(err) => warn!(error = %err, "Upgrade failed"),
        }
    }
}

#[async_trait]
impl InstanceApi for LedgerGateway {
    async fn call(&self, caller: Address, to: Address, call: &Call) -> Result<Bytes, ExecutionError> {
        LedgerGateway::call(self, caller, to, call).await
    }

    async fn static_call(
        &self,
        caller: Address,
        to: Address,
        call: &Call,
    ) -> Result<Bytes, ExecutionError> {
        LedgerGateway::static_call(self, caller, to, call).await
    }

    async fn upgrade_to(
        &self,
        caller: Address,
        proxy: Address,
        implementation: Address,
    ) -> Result<(), ExecutionError> {
        LedgerGateway::upgrade_to(self, caller, proxy, implementation).await
    }

    async fn upgrade_to_and_call(
        &self,
        caller: Address,
        proxy: Address,
        implementation: Address,
        then_call: &Call,
    ) -> Result<Bytes, ExecutionError> {
        LedgerGateway::upgrade_to_and_call(self, caller, proxy, implementation, then_call).await
    }

    async fn storage_at(&self, address: Address, key: StorageKey) -> StorageValue {
        LedgerGateway::storage_at(self, address, key).await
    }

    async fn code_at(&self, address: Address) -> Bytes {
        LedgerGateway::code_at(self, address).await
    }

    async fn implementation_of(&self, proxy: Address) -> Address {
        LedgerGateway::implementation_of(self, proxy).await
    }
}
