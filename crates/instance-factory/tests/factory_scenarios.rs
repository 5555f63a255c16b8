//! # Factory Scenarios
//!
//! End-to-end flows over a bootstrapped system: a deployer publishes the
//! example implementation, deploys a factory with three admins, and the
//! admins create clones and proxies through it.
//!
//! ## Test Categories
//!
//! 1. **Clones** - prediction, initialization, collisions
//! 2. **Proxies** - transparent routing, upgrades, storage continuity
//! 3. **Authorization** - factory admins and proxy admins
//! 4. **Atomicity** - failed deployments leave nothing behind
//! 5. **Concurrency** - racing deployments on one salt

use instance_factory::domain::abi::{self, Call, ParamType, Token};
use instance_factory::domain::instance::signatures as proxy_signatures;
use instance_factory::domain::services::slots;
use instance_factory::implementations::dummy::{self, DUMMY_MARKER};
use instance_factory::implementations::example::{self, CONTRACT_NAME};
use instance_factory::prelude::*;
use proptest::prelude::*;
use rand::Rng;
use std::sync::Arc;

// =============================================================================
// TEST HELPERS
// =============================================================================

const DEPLOYER: Address = Address::new([0xd0; 20]);
const ADMIN_1: Address = Address::new([0xa1; 20]);
const ADMIN_2: Address = Address::new([0xa2; 20]);
const ADMIN_3: Address = Address::new([0xa3; 20]);
const PROXY_ADMIN: Address = Address::new([0xbb; 20]);
const USER: Address = Address::new([0x77; 20]);

async fn system() -> DeployedSystem {
    bootstrap(
        DEPLOYER,
        vec![ADMIN_1, ADMIN_2, ADMIN_3],
        ServiceConfig::default(),
    )
    .await
    .unwrap()
}

fn salt(byte: u8) -> Salt {
    Salt::new([byte; 32])
}

fn contract_name_call() -> Call {
    Call::new(example::signatures::CONTRACT_NAME, &[])
}

fn is_admin_call(who: Address) -> Call {
    Call::new(example::signatures::IS_ADMIN, &[Token::Address(who)])
}

fn decode_string(out: &Bytes) -> String {
    abi::decode_one(ParamType::String, out.as_slice())
        .unwrap()
        .into_string()
        .unwrap()
}

fn decode_bool(out: &Bytes) -> bool {
    abi::decode_one(ParamType::Bool, out.as_slice())
        .unwrap()
        .into_bool()
        .unwrap()
}

// =============================================================================
// CLONES
// =============================================================================

#[tokio::test]
async fn test_clone_end_to_end() {
    let system = system().await;
    let factory = &system.factory;
    let s = salt(1);

    let predicted = factory.predict_clone_address(s);
    assert_eq!(
        predicted,
        derive_address(
            factory.factory_address(),
            s,
            clone_template_hash(system.implementation)
        )
    );

    let clone = factory
        .deploy_deterministic_clone(ADMIN_1, s, &init_payload(&[ADMIN_1]))
        .await
        .unwrap();
    assert_eq!(clone, predicted);

    let entries = system.events.entries();
    assert_eq!(entries.len(), 1);
    assert_eq!(
        entries[0].event,
        FactoryEvent::CloneDeployed {
            instance: clone,
            salt: s
        }
    );

    let gateway = factory.gateway();
    let out = gateway
        .static_call(USER, clone, &contract_name_call())
        .await
        .unwrap();
    assert_eq!(decode_string(&out), CONTRACT_NAME);

    let out = gateway
        .static_call(USER, clone, &is_admin_call(ADMIN_1))
        .await
        .unwrap();
    assert!(decode_bool(&out));
    let out = gateway
        .static_call(USER, clone, &is_admin_call(ADMIN_2))
        .await
        .unwrap();
    assert!(!decode_bool(&out));

    // storage lives on the clone, not on the implementation
    let out = gateway
        .static_call(USER, system.implementation, &is_admin_call(ADMIN_1))
        .await
        .unwrap();
    assert!(!decode_bool(&out));
}

#[tokio::test]
async fn test_clone_salt_reuse_collides() {
    let system = system().await;
    let factory = &system.factory;
    let s = salt(2);

    let first = factory
        .deploy_deterministic_clone(ADMIN_1, s, &init_payload(&[ADMIN_1]))
        .await
        .unwrap();
    let err = factory
        .deploy_deterministic_clone(ADMIN_2, s, &init_payload(&[ADMIN_2]))
        .await
        .unwrap_err();

    assert_eq!(err, FactoryError::AddressCollision(first));
    assert!(err.is_salt_conflict());
    assert_eq!(system.events.len(), 1);
    assert_eq!(factory.stats().await.collisions, 1);
}

#[tokio::test]
async fn test_clones_keep_separate_storage() {
    let system = system().await;
    let gateway = system.factory.gateway();
    let first = system
        .factory
        .deploy_deterministic_clone(ADMIN_1, salt(5), &init_payload(&[ADMIN_1]))
        .await
        .unwrap();
    let second = system
        .factory
        .deploy_deterministic_clone(ADMIN_1, salt(6), &init_payload(&[ADMIN_2, ADMIN_3]))
        .await
        .unwrap();
    assert_ne!(first, second);

    for (clone, admin, expected) in [
        (first, ADMIN_1, true),
        (first, ADMIN_2, false),
        (second, ADMIN_1, false),
        (second, ADMIN_2, true),
        (second, ADMIN_3, true),
    ] {
        let out = gateway
            .static_call(USER, clone, &is_admin_call(admin))
            .await
            .unwrap();
        assert_eq!(decode_bool(&out), expected);
    }

    let count = |out: Bytes| {
        abi::decode_one(ParamType::Uint, out.as_slice())
            .unwrap()
            .into_uint()
            .unwrap()
    };
    let admin_count = Call::new(example::signatures::ADMIN_COUNT, &[]);
    let first_count = gateway.static_call(USER, first, &admin_count).await.unwrap();
    let second_count = gateway.static_call(USER, second, &admin_count).await.unwrap();
    assert_eq!(count(first_count), U256::from(1));
    assert_eq!(count(second_count), U256::from(2));
}

#[tokio::test]
async fn test_clone_reinitialize_rejected() {
    let system = system().await;
    let clone = system
        .factory
        .deploy_deterministic_clone(ADMIN_1, salt(3), &init_payload(&[ADMIN_1]))
        .await
        .unwrap();

    let err = system
        .factory
        .gateway()
        .call(USER, clone, &ExampleContract::initialize_call(&[USER]))
        .await
        .unwrap_err();
    assert_eq!(err, ExecutionError::AlreadyInitialized);

    let out = system
        .factory
        .gateway()
        .static_call(USER, clone, &is_admin_call(USER))
        .await
        .unwrap();
    assert!(!decode_bool(&out));
}

#[tokio::test]
async fn test_clone_code_embeds_base() {
    let system = system().await;
    let clone = system
        .factory
        .deploy_deterministic_clone(ADMIN_3, salt(4), &init_payload(&[]))
        .await
        .unwrap();

    let code = system.factory.gateway().code_at(clone).await;
    assert_eq!(
        instance_factory::domain::services::parse_clone_target(code.as_slice()),
        Some(system.implementation)
    );
}

#[tokio::test]
async fn test_random_salts_match_prediction() {
    let system = system().await;
    let mut rng = rand::thread_rng();

    for _ in 0..8 {
        let bytes: [u8; 32] = rng.gen();
        let s = Salt::new(bytes);
        let predicted = system.factory.predict_clone_address(s);
        let clone = system
            .factory
            .deploy_deterministic_clone(ADMIN_2, s, &init_payload(&[ADMIN_2]))
            .await
            .unwrap();
        assert_eq!(clone, predicted);
    }
    assert_eq!(system.events.len(), 8);
}

// =============================================================================
// PROXIES
// =============================================================================

#[tokio::test]
async fn test_proxy_end_to_end() {
    let system = system().await;
    let factory = &system.factory;
    let gateway = factory.gateway();
    let s = salt(10);

    let predicted = factory.predict_proxy_address(s, PROXY_ADMIN);
    let proxy = factory
        .deploy_deterministic_upgradable_proxy(ADMIN_1, s, PROXY_ADMIN, &init_payload(&[ADMIN_1]))
        .await
        .unwrap();
    assert_eq!(proxy, predicted);
    assert_ne!(proxy, factory.predict_clone_address(s));

    assert_eq!(
        system.events.entries()[0].event,
        FactoryEvent::UpgradableProxyDeployed {
            instance: proxy,
            salt: s
        }
    );

    let out = gateway
        .static_call(USER, proxy, &contract_name_call())
        .await
        .unwrap();
    assert_eq!(decode_string(&out), CONTRACT_NAME);

    assert_eq!(gateway.implementation_of(proxy).await, system.implementation);
    assert_eq!(gateway.admin_of(proxy).await, PROXY_ADMIN);

    // initializer ran against the proxy's storage
    let out = gateway
        .static_call(USER, proxy, &is_admin_call(ADMIN_1))
        .await
        .unwrap();
    assert!(decode_bool(&out));
}

#[tokio::test]
async fn test_proxy_upgrade_by_admin_only() {
    let system = system().await;
    let gateway = system.factory.gateway();
    let proxy = system
        .factory
        .deploy_deterministic_upgradable_proxy(ADMIN_1, salt(11), PROXY_ADMIN, &init_payload(&[]))
        .await
        .unwrap();
    let target = publish_implementation(&system.ledger, DEPLOYER, Arc::new(DummyImplementation))
        .await
        .unwrap();

    // factory admins hold no rights over the proxy
    for intruder in [USER, ADMIN_1] {
        let err = gateway.upgrade_to(intruder, proxy, target).await.unwrap_err();
        assert_eq!(err, ExecutionError::Unauthorized { caller: intruder });
    }
    assert_eq!(gateway.implementation_of(proxy).await, system.implementation);

    gateway.upgrade_to(PROXY_ADMIN, proxy, target).await.unwrap();
    assert_eq!(gateway.implementation_of(proxy).await, target);

    let out = gateway
        .static_call(USER, proxy, &Call::new(dummy::signatures::DUMMY, &[]))
        .await
        .unwrap();
    assert_eq!(decode_string(&out), DUMMY_MARKER);

    let stats = system.factory.stats().await;
    assert_eq!(stats.upgrades, 1);
    assert_eq!(stats.rejected_unauthorized, 2);
}

#[tokio::test]
async fn test_proxy_storage_survives_upgrade() {
    let system = system().await;
    let gateway = system.factory.gateway();
    let proxy = system
        .factory
        .deploy_deterministic_upgradable_proxy(ADMIN_2, salt(12), PROXY_ADMIN, &init_payload(&[USER]))
        .await
        .unwrap();
    let target = publish_implementation(&system.ledger, DEPLOYER, Arc::new(DummyImplementation))
        .await
        .unwrap();

    gateway.upgrade_to(PROXY_ADMIN, proxy, target).await.unwrap();
    let out = gateway
        .static_call(USER, proxy, &Call::new(dummy::signatures::INITIALIZED, &[]))
        .await
        .unwrap();
    assert!(decode_bool(&out));

    gateway
        .upgrade_to(PROXY_ADMIN, proxy, system.implementation)
        .await
        .unwrap();
    let out = gateway
        .static_call(ADMIN_1, proxy, &is_admin_call(USER))
        .await
        .unwrap();
    assert!(decode_bool(&out));
}

#[tokio::test]
async fn test_upgrade_to_and_call_runs_against_new_logic() {
    let system = system().await;
    let gateway = system.factory.gateway();
    let proxy = system
        .factory
        .deploy_deterministic_upgradable_proxy(ADMIN_1, salt(13), PROXY_ADMIN, &init_payload(&[]))
        .await
        .unwrap();
    let target = publish_implementation(&system.ledger, DEPLOYER, Arc::new(DummyImplementation))
        .await
        .unwrap();

    let out = gateway
        .upgrade_to_and_call(
            PROXY_ADMIN,
            proxy,
            target,
            &Call::new(dummy::signatures::DUMMY, &[]),
        )
        .await
        .unwrap();
    assert_eq!(decode_string(&out), DUMMY_MARKER);
    assert_eq!(gateway.implementation_of(proxy).await, target);
}

#[tokio::test]
async fn test_failed_upgrade_to_and_call_keeps_pointer() {
    let system = system().await;
    let gateway = system.factory.gateway();
    let proxy = system
        .factory
        .deploy_deterministic_upgradable_proxy(ADMIN_1, salt(14), PROXY_ADMIN, &init_payload(&[]))
        .await
        .unwrap();
    let target = publish_implementation(&system.ledger, DEPLOYER, Arc::new(DummyImplementation))
        .await
        .unwrap();

    // slot 0 is already set, so the dummy's initializer reverts
    let err = gateway
        .upgrade_to_and_call(
            PROXY_ADMIN,
            proxy,
            target,
            &Call::new(dummy::signatures::INITIALIZE, &[]),
        )
        .await
        .unwrap_err();
    assert_eq!(err, ExecutionError::AlreadyInitialized);
    assert_eq!(gateway.implementation_of(proxy).await, system.implementation);
}

#[tokio::test]
async fn test_proxy_admin_cannot_fallback() {
    let system = system().await;
    let gateway = system.factory.gateway();
    let proxy = system
        .factory
        .deploy_deterministic_upgradable_proxy(ADMIN_1, salt(15), PROXY_ADMIN, &init_payload(&[]))
        .await
        .unwrap();

    let err = gateway
        .static_call(PROXY_ADMIN, proxy, &contract_name_call())
        .await
        .unwrap_err();
    assert_eq!(err, ExecutionError::AdminCannotFallback);

    let out = gateway
        .static_call(PROXY_ADMIN, proxy, &Call::new(proxy_signatures::IMPLEMENTATION, &[]))
        .await
        .unwrap();
    let pointer = abi::decode_one(ParamType::Address, out.as_slice())
        .unwrap()
        .into_address()
        .unwrap();
    assert_eq!(pointer, system.implementation);
}

#[tokio::test]
async fn test_upgrade_to_codeless_address_rejected() {
    let system = system().await;
    let gateway = system.factory.gateway();
    let proxy = system
        .factory
        .deploy_deterministic_upgradable_proxy(ADMIN_1, salt(16), PROXY_ADMIN, &init_payload(&[]))
        .await
        .unwrap();
    let empty = Address::new([0x42; 20]);

    let err = gateway.upgrade_to(PROXY_ADMIN, proxy, empty).await.unwrap_err();
    assert_eq!(err, ExecutionError::InvalidImplementation(empty));
    assert_eq!(
        gateway
            .storage_at(proxy, slots::IMPLEMENTATION_SLOT)
            .await
            .to_address(),
        system.implementation
    );
}

#[tokio::test]
async fn test_zero_proxy_admin_rejected() {
    let system = system().await;
    let err = system
        .factory
        .deploy_deterministic_upgradable_proxy(ADMIN_1, salt(17), Address::ZERO, &init_payload(&[]))
        .await
        .unwrap_err();
    assert_eq!(err, FactoryError::ZeroProxyAdmin);
    assert!(system.events.is_empty());
}

#[tokio::test]
async fn test_proxy_reinitialize_rejected() {
    let system = system().await;
    let gateway = system.factory.gateway();
    let proxy = system
        .factory
        .deploy_deterministic_upgradable_proxy(
            ADMIN_1,
            salt(18),
            PROXY_ADMIN,
            &init_payload(&[ADMIN_1]),
        )
        .await
        .unwrap();

    let err = gateway
        .call(USER, proxy, &ExampleContract::initialize_call(&[USER]))
        .await
        .unwrap_err();
    assert_eq!(err, ExecutionError::AlreadyInitialized);

    let out = gateway
        .static_call(USER, proxy, &is_admin_call(USER))
        .await
        .unwrap();
    assert!(!decode_bool(&out));
}

#[tokio::test]
async fn test_self_referential_upgrade_rejected() {
    let system = system().await;
    let gateway = system.factory.gateway();
    let proxy = system
        .factory
        .deploy_deterministic_upgradable_proxy(ADMIN_1, salt(19), PROXY_ADMIN, &init_payload(&[]))
        .await
        .unwrap();
    let other = system
        .factory
        .deploy_deterministic_upgradable_proxy(ADMIN_1, salt(19), ADMIN_2, &init_payload(&[]))
        .await
        .unwrap();

    for target in [proxy, other] {
        let err = gateway
            .upgrade_to(PROXY_ADMIN, proxy, target)
            .await
            .unwrap_err();
        assert_eq!(err, ExecutionError::InvalidImplementation(target));
    }
    assert_eq!(gateway.implementation_of(proxy).await, system.implementation);

    let out = gateway
        .static_call(USER, proxy, &contract_name_call())
        .await
        .unwrap();
    assert_eq!(decode_string(&out), CONTRACT_NAME);
    assert_eq!(system.factory.stats().await.upgrades, 0);
}

// =============================================================================
// AUTHORIZATION
// =============================================================================

#[tokio::test]
async fn test_non_admin_deploy_rejected() {
    let system = system().await;
    let s = salt(20);
    let target = system.factory.predict_clone_address(s);

    let err = system
        .factory
        .deploy_deterministic_clone(USER, s, &init_payload(&[USER]))
        .await
        .unwrap_err();
    assert_eq!(err, FactoryError::Unauthorized { caller: USER });

    assert!(system.events.is_empty());
    assert!(system.factory.gateway().code_at(target).await.is_empty());
}

#[tokio::test]
async fn test_non_admin_proxy_deploy_rejected() {
    let system = system().await;
    let s = salt(22);
    let target = system.factory.predict_proxy_address(s, PROXY_ADMIN);

    let err = system
        .factory
        .deploy_deterministic_upgradable_proxy(
            USER,
            s,
            PROXY_ADMIN,
            &init_payload(&[USER]),
        )
        .await
        .unwrap_err();
    assert_eq!(err, FactoryError::Unauthorized { caller: USER });

    let gateway = system.factory.gateway();
    assert!(gateway.code_at(target).await.is_empty());
    assert!(gateway.storage_at(target, slots::IMPLEMENTATION_SLOT).await.is_zero());
    assert!(system.events.is_empty());

    // the address is still free for an admin
    let proxy = system
        .factory
        .deploy_deterministic_upgradable_proxy(ADMIN_1, s, PROXY_ADMIN, &init_payload(&[]))
        .await
        .unwrap();
    assert_eq!(proxy, target);
}

#[tokio::test]
async fn test_factory_without_admins_rejects_everyone() {
    let system = bootstrap(DEPLOYER, vec![], ServiceConfig::default())
        .await
        .unwrap();

    for caller in [DEPLOYER, ADMIN_1, USER] {
        let err = system
            .factory
            .deploy_deterministic_clone(caller, salt(21), &init_payload(&[]))
            .await
            .unwrap_err();
        assert_eq!(err, FactoryError::Unauthorized { caller });
    }
    assert!(!system.factory.is_admin(&DEPLOYER));
}

// =============================================================================
// ATOMICITY
// =============================================================================

#[tokio::test]
async fn test_failed_initializer_leaves_nothing() {
    let system = system().await;
    let s = salt(30);
    let target = system.factory.predict_proxy_address(s, PROXY_ADMIN);
    let contracts_before = system.ledger.read().await.contract_count();

    let err = system
        .factory
        .deploy_deterministic_upgradable_proxy(
            ADMIN_1,
            s,
            PROXY_ADMIN,
            &init_payload(&[ADMIN_1, Address::ZERO]),
        )
        .await
        .unwrap_err();
    assert!(matches!(err, FactoryError::InitializationFailed { instance, .. } if instance == target));

    let gateway = system.factory.gateway();
    assert!(gateway.code_at(target).await.is_empty());
    assert!(gateway.storage_at(target, slots::ADMIN_SLOT).await.is_zero());
    assert_eq!(system.ledger.read().await.contract_count(), contracts_before);
    assert!(system.events.is_empty());
}

#[tokio::test]
async fn test_malformed_init_data_fails() {
    let system = system().await;
    let err = system
        .factory
        .deploy_deterministic_clone(ADMIN_1, salt(31), &[0xff; 7])
        .await
        .unwrap_err();
    assert!(matches!(err, FactoryError::InitializationFailed { .. }));
    assert!(system.events.is_empty());
}

// =============================================================================
// CONCURRENCY
// =============================================================================

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_racing_deploys_on_one_salt() {
    let system = system().await;
    let factory = Arc::new(system.factory);
    let s = salt(40);

    let handles: Vec<_> = [ADMIN_1, ADMIN_2]
        .into_iter()
        .map(|admin| {
            let factory = Arc::clone(&factory);
            tokio::spawn(async move {
                let payload = init_payload(&[admin]);
                factory.deploy_deterministic_clone(admin, s, &payload).await
            })
        })
        .collect();

    let mut results = Vec::new();
    for handle in handles {
        results.push(handle.await.unwrap());
    }

    let winners = results.iter().filter(|r| r.is_ok()).count();
    let collisions = results
        .iter()
        .filter(|r| matches!(r, Err(FactoryError::AddressCollision(_))))
        .count();
    assert_eq!(winners, 1);
    assert_eq!(collisions, 1);
    assert_eq!(system.events.len(), 1);
}

#[tokio::test]
async fn test_event_sequence_follows_commit_order() {
    let system = system().await;
    let mut rx = system.events.subscribe();

    let a = system
        .factory
        .deploy_deterministic_clone(ADMIN_1, salt(50), &init_payload(&[]))
        .await
        .unwrap();
    let b = system
        .factory
        .deploy_deterministic_upgradable_proxy(ADMIN_2, salt(50), PROXY_ADMIN, &init_payload(&[]))
        .await
        .unwrap();

    let first = rx.recv().await.unwrap();
    let second = rx.recv().await.unwrap();
    assert_eq!(first.event.instance(), a);
    assert_eq!(second.event.instance(), b);
    assert!(first.sequence < second.sequence);
    assert_ne!(first.correlation_id, second.correlation_id);
}

// =============================================================================
// PROPERTIES
// =============================================================================

proptest! {
    #[test]
    fn prop_derivation_is_deterministic(
        factory in any::<[u8; 20]>(),
        salt in any::<[u8; 32]>(),
        base in any::<[u8; 20]>(),
    ) {
        let factory = Address::new(factory);
        let base = Address::new(base);
        let salt = Salt::new(salt);
        prop_assert_eq!(
            predict_clone_address(factory, salt, base),
            predict_clone_address(factory, salt, base)
        );
        prop_assert_eq!(
            predict_clone_address(factory, salt, base),
            derive_address(factory, salt, clone_template_hash(base))
        );
    }

    #[test]
    fn prop_salt_changes_address(
        factory in any::<[u8; 20]>(),
        salt in any::<[u8; 32]>(),
        flip in 0usize..32,
    ) {
        let factory = Address::new(factory);
        let base = Address::new([0x11; 20]);
        let mut other = salt;
        other[flip] ^= 0x01;
        prop_assert_ne!(
            predict_clone_address(factory, Salt::new(salt), base),
            predict_clone_address(factory, Salt::new(other), base)
        );
    }

    #[test]
    fn prop_clone_and_proxy_never_share_address(
        salt in any::<[u8; 32]>(),
        admin in any::<[u8; 20]>(),
    ) {
        let factory = Address::new([0xfa; 20]);
        let base = Address::new([0xba; 20]);
        let salt = Salt::new(salt);
        prop_assert_ne!(
            predict_clone_address(factory, salt, base),
            predict_proxy_address(factory, salt, base, Address::new(admin))
        );
    }
}
