//! # Domain Services
//!
//! Pure address-derivation and code-template functions.
//! These functions are deterministic and have no side effects.
//!
//! ## Architecture Compliance
//!
//! - NO I/O operations
//! - NO async code
//! - Pure functions only

use crate::domain::abi::{self, Token};
use crate::domain::value_objects::{Address, Bytes, Hash, Salt, StorageKey};
use sha3::{Digest, Keccak256};

// =============================================================================
// KECCAK256 UTILITY
// =============================================================================

/// Computes keccak256 hash of data.
#[must_use]
pub fn keccak256(data: &[u8]) -> Hash {
    let hash = Keccak256::digest(data);
    Hash::new(hash.into())
}

fn address_from_hash(hash: &[u8]) -> Address {
    let mut addr = [0u8; 20];
    addr.copy_from_slice(&hash[12..32]);
    Address::new(addr)
}

// =============================================================================
// CONTRACT ADDRESS COMPUTATION
// =============================================================================

/// Computes the address of a nonce-sequenced creation.
///
/// Address = keccak256(rlp(\[sender, nonce\]))\[12:\]
///
/// Used for the one-off publication of base implementations and factories.
#[must_use]
pub fn compute_contract_address(sender: Address, nonce: u64) -> Address {
    let mut rlp_data = Vec::with_capacity(64);
    let mut content = Vec::with_capacity(32);

    // RLP encode address (20 bytes, 0x80 + 20 = 0x94)
    content.push(0x94);
    content.extend_from_slice(sender.as_bytes());

    if nonce == 0 {
        content.push(0x80); // Empty byte string
    } else if nonce < 128 {
        content.push(nonce as u8);
    } else {
        let nonce_bytes = encode_nonce(nonce);
        content.push(0x80 + nonce_bytes.len() as u8);
        content.extend_from_slice(&nonce_bytes);
    }

    // Content never reaches 56 bytes, so the short list header suffices
    rlp_data.push(0xc0 + content.len() as u8);
    rlp_data.extend_from_slice(&content);

    address_from_hash(&Keccak256::digest(&rlp_data))
}

/// Helper to encode nonce as big-endian bytes without leading zeros.
fn encode_nonce(nonce: u64) -> Vec<u8> {
    let bytes = nonce.to_be_bytes();
    let start = bytes.iter().position(|&b| b != 0).unwrap_or(7);
    bytes[start..].to_vec()
}

/// Derives the deterministic address of an instance.
///
/// Address = keccak256(0xff ++ factory ++ salt ++ `template_hash`)\[12:\]
///
/// Per EIP-1014. The caller must pass the hash of the creation code that
/// will actually be materialized; a mismatched hash yields an address no
/// instance will ever occupy.
#[must_use]
pub fn derive_address(factory: Address, salt: Salt, template_hash: Hash) -> Address {
    let mut data = Vec::with_capacity(85);
    data.push(0xff);
    data.extend_from_slice(factory.as_bytes());
    data.extend_from_slice(salt.as_bytes());
    data.extend_from_slice(template_hash.as_bytes());

    address_from_hash(&Keccak256::digest(&data))
}

/// Convenience wrapper hashing the creation code before deriving.
#[must_use]
pub fn compute_contract_address_create2(sender: Address, salt: Salt, init_code: &[u8]) -> Address {
    derive_address(sender, salt, keccak256(init_code))
}

// =============================================================================
// CLONE TEMPLATE (EIP-1167 minimal delegator)
// =============================================================================

/// Creation code preceding the implementation address.
pub const CLONE_CREATION_PREFIX: [u8; 20] = [
    0x3d, 0x60, 0x2d, 0x80, 0x60, 0x0a, 0x3d, 0x39, 0x81, 0xf3, 0x36, 0x3d, 0x3d, 0x37, 0x3d,
    0x3d, 0x3d, 0x36, 0x3d, 0x73,
];

/// Runtime code preceding the implementation address.
pub const CLONE_RUNTIME_PREFIX: [u8; 10] =
    [0x36, 0x3d, 0x3d, 0x37, 0x3d, 0x3d, 0x3d, 0x36, 0x3d, 0x73];

/// Runtime code following the implementation address.
pub const CLONE_RUNTIME_SUFFIX: [u8; 15] = [
    0x5a, 0xf4, 0x3d, 0x82, 0x80, 0x3e, 0x90, 0x3d, 0x91, 0x60, 0x2b, 0x57, 0xfd, 0x5b, 0xf3,
];

/// Length of a clone's runtime code.
pub const CLONE_RUNTIME_LEN: usize = 45;

/// Runtime code of a clone delegating to `implementation`.
#[must_use]
pub fn clone_runtime_code(implementation: Address) -> Bytes {
    let mut code = Vec::with_capacity(CLONE_RUNTIME_LEN);
    code.extend_from_slice(&CLONE_RUNTIME_PREFIX);
    code.extend_from_slice(implementation.as_bytes());
    code.extend_from_slice(&CLONE_RUNTIME_SUFFIX);
    Bytes::from(code)
}

/// Creation code whose hash keys clone address derivation.
#[must_use]
pub fn clone_creation_code(implementation: Address) -> Bytes {
    let mut code = Vec::with_capacity(55);
    code.extend_from_slice(&CLONE_CREATION_PREFIX);
    code.extend_from_slice(implementation.as_bytes());
    code.extend_from_slice(&CLONE_RUNTIME_SUFFIX);
    Bytes::from(code)
}

/// Template hash for clones of `implementation`.
#[must_use]
pub fn clone_template_hash(implementation: Address) -> Hash {
    keccak256(clone_creation_code(implementation).as_slice())
}

/// Extracts the delegate target if `code` is a minimal delegator.
#[must_use]
pub fn parse_clone_target(code: &[u8]) -> Option<Address> {
    if code.len() != CLONE_RUNTIME_LEN
        || code[..10] != CLONE_RUNTIME_PREFIX
        || code[30..] != CLONE_RUNTIME_SUFFIX
    {
        return None;
    }
    Address::from_slice(&code[10..30])
}

// =============================================================================
// PROXY TEMPLATE (EIP-1967 slots)
// =============================================================================

/// Runtime stub shared by every upgradeable proxy.
///
/// The ledger dispatches proxies natively; the stub only marks the account
/// as a proxy. It starts with `0xfe` (INVALID) so no bytecode interpreter
/// will ever execute it.
pub const PROXY_RUNTIME_CODE: &[u8] = b"\xfe\x19\x67eip1967.transparent-proxy.v1";

/// Creation-code prefix; constructor arguments `(implementation, admin)`
/// are ABI-encoded after it.
pub const PROXY_CREATION_PREFIX: &[u8] = b"\xfe\x19\x67eip1967.transparent-proxy.init.v1";

/// Creation code for a proxy starting at `implementation`, governed by `admin`.
#[must_use]
pub fn proxy_creation_code(implementation: Address, admin: Address) -> Bytes {
    let mut code = PROXY_CREATION_PREFIX.to_vec();
    code.extend(abi::encode(&[
        Token::Address(implementation),
        Token::Address(admin),
    ]));
    Bytes::from(code)
}

/// Template hash for proxies keyed on `(implementation, admin)`.
#[must_use]
pub fn proxy_template_hash(implementation: Address, admin: Address) -> Hash {
    keccak256(proxy_creation_code(implementation, admin).as_slice())
}

/// Returns true if `code` is the proxy runtime stub.
#[must_use]
pub fn is_proxy_code(code: &[u8]) -> bool {
    code == PROXY_RUNTIME_CODE
}

/// Reserved storage positions read by external tooling.
pub mod slots {
    use super::StorageKey;

    /// `keccak256("eip1967.proxy.implementation") - 1`
    pub const IMPLEMENTATION_SLOT: StorageKey = StorageKey([
        0x36, 0x08, 0x94, 0xa1, 0x3b, 0xa1, 0xa3, 0x21, 0x06, 0x67, 0xc8, 0x28, 0x49, 0x2d, 0xb9,
        0x8d, 0xca, 0x3e, 0x20, 0x76, 0xcc, 0x37, 0x35, 0xa9, 0x20, 0xa3, 0xca, 0x50, 0x5d, 0x38,
        0x2b, 0xbc,
    ]);

    /// `keccak256("eip1967.proxy.admin") - 1`
    pub const ADMIN_SLOT: StorageKey = StorageKey([
        0xb5, 0x31, 0x27, 0x68, 0x4a, 0x56, 0x8b, 0x31, 0x73, 0xae, 0x13, 0xb9, 0xf8, 0xa6, 0x01,
        0x6e, 0x24, 0x3e, 0x63, 0xb6, 0xe8, 0xee, 0x11, 0x78, 0xd6, 0xa7, 0x17, 0x85, 0x0b, 0x5d,
        0x61, 0x03,
    ]);
}

// =============================================================================
// PREDICTION
// =============================================================================

/// Predicts where `factory` will place a clone of `implementation` for `salt`.
#[must_use]
pub fn predict_clone_address(factory: Address, salt: Salt, implementation: Address) -> Address {
    derive_address(factory, salt, clone_template_hash(implementation))
}

/// Predicts where `factory` will place a proxy for `salt`.
#[must_use]
pub fn predict_proxy_address(
    factory: Address,
    salt: Salt,
    implementation: Address,
    admin: Address,
) -> Address {
    derive_address(factory, salt, proxy_template_hash(implementation, admin))
}

/// Derives the storage key of `mapping(address => _)[key]` at `base_slot`.
#[must_use]
pub fn mapping_slot(key: Address, base_slot: u64) -> StorageKey {
    let mut preimage = [0u8; 64];
    preimage[12..32].copy_from_slice(key.as_bytes());
    preimage[56..].copy_from_slice(&base_slot.to_be_bytes());
    StorageKey::new(keccak256(&preimage).0)
}

// =============================================================================
// TESTS
// =============================================================================
