//! Upgrade target used to observe that a proxy switched implementations.

use crate::domain::abi::{self, Call, Selector, Token};
use crate::domain::entities::CallContext;
use crate::domain::value_objects::Bytes;
use crate::errors::ExecutionError;
use crate::implementations::{initializable, Implementation};
use crate::ports::outbound::StorageArena;

/// Value returned by `dummy()`.
pub const DUMMY_MARKER: &str = "dummy implementation";

/// Function signatures understood by [`DummyImplementation`].
pub mod signatures {
    /// `dummy() -> string`
    pub const DUMMY: &str = "dummy()";
    /// `initialize()`
    pub const INITIALIZE: &str = "initialize()";
    /// `initialized() -> bool`
    pub const INITIALIZED: &str = "initialized()";
}

/// Stateless logic with a marker accessor.
#[derive(Clone, Copy, Debug, Default)]
pub struct DummyImplementation;

impl Implementation for DummyImplementation {
    fn name(&self) -> &'static str {
        "Dummy Implementation"
    }

    fn runtime_code(&self) -> Bytes {
        let mut code = vec![0xfe];
        code.extend_from_slice(b"dummy-implementation.v1");
        Bytes::from(code)
    }

    fn execute(
        &self,
        _ctx: &CallContext,
        call: &Call,
        storage: &mut dyn StorageArena,
    ) -> Result<Bytes, ExecutionError> {
        let selector = call.selector;
        if selector == Selector::from_signature(signatures::DUMMY) {
            Ok(Bytes::from(abi::encode(&[Token::String(
                DUMMY_MARKER.to_string(),
            )])))
        } else if selector == Selector::from_signature(signatures::INITIALIZE) {
            initializable::begin(storage)?;
            Ok(Bytes::new())
        } else if selector == Selector::from_signature(signatures::INITIALIZED) {
            let flag = initializable::is_initialized(storage);
            Ok(Bytes::from(abi::encode(&[Token::Bool(flag)])))
        } else {
            Err(ExecutionError::UnknownSelector(selector.0))
        }
    }
}
