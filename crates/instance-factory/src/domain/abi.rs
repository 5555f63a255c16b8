//! # Call Encoding
//!
//! Minimal contract ABI codec: 4-byte selectors and head/tail word encoding
//! for the handful of parameter types instances exchange (`address`,
//! `address[]`, `bool`, `uint256`, `bytes`, `string`).
//!
//! Decoding is strict: padding bits must be zero and every offset must land
//! inside the payload, so malformed initializer payloads are rejected rather
//! than silently truncated.

use crate::domain::services::keccak256;
use crate::domain::value_objects::{Address, Bytes, U256};
use crate::errors::AbiError;
use std::fmt;

const WORD: usize = 32;

// =============================================================================
// SELECTOR
// =============================================================================

/// First four bytes of `keccak256(signature)`.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct Selector(pub [u8; 4]);

impl Selector {
    /// Computes the selector of a canonical function signature such as
    /// `"upgradeTo(address)"`.
    #[must_use]
    pub fn from_signature(signature: &str) -> Self {
        let hash = keccak256(signature.as_bytes());
        let mut out = [0u8; 4];
        out.copy_from_slice(&hash.as_bytes()[..4]);
        Self(out)
    }
}

impl fmt::Debug for Selector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{}", hex::encode(self.0))
    }
}

/// A decoded contract call: selector plus ABI-encoded arguments.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Call {
    /// Function selector.
    pub selector: Selector,
    /// ABI-encoded arguments (without the selector).
    pub args: Bytes,
}

impl Call {
    /// Builds a call from a signature and argument tokens.
    #[must_use]
    pub fn new(signature: &str, tokens: &[Token]) -> Self {
        Self {
            selector: Selector::from_signature(signature),
            args: Bytes::from(encode(tokens)),
        }
    }

    /// Splits raw calldata into selector and arguments.
    pub fn from_calldata(data: &[u8]) -> Result<Self, AbiError> {
        if data.len() < 4 {
            return Err(AbiError::ShortCalldata(data.len()));
        }
        let mut selector = [0u8; 4];
        selector.copy_from_slice(&data[..4]);
        Ok(Self {
            selector: Selector(selector),
            args: Bytes::from_slice(&data[4..]),
        })
    }

    /// Re-encodes the call as raw calldata.
    #[must_use]
    pub fn calldata(&self) -> Bytes {
        let mut out = Vec::with_capacity(4 + self.args.len());
        out.extend_from_slice(&self.selector.0);
        out.extend_from_slice(self.args.as_slice());
        Bytes::from(out)
    }

    /// Decodes the arguments against a list of parameter types.
    pub fn decode_args(&self, types: &[ParamType]) -> Result<Vec<Token>, AbiError> {
        decode(types, self.args.as_slice())
    }
}

// =============================================================================
// TOKENS
// =============================================================================

/// Parameter types understood by the codec.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ParamType {
    /// `address`
    Address,
    /// `uint256`
    Uint,
    /// `bool`
    Bool,
    /// `bytes`
    Bytes,
    /// `string`
    String,
    /// `address[]`
    AddressArray,
}

impl ParamType {
    fn is_dynamic(self) -> bool {
        matches!(self, Self::Bytes | Self::String | Self::AddressArray)
    }
}

/// A single ABI value.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Token {
    /// `address`
    Address(Address),
    /// `uint256`
    Uint(U256),
    /// `bool`
    Bool(bool),
    /// `bytes`
    Bytes(Vec<u8>),
    /// `string`
    String(String),
    /// `address[]`
    AddressArray(Vec<Address>),
}

impl Token {
    fn is_dynamic(&self) -> bool {
        matches!(self, Self::Bytes(_) | Self::String(_) | Self::AddressArray(_))
    }

    /// Returns the address if this is an address token.
    #[must_use]
    pub fn into_address(self) -> Option<Address> {
        match self {
            Self::Address(a) => Some(a),
            _ => None,
        }
    }

    /// Returns the raw bytes if this is a bytes token.
    #[must_use]
    pub fn into_bytes(self) -> Option<Vec<u8>> {
        match self {
            Self::Bytes(b) => Some(b),
            _ => None,
        }
    }

    /// Returns the string if this is a string token.
    #[must_use]
    pub fn into_string(self) -> Option<String> {
        match self {
            Self::String(s) => Some(s),
            _ => None,
        }
    }

    /// Returns the addresses if this is an `address[]` token.
    #[must_use]
    pub fn into_address_array(self) -> Option<Vec<Address>> {
        match self {
            Self::AddressArray(v) => Some(v),
            _ => None,
        }
    }

    /// Returns the flag if this is a bool token.
    #[must_use]
    pub fn into_bool(self) -> Option<bool> {
        match self {
            Self::Bool(b) => Some(b),
            _ => None,
        }
    }

    /// Returns the integer if this is a uint token.
    #[must_use]
    pub fn into_uint(self) -> Option<U256> {
        match self {
            Self::Uint(v) => Some(v),
            _ => None,
        }
    }
}

// =============================================================================
// ENCODING
// =============================================================================

fn address_word(address: &Address) -> [u8; WORD] {
    let mut word = [0u8; WORD];
    word[12..].copy_from_slice(address.as_bytes());
    word
}

fn uint_word(value: U256) -> [u8; WORD] {
    let mut word = [0u8; WORD];
    value.to_big_endian(&mut word);
    word
}

fn usize_word(value: usize) -> [u8; WORD] {
    uint_word(U256::from(value))
}

fn padded(data: &[u8]) -> Vec<u8> {
    let mut out = data.to_vec();
    let rem = data.len() % WORD;
    if rem != 0 {
        out.resize(data.len() + (WORD - rem), 0);
    }
    out
}

fn encode_tail(token: &Token) -> Vec<u8> {
    match token {
        Token::Bytes(b) => {
            let mut out = usize_word(b.len()).to_vec();
            out.extend(padded(b));
            out
        }
        Token::String(s) => {
            let mut out = usize_word(s.len()).to_vec();
            out.extend(padded(s.as_bytes()));
            out
        }
        Token::AddressArray(items) => {
            let mut out = usize_word(items.len()).to_vec();
            for item in items {
                out.extend_from_slice(&address_word(item));
            }
            out
        }
        Token::Address(_) | Token::Uint(_) | Token::Bool(_) => Vec::new(),
    }
}

/// Encodes a tuple of tokens using head/tail layout.
#[must_use]
pub fn encode(tokens: &[Token]) -> Vec<u8> {
    let head_len = tokens.len() * WORD;
    let mut head = Vec::with_capacity(head_len);
    let mut tail = Vec::new();

    for token in tokens {
        let word = match token {
            Token::Address(a) => address_word(a),
            Token::Uint(v) => uint_word(*v),
            Token::Bool(b) => usize_word(usize::from(*b)),
            dynamic => {
                debug_assert!(dynamic.is_dynamic());
                let offset = head_len + tail.len();
                tail.extend(encode_tail(dynamic));
                usize_word(offset)
            }
        };
        head.extend_from_slice(&word);
    }

    head.extend(tail);
    head
}

// =============================================================================
// DECODING
// =============================================================================

fn word_at(data: &[u8], offset: usize) -> Result<&[u8], AbiError> {
    let end = offset.checked_add(WORD).ok_or(AbiError::OffsetOutOfBounds {
        offset,
        len: data.len(),
    })?;
    data.get(offset..end).ok_or(AbiError::OffsetOutOfBounds {
        offset,
        len: data.len(),
    })
}

fn read_usize(word: &[u8]) -> Result<usize, AbiError> {
    if word[..24].iter().any(|b| *b != 0) {
        return Err(AbiError::ValueOverflow);
    }
    let mut buf = [0u8; 8];
    buf.copy_from_slice(&word[24..]);
    usize::try_from(u64::from_be_bytes(buf)).map_err(|_| AbiError::ValueOverflow)
}

fn read_address(word: &[u8]) -> Result<Address, AbiError> {
    if word[..12].iter().any(|b| *b != 0) {
        return Err(AbiError::DirtyAddressPadding);
    }
    Address::from_slice(&word[12..]).ok_or(AbiError::DirtyAddressPadding)
}

fn read_bool(word: &[u8]) -> Result<bool, AbiError> {
    if word[..31].iter().any(|b| *b != 0) || word[31] > 1 {
        return Err(AbiError::InvalidBool);
    }
    Ok(word[31] == 1)
}

fn read_bytes(data: &[u8], offset: usize) -> Result<&[u8], AbiError> {
    let len = read_usize(word_at(data, offset)?)?;
    let start = offset + WORD;
    let end = start.checked_add(len).ok_or(AbiError::ValueOverflow)?;
    data.get(start..end).ok_or(AbiError::OffsetOutOfBounds {
        offset: start,
        len: data.len(),
    })
}

fn decode_dynamic(kind: ParamType, data: &[u8], offset: usize) -> Result<Token, AbiError> {
    match kind {
        ParamType::Bytes => Ok(Token::Bytes(read_bytes(data, offset)?.to_vec())),
        ParamType::String => {
            let raw = read_bytes(data, offset)?;
            String::from_utf8(raw.to_vec())
                .map(Token::String)
                .map_err(|_| AbiError::InvalidUtf8)
        }
        ParamType::AddressArray => {
            let count = read_usize(word_at(data, offset)?)?;
            let mut items = Vec::with_capacity(count.min(1024));
            for i in 0..count {
                let at = offset + WORD + i * WORD;
                items.push(read_address(word_at(data, at)?)?);
            }
            Ok(Token::AddressArray(items))
        }
        ParamType::Address | ParamType::Uint | ParamType::Bool => {
            Err(AbiError::UnexpectedType(kind))
        }
    }
}

/// Decodes a tuple of the given parameter types.
pub fn decode(types: &[ParamType], data: &[u8]) -> Result<Vec<Token>, AbiError> {
    let mut tokens = Vec::with_capacity(types.len());
    for (i, kind) in types.iter().enumerate() {
        let word = word_at(data, i * WORD)?;
        let token = match kind {
            ParamType::Address => Token::Address(read_address(word)?),
            ParamType::Uint => Token::Uint(U256::from_big_endian(word)),
            ParamType::Bool => Token::Bool(read_bool(word)?),
            dynamic => {
                debug_assert!(dynamic.is_dynamic());
                let offset = read_usize(word)?;
                decode_dynamic(*dynamic, data, offset)?
            }
        };
        tokens.push(token);
    }
    Ok(tokens)
}

/// Decodes a single value of the given type.
pub fn decode_one(kind: ParamType, data: &[u8]) -> Result<Token, AbiError> {
    decode(&[kind], data)?
        .pop()
        .ok_or(AbiError::UnexpectedType(kind))
}

// =============================================================================
// TESTS
// =============================================================================
