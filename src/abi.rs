//! Encoding and decoding of the read-only ERC20 calls the monitor issues.
//!
//! The interface is closed: `decimals()`, `symbol()` and `balanceOf(address)`.
//! Each function has a typed path (through the `sol!`-generated call types)
//! and a generic path over [`AbiValue`] lists that validates arity and types
//! before touching the wire format.

use crate::error::{DecodingError, EncodingError};
use alloy::sol;
use alloy::sol_types::SolCall;
use alloy_primitives::{Address, Bytes, U256};

sol! {
    function balanceOf(address owner) external view returns (uint256);
    function decimals() external view returns (uint8);
    function symbol() external view returns (string);
}

const WORD: usize = 32;
const ADDRESS_WIDTH: usize = 20;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AbiType {
    Address,
    Uint8,
    Uint256,
    String,
}

impl AbiType {
    pub fn name(self) -> &'static str {
        match self {
            AbiType::Address => "address",
            AbiType::Uint8 => "uint8",
            AbiType::Uint256 => "uint256",
            AbiType::String => "string",
        }
    }

    /// Smallest number of return bytes this type can occupy (head plus, for
    /// dynamic types, the length word of the tail).
    fn min_encoded_len(self) -> usize {
        match self {
            AbiType::String => 2 * WORD,
            _ => WORD,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AbiValue {
    Address(Address),
    Uint8(u8),
    Uint(U256),
    String(String),
    /// Untyped bytes, accepted for an `address` parameter when exactly 20 bytes wide.
    Bytes(Bytes),
}

impl AbiValue {
    pub fn type_name(&self) -> &'static str {
        match self {
            AbiValue::Address(_) => "address",
            AbiValue::Uint8(_) => "uint8",
            AbiValue::Uint(_) => "uint256",
            AbiValue::String(_) => "string",
            AbiValue::Bytes(_) => "bytes",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
enum FunctionId {
    BalanceOf,
    Decimals,
    Symbol,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FunctionSignature {
    id: FunctionId,
    pub name: &'static str,
    pub inputs: &'static [AbiType],
    pub outputs: &'static [AbiType],
}

pub const BALANCE_OF: FunctionSignature = FunctionSignature {
    id: FunctionId::BalanceOf,
    name: "balanceOf",
    inputs: &[AbiType::Address],
    outputs: &[AbiType::Uint256],
};

pub const DECIMALS: FunctionSignature = FunctionSignature {
    id: FunctionId::Decimals,
    name: "decimals",
    inputs: &[],
    outputs: &[AbiType::Uint8],
};

pub const SYMBOL: FunctionSignature = FunctionSignature {
    id: FunctionId::Symbol,
    name: "symbol",
    inputs: &[],
    outputs: &[AbiType::String],
};

pub const SUPPORTED_FUNCTIONS: [FunctionSignature; 3] = [BALANCE_OF, DECIMALS, SYMBOL];

impl FunctionSignature {
    pub fn selector(&self) -> [u8; 4] {
        match self.id {
            FunctionId::BalanceOf => balanceOfCall::SELECTOR,
            FunctionId::Decimals => decimalsCall::SELECTOR,
            FunctionId::Symbol => symbolCall::SELECTOR,
        }
    }

    fn min_return_len(&self) -> usize {
        self.outputs.iter().map(|t| t.min_encoded_len()).sum()
    }

    fn check_args(&self, args: &[AbiValue]) -> Result<Vec<AbiValue>, EncodingError> {
        if args.len() != self.inputs.len() {
            return Err(EncodingError::Arity {
                function: self.name,
                expected: self.inputs.len(),
                actual: args.len(),
            });
        }

        self.inputs
            .iter()
            .zip(args)
            .enumerate()
            .map(|(index, (expected, arg))| match (expected, arg) {
                (AbiType::Address, AbiValue::Address(_)) => Ok(arg.clone()),
                (AbiType::Address, AbiValue::Bytes(raw)) => {
                    if raw.len() != ADDRESS_WIDTH {
                        return Err(EncodingError::ArgumentWidth {
                            function: self.name,
                            index,
                            expected: ADDRESS_WIDTH,
                            actual: raw.len(),
                        });
                    }
                    Ok(AbiValue::Address(Address::from_slice(raw)))
                }
                (AbiType::Uint8, AbiValue::Uint8(_))
                | (AbiType::Uint256, AbiValue::Uint(_))
                | (AbiType::String, AbiValue::String(_)) => Ok(arg.clone()),
                _ => Err(EncodingError::ArgumentType {
                    function: self.name,
                    index,
                    expected: expected.name(),
                    actual: arg.type_name(),
                }),
            })
            .collect()
    }

    /// Builds the call payload (selector followed by encoded arguments).
    pub fn encode(&self, args: &[AbiValue]) -> Result<Bytes, EncodingError> {
        let args = self.check_args(args)?;
        let payload = match (self.id, args.as_slice()) {
            (FunctionId::BalanceOf, [AbiValue::Address(owner)]) => {
                encode_call(&balanceOfCall { owner: *owner })
            }
            (FunctionId::Decimals, []) => encode_call(&decimalsCall {}),
            (FunctionId::Symbol, []) => encode_call(&symbolCall {}),
            // check_args guarantees the shapes above
            _ => unreachable!("arguments validated against {}", self.name),
        };
        Ok(payload)
    }

    /// Decodes return data into the declared outputs, in order.
    pub fn decode(&self, data: &[u8]) -> Result<Vec<AbiValue>, DecodingError> {
        let value = match self.id {
            FunctionId::BalanceOf => AbiValue::Uint(decode_returns::<balanceOfCall>(data)?),
            FunctionId::Decimals => AbiValue::Uint8(decode_returns::<decimalsCall>(data)?),
            FunctionId::Symbol => AbiValue::String(decode_returns::<symbolCall>(data)?),
        };
        Ok(vec![value])
    }
}

/// Ties a generated call type to its entry in the closed function set.
pub trait ViewCall: SolCall {
    const FUNCTION: FunctionSignature;
}

impl ViewCall for balanceOfCall {
    const FUNCTION: FunctionSignature = BALANCE_OF;
}

impl ViewCall for decimalsCall {
    const FUNCTION: FunctionSignature = DECIMALS;
}

impl ViewCall for symbolCall {
    const FUNCTION: FunctionSignature = SYMBOL;
}

pub fn encode_call<C: ViewCall>(call: &C) -> Bytes {
    Bytes::from(call.abi_encode())
}

pub fn decode_returns<C: ViewCall>(data: &[u8]) -> Result<C::Return, DecodingError> {
    let function = C::FUNCTION;
    let expected = function.min_return_len();
    if data.len() < expected {
        return Err(DecodingError::InsufficientData {
            function: function.name,
            expected,
            actual: data.len(),
        });
    }

    // out-of-range words (e.g. a uint8 above 255) are rejected rather than truncated
    C::abi_decode_returns_validate(data).map_err(|e| DecodingError::Malformed {
        function: function.name,
        reason: e.to_string(),
    })
}

pub fn encode(function: &FunctionSignature, args: &[AbiValue]) -> Result<Bytes, EncodingError> {
    function.encode(args)
}

pub fn decode(function: &FunctionSignature, data: &[u8]) -> Result<Vec<AbiValue>, DecodingError> {
    function.decode(data)
}
