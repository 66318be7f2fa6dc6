//! Decoded exchange-contract events
//!
//! Raw logs are decoded exactly once, at the `ChainClient` boundary; the
//! rest of the engine only sees this closed enum.

use primitive_types::{H160, U256};
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum ChainEvent {
    TokenRegistered {
        token_id: u16,
        token_address: H160,
    },
    DepositRequested {
        owner: H160,
        token_address: H160,
        amount: U256,
        fee: U256,
    },
    WithdrawalRequested {
        withdrawal_idx: u64,
        account_id: u32,
        token_id: u16,
        amount: U256,
    },
    BlockSubmitted {
        block_idx: u64,
        block_fee: U256,
        timestamp: u64,
        operator: H160,
        origin: H160,
        calldata: Vec<u8>,
    },
    Shutdown {
        timestamp: u64,
    },
    WithdrawalModeActivated {
        timestamp: u64,
    },
    OperatorChanged {
        old_operator: H160,
        new_operator: H160,
    },
    ProtocolFeesUpdated {
        taker_bips: u8,
        maker_bips: u8,
    },
    OwnershipTransferred {
        old_owner: H160,
        new_owner: H160,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_event_serde_round_trip() {
        let event = ChainEvent::BlockSubmitted {
            block_idx: 3,
            block_fee: U256::from(12u64),
            timestamp: 1_700_000_000,
            operator: H160::repeat_byte(1),
            origin: H160::repeat_byte(2),
            calldata: vec![0, 1, 2],
        };
        let json = serde_json::to_string(&event).unwrap();
        let back: ChainEvent = serde_json::from_str(&json).unwrap();
        assert_eq!(back, event);
    }
}
