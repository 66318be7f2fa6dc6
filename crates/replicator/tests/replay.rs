//! End-to-end block replay against the ledger

use block_replicator::{BlockBuilder, BlockContext, BlockRecord, BlockReplicator, ReplayError};
use exchange_state::{
    Deposit, DepositTx, ExchangeState, NftMintData, NftMintTx, Order, SpotTradeTx, WithdrawalTx,
};
use primitive_types::{H160, H256, U256};

const EXCHANGE: H160 = H160::repeat_byte(0xee);
const OPERATOR_ACCOUNT: u32 = 1;

fn ctx(block_idx: u64) -> BlockContext {
    BlockContext {
        block_idx,
        timestamp: 1_700_000_000 + block_idx,
        operator: H160::repeat_byte(0x0f),
        origin: H160::repeat_byte(0x0f),
    }
}

/// Replay `record` on a scratch copy to learn the post-state root, patch it
/// into the committed header, then replay for real.
fn replicate(state: &mut ExchangeState, mut record: BlockRecord, block_idx: u64) -> H256 {
    let mut scratch = state.clone();
    let err = BlockReplicator::new(&mut scratch)
        .replicate(&record, &ctx(block_idx))
        .unwrap_err();
    let root = match err {
        ReplayError::StateDivergence { actual, .. } => actual,
        other => panic!("replay failed before the root check: {other}"),
    };
    record.data[52..84].copy_from_slice(root.as_bytes());
    BlockReplicator::new(state)
        .replicate(&record, &ctx(block_idx))
        .unwrap();
    root
}

fn deposit_tx(account_id: u32, owner_byte: u8, token_id: u16, amount: u64) -> DepositTx {
    DepositTx {
        owner: H160::repeat_byte(owner_byte),
        account_id,
        token_id,
        amount: U256::from(amount),
        pub_key_x: H256::repeat_byte(owner_byte),
        pub_key_y: H256::repeat_byte(owner_byte),
    }
}

fn builder(state: &ExchangeState) -> BlockBuilder {
    let mut b = BlockBuilder::new(EXCHANGE);
    b.set_roots(state.root(), H256::zero());
    b.set_operator_account(OPERATOR_ACCOUNT);
    b.set_protocol_fees(25, 10);
    b
}

fn genesis_with_deposits() -> ExchangeState {
    let mut state = ExchangeState::new(EXCHANGE);
    state.add_deposit(Deposit::new(
        H160::repeat_byte(0xa1),
        0,
        U256::from(1_000u64),
        U256::zero(),
    ));
    state.add_deposit(Deposit::new(
        H160::repeat_byte(0xb2),
        1,
        U256::from(2_000_000u64),
        U256::zero(),
    ));

    let mut b = builder(&state);
    b.add_deposit(&deposit_tx(OPERATOR_ACCOUNT, 0x0f, 0, 0))
        .unwrap()
        .add_deposit(&deposit_tx(2, 0xa1, 0, 1_000))
        .unwrap()
        .add_deposit(&deposit_tx(3, 0xb2, 1, 2_000_000))
        .unwrap()
        .add_noop();
    replicate(&mut state, b.build(), 0);
    state
}

#[test]
fn test_deposit_block_credits_and_links_queue() {
    let state = genesis_with_deposits();

    assert_eq!(state.num_blocks(), 1);
    assert_eq!(state.num_accounts(), 4);
    assert_eq!(
        state.get_account(2).unwrap().balance_amount(0),
        U256::from(1_000u64)
    );
    assert_eq!(
        state.get_account(3).unwrap().balance_amount(1),
        U256::from(2_000_000u64)
    );
    // Both queue entries were consumed by the in-block deposits.
    assert!(state.deposits().iter().all(|d| d.is_linked()));
    // One nonce bump for the operator, none for depositors.
    assert_eq!(state.get_account(OPERATOR_ACCOUNT).unwrap().nonce, 1);
    assert_eq!(state.get_account(2).unwrap().nonce, 0);
    // One log entry per slot, noop included.
    assert_eq!(state.total_requests_processed(), 4);
    assert_eq!(state.last_block().unwrap().merkle_root, state.root());
}

#[test]
fn test_spot_trade_block_fee_and_protocol_fee_floors() {
    let mut state = genesis_with_deposits();

    // feeBips 10 on a 200_000 buy: fee = fillB / 1000 = 200.
    // protocolTakerBips 25: protocolFee = fillB / 4000 = 50.
    let trade = SpotTradeTx {
        order_a: Order {
            storage_id: 0,
            account_id: 2,
            token_s: 0,
            token_b: 1,
            fill_s: U256::from(1_000u64),
            fee_bips: 10,
            rebate: false,
            overwrite: false,
        },
        order_b: Order {
            storage_id: 0,
            account_id: 3,
            token_s: 1,
            token_b: 0,
            fill_s: U256::from(200_000u64),
            fee_bips: 0,
            rebate: false,
            overwrite: false,
        },
    };
    let mut b = builder(&state);
    b.add_spot_trade(&trade).unwrap();
    replicate(&mut state, b.build(), 1);

    let fill_b_a = U256::from(200_000u64);
    let fee_a = fill_b_a / 1_000;
    let protocol_a = fill_b_a / 4_000;
    assert_eq!(
        state.get_account(2).unwrap().balance_amount(1),
        fill_b_a - fee_a
    );
    assert_eq!(state.get_account(2).unwrap().balance_amount(0), U256::zero());
    assert_eq!(
        state.get_account(3).unwrap().balance_amount(0),
        U256::from(1_000u64)
    );
    assert_eq!(state.get_account(0).unwrap().balance_amount(1), protocol_a);
    assert_eq!(
        state
            .get_account(OPERATOR_ACCOUNT)
            .unwrap()
            .balance_amount(1),
        fee_a - protocol_a
    );

    // Per-token conservation over all accounts.
    for (token, expected) in [(0u16, 1_000u64), (1, 2_000_000)] {
        let total = (0..state.num_accounts())
            .map(|id| state.get_account(id as u32).unwrap().balance_amount(token))
            .fold(U256::zero(), |acc, b| acc + b);
        assert_eq!(total, U256::from(expected));
    }
}

#[test]
fn test_full_withdrawal_zeroes_balance() {
    let mut state = genesis_with_deposits();

    let mut b = builder(&state);
    b.add_withdrawal(&WithdrawalTx {
        withdrawal_type: 2,
        owner: H160::repeat_byte(0xa1),
        account_id: 2,
        token_id: 0,
        amount: U256::zero(),
        fee_token_id: 0,
        fee: U256::zero(),
        storage_id: 0,
    })
    .unwrap();
    replicate(&mut state, b.build(), 1);

    assert_eq!(state.get_account(2).unwrap().balance_amount(0), U256::zero());
    assert_eq!(state.get_account(2).unwrap().nonce, 1);
}

#[test]
fn test_unknown_withdrawal_type_aborts_replay() {
    let mut state = genesis_with_deposits();
    let before = state.root();

    let mut b = builder(&state);
    b.add_withdrawal(&WithdrawalTx {
        withdrawal_type: 9,
        owner: H160::repeat_byte(0xa1),
        account_id: 2,
        token_id: 0,
        amount: U256::zero(),
        fee_token_id: 0,
        fee: U256::zero(),
        storage_id: 0,
    })
    .unwrap();
    let err = BlockReplicator::new(&mut state)
        .replicate(&b.build(), &ctx(1))
        .unwrap_err();
    assert!(matches!(
        err,
        ReplayError::InvalidWithdrawalType { withdrawal_type: 9 }
    ));
    assert_eq!(state.num_blocks(), 1);
    assert_eq!(state.root(), before);
}

#[test]
fn test_nft_mint_and_carrier_slots() {
    let mut state = genesis_with_deposits();

    let mint = NftMintTx {
        mint_type: 0,
        minter_account_id: 2,
        to_account_id: 2,
        to_token_id: 0x8000,
        amount: U256::from(1u64),
        fee_token_id: 0,
        fee: U256::zero(),
        storage_id: 0,
        to: H160::zero(),
        data: NftMintData::Descriptor {
            minter: H160::repeat_byte(0xa1),
            nft_type: 0,
            token_address: H160::repeat_byte(0x33),
            creator_fee_bips: 5,
            nft_id: H256::repeat_byte(0x44),
        },
    };
    let mut b = builder(&state);
    b.add_nft_mint(&mint).unwrap();
    assert_eq!(b.num_slots(), 3);
    replicate(&mut state, b.build(), 1);

    let account = state.get_account(2).unwrap();
    assert_eq!(account.balance_amount(0x8000), U256::from(1u64));
    let descriptor = account.nft_descriptor(0x8000).unwrap();
    let mut bytes = [0u8; 32];
    descriptor.to_big_endian(&mut bytes);
    assert!(state.get_nft(H256::from(bytes)).is_some());
    // Mint slot plus two carriers, one log entry each.
    assert_eq!(state.last_block().unwrap().num_requests_processed, 3);
}

#[test]
fn test_wrong_committed_root_is_divergence() {
    let mut state = genesis_with_deposits();

    let mut b = builder(&state);
    b.set_roots(state.root(), H256::repeat_byte(0xff));
    b.add_noop();
    let err = BlockReplicator::new(&mut state)
        .replicate(&b.build(), &ctx(1))
        .unwrap_err();
    assert!(matches!(err, ReplayError::StateDivergence { .. }));
}

#[test]
fn test_wrong_root_before_is_divergence() {
    let mut state = genesis_with_deposits();

    let mut b = builder(&state);
    b.set_roots(H256::repeat_byte(0xaa), H256::zero());
    b.add_noop();
    let err = BlockReplicator::new(&mut state)
        .replicate(&b.build(), &ctx(1))
        .unwrap_err();
    assert!(matches!(err, ReplayError::StateDivergence { .. }));
}

#[test]
fn test_unknown_tag_is_fatal() {
    let mut state = ExchangeState::new(EXCHANGE);
    let mut b = BlockBuilder::new(EXCHANGE);
    b.set_roots(state.root(), H256::zero());
    b.add_noop();
    let mut record = b.build();
    // Corrupt the tag of slot 0.
    record.data[94] = 200;
    let err = BlockReplicator::new(&mut state)
        .replicate(&record, &ctx(0))
        .unwrap_err();
    assert!(matches!(
        err,
        ReplayError::UnknownTransactionType { tag: 200, slot: 0 }
    ));
}

#[test]
fn test_storage_overwrite_semantics_across_blocks() {
    let mut state = genesis_with_deposits();

    let order = |storage_id, fill, overwrite| Order {
        storage_id,
        account_id: 2,
        token_s: 0,
        token_b: 1,
        fill_s: U256::from(fill),
        fee_bips: 0,
        rebate: false,
        overwrite,
    };
    let counter = |fill| Order {
        storage_id: 2,
        account_id: 3,
        token_s: 1,
        token_b: 0,
        fill_s: U256::from(fill),
        fee_bips: 0,
        rebate: false,
        overwrite: true,
    };

    // Two partial fills under the same storage id accumulate. The first
    // claim of the fresh slot carries the overwrite flag.
    let mut b = builder(&state);
    b.add_spot_trade(&SpotTradeTx {
        order_a: order(7, 300u64, true),
        order_b: counter(100),
    })
    .unwrap()
    .add_spot_trade(&SpotTradeTx {
        order_a: order(7, 200, false),
        order_b: counter(100),
    })
    .unwrap();
    replicate(&mut state, b.build(), 1);

    // A later order reusing the slot with the overwrite flag resets it.
    let reused = 7 + exchange_state::NUM_STORAGE_SLOTS;
    let mut b = builder(&state);
    b.add_spot_trade(&SpotTradeTx {
        order_a: order(reused, 100, true),
        order_b: counter(100),
    })
    .unwrap();
    replicate(&mut state, b.build(), 2);

    let account = state.get_account(2).unwrap();
    let slot = account.balance(0).unwrap().storage.get(&7).unwrap();
    assert_eq!(slot.storage_id, reused);
    assert_eq!(slot.data, U256::from(100u64));
}
