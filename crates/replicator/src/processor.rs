//! Per-type transaction processors
//!
//! Each processor applies one decoded transaction to the ledger. All
//! arithmetic is integer and floors toward zero; fee handling is shared:
//! the payer's fee-token balance is debited and the operator account is
//! credited the same amount.

use crate::error::ReplayError;
use exchange_state::{
    is_nft_token, AccountId, AccountUpdateTx, AmmUpdateTx, DepositTx, ExchangeState, Nft,
    NftMintData, NftMintTx, Order, OrderCancellationTx, SpotTradeTx, StateError, TransferTx,
    WithdrawalTx, PROTOCOL_FEE_ACCOUNT,
};
use primitive_types::U256;
use tracing::debug;

const FEE_DENOMINATOR: u64 = 10_000;
const PROTOCOL_FEE_DENOMINATOR: u64 = 100_000;

/// Per-block context shared by the processors.
#[derive(Clone, Copy, Debug)]
pub struct TxContext {
    pub block_idx: u64,
    pub operator_account_id: AccountId,
    pub protocol_taker_fee_bips: u8,
    pub protocol_maker_fee_bips: u8,
}

fn pay_fee(
    state: &mut ExchangeState,
    payer: AccountId,
    fee_token: u16,
    fee: U256,
    operator: AccountId,
) -> Result<(), StateError> {
    if fee.is_zero() {
        return Ok(());
    }
    state.debit(payer, fee_token, fee)?;
    state.credit(operator, fee_token, fee)
}

pub fn process_deposit(
    state: &mut ExchangeState,
    tx: &DepositTx,
    ctx: &TxContext,
    request_idx: u64,
) -> Result<(), StateError> {
    let account = state.get_or_create_account(tx.account_id)?;
    account.owner = tx.owner;
    if !tx.pub_key_x.is_zero() || !tx.pub_key_y.is_zero() {
        account.pub_key_x = tx.pub_key_x;
        account.pub_key_y = tx.pub_key_y;
    }
    state.credit(tx.account_id, tx.token_id, tx.amount)?;
    state.link_deposit(tx.owner, tx.token_id, tx.amount, ctx.block_idx, request_idx);
    debug!(account = tx.account_id, token = tx.token_id, amount = %tx.amount, "deposit");
    Ok(())
}

pub fn process_withdrawal(
    state: &mut ExchangeState,
    tx: &WithdrawalTx,
    ctx: &TxContext,
    request_idx: u64,
) -> Result<(), ReplayError> {
    match tx.withdrawal_type {
        0 | 1 => {
            state.debit(tx.account_id, tx.token_id, tx.amount)?;
            state
                .storage_mut(tx.account_id, tx.token_id, tx.storage_id)?
                .mark_used(tx.storage_id)?;
            state.account_mut(tx.account_id)?.nonce += 1;
        }
        2 => {
            // Full exit: the whole current balance leaves, the amount
            // field is not trusted.
            let balance = state
                .get_account(tx.account_id)?
                .balance_amount(tx.token_id);
            state.debit(tx.account_id, tx.token_id, balance)?;
            state.balance_mut(tx.account_id, tx.token_id)?.weight_amm = U256::zero();
            state.account_mut(tx.account_id)?.nonce += 1;
            state.link_onchain_withdrawal(tx.account_id, tx.token_id, ctx.block_idx, request_idx);
        }
        3 => {
            // A forced request against an invalid account pays the fee and
            // settles the queue entry without moving principal.
            state.link_onchain_withdrawal(tx.account_id, tx.token_id, ctx.block_idx, request_idx);
        }
        other => {
            return Err(ReplayError::InvalidWithdrawalType {
                withdrawal_type: other,
            })
        }
    }
    pay_fee(
        state,
        tx.account_id,
        tx.fee_token_id,
        tx.fee,
        ctx.operator_account_id,
    )?;
    debug!(
        account = tx.account_id,
        token = tx.token_id,
        withdrawal_type = tx.withdrawal_type,
        "withdrawal"
    );
    Ok(())
}

pub fn process_transfer(
    state: &mut ExchangeState,
    tx: &TransferTx,
    ctx: &TxContext,
) -> Result<(), StateError> {
    let to_account = state.get_or_create_account(tx.to_account_id)?;
    if !tx.to.is_zero() {
        to_account.owner = tx.to;
    }

    if is_nft_token(tx.token_id) {
        let descriptor = state
            .get_account(tx.from_account_id)?
            .balance(tx.token_id)
            .map(|b| b.weight_amm)
            .unwrap_or_default();
        let receiver = state.balance_mut(tx.to_account_id, tx.token_id)?;
        if !receiver.weight_amm.is_zero() && receiver.weight_amm != descriptor {
            return Err(StateError::NftDescriptorMismatch {
                account: tx.to_account_id,
                token: tx.token_id,
            });
        }
        receiver.weight_amm = descriptor;
    }

    state.debit(tx.from_account_id, tx.token_id, tx.amount)?;
    state.credit(tx.to_account_id, tx.token_id, tx.amount)?;
    state
        .storage_mut(tx.from_account_id, tx.token_id, tx.storage_id)?
        .mark_used(tx.storage_id)?;
    state.account_mut(tx.from_account_id)?.nonce += 1;
    pay_fee(
        state,
        tx.from_account_id,
        tx.fee_token_id,
        tx.fee,
        ctx.operator_account_id,
    )?;
    debug!(
        from = tx.from_account_id,
        to = tx.to_account_id,
        token = tx.token_id,
        amount = %tx.amount,
        "transfer"
    );
    Ok(())
}

/// Settle one side of a trade. `fill_b` is the amount this side buys,
/// which is what its fee, protocol fee and rebate are charged on.
fn settle_trade_side(
    state: &mut ExchangeState,
    order: &Order,
    fill_b: U256,
    protocol_bips: u8,
    operator: AccountId,
) -> Result<(), StateError> {
    let (fee, rebate) = if order.rebate {
        (
            U256::zero(),
            fill_b * U256::from(order.fee_bips) / U256::from(FEE_DENOMINATOR),
        )
    } else {
        (
            fill_b * U256::from(order.fee_bips) / U256::from(FEE_DENOMINATOR),
            U256::zero(),
        )
    };
    let protocol_fee =
        fill_b * U256::from(protocol_bips) / U256::from(PROTOCOL_FEE_DENOMINATOR);

    state.debit(order.account_id, order.token_s, order.fill_s)?;
    state.credit(order.account_id, order.token_b, fill_b - fee + rebate)?;
    state.credit(PROTOCOL_FEE_ACCOUNT, order.token_b, protocol_fee)?;

    // The operator's delta is fee - protocolFee - rebate. A negative delta
    // comes out of the operator's standing balance; an operator that cannot
    // cover it is a fatal underflow.
    state.credit(operator, order.token_b, fee)?;
    state.debit(operator, order.token_b, protocol_fee + rebate)?;

    state
        .storage_mut(order.account_id, order.token_s, order.storage_id)?
        .accumulate(order.storage_id, order.overwrite, order.fill_s)?;
    Ok(())
}

pub fn process_spot_trade(
    state: &mut ExchangeState,
    tx: &SpotTradeTx,
    ctx: &TxContext,
) -> Result<(), StateError> {
    // Each side buys what the other side sells.
    let fill_b_a = tx.order_b.fill_s;
    let fill_b_b = tx.order_a.fill_s;

    settle_trade_side(
        state,
        &tx.order_a,
        fill_b_a,
        ctx.protocol_taker_fee_bips,
        ctx.operator_account_id,
    )?;
    settle_trade_side(
        state,
        &tx.order_b,
        fill_b_b,
        ctx.protocol_maker_fee_bips,
        ctx.operator_account_id,
    )?;
    debug!(
        account_a = tx.order_a.account_id,
        account_b = tx.order_b.account_id,
        fill_a = %tx.order_a.fill_s,
        fill_b = %tx.order_b.fill_s,
        "spot trade"
    );
    Ok(())
}

pub fn process_account_update(
    state: &mut ExchangeState,
    tx: &AccountUpdateTx,
    ctx: &TxContext,
) -> Result<(), StateError> {
    let account = state.get_or_create_account(tx.account_id)?;
    account.pub_key_x = tx.pub_key_x;
    account.pub_key_y = tx.pub_key_y;
    account.nonce += 1;
    pay_fee(
        state,
        tx.account_id,
        tx.fee_token_id,
        tx.fee,
        ctx.operator_account_id,
    )?;
    debug!(account = tx.account_id, "account update");
    Ok(())
}

pub fn process_amm_update(
    state: &mut ExchangeState,
    tx: &AmmUpdateTx,
) -> Result<(), StateError> {
    let account = state.account_mut(tx.account_id)?;
    account.fee_bips_amm = tx.fee_bips as u32;
    account.nonce += 1;
    state.balance_mut(tx.account_id, tx.token_id)?.weight_amm = tx.token_weight;
    debug!(account = tx.account_id, token = tx.token_id, "amm update");
    Ok(())
}

pub fn process_nft_mint(
    state: &mut ExchangeState,
    tx: &NftMintTx,
    ctx: &TxContext,
) -> Result<(), StateError> {
    let descriptor_hash = match &tx.data {
        NftMintData::Descriptor {
            minter,
            nft_type,
            token_address,
            creator_fee_bips,
            nft_id,
        } => {
            let nft = Nft {
                minter: *minter,
                nft_type: *nft_type,
                token_address: *token_address,
                nft_id: *nft_id,
                creator_fee_bips: *creator_fee_bips,
            };
            let hash = nft.hash();
            state.register_nft(nft);
            hash
        }
        NftMintData::Hash(hash) => {
            if state.get_nft(*hash).is_none() {
                return Err(StateError::UnknownNft { hash: *hash });
            }
            *hash
        }
    };
    let descriptor = U256::from_big_endian(descriptor_hash.as_bytes());

    state.get_or_create_account(tx.to_account_id)?;
    let balance = state.balance_mut(tx.to_account_id, tx.to_token_id)?;
    if !balance.weight_amm.is_zero() && balance.weight_amm != descriptor {
        return Err(StateError::NftDescriptorMismatch {
            account: tx.to_account_id,
            token: tx.to_token_id,
        });
    }
    balance.weight_amm = descriptor;
    state.credit(tx.to_account_id, tx.to_token_id, tx.amount)?;

    // Types 0/1 are fresh mints with replay protection on the minter;
    // type 2 re-mints already-registered data without a storage claim.
    if tx.mint_type != 2 {
        state
            .storage_mut(tx.minter_account_id, tx.to_token_id, tx.storage_id)?
            .mark_used(tx.storage_id)?;
    }
    pay_fee(
        state,
        tx.minter_account_id,
        tx.fee_token_id,
        tx.fee,
        ctx.operator_account_id,
    )?;
    debug!(
        minter = tx.minter_account_id,
        to = tx.to_account_id,
        token = tx.to_token_id,
        nft = ?descriptor_hash,
        "nft mint"
    );
    Ok(())
}

pub fn process_order_cancellation(
    state: &mut ExchangeState,
    tx: &OrderCancellationTx,
    ctx: &TxContext,
) -> Result<(), StateError> {
    state
        .storage_mut(tx.account_id, tx.token_id, tx.storage_id)?
        .cancel(tx.storage_id)?;
    state.account_mut(tx.account_id)?.nonce += 1;
    pay_fee(
        state,
        tx.account_id,
        tx.fee_token_id,
        tx.fee,
        ctx.operator_account_id,
    )?;
    debug!(
        account = tx.account_id,
        token = tx.token_id,
        storage_id = tx.storage_id,
        "order cancellation"
    );
    Ok(())
}
