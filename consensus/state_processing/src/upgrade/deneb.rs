use std::mem;
use types::{
    BeaconState, BeaconStateDeneb, BeaconStateError as Error, ChainSpec, EthSpec,
    ExecutionPayloadHeaderDeneb, Fork,
};

/// Transform a `Capella` state into a `Deneb` state.
pub fn upgrade_to_deneb<E: EthSpec>(
    pre_state: &mut BeaconState<E>,
    spec: &ChainSpec,
) -> Result<(), Error> {
    let epoch = pre_state.current_epoch();

    let pre = match pre_state {
        BeaconState::Capella(pre) => pre,
        _ => return Err(Error::IncorrectStateVariant),
    };

    let previous_payload_header = pre.latest_execution_payload_header.clone();

    let post = BeaconState::Deneb(BeaconStateDeneb {
        // Versioning
        genesis_time: pre.genesis_time,
        genesis_validators_root: pre.genesis_validators_root,
        slot: pre.slot,
        fork: Fork {
            previous_version: pre.fork.current_version,
            current_version: spec.deneb_fork_version,
            epoch,
        },
        // History
        latest_block_header: pre.latest_block_header.clone(),
        block_roots: pre.block_roots.clone(),
        state_roots: pre.state_roots.clone(),
        historical_roots: mem::take(&mut pre.historical_roots),
        // Eth1
        eth1_data: pre.eth1_data.clone(),
        eth1_data_votes: mem::take(&mut pre.eth1_data_votes),
        eth1_deposit_index: pre.eth1_deposit_index,
        // Registry
        validators: mem::take(&mut pre.validators),
        balances: mem::take(&mut pre.balances),
        // Randomness
        randao_mixes: pre.randao_mixes.clone(),
        // Slashings
        slashings: pre.slashings.clone(),
        // Participation
        previous_epoch_participation: mem::take(&mut pre.previous_epoch_participation),
        current_epoch_participation: mem::take(&mut pre.current_epoch_participation),
        // Finality
        justification_bits: pre.justification_bits.clone(),
        previous_justified_checkpoint: pre.previous_justified_checkpoint,
        current_justified_checkpoint: pre.current_justified_checkpoint,
        finalized_checkpoint: pre.finalized_checkpoint,
        // Inactivity
        inactivity_scores: mem::take(&mut pre.inactivity_scores),
        // Sync committees
        current_sync_committee: pre.current_sync_committee.clone(),
        next_sync_committee: pre.next_sync_committee.clone(),
        // Execution
        latest_execution_payload_header: ExecutionPayloadHeaderDeneb {
            parent_hash: previous_payload_header.parent_hash,
            fee_recipient: previous_payload_header.fee_recipient,
            state_root: previous_payload_header.state_root,
            receipts_root: previous_payload_header.receipts_root,
            logs_bloom: previous_payload_header.logs_bloom,
            prev_randao: previous_payload_header.prev_randao,
            block_number: previous_payload_header.block_number,
            gas_limit: previous_payload_header.gas_limit,
            gas_used: previous_payload_header.gas_used,
            timestamp: previous_payload_header.timestamp,
            extra_data: previous_payload_header.extra_data,
            base_fee_per_gas: previous_payload_header.base_fee_per_gas,
            block_hash: previous_payload_header.block_hash,
            transactions_root: previous_payload_header.transactions_root,
            withdrawals_root: previous_payload_header.withdrawals_root,
            blob_gas_used: 0,
            excess_blob_gas: 0,
        },
        // Capella
        next_withdrawal_index: pre.next_withdrawal_index,
        next_withdrawal_validator_index: pre.next_withdrawal_validator_index,
        historical_summaries: mem::take(&mut pre.historical_summaries),
        // Caches
        total_active_balance: pre.total_active_balance,
        committee_caches: mem::take(&mut pre.committee_caches),
        pubkey_cache: mem::take(&mut pre.pubkey_cache),
        exit_cache: mem::take(&mut pre.exit_cache),
        progressive_balances_cache: mem::take(&mut pre.progressive_balances_cache),
        epoch_cache: mem::take(&mut pre.epoch_cache),
    });

    *pre_state = post;

    Ok(())
}
