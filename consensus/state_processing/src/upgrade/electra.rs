use safe_arith::SafeArith;
use std::mem;
use types::{
    BeaconState, BeaconStateElectra, BeaconStateError as Error, ChainSpec, Epoch, EthSpec,
    ExecutionPayloadHeaderElectra, Fork, PendingDeposit, VariableList,
};

/// Transform a `Deneb` state into an `Electra` state.
///
/// In addition to moving fields, the upgrade seeds the new churn accounting fields and queues
/// any not-yet-activated deposits into `pending_deposits` (EIP-7251 / EIP-6110 transition).
pub fn upgrade_to_electra<E: EthSpec>(
    pre_state: &mut BeaconState<E>,
    spec: &ChainSpec,
) -> Result<(), Error> {
    let epoch = pre_state.current_epoch();

    // The earliest exit epoch must not regress for validators already exiting.
    let earliest_exit_epoch = pre_state
        .validators()
        .iter()
        .filter(|v| v.exit_epoch != spec.far_future_epoch)
        .map(|v| v.exit_epoch)
        .max()
        .unwrap_or(epoch)
        .safe_add(1)?;

    // Validators that are not yet active, sorted by eligibility, are re-queued as pending
    // deposits so the new deposit flow owns their activation.
    let mut pre_activation = pre_state
        .validators()
        .iter()
        .enumerate()
        .filter(|(_, validator)| validator.activation_epoch == spec.far_future_epoch)
        .map(|(index, validator)| (validator.activation_eligibility_epoch, index))
        .collect::<Vec<_>>();
    pre_activation.sort();

    let pre = match pre_state {
        BeaconState::Deneb(pre) => pre,
        _ => return Err(Error::IncorrectStateVariant),
    };

    let mut pending_deposits = VariableList::empty();
    for (_, index) in pre_activation.iter() {
        let validator = pre
            .validators
            .get_mut(*index)
            .ok_or(Error::UnknownValidator(*index))?;
        let balance = pre
            .balances
            .get_mut(*index)
            .ok_or(Error::BalancesOutOfBounds(*index))?;

        let deposit_balance = mem::take(balance);
        validator.effective_balance = 0;
        validator.activation_eligibility_epoch = spec.far_future_epoch;

        pending_deposits.push(PendingDeposit {
            pubkey: validator.pubkey,
            withdrawal_credentials: validator.withdrawal_credentials,
            amount: deposit_balance,
            signature: bls::SignatureBytes::empty(),
            slot: spec.genesis_slot,
        })?;
    }

    let previous_payload_header = pre.latest_execution_payload_header.clone();

    let post = BeaconState::Electra(BeaconStateElectra {
        // Versioning
        genesis_time: pre.genesis_time,
        genesis_validators_root: pre.genesis_validators_root,
        slot: pre.slot,
        fork: Fork {
            previous_version: pre.fork.current_version,
            current_version: spec.electra_fork_version,
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
        latest_execution_payload_header: ExecutionPayloadHeaderElectra {
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
            blob_gas_used: previous_payload_header.blob_gas_used,
            excess_blob_gas: previous_payload_header.excess_blob_gas,
        },
        // Capella
        next_withdrawal_index: pre.next_withdrawal_index,
        next_withdrawal_validator_index: pre.next_withdrawal_validator_index,
        historical_summaries: mem::take(&mut pre.historical_summaries),
        // Electra
        deposit_requests_start_index: spec.unset_deposit_requests_start_index,
        deposit_balance_to_consume: 0,
        exit_balance_to_consume: 0,
        earliest_exit_epoch,
        consolidation_balance_to_consume: 0,
        earliest_consolidation_epoch: compute_activation_exit_epoch(epoch, spec)?,
        pending_deposits,
        pending_partial_withdrawals: VariableList::empty(),
        pending_consolidations: VariableList::empty(),
        // Caches
        total_active_balance: pre.total_active_balance,
        committee_caches: mem::take(&mut pre.committee_caches),
        pubkey_cache: mem::take(&mut pre.pubkey_cache),
        exit_cache: mem::take(&mut pre.exit_cache),
        progressive_balances_cache: mem::take(&mut pre.progressive_balances_cache),
        epoch_cache: mem::take(&mut pre.epoch_cache),
    });

    *pre_state = post;

    // The churn fields depend on the total active balance, which must be rebuilt after the
    // effective balance changes above.
    pre_state.force_build_total_active_balance_cache(spec)?;
    let exit_balance_to_consume = pre_state.get_activation_exit_churn_limit(spec)?;
    if let BeaconState::Electra(post) = pre_state {
        post.exit_balance_to_consume = exit_balance_to_consume;
    }

    Ok(())
}

fn compute_activation_exit_epoch(epoch: Epoch, spec: &ChainSpec) -> Result<Epoch, Error> {
    Ok(epoch.safe_add(1)?.safe_add(spec.max_seed_lookahead)?)
}
