use super::base::TotalBalances;

/// Provides a summary of validator participation during the epoch.
#[derive(Debug, PartialEq, Clone)]
pub enum EpochProcessingSummary {
    Base {
        total_balances: TotalBalances,
    },
    Altair {
        previous_epoch_total_active_balance: u64,
        previous_epoch_target_attesting_balance: u64,
        current_epoch_total_active_balance: u64,
        current_epoch_target_attesting_balance: u64,
    },
}

impl EpochProcessingSummary {
    /// Returns the sum of the effective balance of all validators in the current epoch.
    pub fn current_epoch_total_active_balance(&self) -> u64 {
        match self {
            EpochProcessingSummary::Base { total_balances } => total_balances.current_epoch(),
            EpochProcessingSummary::Altair {
                current_epoch_total_active_balance,
                ..
            } => *current_epoch_total_active_balance,
        }
    }

    /// Returns the sum of the effective balance of all validators in the current epoch who
    /// included an attestation that matched the target.
    pub fn current_epoch_target_attesting_balance(&self) -> u64 {
        match self {
            EpochProcessingSummary::Base { total_balances } => {
                total_balances.current_epoch_target_attesters()
            }
            EpochProcessingSummary::Altair {
                current_epoch_target_attesting_balance,
                ..
            } => *current_epoch_target_attesting_balance,
        }
    }

    /// Returns the sum of the effective balance of all validators in the previous epoch.
    pub fn previous_epoch_total_active_balance(&self) -> u64 {
        match self {
            EpochProcessingSummary::Base { total_balances } => total_balances.previous_epoch(),
            EpochProcessingSummary::Altair {
                previous_epoch_total_active_balance,
                ..
            } => *previous_epoch_total_active_balance,
        }
    }

    /// Returns the sum of the effective balance of all validators in the previous epoch who
    /// included an attestation that matched the target.
    pub fn previous_epoch_target_attesting_balance(&self) -> u64 {
        match self {
            EpochProcessingSummary::Base { total_balances } => {
                total_balances.previous_epoch_target_attesters()
            }
            EpochProcessingSummary::Altair {
                previous_epoch_target_attesting_balance,
                ..
            } => *previous_epoch_target_attesting_balance,
        }
    }
}
