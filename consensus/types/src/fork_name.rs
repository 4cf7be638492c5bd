use crate::{ChainSpec, Epoch};
use serde::{Deserialize, Serialize};
use std::fmt::{self, Display, Formatter};
use std::str::FromStr;

/// The name of a consensus fork, ordered by activation.
///
/// The ordinal ordering (`ForkName::Base < ForkName::Altair < …`) is load-bearing: fork-gated
/// logic compares with `>=` rather than enumerating forks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ForkName {
    Base,
    Altair,
    Bellatrix,
    Capella,
    Deneb,
    Electra,
    Fulu,
    Gloas,
}

impl ForkName {
    pub fn list_all() -> Vec<ForkName> {
        vec![
            ForkName::Base,
            ForkName::Altair,
            ForkName::Bellatrix,
            ForkName::Capella,
            ForkName::Deneb,
            ForkName::Electra,
            ForkName::Fulu,
            ForkName::Gloas,
        ]
    }

    pub fn latest() -> ForkName {
        // This unwrap is safe as long as we have 1+ forks. It is tested below.
        *ForkName::list_all().last().unwrap()
    }

    /// Returns the `ForkName` given the slot and depending on the fork schedule in `spec`.
    pub fn from_epoch(epoch: Epoch, spec: &ChainSpec) -> Self {
        spec.fork_name_at_epoch(epoch)
    }

    /// Return the epoch at which this fork activates, if scheduled.
    pub fn activation_epoch(self, spec: &ChainSpec) -> Option<Epoch> {
        match self {
            ForkName::Base => Some(Epoch::new(0)),
            ForkName::Altair => spec.altair_fork_epoch,
            ForkName::Bellatrix => spec.bellatrix_fork_epoch,
            ForkName::Capella => spec.capella_fork_epoch,
            ForkName::Deneb => spec.deneb_fork_epoch,
            ForkName::Electra => spec.electra_fork_epoch,
            ForkName::Fulu => spec.fulu_fork_epoch,
            ForkName::Gloas => spec.gloas_fork_epoch,
        }
    }

    /// Return the fork immediately following this one, if any.
    pub fn next_fork(self) -> Option<ForkName> {
        match self {
            ForkName::Base => Some(ForkName::Altair),
            ForkName::Altair => Some(ForkName::Bellatrix),
            ForkName::Bellatrix => Some(ForkName::Capella),
            ForkName::Capella => Some(ForkName::Deneb),
            ForkName::Deneb => Some(ForkName::Electra),
            ForkName::Electra => Some(ForkName::Fulu),
            ForkName::Fulu => Some(ForkName::Gloas),
            ForkName::Gloas => None,
        }
    }

    /// Return the fork immediately preceding this one, if any.
    pub fn previous_fork(self) -> Option<ForkName> {
        match self {
            ForkName::Base => None,
            ForkName::Altair => Some(ForkName::Base),
            ForkName::Bellatrix => Some(ForkName::Altair),
            ForkName::Capella => Some(ForkName::Bellatrix),
            ForkName::Deneb => Some(ForkName::Capella),
            ForkName::Electra => Some(ForkName::Deneb),
            ForkName::Fulu => Some(ForkName::Electra),
            ForkName::Gloas => Some(ForkName::Fulu),
        }
    }

    pub fn altair_enabled(self) -> bool {
        self >= ForkName::Altair
    }

    pub fn bellatrix_enabled(self) -> bool {
        self >= ForkName::Bellatrix
    }

    pub fn capella_enabled(self) -> bool {
        self >= ForkName::Capella
    }

    pub fn deneb_enabled(self) -> bool {
        self >= ForkName::Deneb
    }

    pub fn electra_enabled(self) -> bool {
        self >= ForkName::Electra
    }

    pub fn fulu_enabled(self) -> bool {
        self >= ForkName::Fulu
    }

    pub fn gloas_enabled(self) -> bool {
        self >= ForkName::Gloas
    }
}

impl FromStr for ForkName {
    type Err = String;

    fn from_str(fork_name: &str) -> Result<Self, String> {
        Ok(match fork_name.to_lowercase().as_ref() {
            "phase0" | "base" => ForkName::Base,
            "altair" => ForkName::Altair,
            "bellatrix" | "merge" => ForkName::Bellatrix,
            "capella" => ForkName::Capella,
            "deneb" => ForkName::Deneb,
            "electra" => ForkName::Electra,
            "fulu" => ForkName::Fulu,
            "gloas" => ForkName::Gloas,
            _ => return Err(format!("unknown fork name: {}", fork_name)),
        })
    }
}

impl Display for ForkName {
    fn fmt(&self, f: &mut Formatter<'_>) -> Result<(), fmt::Error> {
        match self {
            ForkName::Base => "phase0".fmt(f),
            ForkName::Altair => "altair".fmt(f),
            ForkName::Bellatrix => "bellatrix".fmt(f),
            ForkName::Capella => "capella".fmt(f),
            ForkName::Deneb => "deneb".fmt(f),
            ForkName::Electra => "electra".fmt(f),
            ForkName::Fulu => "fulu".fmt(f),
            ForkName::Gloas => "gloas".fmt(f),
        }
    }
}

/// A fork and the slot at which a mismatching object was observed, used in errors.
#[derive(Debug, PartialEq, Clone)]
pub struct InconsistentFork {
    pub fork_at_slot: ForkName,
    pub object_fork: ForkName,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn previous_and_next_fork_consistent() {
        assert_eq!(ForkName::latest().next_fork(), None);
        assert_eq!(ForkName::Base.previous_fork(), None);

        for fork in ForkName::list_all() {
            if let Some(next) = fork.next_fork() {
                assert_eq!(next.previous_fork(), Some(fork));
                assert!(fork < next);
            }
        }
    }

    #[test]
    fn fork_name_case_insensitive_parse() {
        assert_eq!(ForkName::from_str("Phase0"), Ok(ForkName::Base));
        assert_eq!(ForkName::from_str("MERGE"), Ok(ForkName::Bellatrix));
        assert!(ForkName::from_str("verkle").is_err());
    }

    #[test]
    fn ordinal_gating() {
        assert!(ForkName::Electra.deneb_enabled());
        assert!(!ForkName::Capella.deneb_enabled());
        assert!(ForkName::Gloas.electra_enabled());
    }
}
