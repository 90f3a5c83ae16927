//! Derived per-proposal metrics.

use std::fmt;

use ballot_types::{Proposal, ProposalState};

/// How much participation a proposal attracted, from total weight cast.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Impact {
    Low,
    Moderate,
    High,
}

impl fmt::Display for Impact {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Low => "Low",
            Self::Moderate => "Moderate",
            Self::High => "High",
        })
    }
}

/// Rough likelihood of passing, from the support ratio.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Feasibility {
    Low,
    Moderate,
    High,
}

impl fmt::Display for Feasibility {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Low => "Low",
            Self::Moderate => "Moderate",
            Self::High => "High",
        })
    }
}

/// Metrics derived from one proposal's on-chain numbers.
#[derive(Debug, Clone, PartialEq)]
pub struct Evaluation {
    pub id: u64,
    /// Percentage of total cast weight voting "for"; 0 when nothing cast.
    pub support_ratio: f64,
    pub impact: Impact,
    pub feasibility: Feasibility,
    pub state: ProposalState,
    pub risks: Vec<&'static str>,
}

const IMPACT_HIGH_THRESHOLD: u128 = 1000;
const IMPACT_MODERATE_THRESHOLD: u128 = 500;
const FEASIBILITY_LOW_BELOW: f64 = 30.0;
const FEASIBILITY_HIGH_ABOVE: f64 = 70.0;

#[must_use]
pub fn evaluate(proposal: &Proposal) -> Evaluation {
    let total = proposal.total_votes();
    let support_ratio = if total > 0 {
        (proposal.for_votes as f64 / total as f64) * 100.0
    } else {
        0.0
    };

    let impact = if total > IMPACT_HIGH_THRESHOLD {
        Impact::High
    } else if total > IMPACT_MODERATE_THRESHOLD {
        Impact::Moderate
    } else {
        Impact::Low
    };

    let feasibility = if support_ratio < FEASIBILITY_LOW_BELOW {
        Feasibility::Low
    } else if support_ratio > FEASIBILITY_HIGH_ABOVE {
        Feasibility::High
    } else {
        Feasibility::Moderate
    };

    let mut risks = Vec::new();
    match proposal.state {
        ProposalState::Canceled => risks.push("Proposal has been canceled"),
        ProposalState::Defeated => risks.push("Proposal did not receive sufficient support"),
        _ => {}
    }

    Evaluation {
        id: proposal.id.value(),
        support_ratio,
        impact,
        feasibility,
        state: proposal.state,
        risks,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ballot_types::{ProposalId, WalletAddress};

    fn proposal(for_votes: u128, against: u128, abstain: u128, state: ProposalState) -> Proposal {
        Proposal {
            id: ProposalId::new(1),
            proposer: WalletAddress::new("0x1111111111111111111111111111111111111111").unwrap(),
            start_block: 0,
            end_block: 0,
            for_votes,
            against_votes: against,
            abstain_votes: abstain,
            canceled: false,
            executed: false,
            state,
        }
    }

    #[test]
    fn support_ratio_is_a_percentage() {
        let eval = evaluate(&proposal(75, 25, 0, ProposalState::Active));
        assert!((eval.support_ratio - 75.0).abs() < f64::EPSILON);
    }

    #[test]
    fn zero_participation_means_zero_support() {
        let eval = evaluate(&proposal(0, 0, 0, ProposalState::Pending));
        assert!((eval.support_ratio).abs() < f64::EPSILON);
        assert_eq!(eval.impact, Impact::Low);
        assert_eq!(eval.feasibility, Feasibility::Low);
    }

    #[test]
    fn impact_tiers_follow_total_weight() {
        assert_eq!(
            evaluate(&proposal(1001, 0, 0, ProposalState::Active)).impact,
            Impact::High
        );
        assert_eq!(
            evaluate(&proposal(501, 0, 0, ProposalState::Active)).impact,
            Impact::Moderate
        );
        assert_eq!(
            evaluate(&proposal(500, 0, 0, ProposalState::Active)).impact,
            Impact::Low
        );
    }

    #[test]
    fn canceled_and_defeated_carry_risk_flags() {
        assert_eq!(
            evaluate(&proposal(10, 0, 0, ProposalState::Canceled)).risks,
            vec!["Proposal has been canceled"]
        );
        assert_eq!(
            evaluate(&proposal(10, 90, 0, ProposalState::Defeated)).risks,
            vec!["Proposal did not receive sufficient support"]
        );
        assert!(evaluate(&proposal(10, 0, 0, ProposalState::Executed))
            .risks
            .is_empty());
    }
}
