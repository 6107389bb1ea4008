use serde::{Deserialize, Serialize};

use crate::guard;
use crate::types::Money;

/// Which of the two parallel ledgers an entry belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum LedgerTarget {
    /// LALUR, feeding the IRPJ base.
    IncomeTax,
    /// LACS, feeding the CSLL base.
    SocialContribution,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AdjustmentDirection {
    AddBack,
    Exclusion,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AdjustmentLedgerEntry {
    pub target: LedgerTarget,
    pub amount: Money,
    pub direction: AdjustmentDirection,
    pub reason: String,
}

impl AdjustmentLedgerEntry {
    /// Positive for add-backs, negative for exclusions.
    pub fn signed_amount(&self) -> Money {
        match self.direction {
            AdjustmentDirection::AddBack => self.amount,
            AdjustmentDirection::Exclusion => -self.amount,
        }
    }
}

/// Append-only list of adjustments for one tax.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AdjustmentLedger {
    pub target: LedgerTarget,
    entries: Vec<AdjustmentLedgerEntry>,
}

impl AdjustmentLedger {
    pub fn new(target: LedgerTarget) -> Self {
        AdjustmentLedger {
            target,
            entries: Vec::new(),
        }
    }

    /// Record an adjustment. Zero amounts are not recorded.
    pub fn record(
        &mut self,
        amount: Money,
        direction: AdjustmentDirection,
        reason: impl Into<String>,
    ) {
        if amount.is_zero() {
            return;
        }
        self.entries.push(AdjustmentLedgerEntry {
            target: self.target,
            amount,
            direction,
            reason: reason.into(),
        });
    }

    pub fn entries(&self) -> &[AdjustmentLedgerEntry] {
        &self.entries
    }

    pub fn total_add_backs(&self) -> Money {
        self.total_for(AdjustmentDirection::AddBack)
    }

    pub fn total_exclusions(&self) -> Money {
        self.total_for(AdjustmentDirection::Exclusion)
    }

    /// Net effect on the base: add-backs − exclusions.
    pub fn net(&self) -> Money {
        guard::sum(self.entries.iter().map(|e| e.signed_amount()))
    }

    fn total_for(&self, direction: AdjustmentDirection) -> Money {
        guard::sum(
            self.entries
                .iter()
                .filter(|e| e.direction == direction)
                .map(|e| e.amount),
        )
    }
}

/// The IRPJ and CSLL ledgers, kept side by side and never merged.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AdjustmentLedgers {
    pub income_tax: AdjustmentLedger,
    pub social_contribution: AdjustmentLedger,
}

impl Default for AdjustmentLedgers {
    fn default() -> Self {
        AdjustmentLedgers {
            income_tax: AdjustmentLedger::new(LedgerTarget::IncomeTax),
            social_contribution: AdjustmentLedger::new(LedgerTarget::SocialContribution),
        }
    }
}

impl AdjustmentLedgers {
    pub fn ledger_mut(&mut self, target: LedgerTarget) -> &mut AdjustmentLedger {
        match target {
            LedgerTarget::IncomeTax => &mut self.income_tax,
            LedgerTarget::SocialContribution => &mut self.social_contribution,
        }
    }

    /// Write a caller-supplied adjustment; a `Both` scope writes one entry per ledger.
    pub fn apply_manual(&mut self, adjustment: &ManualAdjustment) {
        for target in adjustment.scope.targets() {
            self.ledger_mut(*target).record(
                adjustment.amount,
                adjustment.direction,
                format!("Manual adjustment: {}", adjustment.reason),
            );
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AdjustmentScope {
    IncomeTax,
    SocialContribution,
    Both,
}

impl AdjustmentScope {
    pub fn targets(&self) -> &'static [LedgerTarget] {
        match self {
            AdjustmentScope::IncomeTax => &[LedgerTarget::IncomeTax],
            AdjustmentScope::SocialContribution => &[LedgerTarget::SocialContribution],
            AdjustmentScope::Both => &[LedgerTarget::IncomeTax, LedgerTarget::SocialContribution],
        }
    }
}

/// A book-to-tax adjustment the classifier cannot derive from expense lines
/// (equity-method results, exempt dividends, provision reversals).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ManualAdjustment {
    pub scope: AdjustmentScope,
    pub direction: AdjustmentDirection,
    pub amount: Money,
    pub reason: String,
}
