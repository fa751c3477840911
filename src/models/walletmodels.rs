// models/walletmodels.rs
use bigdecimal::BigDecimal;
use chrono::{DateTime, Utc};
use num_traits::Zero;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Serialize, Deserialize, Clone, Copy, sqlx::Type, PartialEq)]
#[sqlx(type_name = "entry_direction", rename_all = "lowercase")]
pub enum EntryDirection {
    Credit,
    Debit,
}

#[derive(Debug, Serialize, Deserialize, Clone, Copy, sqlx::Type, PartialEq)]
#[sqlx(type_name = "ledger_source", rename_all = "snake_case")]
pub enum LedgerSource {
    TopUp,
    ContractAllocation,
    ContractPayment,
    Installment,
    MilestonePayment,
    BalanceRelease,
    Refund,
    Withdrawal,
}

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Wallet {
    pub id: Uuid,
    pub user_id: Uuid,
    pub available_balance: BigDecimal,
    pub pending_balance: BigDecimal,
    pub total_earned: BigDecimal,
    pub currency: String,
    pub created_at: Option<DateTime<Utc>>,
    pub updated_at: Option<DateTime<Utc>>,
}

/// One immutable row of the audit log. Entries are only ever appended;
/// refunds and reversals are new entries, never edits.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct LedgerEntry {
    pub id: Uuid,
    pub wallet_id: Uuid,
    pub amount: BigDecimal,
    pub direction: EntryDirection,
    pub source: LedgerSource,
    pub description: String,
    pub contract_id: Option<Uuid>,
    pub payment_id: Option<Uuid>,
    pub created_at: Option<DateTime<Utc>>,
}

/// Per-bucket deltas a single ledger entry applies to its wallet.
#[derive(Debug, Clone, PartialEq)]
pub struct BalanceEffect {
    pub available: BigDecimal,
    pub pending: BigDecimal,
    pub earned: BigDecimal,
}

impl LedgerEntry {
    /// How this entry moves the wallet buckets. The (source, direction)
    /// pair fully determines the effect, which is what makes replay
    /// deterministic:
    ///
    /// - top_up credit / withdrawal debit: available +/- amount
    /// - contract_allocation debit: available -> pending (commitment)
    /// - contract_allocation credit: pending -> available (de-allocation)
    /// - contract_payment / installment / milestone_payment:
    ///   debit removes from the payer's pending bucket,
    ///   credit adds to the payee's pending bucket
    /// - refund: credit re-adds to pending, debit removes from pending
    /// - balance_release credit: pending -> available, counts as earned
    pub fn balance_effect(&self) -> BalanceEffect {
        let a = &self.amount;
        let zero = BigDecimal::zero;

        let (available, pending, earned) = match (self.source, self.direction) {
            (LedgerSource::TopUp, EntryDirection::Credit) => (a.clone(), zero(), zero()),
            (LedgerSource::Withdrawal, EntryDirection::Debit) => (-a.clone(), zero(), zero()),
            (LedgerSource::ContractAllocation, EntryDirection::Debit) => {
                (-a.clone(), a.clone(), zero())
            }
            (LedgerSource::ContractAllocation, EntryDirection::Credit) => {
                (a.clone(), -a.clone(), zero())
            }
            (
                LedgerSource::ContractPayment
                | LedgerSource::Installment
                | LedgerSource::MilestonePayment,
                EntryDirection::Debit,
            ) => (zero(), -a.clone(), zero()),
            (
                LedgerSource::ContractPayment
                | LedgerSource::Installment
                | LedgerSource::MilestonePayment,
                EntryDirection::Credit,
            ) => (zero(), a.clone(), zero()),
            (LedgerSource::Refund, EntryDirection::Credit) => (zero(), a.clone(), zero()),
            (LedgerSource::Refund, EntryDirection::Debit) => (zero(), -a.clone(), zero()),
            (LedgerSource::BalanceRelease, EntryDirection::Credit) => {
                (a.clone(), -a.clone(), a.clone())
            }
            // Remaining combinations are never written by the engine.
            _ => (zero(), zero(), zero()),
        };

        BalanceEffect {
            available,
            pending,
            earned,
        }
    }
}

/// Replay a wallet's entries in creation order and recompute
/// (available, pending, total_earned). The cached columns on the wallet
/// row are a projection of this sum and must always agree with it.
pub fn replay_entries(entries: &[LedgerEntry]) -> BalanceEffect {
    let mut totals = BalanceEffect {
        available: BigDecimal::zero(),
        pending: BigDecimal::zero(),
        earned: BigDecimal::zero(),
    };

    for entry in entries {
        let effect = entry.balance_effect();
        totals.available += effect.available;
        totals.pending += effect.pending;
        totals.earned += effect.earned;
    }

    totals
}

pub fn generate_payment_reference() -> String {
    let suffix = Uuid::new_v4().simple().to_string()[..16].to_uppercase();
    format!("CLK-{}", suffix)
}

pub fn generate_contract_number() -> String {
    let year = Utc::now().format("%Y");
    let suffix = Uuid::new_v4().simple().to_string()[..8].to_uppercase();
    format!("CON-{}-{}", year, suffix)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    fn dec(s: &str) -> BigDecimal {
        BigDecimal::from_str(s).unwrap()
    }

    fn entry(amount: &str, direction: EntryDirection, source: LedgerSource) -> LedgerEntry {
        LedgerEntry {
            id: Uuid::new_v4(),
            wallet_id: Uuid::nil(),
            amount: dec(amount),
            direction,
            source,
            description: String::new(),
            contract_id: None,
            payment_id: None,
            created_at: Some(Utc::now()),
        }
    }

    #[test]
    fn test_top_up_then_withdrawal() {
        let entries = vec![
            entry("500.00", EntryDirection::Credit, LedgerSource::TopUp),
            entry("120.00", EntryDirection::Debit, LedgerSource::Withdrawal),
        ];

        let totals = replay_entries(&entries);
        assert_eq!(totals.available, dec("380.00"));
        assert_eq!(totals.pending, dec("0.00"));
        assert_eq!(totals.earned, dec("0.00"));
    }

    #[test]
    fn test_allocation_is_a_bucket_move() {
        let entries = vec![
            entry("1000.00", EntryDirection::Credit, LedgerSource::TopUp),
            entry(
                "1000.00",
                EntryDirection::Debit,
                LedgerSource::ContractAllocation,
            ),
        ];

        let totals = replay_entries(&entries);
        assert_eq!(totals.available, dec("0.00"));
        assert_eq!(totals.pending, dec("1000.00"));
        // The sum is unchanged by a commitment.
        assert_eq!(totals.available + totals.pending, dec("1000.00"));
    }

    #[test]
    fn test_client_side_payment_lifecycle_replays() {
        // Top up, allocate, pay 400 gross out of escrow.
        let entries = vec![
            entry("1000.00", EntryDirection::Credit, LedgerSource::TopUp),
            entry(
                "1000.00",
                EntryDirection::Debit,
                LedgerSource::ContractAllocation,
            ),
            entry(
                "400.00",
                EntryDirection::Debit,
                LedgerSource::ContractPayment,
            ),
        ];

        let totals = replay_entries(&entries);
        assert_eq!(totals.available, dec("0.00"));
        assert_eq!(totals.pending, dec("600.00"));
    }

    #[test]
    fn test_professional_side_hold_then_release() {
        let entries = vec![
            entry(
                "340.00",
                EntryDirection::Credit,
                LedgerSource::ContractPayment,
            ),
            entry(
                "340.00",
                EntryDirection::Credit,
                LedgerSource::BalanceRelease,
            ),
        ];

        let totals = replay_entries(&entries);
        assert_eq!(totals.available, dec("340.00"));
        assert_eq!(totals.pending, dec("0.00"));
        assert_eq!(totals.earned, dec("340.00"));
    }

    #[test]
    fn test_refund_reverses_transfer_exactly() {
        // Professional received 340 net into pending, then the payment
        // was cancelled before the hold elapsed.
        let entries = vec![
            entry(
                "340.00",
                EntryDirection::Credit,
                LedgerSource::ContractPayment,
            ),
            entry("340.00", EntryDirection::Debit, LedgerSource::Refund),
        ];

        let totals = replay_entries(&entries);
        assert_eq!(totals.available, dec("0.00"));
        assert_eq!(totals.pending, dec("0.00"));
        assert_eq!(totals.earned, dec("0.00"));
    }

    #[test]
    fn test_deallocation_returns_funds_to_available() {
        let entries = vec![
            entry("200.00", EntryDirection::Credit, LedgerSource::TopUp),
            entry(
                "200.00",
                EntryDirection::Debit,
                LedgerSource::ContractAllocation,
            ),
            entry(
                "200.00",
                EntryDirection::Credit,
                LedgerSource::ContractAllocation,
            ),
        ];

        let totals = replay_entries(&entries);
        assert_eq!(totals.available, dec("200.00"));
        assert_eq!(totals.pending, dec("0.00"));
    }

    #[test]
    fn test_conservation_modulo_commission() {
        // Client funds a 1000 contract and approves a 400 payment at a
        // 15% commission; the professional's hold then elapses.
        let client = vec![
            entry("1000.00", EntryDirection::Credit, LedgerSource::TopUp),
            entry(
                "1000.00",
                EntryDirection::Debit,
                LedgerSource::ContractAllocation,
            ),
            entry(
                "400.00",
                EntryDirection::Debit,
                LedgerSource::ContractPayment,
            ),
        ];
        let professional = vec![
            entry(
                "340.00",
                EntryDirection::Credit,
                LedgerSource::ContractPayment,
            ),
            entry(
                "340.00",
                EntryDirection::Credit,
                LedgerSource::BalanceRelease,
            ),
        ];

        let client_totals = replay_entries(&client);
        let professional_totals = replay_entries(&professional);

        let in_circulation = client_totals.available
            + client_totals.pending
            + professional_totals.available
            + professional_totals.pending;

        // 1000 entered, 60 commission left circulation.
        assert_eq!(in_circulation, dec("940.00"));
        assert_eq!(professional_totals.earned, dec("340.00"));
    }

    #[test]
    fn test_contract_number_format() {
        let number = generate_contract_number();
        assert!(number.starts_with("CON-"));
        assert_eq!(number.len(), "CON-2026-".len() + 8);
    }
}
