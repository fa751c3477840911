// models/contractmodels.rs
use bigdecimal::BigDecimal;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::models::usermodel::UserRole;

#[derive(Debug, Serialize, Deserialize, Clone, Copy, sqlx::Type, PartialEq)]
#[sqlx(type_name = "contract_status", rename_all = "snake_case")]
pub enum ContractStatus {
    Draft,
    Pending,
    Active,
    Completed,
    Cancelled,
    Disputed,
    Terminated,
}

#[derive(Debug, Serialize, Deserialize, Clone, Copy, sqlx::Type, PartialEq)]
#[sqlx(type_name = "payment_request_status", rename_all = "snake_case")]
pub enum PaymentRequestStatus {
    Pending,
    Approved,
    Transferred,
    Completed,
    Cancelled,
    Disputed,
}

/// One lifecycle for the three payment surfaces. Direct payments and
/// milestones are requested by the professional; installments are
/// client-initiated pre-payments that allocate their amount on creation.
#[derive(Debug, Serialize, Deserialize, Clone, Copy, sqlx::Type, PartialEq)]
#[sqlx(type_name = "payment_request_kind", rename_all = "snake_case")]
pub enum PaymentRequestKind {
    Direct,
    Milestone,
    Installment,
}

impl PaymentRequestKind {
    /// Which party may create a request of this kind. The asymmetry
    /// (installments created by the client, everything else by the
    /// professional) is deliberate and mirrors the product rules.
    pub fn requester_role(&self) -> UserRole {
        match self {
            PaymentRequestKind::Direct | PaymentRequestKind::Milestone => UserRole::Professional,
            PaymentRequestKind::Installment => UserRole::Client,
        }
    }

    /// Approval is always the client's call.
    pub fn approver_role(&self) -> UserRole {
        UserRole::Client
    }

    pub fn ledger_source(&self) -> crate::models::walletmodels::LedgerSource {
        use crate::models::walletmodels::LedgerSource;
        match self {
            PaymentRequestKind::Direct => LedgerSource::ContractPayment,
            PaymentRequestKind::Milestone => LedgerSource::MilestonePayment,
            PaymentRequestKind::Installment => LedgerSource::Installment,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Contract {
    pub id: Uuid,
    pub contract_number: String,
    pub client_id: Uuid,
    pub professional_id: Uuid,
    pub total_amount: BigDecimal,
    pub contract_balance: BigDecimal,
    pub professional_balance: BigDecimal,
    pub professional_balance_release_date: Option<DateTime<Utc>>,
    pub paid_amount: BigDecimal,
    pub platform_commission_rate: BigDecimal,
    pub status: ContractStatus,
    pub completion_percentage: i32,
    pub created_at: Option<DateTime<Utc>>,
    pub updated_at: Option<DateTime<Utc>>,
}

impl Contract {
    pub fn is_active(&self) -> bool {
        self.status == ContractStatus::Active
    }

    pub fn is_frozen(&self) -> bool {
        self.status == ContractStatus::Disputed
    }

    pub fn is_professional_balance_available(&self, now: DateTime<Utc>) -> bool {
        match self.professional_balance_release_date {
            Some(release_date) => now >= release_date,
            None => false,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct PaymentRequest {
    pub id: Uuid,
    pub contract_id: Uuid,
    pub kind: PaymentRequestKind,
    pub amount: BigDecimal,
    pub platform_commission_rate: BigDecimal,
    pub platform_commission_amount: BigDecimal,
    pub net_amount_to_professional: BigDecimal,
    pub status: PaymentRequestStatus,
    pub description: String,
    pub requested_by: Uuid,
    pub approved_by: Option<Uuid>,
    pub created_at: Option<DateTime<Utc>>,
    pub approved_at: Option<DateTime<Utc>>,
    pub transferred_at: Option<DateTime<Utc>>,
    pub available_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
    pub cancelled_at: Option<DateTime<Utc>>,
    pub cancellation_reason: Option<String>,
}

impl PaymentRequest {
    pub fn is_available_to_professional(&self, now: DateTime<Utc>) -> bool {
        match (self.status, self.available_at) {
            (PaymentRequestStatus::Transferred, Some(available_at)) => now >= available_at,
            _ => false,
        }
    }

    /// Valid transitions of the request state machine. Transfer is
    /// system-driven off approval, completion is scheduler-driven off the
    /// elapsed hold, disputes come from the disputes subsystem.
    pub fn can_transition_to(&self, to: PaymentRequestStatus) -> bool {
        use PaymentRequestStatus::*;
        matches!(
            (self.status, to),
            (Pending, Approved)
                | (Pending, Cancelled)
                | (Approved, Transferred)
                | (Approved, Cancelled)
                | (Transferred, Completed)
                | (Transferred, Cancelled)
                | (Transferred, Disputed)
                | (Disputed, Transferred)
                | (Disputed, Cancelled)
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use num_traits::Zero;

    fn request(status: PaymentRequestStatus) -> PaymentRequest {
        PaymentRequest {
            id: Uuid::new_v4(),
            contract_id: Uuid::new_v4(),
            kind: PaymentRequestKind::Direct,
            amount: BigDecimal::zero(),
            platform_commission_rate: BigDecimal::zero(),
            platform_commission_amount: BigDecimal::zero(),
            net_amount_to_professional: BigDecimal::zero(),
            status,
            description: String::new(),
            requested_by: Uuid::new_v4(),
            approved_by: None,
            created_at: Some(Utc::now()),
            approved_at: None,
            transferred_at: None,
            available_at: None,
            completed_at: None,
            cancelled_at: None,
            cancellation_reason: None,
        }
    }

    #[test]
    fn test_requester_roles_per_kind() {
        assert_eq!(
            PaymentRequestKind::Direct.requester_role(),
            UserRole::Professional
        );
        assert_eq!(
            PaymentRequestKind::Milestone.requester_role(),
            UserRole::Professional
        );
        assert_eq!(
            PaymentRequestKind::Installment.requester_role(),
            UserRole::Client
        );
    }

    #[test]
    fn test_approver_is_always_the_client() {
        for kind in [
            PaymentRequestKind::Direct,
            PaymentRequestKind::Milestone,
            PaymentRequestKind::Installment,
        ] {
            assert_eq!(kind.approver_role(), UserRole::Client);
        }
    }

    #[test]
    fn test_state_machine_forward_path() {
        use PaymentRequestStatus::*;
        assert!(request(Pending).can_transition_to(Approved));
        assert!(request(Approved).can_transition_to(Transferred));
        assert!(request(Transferred).can_transition_to(Completed));
    }

    #[test]
    fn test_state_machine_rejects_double_completion() {
        use PaymentRequestStatus::*;
        assert!(!request(Completed).can_transition_to(Completed));
        assert!(!request(Completed).can_transition_to(Cancelled));
        assert!(!request(Cancelled).can_transition_to(Approved));
    }

    #[test]
    fn test_state_machine_dispute_paths() {
        use PaymentRequestStatus::*;
        assert!(request(Transferred).can_transition_to(Disputed));
        assert!(request(Disputed).can_transition_to(Transferred));
        assert!(request(Disputed).can_transition_to(Cancelled));
        assert!(!request(Pending).can_transition_to(Disputed));
    }

    #[test]
    fn test_availability_requires_transferred_and_elapsed_hold() {
        let now = Utc::now();

        let mut req = request(PaymentRequestStatus::Transferred);
        req.available_at = Some(now - chrono::Duration::hours(1));
        assert!(req.is_available_to_professional(now));

        req.available_at = Some(now + chrono::Duration::days(3));
        assert!(!req.is_available_to_professional(now));

        let mut completed = request(PaymentRequestStatus::Completed);
        completed.available_at = Some(now - chrono::Duration::hours(1));
        assert!(!completed.is_available_to_professional(now));
    }
}
