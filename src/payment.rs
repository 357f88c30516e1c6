//! Account postings fired by payment status edges
use crate::accessor::{AccountAccessor, UpdateOutcome};
use crate::error::ReconcileError;
use crate::status::{OrderStatus, PurchaseFlag, PurchaseFlags, Transition, transition_of};
use crate::types::{Money, OrderSnapshot, Posting, PostingKind, TimeStamp};
use crate::utils;
use tracing::{debug, warn};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PaymentOutcome {
    /// Balance moved and the posting was appended.
    Posted(Posting),
    /// The balance update was a no-op; nothing was appended.
    Unchanged,
}

/// Moves order totals in and out of accounts.
///
/// Only activations post. Leaving FINISHED or INVOICE_SETTLED again never
/// reverses a posting.
pub struct PaymentReconciler<'a, A: ?Sized> {
    accounts: &'a A,
}

impl<'a, A: AccountAccessor + ?Sized> PaymentReconciler<'a, A> {
    pub fn new(accounts: &'a A) -> Self {
        Self { accounts }
    }

    /// FINISHED activated: the order total is received into the order's account.
    pub fn reconcile_sales(
        &self,
        old: Option<&OrderSnapshot<OrderStatus>>,
        new: Option<&OrderSnapshot<OrderStatus>>,
    ) -> Result<Option<PaymentOutcome>, ReconcileError> {
        let fired = transition_of(
            old.map(|o| &o.status),
            new.map(|o| &o.status),
            OrderStatus::Finished,
        );
        match (fired, new) {
            (Some(Transition::Activated), Some(order)) => self
                .post(order, PostingKind::Receipt, order.total_price())
                .map(Some),
            _ => Ok(None),
        }
    }

    /// INVOICE_SETTLED activated: the order total is paid out of the order's account.
    pub fn reconcile_purchase(
        &self,
        old: Option<&OrderSnapshot<PurchaseFlags>>,
        new: Option<&OrderSnapshot<PurchaseFlags>>,
    ) -> Result<Option<PaymentOutcome>, ReconcileError> {
        let fired = transition_of(
            old.map(|o| &o.status),
            new.map(|o| &o.status),
            PurchaseFlag::InvoiceSettled,
        );
        match (fired, new) {
            (Some(Transition::Activated), Some(order)) => self
                .post(order, PostingKind::Disbursal, -order.total_price())
                .map(Some),
            _ => Ok(None),
        }
    }

    fn post<S>(
        &self,
        order: &OrderSnapshot<S>,
        kind: PostingKind,
        change: Money,
    ) -> Result<PaymentOutcome, ReconcileError> {
        let account_id = order
            .account
            .as_ref()
            .ok_or_else(|| ReconcileError::MissingAccount(order.id.clone()))?;

        let mut account = self.accounts.get_account(account_id)?;
        account.balance += change;

        // balance first; a posting never exists without its balance change
        if self.accounts.update_account(&account)? == UpdateOutcome::Unchanged {
            warn!(order = %order.id, account = %account_id, "account update changed nothing");
            return Ok(PaymentOutcome::Unchanged);
        }

        let posting = Posting {
            id: utils::new_posting_id()?,
            order: order.id.clone(),
            account: account_id.clone(),
            kind,
            amount: order.total_price(),
            timestamp: TimeStamp::new(),
        };
        self.accounts.append_posting(&posting)?;

        debug!(order = %order.id, account = %account_id, ?kind, %change, "posting appended");
        Ok(PaymentOutcome::Posted(posting))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::MemoryStore;
    use crate::types::{Account, OrderLine};

    fn store() -> MemoryStore {
        let store = MemoryStore::new();
        store.put_account(Account::new("cash", "Cash", Money::from_units(100)));
        store
    }

    fn sales(status: OrderStatus) -> OrderSnapshot<OrderStatus> {
        OrderSnapshot::new("so-1", status)
            .add_line(OrderLine::new("a", 2).with_unit_price(Money::from_units(15)))
            .set_account("cash")
    }

    #[test]
    fn finishing_a_sales_order_receives_its_total() {
        let store = store();
        let payments = PaymentReconciler::new(&store);

        let outcome = payments
            .reconcile_sales(Some(&sales(OrderStatus::Open)), Some(&sales(OrderStatus::Finished)))
            .unwrap();

        assert!(matches!(outcome, Some(PaymentOutcome::Posted(ref p)) if p.kind == PostingKind::Receipt));
        assert_eq!(store.account(&"cash".into()).unwrap().balance, Money::from_units(130));
        assert_eq!(store.postings().len(), 1);
    }

    #[test]
    fn leaving_finished_does_not_reverse() {
        let store = store();
        let payments = PaymentReconciler::new(&store);

        let outcome = payments
            .reconcile_sales(Some(&sales(OrderStatus::Finished)), Some(&sales(OrderStatus::Open)))
            .unwrap();

        assert_eq!(outcome, None);
        assert_eq!(store.account(&"cash".into()).unwrap().balance, Money::from_units(100));
    }

    #[test]
    fn zero_total_is_unchanged_and_not_posted() {
        let store = store();
        let payments = PaymentReconciler::new(&store);
        let order = OrderSnapshot::new("so-2", OrderStatus::Finished)
            .add_line(OrderLine::new("a", 1))
            .set_account("cash");

        let outcome = payments.reconcile_sales(None, Some(&order)).unwrap();

        assert_eq!(outcome, Some(PaymentOutcome::Unchanged));
        assert!(store.postings().is_empty());
    }

    #[test]
    fn settling_without_account_is_an_error() {
        let store = store();
        let payments = PaymentReconciler::new(&store);
        let order = OrderSnapshot::new("po-1", PurchaseFlags::new().with(PurchaseFlag::InvoiceSettled));

        let result = payments.reconcile_purchase(None, Some(&order));

        assert!(matches!(result, Err(ReconcileError::MissingAccount(_))));
    }
}
