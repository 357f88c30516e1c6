//! Lifecycle status models and status-edge detection
//!
//! Sales and production orders carry exactly one [`OrderStatus`]. Purchase orders
//! carry a [`PurchaseFlags`] set in which any subset of [`PurchaseFlag`]s may be
//! active at once. Both implement [`StatusModel`], which is all edge detection
//! needs.
use std::collections::BTreeSet;
use std::fmt::Debug;

pub trait StatusModel {
    type Flag: Copy + Eq + Debug + 'static;

    /// Every flag relevant to the order type, in the order edges are reported.
    const FLAGS: &'static [Self::Flag];

    /// Exactly one flag is active at a time, so a value change is reported as
    /// the activation alone.
    const EXCLUSIVE: bool = false;

    fn is_active(&self, flag: Self::Flag) -> bool;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transition {
    Activated,
    Deactivated,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StatusEdge<F> {
    pub flag: F,
    pub transition: Transition,
}

impl<F: PartialEq> StatusEdge<F> {
    pub fn activated(flag: F) -> Self {
        Self {
            flag,
            transition: Transition::Activated,
        }
    }
    pub fn deactivated(flag: F) -> Self {
        Self {
            flag,
            transition: Transition::Deactivated,
        }
    }
    pub fn is_activation_of(&self, flag: F) -> bool {
        self.flag == flag && self.transition == Transition::Activated
    }
    pub fn is_deactivation_of(&self, flag: F) -> bool {
        self.flag == flag && self.transition == Transition::Deactivated
    }
}

/// `flag` is active in `status`; an absent status (order not yet created, or
/// deleted) has nothing active.
pub fn is_active<S: StatusModel>(status: Option<&S>, flag: S::Flag) -> bool {
    status.is_some_and(|s| s.is_active(flag))
}

/// How `flag` moved between `old` and `new`, if it moved at all.
pub fn transition_of<S: StatusModel>(
    old: Option<&S>,
    new: Option<&S>,
    flag: S::Flag,
) -> Option<Transition> {
    match (is_active(old, flag), is_active(new, flag)) {
        (false, true) => Some(Transition::Activated),
        (true, false) => Some(Transition::Deactivated),
        _ => None,
    }
}

/// Every flag whose activity differs between `old` and `new`, in `S::FLAGS` order.
///
/// For exclusive models with both sides present only the activation is kept, so
/// at most one edge comes back.
pub fn transitions<S: StatusModel>(old: Option<&S>, new: Option<&S>) -> Vec<StatusEdge<S::Flag>> {
    let mut edges: Vec<_> = S::FLAGS
        .iter()
        .copied()
        .filter_map(|flag| {
            transition_of(old, new, flag).map(|transition| StatusEdge { flag, transition })
        })
        .collect();

    if S::EXCLUSIVE && old.is_some() && new.is_some() {
        edges.retain(|edge| edge.transition == Transition::Activated);
    }
    edges
}

/// Single-value lifecycle used by sales and production orders.
#[derive(minicbor::Encode, minicbor::Decode, Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum OrderStatus {
    #[default]
    #[n(0)]
    Open,
    #[n(1)]
    InProcess,
    #[n(2)]
    Finished,
    #[n(3)]
    Canceled,
}

impl StatusModel for OrderStatus {
    type Flag = OrderStatus;

    const FLAGS: &'static [OrderStatus] = &[
        OrderStatus::Open,
        OrderStatus::InProcess,
        OrderStatus::Finished,
        OrderStatus::Canceled,
    ];

    const EXCLUSIVE: bool = true;

    fn is_active(&self, flag: OrderStatus) -> bool {
        *self == flag
    }
}

#[derive(
    minicbor::Encode, minicbor::Decode, Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord,
)]
pub enum PurchaseFlag {
    #[n(0)]
    Open,
    #[n(1)]
    GoodsReceipt,
    #[n(2)]
    InvoiceReceipt,
    #[n(3)]
    InvoiceSettled,
    #[n(4)]
    Canceled,
    #[n(5)]
    Finished,
}

/// Independent lifecycle flags of a purchase order.
#[derive(minicbor::Encode, minicbor::Decode, Debug, Clone, PartialEq, Eq, Default)]
#[cbor(transparent)]
pub struct PurchaseFlags(#[n(0)] BTreeSet<PurchaseFlag>);

impl PurchaseFlags {
    pub fn new() -> Self {
        Self::default()
    }
    pub fn with(mut self, flag: PurchaseFlag) -> Self {
        self.0.insert(flag);
        self
    }
    pub fn without(mut self, flag: PurchaseFlag) -> Self {
        self.0.remove(&flag);
        self
    }
    pub fn set(&mut self, flag: PurchaseFlag, active: bool) {
        if active {
            self.0.insert(flag);
        } else {
            self.0.remove(&flag);
        }
    }
    pub fn iter(&self) -> impl Iterator<Item = PurchaseFlag> + '_ {
        self.0.iter().copied()
    }
}

impl FromIterator<PurchaseFlag> for PurchaseFlags {
    fn from_iter<I: IntoIterator<Item = PurchaseFlag>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

impl StatusModel for PurchaseFlags {
    type Flag = PurchaseFlag;

    const FLAGS: &'static [PurchaseFlag] = &[
        PurchaseFlag::Open,
        PurchaseFlag::GoodsReceipt,
        PurchaseFlag::InvoiceReceipt,
        PurchaseFlag::InvoiceSettled,
        PurchaseFlag::Canceled,
        PurchaseFlag::Finished,
    ];

    fn is_active(&self, flag: PurchaseFlag) -> bool {
        self.0.contains(&flag)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn single_value_change_is_one_edge() {
        let edges = transitions(Some(&OrderStatus::Open), Some(&OrderStatus::Finished));

        assert_eq!(edges, vec![StatusEdge::activated(OrderStatus::Finished)]);
        assert_eq!(
            transition_of(Some(&OrderStatus::Open), Some(&OrderStatus::Finished), OrderStatus::Open),
            Some(Transition::Deactivated)
        );
    }

    #[test]
    fn unchanged_status_has_no_edges() {
        assert!(transitions(Some(&OrderStatus::InProcess), Some(&OrderStatus::InProcess)).is_empty());

        let flags = PurchaseFlags::new().with(PurchaseFlag::Open);
        assert!(transitions(Some(&flags), Some(&flags.clone())).is_empty());
    }

    #[test]
    fn flag_set_reports_several_edges_in_fixed_order() {
        let old = PurchaseFlags::new().with(PurchaseFlag::Open);
        let new = PurchaseFlags::new()
            .with(PurchaseFlag::InvoiceSettled)
            .with(PurchaseFlag::GoodsReceipt);

        let edges = transitions(Some(&old), Some(&new));

        assert_eq!(
            edges,
            vec![
                StatusEdge::deactivated(PurchaseFlag::Open),
                StatusEdge::activated(PurchaseFlag::GoodsReceipt),
                StatusEdge::activated(PurchaseFlag::InvoiceSettled),
            ]
        );
    }

    #[test]
    fn absent_side_has_nothing_active() {
        let created = transitions(None, Some(&OrderStatus::Finished));
        assert_eq!(created, vec![StatusEdge::activated(OrderStatus::Finished)]);

        let deleted = transitions(Some(&OrderStatus::Canceled), None::<&OrderStatus>);
        assert_eq!(deleted, vec![StatusEdge::deactivated(OrderStatus::Canceled)]);
    }

    #[test]
    fn flags_encoding() {
        let original = PurchaseFlags::new()
            .with(PurchaseFlag::GoodsReceipt)
            .with(PurchaseFlag::Canceled);

        let encoding = minicbor::to_vec(&original).unwrap();
        let decode: PurchaseFlags = minicbor::decode(&encoding).unwrap();

        assert_eq!(original, decode);
    }
}
