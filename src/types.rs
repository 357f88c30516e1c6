//! Order, material and ledger records shared by the engine and its accessors
use crate::error::AccessError;
use chrono::{DateTime, TimeZone, Utc};
use rust_decimal::Decimal;
use std::fmt;
use std::ops::{Add, AddAssign, Neg, Sub};
use std::str::FromStr;

#[derive(minicbor::Encode, minicbor::Decode, Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cbor(transparent)]
pub struct MaterialId(#[n(0)] pub String);

#[derive(minicbor::Encode, minicbor::Decode, Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cbor(transparent)]
pub struct AccountId(#[n(0)] pub String);

#[derive(minicbor::Encode, minicbor::Decode, Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cbor(transparent)]
pub struct OrderId(#[n(0)] pub String);

macro_rules! string_id {
    ($name:ident) => {
        impl $name {
            pub fn new(id: impl Into<String>) -> Self {
                Self(id.into())
            }
            pub fn as_str(&self) -> &str {
                &self.0
            }
        }
        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }
        impl From<&str> for $name {
            fn from(value: &str) -> Self {
                Self(value.to_string())
            }
        }
        impl From<String> for $name {
            fn from(value: String) -> Self {
                Self(value)
            }
        }
    };
}

string_id!(MaterialId);
string_id!(AccountId);
string_id!(OrderId);

/// Decimal currency amount. Stored as its canonical string so no precision is lost.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Money(Decimal);

impl Money {
    pub const ZERO: Money = Money(Decimal::ZERO);

    pub fn new(amount: Decimal) -> Self {
        Self(amount)
    }
    /// Whole currency units, mostly handy in tests.
    pub fn from_units(units: i64) -> Self {
        Self(Decimal::from(units))
    }
    pub fn amount(&self) -> Decimal {
        self.0
    }
    pub fn times(&self, quantity: u64) -> Money {
        Money(self.0 * Decimal::from(quantity))
    }
    pub fn is_zero(&self) -> bool {
        self.0.is_zero()
    }
}

impl fmt::Display for Money {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.0, f)
    }
}

impl From<Decimal> for Money {
    fn from(value: Decimal) -> Self {
        Money(value)
    }
}

impl Add for Money {
    type Output = Money;
    fn add(self, rhs: Money) -> Money {
        Money(self.0 + rhs.0)
    }
}

impl AddAssign for Money {
    fn add_assign(&mut self, rhs: Money) {
        self.0 += rhs.0;
    }
}

impl Sub for Money {
    type Output = Money;
    fn sub(self, rhs: Money) -> Money {
        Money(self.0 - rhs.0)
    }
}

impl Neg for Money {
    type Output = Money;
    fn neg(self) -> Money {
        Money(-self.0)
    }
}

impl std::iter::Sum for Money {
    fn sum<I: Iterator<Item = Money>>(iter: I) -> Money {
        iter.fold(Money::ZERO, |acc, m| acc + m)
    }
}

impl<C> minicbor::Encode<C> for Money {
    fn encode<W: minicbor::encode::Write>(
        &self,
        e: &mut minicbor::Encoder<W>,
        _: &mut C,
    ) -> Result<(), minicbor::encode::Error<W::Error>> {
        e.str(&self.0.to_string())?.ok()
    }
}

impl<'b, C> minicbor::Decode<'b, C> for Money {
    fn decode(d: &mut minicbor::Decoder<'b>, _: &mut C) -> Result<Self, minicbor::decode::Error> {
        let text = d.str()?;

        Decimal::from_str(text)
            .map(Money)
            .map_err(|_| minicbor::decode::Error::message("failed to parse decimal amount"))
    }
}

#[derive(Debug, PartialEq, Eq, PartialOrd, Ord, Clone)]
pub struct TimeStamp<T: TimeZone>(DateTime<T>);

impl TimeStamp<Utc> {
    pub fn new() -> Self {
        Self(Utc::now())
    }
    pub fn to_datetime_utc(&self) -> DateTime<Utc> {
        self.0
    }
}

impl Default for TimeStamp<Utc> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: TimeZone> From<DateTime<T>> for TimeStamp<T> {
    fn from(value: DateTime<T>) -> Self {
        TimeStamp(value)
    }
}

impl<C> minicbor::Encode<C> for TimeStamp<Utc> {
    fn encode<W: minicbor::encode::Write>(
        &self,
        e: &mut minicbor::Encoder<W>,
        _: &mut C,
    ) -> Result<(), minicbor::encode::Error<W::Error>> {
        if let Some(nsec) = self.0.timestamp_nanos_opt() {
            return e.i64(nsec)?.ok();
        }

        Err(minicbor::encode::Error::message(
            "failed to encode timestamp. timestamp_nanos_opt returned None",
        ))
    }
}

impl<'b, C> minicbor::Decode<'b, C> for TimeStamp<Utc> {
    fn decode(d: &mut minicbor::Decoder<'b>, _: &mut C) -> Result<Self, minicbor::decode::Error> {
        let nsecs = d.i64()?;

        Ok(TimeStamp(DateTime::from_timestamp_nanos(nsecs)))
    }
}

/// One material line of an order. Zero quantities count as absent.
#[derive(minicbor::Encode, minicbor::Decode, Debug, Clone, PartialEq, Eq)]
pub struct OrderLine {
    #[n(0)]
    pub material: MaterialId,
    #[n(1)]
    pub quantity: u64,
    #[n(2)]
    pub unit_price: Money,
}

impl OrderLine {
    pub fn new(material: impl Into<MaterialId>, quantity: u64) -> Self {
        Self {
            material: material.into(),
            quantity,
            unit_price: Money::ZERO,
        }
    }
    pub fn with_unit_price(mut self, price: Money) -> Self {
        self.unit_price = price;
        self
    }
    pub fn total(&self) -> Money {
        self.unit_price.times(self.quantity)
    }
}

/// An order's lines and lifecycle status at one point in time.
///
/// `S` is the status representation: [`crate::status::OrderStatus`] for sales and
/// production orders, [`crate::status::PurchaseFlags`] for purchase orders.
#[derive(minicbor::Encode, minicbor::Decode, Debug, Clone, PartialEq, Eq)]
pub struct OrderSnapshot<S> {
    #[n(0)]
    pub id: OrderId,
    #[n(1)]
    pub lines: Vec<OrderLine>,
    #[n(2)]
    pub status: S,
    #[n(3)]
    pub account: Option<AccountId>,
}

impl<S> OrderSnapshot<S> {
    pub fn new(id: impl Into<OrderId>, status: S) -> Self {
        Self {
            id: id.into(),
            lines: vec![],
            status,
            account: None,
        }
    }
    pub fn add_line(mut self, line: OrderLine) -> Self {
        self.lines.push(line);
        self
    }
    pub fn set_account(mut self, account: impl Into<AccountId>) -> Self {
        self.account = Some(account.into());
        self
    }
    pub fn set_status(mut self, status: S) -> Self {
        self.status = status;
        self
    }
    /// Sum of `quantity * unit_price` over every line.
    pub fn total_price(&self) -> Money {
        self.lines.iter().map(OrderLine::total).sum()
    }
}

#[derive(minicbor::Encode, minicbor::Decode, Debug, Clone, PartialEq, Eq)]
pub struct BomEntry {
    #[n(0)]
    pub component: MaterialId,
    #[n(1)]
    pub multiplier: u64, // units of component per unit of product
}

#[derive(minicbor::Encode, minicbor::Decode, Debug, Clone, PartialEq, Eq)]
pub struct Material {
    #[n(0)]
    pub id: MaterialId,
    #[n(1)]
    pub name: String,
    #[n(2)]
    pub inventory: i64,
    #[n(3)]
    pub bill_of_materials: Vec<BomEntry>,
}

impl Material {
    pub fn new(id: impl Into<MaterialId>, name: impl Into<String>, inventory: i64) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            inventory,
            bill_of_materials: vec![],
        }
    }
    pub fn add_component(mut self, component: impl Into<MaterialId>, multiplier: u64) -> Self {
        self.bill_of_materials.push(BomEntry {
            component: component.into(),
            multiplier,
        });
        self
    }
}

#[derive(minicbor::Encode, minicbor::Decode, Debug, Clone, PartialEq, Eq)]
pub struct Account {
    #[n(0)]
    pub id: AccountId,
    #[n(1)]
    pub name: String,
    #[n(2)]
    pub balance: Money,
}

impl Account {
    pub fn new(id: impl Into<AccountId>, name: impl Into<String>, balance: Money) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            balance,
        }
    }
}

#[derive(minicbor::Encode, minicbor::Decode, Debug, Clone, Copy, PartialEq, Eq)]
pub enum PostingKind {
    #[n(0)]
    Receipt,
    #[n(1)]
    Disbursal,
}

/// Append-only ledger record written next to a balance change.
#[derive(minicbor::Encode, minicbor::Decode, Debug, Clone, PartialEq, Eq)]
pub struct Posting {
    #[n(0)]
    pub id: String, // bech32 encoded uuid7
    #[n(1)]
    pub order: OrderId,
    #[n(2)]
    pub account: AccountId,
    #[n(3)]
    pub kind: PostingKind,
    #[n(4)]
    pub amount: Money,
    #[n(5)]
    pub timestamp: TimeStamp<Utc>,
}

impl Posting {
    /// Returns the sha256 digest of the CBOR encoding alongside the encoding itself.
    pub fn build(&self) -> Result<(String, Vec<u8>), AccessError> {
        let cbor = minicbor::to_vec(self)?;
        let hash = sha256::digest(&cbor);

        Ok((hash, cbor))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn timestamp_encoding() {
        let original = TimeStamp::new();

        let encoding = minicbor::to_vec(original.clone()).unwrap();
        let decode: TimeStamp<Utc> = minicbor::decode(&encoding).unwrap();

        assert_eq!(original, decode);
    }

    #[test]
    fn money_keeps_decimal_scale() {
        let original = Money::new(Decimal::new(123_450, 2));

        let encoding = minicbor::to_vec(original).unwrap();
        let decode: Money = minicbor::decode(&encoding).unwrap();

        assert_eq!(original, decode);
        assert_eq!(decode.to_string(), "1234.50");
    }

    #[test]
    fn total_price_sums_lines() {
        let order = OrderSnapshot::new("o1", ())
            .add_line(OrderLine::new("a", 3).with_unit_price(Money::from_units(2)))
            .add_line(OrderLine::new("b", 1).with_unit_price(Money::from_units(10)));

        assert_eq!(order.total_price(), Money::from_units(16));
    }

    #[test]
    fn posting_hash_is_stable() {
        let posting = Posting {
            id: "post_1".into(),
            order: "o1".into(),
            account: "acc".into(),
            kind: PostingKind::Receipt,
            amount: Money::from_units(5),
            timestamp: TimeStamp::new(),
        };

        let (first, _) = posting.build().unwrap();
        let (second, cbor) = posting.build().unwrap();

        assert_eq!(first, second);
        assert_eq!(first.len(), 64);
        let decoded: Posting = minicbor::decode(&cbor).unwrap();
        assert_eq!(decoded, posting);
    }
}
