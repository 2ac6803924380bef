//! Core value types shared by every ledger record
use crate::error::LedgerError;
use chrono::{DateTime, TimeZone, Utc};
use std::fmt;
use std::str::FromStr;

/// Fixed-point currency in minor units (cents). Use integers for currency.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Amount(u64);

impl Amount {
    pub const ZERO: Amount = Amount(0);

    pub const fn from_minor(cents: u64) -> Self {
        Self(cents)
    }
    /// Whole currency units, e.g. `Amount::from_major(50)` is $50.00
    pub const fn from_major(units: u64) -> Self {
        Self(units * 100)
    }
    pub const fn minor(&self) -> u64 {
        self.0
    }
    pub fn is_zero(&self) -> bool {
        self.0 == 0
    }
    pub fn checked_add(self, rhs: Amount) -> Result<Amount, LedgerError> {
        self.0
            .checked_add(rhs.0)
            .map(Amount)
            .ok_or_else(|| LedgerError::internal("amount overflow"))
    }
    pub fn checked_sub(self, rhs: Amount) -> Option<Amount> {
        self.0.checked_sub(rhs.0).map(Amount)
    }
    pub fn saturating_sub(self, rhs: Amount) -> Amount {
        Amount(self.0.saturating_sub(rhs.0))
    }
    pub fn sum<'a, I: IntoIterator<Item = &'a Amount>>(items: I) -> Result<Amount, LedgerError> {
        items
            .into_iter()
            .try_fold(Amount::ZERO, |acc, a| acc.checked_add(*a))
    }
}

impl fmt::Display for Amount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "${}.{:02}", self.0 / 100, self.0 % 100)
    }
}

#[derive(Debug, PartialEq, Eq, Clone)]
pub struct TimeStamp<T: TimeZone>(DateTime<T>);

impl PartialOrd for TimeStamp<Utc> {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for TimeStamp<Utc> {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        self.to_datetime_utc().cmp(&other.to_datetime_utc())
    }
}

impl TimeStamp<Utc> {
    pub fn new() -> Self {
        Self(Utc::now())
    }
    /// Fixed point in time, mostly for tests and fixtures.
    ///
    /// # Panics
    /// If the arguments do not name a valid calendar time.
    pub fn new_with(year: i32, month: u32, day: u32, hour: u32, min: u32, sec: u32) -> Self {
        match Utc.with_ymd_and_hms(year, month, day, hour, min, sec).single() {
            Some(datetime) => datetime.into(),
            None => panic!("invalid timestamp {year}-{month}-{day} {hour}:{min}:{sec}"),
        }
    }
    /// One nanosecond after `self`, used to keep per-organization donation order strict.
    pub fn next_tick(&self) -> Self {
        (self.0 + chrono::Duration::nanoseconds(1)).into()
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

#[derive(minicbor::Encode, minicbor::Decode, Debug, Clone, Copy, PartialEq, Eq)]
pub enum PaymentMethod {
    #[n(0)]
    Card,
    #[n(1)]
    Bank,
    #[n(2)]
    MobileMoney,
    #[n(3)]
    Crypto,
    #[n(4)]
    Cash,
}

impl PaymentMethod {
    /// Unknown labels fall back to card.
    pub fn from_label(label: &str) -> Self {
        match label.trim().to_ascii_lowercase().as_str() {
            "bank" => Self::Bank,
            "mobile_money" => Self::MobileMoney,
            "crypto" => Self::Crypto,
            "cash" => Self::Cash,
            _ => Self::Card,
        }
    }
}

#[derive(minicbor::Encode, minicbor::Decode, Debug, Clone, Copy, PartialEq, Eq)]
pub enum DonationStatus {
    #[n(0)]
    Allocated,
    #[n(1)]
    PartiallySpent,
    #[n(2)]
    FullySpent,
}

#[derive(minicbor::Encode, minicbor::Decode, Debug, Clone, Copy, PartialEq, Eq)]
pub enum WithdrawalStatus {
    #[n(0)]
    Pending,
    #[n(1)]
    Approved,
    #[n(2)]
    Rejected,
    #[n(3)]
    Completed,
}

impl WithdrawalStatus {
    /// Statuses that still hold a claim on the organization's funds.
    pub fn reserves_funds(&self) -> bool {
        matches!(self, Self::Pending | Self::Approved | Self::Completed)
    }
    /// Statuses whose funds have actually left the organization.
    pub fn is_spent(&self) -> bool {
        matches!(self, Self::Approved | Self::Completed)
    }
}

impl fmt::Display for WithdrawalStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::Pending => "pending",
            Self::Approved => "approved",
            Self::Rejected => "rejected",
            Self::Completed => "completed",
        };
        f.write_str(label)
    }
}

#[derive(minicbor::Encode, minicbor::Decode, Debug, Clone, Copy, PartialEq, Eq)]
pub enum AllocationStatus {
    #[n(0)]
    Pending,
    #[n(1)]
    Completed,
}

#[derive(minicbor::Encode, minicbor::Decode, Debug, Clone, Copy, PartialEq, Eq)]
pub enum VerificationStatus {
    #[n(0)]
    Pending,
    #[n(1)]
    Approved,
    #[n(2)]
    Rejected,
}

impl fmt::Display for VerificationStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::Pending => "pending",
            Self::Approved => "approved",
            Self::Rejected => "rejected",
        };
        f.write_str(label)
    }
}

#[derive(minicbor::Encode, minicbor::Decode, Debug, Clone, Copy, PartialEq, Eq)]
pub enum AdminRole {
    #[n(0)]
    Moderator,
    #[n(1)]
    FinanceAdmin,
    #[n(2)]
    SuperAdmin,
}

impl AdminRole {
    pub fn can_process_withdrawals(&self) -> bool {
        matches!(self, Self::FinanceAdmin | Self::SuperAdmin)
    }
}

/// An admin decision on a pending withdrawal or an organization registration.
#[derive(minicbor::Encode, minicbor::Decode, Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReviewAction {
    #[n(0)]
    Approve,
    #[n(1)]
    Reject,
}

impl ReviewAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Approve => "approve",
            Self::Reject => "reject",
        }
    }
}

impl FromStr for ReviewAction {
    type Err = LedgerError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "approve" => Ok(Self::Approve),
            "reject" => Ok(Self::Reject),
            other => Err(LedgerError::Validation(format!(
                "action must be either \"approve\" or \"reject\", got {other:?}"
            ))),
        }
    }
}

impl<C> minicbor::Encode<C> for Amount {
    fn encode<W: minicbor::encode::Write>(
        &self,
        e: &mut minicbor::Encoder<W>,
        _: &mut C,
    ) -> Result<(), minicbor::encode::Error<W::Error>> {
        e.u64(self.0)?.ok()
    }
}

impl<'b, C> minicbor::Decode<'b, C> for Amount {
    fn decode(d: &mut minicbor::Decoder<'b>, _: &mut C) -> Result<Self, minicbor::decode::Error> {
        Ok(Amount(d.u64()?))
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
    fn timestamps_order_chronologically() {
        let earlier = TimeStamp::new_with(2025, 1, 1, 8, 0, 0);
        let later = TimeStamp::new_with(2025, 1, 1, 8, 0, 1);

        assert!(earlier < later);
        assert!(earlier < earlier.next_tick());

        let mut stamps = vec![later.clone(), earlier.clone()];
        stamps.sort();
        assert_eq!(stamps, vec![earlier, later]);
    }

    #[test]
    #[should_panic(expected = "invalid timestamp")]
    fn impossible_date_is_not_silently_replaced() {
        TimeStamp::new_with(2025, 2, 30, 0, 0, 0);
    }

    #[test]
    fn amount_displays_as_currency() {
        assert_eq!(Amount::from_minor(5).to_string(), "$0.05");
        assert_eq!(Amount::from_major(1_250).to_string(), "$1250.00");
    }

    #[test]
    fn amount_overflow_is_an_error() {
        let max = Amount::from_minor(u64::MAX);
        assert!(max.checked_add(Amount::from_minor(1)).is_err());
    }

    #[test]
    fn unknown_payment_label_falls_back_to_card() {
        assert_eq!(PaymentMethod::from_label("mobile_money"), PaymentMethod::MobileMoney);
        assert_eq!(PaymentMethod::from_label("cheque"), PaymentMethod::Card);
    }

    #[test]
    fn review_action_parses_case_insensitively() {
        assert_eq!("Approve".parse::<ReviewAction>().unwrap(), ReviewAction::Approve);
        assert_eq!(" reject ".parse::<ReviewAction>().unwrap(), ReviewAction::Reject);
        assert!("cancel".parse::<ReviewAction>().is_err());
    }
}
