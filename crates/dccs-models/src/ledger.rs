//! # Allocation Ledger
//!
//! Billable line items and their sparse per-date allocated quantities.
//!
//! ## Determinism
//! - Lines are keyed by `LineKey` in a `BTreeMap`, dates by `NaiveDate`
//! - Serialized form lists lines in key order, so equal ledgers produce equal bytes
//! - `digest()` hashes that canonical form

use crate::{EventKey, WellName};
use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::BTreeMap;

// =============================================================================
// Currency
// =============================================================================

/// Currency of a unit price.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum Currency {
    /// US Dollar (reporting currency)
    #[default]
    USD,
    /// Malaysian Ringgit (local currency)
    MYR,
}

impl Currency {
    pub fn is_reporting(&self) -> bool {
        matches!(self, Currency::USD)
    }
}

/// Price in USD. Local-currency prices are divided by `usd_rate`
/// (local units per USD); a zero rate yields zero.
pub fn unit_price_usd(price: Decimal, currency: Currency, usd_rate: Decimal) -> Decimal {
    if currency.is_reporting() || price.is_zero() {
        return price;
    }
    if usd_rate.is_zero() {
        return Decimal::ZERO;
    }
    price.checked_div(usd_rate).unwrap_or_else(|| {
        if price.is_sign_negative() == usd_rate.is_sign_negative() {
            Decimal::MAX
        } else {
            Decimal::MIN
        }
    })
}

/// `price × quantity`, saturating at `Decimal::MAX` / `Decimal::MIN`.
pub fn line_cost(price: Decimal, quantity: Decimal) -> Decimal {
    price.saturating_mul(quantity)
}

/// Saturating sum of money or quantity values.
pub fn saturating_sum<I: IntoIterator<Item = Decimal>>(values: I) -> Decimal {
    values.into_iter().fold(Decimal::ZERO, Decimal::saturating_add)
}

impl std::fmt::Display for Currency {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Currency::USD => write!(f, "USD"),
            Currency::MYR => write!(f, "MYR"),
        }
    }
}

// =============================================================================
// Line Identity
// =============================================================================

/// Stable identity of a billable line across runs.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct LineKey {
    pub well: WellName,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub event: Option<EventKey>,
    /// Contract / call-off reference (OCS number)
    #[serde(default)]
    pub contract: String,
    #[serde(default)]
    pub item: String,
    pub description: String,
}

impl std::fmt::Display for LineKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.well)?;
        if let Some(event) = &self.event {
            write!(f, "/{}", event)?;
        }
        write!(f, "/{}#{} {}", self.contract, self.item, self.description)
    }
}

// =============================================================================
// Line Item
// =============================================================================

/// One billable row from the contract call-offs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LineItem {
    pub key: LineKey,
    pub unit_price: Decimal,
    #[serde(default)]
    pub currency: Currency,
    #[serde(default)]
    pub unit_of_measure: String,
    /// Charging-mechanism instruction text
    pub charging_mechanism: String,
    /// Cap applied when the instruction does not state one
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub occurrence_cap: Option<Decimal>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cost_group: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub vendor: Option<String>,
}

/// A line item with its allocated quantities.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LedgerLine {
    #[serde(flatten)]
    pub item: LineItem,
    /// Computed lines never store zeros. An explicit zero read back from an
    /// edited ledger is kept: it is a manual override, not an absent value.
    #[serde(default)]
    pub allocations: BTreeMap<NaiveDate, Decimal>,
}

impl LedgerLine {
    pub fn new(item: LineItem, allocations: BTreeMap<NaiveDate, Decimal>) -> Self {
        let mut line = Self { item, allocations };
        line.normalize();
        line
    }

    pub fn key(&self) -> &LineKey {
        &self.item.key
    }

    /// Line with `allocations` taken as-is, explicit zeros included.
    pub fn with_overrides(item: LineItem, allocations: BTreeMap<NaiveDate, Decimal>) -> Self {
        Self { item, allocations }
    }

    /// Drop zero quantities.
    pub fn normalize(&mut self) {
        self.allocations.retain(|_, q| !q.is_zero());
    }

    /// Quantity on `date` (zero when absent).
    pub fn quantity_on(&self, date: NaiveDate) -> Decimal {
        self.allocations.get(&date).copied().unwrap_or(Decimal::ZERO)
    }

    /// Sum of all allocated quantities.
    pub fn total_units(&self) -> Decimal {
        saturating_sum(self.allocations.values().copied())
    }

    pub fn unit_price_usd(&self, usd_rate: Decimal) -> Decimal {
        unit_price_usd(self.item.unit_price, self.item.currency, usd_rate)
    }

    /// `unit_price_usd × total_units`.
    pub fn total_cost_usd(&self, usd_rate: Decimal) -> Decimal {
        line_cost(self.unit_price_usd(usd_rate), self.total_units())
    }
}

// =============================================================================
// Ledger
// =============================================================================

/// All line items of one reporting run, keyed by line identity.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AllocationLedger {
    #[serde(with = "lines_in_key_order")]
    pub lines: BTreeMap<LineKey, LedgerLine>,
}

impl AllocationLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace a line. Returns the replaced line, if any.
    pub fn insert(&mut self, line: LedgerLine) -> Option<LedgerLine> {
        self.lines.insert(line.key().clone(), line)
    }

    pub fn get(&self, key: &LineKey) -> Option<&LedgerLine> {
        self.lines.get(key)
    }

    pub fn contains(&self, key: &LineKey) -> bool {
        self.lines.contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.lines.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &LedgerLine> {
        self.lines.values()
    }

    /// Dates that carry at least one non-zero allocation, ascending.
    pub fn active_dates(&self) -> Vec<NaiveDate> {
        let mut dates: Vec<NaiveDate> = self
            .lines
            .values()
            .flat_map(|l| l.allocations.iter())
            .filter(|(_, q)| !q.is_zero())
            .map(|(d, _)| *d)
            .collect();
        dates.sort();
        dates.dedup();
        dates
    }

    /// Compact JSON with lines in key order; the bytes `digest()` hashes.
    pub fn canonical_json(&self) -> serde_json::Result<Vec<u8>> {
        serde_json::to_vec(self)
    }

    /// SHA-256 over the canonical JSON form (lowercase hex).
    pub fn digest(&self) -> String {
        sha256_hex(&self.canonical_json().unwrap_or_default())
    }
}

/// SHA-256 of `bytes` as lowercase hex.
pub fn sha256_hex(bytes: &[u8]) -> String {
    hex::encode(Sha256::digest(bytes))
}

impl FromIterator<LedgerLine> for AllocationLedger {
    fn from_iter<I: IntoIterator<Item = LedgerLine>>(iter: I) -> Self {
        let mut ledger = AllocationLedger::new();
        for line in iter {
            ledger.insert(line);
        }
        ledger
    }
}

/// Serializes the line map as a JSON array in key order; each line carries its own key.
mod lines_in_key_order {
    use super::{LedgerLine, LineKey};
    use serde::{Deserialize, Deserializer, Serialize, Serializer};
    use std::collections::BTreeMap;

    pub fn serialize<S>(
        lines: &BTreeMap<LineKey, LedgerLine>,
        serializer: S,
    ) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let ordered: Vec<&LedgerLine> = lines.values().collect();
        ordered.serialize(serializer)
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<BTreeMap<LineKey, LedgerLine>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let lines = Vec::<LedgerLine>::deserialize(deserializer)?;
        Ok(lines.into_iter().map(|line| (line.key().clone(), line)).collect())
    }
}
