//! Resource models
//!
//! Every model declares its full field set and rejects unknown fields, so a
//! schema change on the API side fails loudly at decode time. Money is
//! [`Decimal`] throughout; JSON numbers are decoded without passing through
//! binary floating point.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use serde_json::Value;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Account {
    pub id: String,
    #[serde(default)]
    pub name: Option<String>,
    pub currency: String,
    pub balance: Decimal,
    pub state: String,
    #[serde(default)]
    pub public: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Counterparty {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub phone: Option<String>,
    #[serde(default)]
    pub profile_type: Option<String>,
    #[serde(default)]
    pub country: Option<String>,
    pub state: String,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub updated_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub accounts: Vec<CounterpartyAccount>,
}

impl Counterparty {
    /// Whether one of this counterparty's accounts has the given id.
    pub fn owns_account(&self, account_id: &str) -> bool {
        self.accounts.iter().any(|account| account.id() == account_id)
    }
}

/// Destination account of a counterparty.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case", deny_unknown_fields)]
pub enum CounterpartyAccount {
    /// Account held at Revolut.
    Revolut {
        id: String,
        #[serde(default)]
        name: Option<String>,
        currency: String,
    },
    External {
        id: String,
        #[serde(default)]
        name: Option<String>,
        currency: String,
        #[serde(default)]
        account_no: Option<String>,
        #[serde(default)]
        iban: Option<String>,
        #[serde(default)]
        sort_code: Option<String>,
        #[serde(default)]
        routing_number: Option<String>,
        #[serde(default)]
        bic: Option<String>,
        #[serde(default)]
        email: Option<String>,
        #[serde(default)]
        bank_country: Option<String>,
        #[serde(default)]
        recipient_charges: Option<String>,
        #[serde(default)]
        bsb_code: Option<String>,
    },
}

impl CounterpartyAccount {
    pub fn id(&self) -> &str {
        match self {
            CounterpartyAccount::Revolut { id, .. } | CounterpartyAccount::External { id, .. } => id,
        }
    }

    pub fn currency(&self) -> &str {
        match self {
            CounterpartyAccount::Revolut { currency, .. }
            | CounterpartyAccount::External { currency, .. } => currency,
        }
    }
}

/// Transaction types accepted by the transactions listing filter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransactionType {
    Atm,
    CardPayment,
    CardRefund,
    CardChargeback,
    CardCredit,
    Exchange,
    Transfer,
    Loan,
    Fee,
    Refund,
    Topup,
    TopupReturn,
    Tax,
    TaxRefund,
}

impl TransactionType {
    pub const ALL: [TransactionType; 14] = [
        TransactionType::Atm,
        TransactionType::CardPayment,
        TransactionType::CardRefund,
        TransactionType::CardChargeback,
        TransactionType::CardCredit,
        TransactionType::Exchange,
        TransactionType::Transfer,
        TransactionType::Loan,
        TransactionType::Fee,
        TransactionType::Refund,
        TransactionType::Topup,
        TransactionType::TopupReturn,
        TransactionType::Tax,
        TransactionType::TaxRefund,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            TransactionType::Atm => "atm",
            TransactionType::CardPayment => "card_payment",
            TransactionType::CardRefund => "card_refund",
            TransactionType::CardChargeback => "card_chargeback",
            TransactionType::CardCredit => "card_credit",
            TransactionType::Exchange => "exchange",
            TransactionType::Transfer => "transfer",
            TransactionType::Loan => "loan",
            TransactionType::Fee => "fee",
            TransactionType::Refund => "refund",
            TransactionType::Topup => "topup",
            TransactionType::TopupReturn => "topup_return",
            TransactionType::Tax => "tax",
            TransactionType::TaxRefund => "tax_refund",
        }
    }
}

impl std::str::FromStr for TransactionType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        TransactionType::ALL
            .into_iter()
            .find(|t| t.as_str() == s)
            .ok_or_else(|| format!("invalid transaction type: {s}"))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    In,
    Out,
    /// Both legs belong to us, e.g. an internal transfer or exchange.
    Both,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Transaction {
    pub id: String,
    #[serde(rename = "type")]
    pub tx_type: String,
    pub state: String,
    #[serde(default)]
    pub reason_code: Option<String>,
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub updated_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub completed_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub request_id: Option<String>,
    #[serde(default)]
    pub reference: Option<String>,
    #[serde(default)]
    pub revertable: bool,
    #[serde(default)]
    pub legs: Vec<TransactionLeg>,
    #[serde(default)]
    pub merchant: Option<Value>,
    #[serde(default)]
    pub card: Option<Value>,
}

impl Transaction {
    /// Money flow relative to our accounts. Two legs means both sides are ours;
    /// otherwise the sign of the single leg decides.
    pub fn direction(&self) -> Direction {
        match self.legs.as_slice() {
            [_, _] => Direction::Both,
            [leg, ..] if leg.amount.is_sign_negative() => Direction::Out,
            _ => Direction::In,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TransactionLeg {
    pub leg_id: String,
    pub account_id: String,
    #[serde(default)]
    pub counterparty: Option<LegCounterparty>,
    pub amount: Decimal,
    #[serde(default)]
    pub fee: Option<Decimal>,
    pub currency: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub balance: Option<Decimal>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct LegCounterparty {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub account_id: Option<String>,
    #[serde(default)]
    pub account_type: Option<String>,
}

/// Amount in minor currency units (1/100).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct MinorAmount {
    pub value: i64,
    pub currency: String,
}

impl MinorAmount {
    pub fn to_decimal(&self) -> Decimal {
        minor_to_decimal(self.value)
    }
}

/// Minor units to a two-place decimal.
pub fn minor_to_decimal(value: i64) -> Decimal {
    Decimal::new(value, 2)
}

/// Decimal to minor units, rounding half away from zero at the cent.
pub fn decimal_to_minor(value: Decimal) -> Option<i64> {
    use rust_decimal::prelude::ToPrimitive;
    (value * Decimal::ONE_HUNDRED)
        .round_dp_with_strategy(0, rust_decimal::RoundingStrategy::MidpointAwayFromZero)
        .to_i64()
}

/// Merchant API order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Order {
    pub id: String,
    #[serde(default)]
    pub public_id: Option<String>,
    #[serde(default)]
    pub merchant_order_ext_ref: Option<String>,
    #[serde(rename = "type")]
    pub order_type: String,
    pub state: String,
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub updated_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub completed_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub capture_mode: Option<String>,
    pub order_amount: MinorAmount,
    #[serde(default)]
    pub order_outstanding_amount: Option<MinorAmount>,
    #[serde(default)]
    pub refunded_amount: Option<MinorAmount>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub metadata: Option<Value>,
    #[serde(default)]
    pub customer_id: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub phone: Option<String>,
    #[serde(default)]
    pub payments: Vec<Value>,
    #[serde(default)]
    pub related: Vec<Value>,
    #[serde(default)]
    pub shipping_address: Option<Value>,
    #[serde(default)]
    pub checkout_url: Option<String>,
}

impl Order {
    pub fn currency(&self) -> &str {
        &self.order_amount.currency
    }

    pub fn value(&self) -> Decimal {
        self.order_amount.to_decimal()
    }

    pub fn outstanding_value(&self) -> Option<Decimal> {
        self.order_outstanding_amount.as_ref().map(MinorAmount::to_decimal)
    }

    pub fn refunded_value(&self) -> Option<Decimal> {
        self.refunded_amount.as_ref().map(MinorAmount::to_decimal)
    }
}
