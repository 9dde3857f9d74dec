//! Merchant API client
//!
//! Merchant secret keys carry no environment prefix, so the caller picks
//! sandbox or production explicitly. The key never expires; the client wraps
//! it in a fixed-token session.

use chrono::{DateTime, SecondsFormat, Utc};
use reqwest::Url;
use revolut_auth::{Environment, FixedTokenSession};
use rust_decimal::Decimal;
use serde::Serialize;
use tracing::info;

use crate::business::segment;
use crate::error::{Error, Result};
use crate::executor::{ClientConfig, RequestExecutor, decode};
use crate::models::{Order, decimal_to_minor};

/// Editable fields of an existing order. Unset fields are left alone.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct OrderUpdate {
    pub amount: Option<Decimal>,
    pub currency: Option<String>,
    pub description: Option<String>,
    pub email: Option<String>,
    pub customer_id: Option<String>,
    pub merchant_order_ext_ref: Option<String>,
    pub capture_mode: Option<String>,
}

#[derive(Serialize)]
struct OrderPatch<'a> {
    #[serde(skip_serializing_if = "Option::is_none")]
    amount: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    currency: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    description: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    email: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    customer_id: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    merchant_order_ext_ref: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    capture_mode: Option<&'a str>,
}

impl OrderUpdate {
    fn is_empty(&self) -> bool {
        *self == Self::default()
    }

    fn patch(&self) -> Result<OrderPatch<'_>> {
        let amount = match self.amount {
            Some(amount) if amount.is_sign_negative() => {
                return Err(Error::InvalidRequest(format!("order amount {amount} is negative")));
            }
            Some(amount) => Some(decimal_to_minor(amount).ok_or_else(|| {
                Error::InvalidRequest(format!("order amount {amount} does not fit in minor units"))
            })?),
            None => None,
        };
        Ok(OrderPatch {
            amount,
            currency: self.currency.as_deref(),
            description: self.description.as_deref(),
            email: self.email.as_deref(),
            customer_id: self.customer_id.as_deref(),
            merchant_order_ext_ref: self.merchant_order_ext_ref.as_deref(),
            capture_mode: self.capture_mode.as_deref(),
        })
    }
}

#[derive(Serialize)]
struct Webhook<'a> {
    url: &'a str,
    #[serde(skip_serializing_if = "no_events")]
    events: &'a [&'a str],
}

fn no_events(events: &&[&str]) -> bool {
    events.is_empty()
}

pub struct MerchantClient {
    executor: RequestExecutor,
    sandbox: bool,
}

impl MerchantClient {
    pub fn new(merchant_key: impl Into<String>, sandbox: bool, config: ClientConfig) -> Result<Self> {
        Self::with_environment(merchant_key, Environment::merchant(sandbox), config)
    }

    /// Target an explicit environment (mock server, proxy).
    pub fn with_environment(
        merchant_key: impl Into<String>,
        environment: Environment,
        config: ClientConfig,
    ) -> Result<Self> {
        let sandbox = !environment.is_live();
        let session = FixedTokenSession::with_environment(merchant_key, environment)?;
        Ok(Self {
            executor: RequestExecutor::new(Box::new(session), config)?,
            sandbox,
        })
    }

    pub fn is_sandbox(&self) -> bool {
        self.sandbox
    }

    pub async fn order(&self, id: &str) -> Result<Order> {
        let path = format!("orders/{}", segment(id)?);
        self.executor.get_json(&path, &[]).await
    }

    /// Change an order and return it as the server now holds it.
    pub async fn update_order(&self, id: &str, update: &OrderUpdate) -> Result<Order> {
        if update.is_empty() {
            return Err(Error::InvalidRequest("order update changes nothing".into()));
        }
        let path = format!("orders/{}", segment(id)?);
        match self.executor.patch(&path, &update.patch()?).await? {
            Some(value) => decode(value),
            None => Err(Error::Decode(format!("{path} returned no content"))),
        }
    }

    /// Register the URL the merchant API notifies. With no `events` the
    /// server's default set applies.
    pub async fn set_webhook(&self, url: &str, events: &[&str]) -> Result<()> {
        match Url::parse(url) {
            Ok(parsed) if matches!(parsed.scheme(), "http" | "https") => {}
            _ => return Err(Error::InvalidRequest(format!("invalid webhook URL {url:?}"))),
        }
        self.executor.post("webhooks", &Webhook { url, events }).await?;
        info!(url, ?events, "webhook registered");
        Ok(())
    }

    /// Orders created within the optional range.
    pub async fn orders(
        &self,
        from: Option<DateTime<Utc>>,
        to: Option<DateTime<Utc>>,
    ) -> Result<Vec<Order>> {
        if let (Some(from), Some(to)) = (from, to)
            && from > to
        {
            return Err(Error::InvalidRequest(format!(
                "order range starts after it ends ({from} > {to})"
            )));
        }
        let mut query = Vec::new();
        if let Some(from) = from {
            query.push(("from_created_date", timestamp(from)));
        }
        if let Some(to) = to {
            query.push(("to_created_date", timestamp(to)));
        }
        self.executor.get_json("orders", &query).await
    }
}

fn timestamp(at: DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Micros, true)
}
