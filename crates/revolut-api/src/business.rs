//! Business API client
//!
//! Account and counterparty listings are cached after the first fetch. The
//! cache is only dropped by an explicit `invalidate_*` call or by a mutation
//! made through this client, so callers always know when a request happens.

use chrono::NaiveDate;
use revolut_auth::Session;
use serde_json::Value;
use tokio::sync::Mutex;
use tracing::debug;

use crate::error::{Error, Result};
use crate::executor::{ClientConfig, RequestExecutor};
use crate::models::{Account, Counterparty, Transaction, TransactionType};

/// Optional constraints for [`BusinessClient::transactions`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TransactionFilter {
    pub counterparty: Option<String>,
    pub from: Option<NaiveDate>,
    pub to: Option<NaiveDate>,
    pub tx_type: Option<TransactionType>,
}

impl TransactionFilter {
    fn query(&self) -> Result<Vec<(&'static str, String)>> {
        if let (Some(from), Some(to)) = (self.from, self.to)
            && from > to
        {
            return Err(Error::InvalidRequest(format!(
                "transaction range starts after it ends ({from} > {to})"
            )));
        }
        let mut query = Vec::new();
        if let Some(counterparty) = &self.counterparty {
            query.push(("counterparty", segment(counterparty)?.to_string()));
        }
        if let Some(from) = self.from {
            query.push(("from", from.to_string()));
        }
        if let Some(to) = self.to {
            query.push(("to", to.to_string()));
        }
        if let Some(tx_type) = self.tx_type {
            query.push(("type", tx_type.as_str().to_string()));
        }
        Ok(query)
    }
}

/// Client for the business banking API.
pub struct BusinessClient {
    executor: RequestExecutor,
    accounts: Mutex<Option<Vec<Account>>>,
    counterparties: Mutex<Option<Vec<Counterparty>>>,
}

impl BusinessClient {
    /// The environment comes from the session.
    pub fn new(session: Box<dyn Session>, config: ClientConfig) -> Result<Self> {
        Ok(Self::from_executor(RequestExecutor::new(session, config)?))
    }

    pub fn from_executor(executor: RequestExecutor) -> Self {
        Self {
            executor,
            accounts: Mutex::new(None),
            counterparties: Mutex::new(None),
        }
    }

    pub fn executor(&self) -> &RequestExecutor {
        &self.executor
    }

    /// Whether requests move real money.
    pub fn is_live(&self) -> bool {
        self.executor.environment().is_live()
    }

    /// All accounts, fetched once and then served from the cache.
    pub async fn accounts(&self) -> Result<Vec<Account>> {
        let mut cache = self.accounts.lock().await;
        if let Some(accounts) = cache.as_ref() {
            return Ok(accounts.clone());
        }
        let accounts: Vec<Account> = self.executor.get_json("accounts", &[]).await?;
        debug!(count = accounts.len(), "cached accounts");
        *cache = Some(accounts.clone());
        Ok(accounts)
    }

    pub async fn invalidate_accounts(&self) {
        *self.accounts.lock().await = None;
    }

    /// One account, always fetched fresh.
    pub async fn account(&self, id: &str) -> Result<Account> {
        let path = format!("accounts/{}", segment(id)?);
        self.executor.get_json(&path, &[]).await
    }

    /// Bank details for receiving transfers into an account.
    pub async fn account_bank_details(&self, id: &str) -> Result<Value> {
        let path = format!("accounts/{}/bank-details", segment(id)?);
        self.executor.get_json(&path, &[]).await
    }

    /// All counterparties, fetched once and then served from the cache.
    pub async fn counterparties(&self) -> Result<Vec<Counterparty>> {
        let mut cache = self.counterparties.lock().await;
        if let Some(counterparties) = cache.as_ref() {
            return Ok(counterparties.clone());
        }
        let counterparties: Vec<Counterparty> = self.executor.get_json("counterparties", &[]).await?;
        debug!(count = counterparties.len(), "cached counterparties");
        *cache = Some(counterparties.clone());
        Ok(counterparties)
    }

    pub async fn invalidate_counterparties(&self) {
        *self.counterparties.lock().await = None;
    }

    /// The cached counterparty owning `account_id`, if any.
    pub async fn counterparty_for_account(&self, account_id: &str) -> Result<Option<Counterparty>> {
        Ok(self
            .counterparties()
            .await?
            .into_iter()
            .find(|counterparty| counterparty.owns_account(account_id)))
    }

    pub async fn counterparty(&self, id: &str) -> Result<Counterparty> {
        let path = format!("counterparty/{}", segment(id)?);
        self.executor.get_json(&path, &[]).await
    }

    /// Delete a counterparty and drop the counterparty cache.
    pub async fn delete_counterparty(&self, id: &str) -> Result<()> {
        let path = format!("counterparty/{}", segment(id)?);
        self.executor.delete(&path).await?;
        self.invalidate_counterparties().await;
        Ok(())
    }

    pub async fn transactions(&self, filter: &TransactionFilter) -> Result<Vec<Transaction>> {
        let query = filter.query()?;
        self.executor.get_json("transactions", &query).await
    }

    pub async fn transaction(&self, id: &str) -> Result<Transaction> {
        let path = format!("transaction/{}", segment(id)?);
        self.executor.get_json(&path, &[]).await
    }
}

/// Validate a caller-supplied id before it becomes a path segment.
///
/// URL resolution drops `.` and `..` segments (also when written as `%2e`)
/// and reads `\` as `/`, so any of those would address a different resource.
pub(crate) fn segment(id: &str) -> Result<&str> {
    if id.is_empty() || id == "." || id == ".." || id.contains(['/', '\\', '?', '#', '%']) {
        return Err(Error::InvalidRequest(format!("invalid resource id {id:?}")));
    }
    Ok(id)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use revolut_auth::{Environment, FixedTokenSession};
    use rust_decimal_macros::dec;
    use serde_json::json;
    use wiremock::matchers::{method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn client(server: &MockServer) -> BusinessClient {
        let env = Environment::custom(&format!("{}/api/1.0", server.uri()), false).unwrap();
        let session = FixedTokenSession::with_environment("oa_sand_fixed", env).unwrap();
        BusinessClient::new(Box::new(session), ClientConfig::default()).unwrap()
    }

    fn account(id: &str) -> Value {
        json!({
            "id": id,
            "name": "Main",
            "currency": "EUR",
            "balance": 100.25,
            "state": "active",
            "public": false,
            "created_at": "2023-03-01T10:00:00Z",
            "updated_at": "2023-03-01T10:00:00Z"
        })
    }

    fn counterparty(id: &str, account_id: &str) -> Value {
        json!({
            "id": id,
            "name": "Acme",
            "state": "created",
            "accounts": [{"type": "revolut", "id": account_id, "currency": "EUR"}]
        })
    }

    #[tokio::test]
    async fn accounts_are_cached_until_invalidated() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/1.0/accounts"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!([account("a1")])))
            .expect(2)
            .mount(&server)
            .await;
        let client = client(&server);

        let first = client.accounts().await.unwrap();
        let second = client.accounts().await.unwrap();
        assert_eq!(first, second);
        assert_eq!(first[0].balance, dec!(100.25));

        client.invalidate_accounts().await;
        client.accounts().await.unwrap();
    }

    #[tokio::test]
    async fn single_account_is_always_fetched() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/1.0/accounts/a1"))
            .respond_with(ResponseTemplate::new(200).set_body_json(account("a1")))
            .expect(2)
            .mount(&server)
            .await;
        let client = client(&server);

        client.account("a1").await.unwrap();
        assert_eq!(client.account("a1").await.unwrap().id, "a1");
        assert!(!client.is_live());
    }

    #[tokio::test]
    async fn bank_details_are_returned_raw() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/1.0/accounts/a1/bank-details"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!([{"iban": "GB00REVO0000"}])))
            .mount(&server)
            .await;

        let details = client(&server).account_bank_details("a1").await.unwrap();
        assert_eq!(details[0]["iban"], "GB00REVO0000");
    }

    #[tokio::test]
    async fn deleting_counterparty_drops_cache() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/1.0/counterparties"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!([counterparty("c1", "ca1")])))
            .expect(2)
            .mount(&server)
            .await;
        Mock::given(method("DELETE"))
            .and(path("/api/1.0/counterparty/c1"))
            .respond_with(ResponseTemplate::new(204))
            .expect(1)
            .mount(&server)
            .await;
        let client = client(&server);

        client.counterparties().await.unwrap();
        client.counterparties().await.unwrap();
        client.delete_counterparty("c1").await.unwrap();
        client.counterparties().await.unwrap();
    }

    #[tokio::test]
    async fn failed_delete_keeps_cache() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/1.0/counterparties"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!([counterparty("c1", "ca1")])))
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("DELETE"))
            .respond_with(ResponseTemplate::new(404).set_body_json(json!({"message": "Counterparty not found"})))
            .mount(&server)
            .await;
        let client = client(&server);

        client.counterparties().await.unwrap();
        let err = client.delete_counterparty("c1").await.unwrap_err();
        assert_eq!(err.kind(), Some(ErrorKind::NotFound));
        client.counterparties().await.unwrap();
    }

    #[tokio::test]
    async fn counterparty_lookup_by_account() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/1.0/counterparties"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!([
                counterparty("c1", "ca1"),
                counterparty("c2", "ca2")
            ])))
            .expect(1)
            .mount(&server)
            .await;
        let client = client(&server);

        let found = client.counterparty_for_account("ca2").await.unwrap().unwrap();
        assert_eq!(found.id, "c2");
        assert!(client.counterparty_for_account("missing").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn transactions_filter_becomes_query() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/1.0/transactions"))
            .and(query_param("counterparty", "c1"))
            .and(query_param("from", "2024-01-01"))
            .and(query_param("to", "2024-01-31"))
            .and(query_param("type", "card_payment"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!([{
                "id": "t1",
                "type": "card_payment",
                "state": "completed",
                "created_at": "2024-01-05T10:00:00Z",
                "legs": [{"leg_id": "l1", "account_id": "a1", "amount": -9.99, "currency": "EUR"}]
            }])))
            .expect(1)
            .mount(&server)
            .await;

        let filter = TransactionFilter {
            counterparty: Some("c1".into()),
            from: NaiveDate::from_ymd_opt(2024, 1, 1),
            to: NaiveDate::from_ymd_opt(2024, 1, 31),
            tx_type: Some(TransactionType::CardPayment),
        };
        let transactions = client(&server).transactions(&filter).await.unwrap();
        assert_eq!(transactions.len(), 1);
        assert_eq!(transactions[0].legs[0].amount, dec!(-9.99));
    }

    #[tokio::test]
    async fn inverted_date_range_is_rejected_before_sending() {
        let server = MockServer::start().await;
        let filter = TransactionFilter {
            from: NaiveDate::from_ymd_opt(2024, 2, 1),
            to: NaiveDate::from_ymd_opt(2024, 1, 1),
            ..TransactionFilter::default()
        };

        let err = client(&server).transactions(&filter).await.unwrap_err();
        assert!(matches!(err, Error::InvalidRequest(_)));
        assert!(server.received_requests().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn single_transaction_path() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/1.0/transaction/t1"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "id": "t1",
                "type": "transfer",
                "state": "pending",
                "created_at": "2024-01-05T10:00:00Z",
                "legs": []
            })))
            .mount(&server)
            .await;

        let tx = client(&server).transaction("t1").await.unwrap();
        assert_eq!(tx.state, "pending");
    }

    #[tokio::test]
    async fn schema_mismatch_is_decode_error() {
        let server = MockServer::start().await;
        let mut body = account("a1");
        body["unexpected"] = json!(true);
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_json(body))
            .mount(&server)
            .await;

        let err = client(&server).account("a1").await.unwrap_err();
        assert!(matches!(err, Error::Decode(_)), "got {err:?}");
    }

    #[test]
    fn ids_must_be_single_segments() {
        assert!(segment("a1").is_ok());
        assert!(matches!(segment(""), Err(Error::InvalidRequest(_))));
        assert!(matches!(segment("../admin"), Err(Error::InvalidRequest(_))));
        assert!(matches!(segment("a?b=c"), Err(Error::InvalidRequest(_))));
        assert!(matches!(segment("a\\b"), Err(Error::InvalidRequest(_))));
    }

    #[test]
    fn dot_segments_are_rejected() {
        for id in [".", "..", "%2e%2e", "%2E"] {
            assert!(matches!(segment(id), Err(Error::InvalidRequest(_))), "{id} accepted");
        }
        assert!(segment("a.b").is_ok());
        assert!(segment("...").is_ok());
    }

    // A dot id resolves to the API root; a DELETE there must never be sent
    // or treated as a successful counterparty removal.
    #[tokio::test]
    async fn dot_id_never_reaches_the_server() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/1.0/counterparties"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!([counterparty("c1", "ca1")])))
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("DELETE"))
            .respond_with(ResponseTemplate::new(204))
            .expect(0)
            .mount(&server)
            .await;
        let client = client(&server);

        client.counterparties().await.unwrap();
        let err = client.delete_counterparty("..").await.unwrap_err();
        assert!(matches!(err, Error::InvalidRequest(_)));
        assert!(matches!(client.account(".").await, Err(Error::InvalidRequest(_))));
        assert!(matches!(client.transaction("..").await, Err(Error::InvalidRequest(_))));
        // Cache survives the rejected delete.
        client.counterparties().await.unwrap();

        let requests = server.received_requests().await.unwrap();
        assert_eq!(requests.len(), 1);
    }
}
