//! In-crate test doubles for the bridge traits.

use async_trait::async_trait;
use bridge_traits::error::{BridgeError, Result as BridgeResult};
use bridge_traits::http::{HttpClient, HttpRequest, HttpResponse, RetryPolicy};
use bridge_traits::storage::SecureStore;
use bridge_traits::time::Clock;
use chrono::{DateTime, Duration, TimeZone, Utc};
use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

pub fn base_time() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 3, 1, 12, 0, 0).unwrap()
}

/// Clock whose "now" only moves when a test advances it.
pub struct TestClock {
    now: Mutex<DateTime<Utc>>,
}

impl TestClock {
    pub fn new(now: DateTime<Utc>) -> Self {
        Self {
            now: Mutex::new(now),
        }
    }

    pub fn advance(&self, by: Duration) {
        let mut now = self.now.lock().unwrap();
        *now += by;
    }
}

impl Clock for TestClock {
    fn now(&self) -> DateTime<Utc> {
        *self.now.lock().unwrap()
    }
}

#[derive(Default)]
pub struct MemoryStore {
    entries: Mutex<HashMap<String, Vec<u8>>>,
    pub fail_writes: std::sync::atomic::AtomicBool,
    pub fail_reads: std::sync::atomic::AtomicBool,
}

impl MemoryStore {
    pub fn raw(&self, key: &str) -> Option<Vec<u8>> {
        self.entries.lock().unwrap().get(key).cloned()
    }

    pub fn put_raw(&self, key: &str, value: &[u8]) {
        self.entries
            .lock()
            .unwrap()
            .insert(key.to_string(), value.to_vec());
    }
}

#[async_trait]
impl SecureStore for MemoryStore {
    async fn set_secret(&self, key: &str, value: &[u8]) -> BridgeResult<()> {
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(BridgeError::NotAvailable("store locked".to_string()));
        }
        self.put_raw(key, value);
        Ok(())
    }

    async fn get_secret(&self, key: &str) -> BridgeResult<Option<Vec<u8>>> {
        if self.fail_reads.load(Ordering::SeqCst) {
            return Err(BridgeError::NotAvailable("store locked".to_string()));
        }
        Ok(self.raw(key))
    }

    async fn delete_secret(&self, key: &str) -> BridgeResult<()> {
        self.entries.lock().unwrap().remove(key);
        Ok(())
    }

    async fn list_keys(&self) -> BridgeResult<Vec<String>> {
        Ok(self.entries.lock().unwrap().keys().cloned().collect())
    }

    async fn clear_all(&self) -> BridgeResult<()> {
        self.entries.lock().unwrap().clear();
        Ok(())
    }
}

/// HTTP client that replays queued responses and records every request.
#[derive(Default)]
pub struct ScriptedHttpClient {
    responses: Mutex<VecDeque<BridgeResult<HttpResponse>>>,
    requests: Mutex<Vec<(HttpRequest, RetryPolicy)>>,
    calls: AtomicUsize,
    delay: Mutex<Option<std::time::Duration>>,
}

impl ScriptedHttpClient {
    pub fn push_json(&self, status: u16, body: &str) {
        self.responses
            .lock()
            .unwrap()
            .push_back(Ok(HttpResponse::new(status, body.to_string())));
    }

    pub fn push_error(&self, error: BridgeError) {
        self.responses.lock().unwrap().push_back(Err(error));
    }

    /// Delay every response, keeping the exchange in flight.
    pub fn set_delay(&self, delay: std::time::Duration) {
        *self.delay.lock().unwrap() = Some(delay);
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn requests(&self) -> Vec<(HttpRequest, RetryPolicy)> {
        self.requests.lock().unwrap().clone()
    }

    pub fn last_form(&self) -> HashMap<String, String> {
        let requests = self.requests.lock().unwrap();
        let (request, _) = requests.last().expect("no request recorded");
        let body = request.body.clone().unwrap_or_default();
        serde_urlencoded::from_bytes(&body).unwrap()
    }
}

#[async_trait]
impl HttpClient for ScriptedHttpClient {
    async fn execute(&self, request: HttpRequest) -> BridgeResult<HttpResponse> {
        self.execute_with_retry(request, RetryPolicy::default()).await
    }

    async fn execute_with_retry(
        &self,
        request: HttpRequest,
        policy: RetryPolicy,
    ) -> BridgeResult<HttpResponse> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.requests.lock().unwrap().push((request, policy));

        let delay = *self.delay.lock().unwrap();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }

        self.responses
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Err(BridgeError::OperationFailed("no scripted response".into())))
    }
}

pub const CODE_GRANT_RESPONSE: &str = r#"{
    "access_token": "access-1",
    "id_token": "id-1",
    "refresh_token": "refresh-1",
    "expires_in": 3600,
    "token_type": "Bearer"
}"#;

pub const REFRESH_GRANT_RESPONSE: &str = r#"{
    "access_token": "access-2",
    "id_token": "id-2",
    "expires_in": 3600,
    "token_type": "Bearer"
}"#;
