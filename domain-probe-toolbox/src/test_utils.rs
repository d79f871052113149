//! Test helpers: in-memory DNS and HTTP backends.

#![allow(clippy::unwrap_used)]

use std::collections::HashMap;
use std::net::IpAddr;
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use tokio::time::{Duration, sleep};

use crate::services::fetch::{FetchError, FetchMethod, FetchRequest, FetchedResponse, HttpFetcher};
use crate::services::resolver::DnsBackend;
use crate::types::{
    DnsQueryType, DnsRecord, HttpHeader, LookupFailure, NetworkErrorKind, TaskResult,
};

pub fn record(value: &str) -> DnsRecord {
    DnsRecord {
        value: value.to_string(),
        ttl: 300,
        priority: None,
    }
}

// ===== MockDnsBackend =====

/// Answers from fixed tables. Unknown names answer `NotFound`.
#[derive(Default)]
pub struct MockDnsBackend {
    answers: HashMap<(String, DnsQueryType), TaskResult<Vec<DnsRecord>>>,
    ptr: HashMap<IpAddr, TaskResult<Vec<String>>>,
    delays: HashMap<String, Duration>,
    /// Delay for names without an explicit entry.
    default_delay: Option<Duration>,
    lookups: AtomicUsize,
    queried: Mutex<Vec<(String, DnsQueryType)>>,
}

impl MockDnsBackend {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_records(mut self, name: &str, record_type: DnsQueryType, values: &[&str]) -> Self {
        self.answers.insert(
            (name.to_string(), record_type),
            Ok(values.iter().map(|v| record(v)).collect()),
        );
        self
    }

    pub fn with_record_list(
        mut self,
        name: &str,
        record_type: DnsQueryType,
        records: Vec<DnsRecord>,
    ) -> Self {
        self.answers
            .insert((name.to_string(), record_type), Ok(records));
        self
    }

    pub fn with_failure(
        mut self,
        name: &str,
        record_type: DnsQueryType,
        failure: LookupFailure,
    ) -> Self {
        self.answers
            .insert((name.to_string(), record_type), Err(failure));
        self
    }

    pub fn with_ptr(mut self, ip: IpAddr, result: TaskResult<Vec<String>>) -> Self {
        self.ptr.insert(ip, result);
        self
    }

    pub fn with_delay(mut self, name: &str, delay: Duration) -> Self {
        self.delays.insert(name.to_string(), delay);
        self
    }

    pub fn with_default_delay(mut self, delay: Duration) -> Self {
        self.default_delay = Some(delay);
        self
    }

    pub fn lookup_count(&self) -> usize {
        self.lookups.load(Ordering::SeqCst)
    }

    pub fn queried(&self) -> Vec<(String, DnsQueryType)> {
        self.queried.lock().unwrap().clone()
    }

    async fn wait_for(&self, name: &str) {
        if let Some(delay) = self.delays.get(name).copied().or(self.default_delay) {
            sleep(delay).await;
        }
    }

    fn answer(&self, name: &str, record_type: DnsQueryType) -> TaskResult<Vec<DnsRecord>> {
        self.answers
            .get(&(name.to_string(), record_type))
            .cloned()
            .unwrap_or(Err(LookupFailure::NotFound))
    }
}

#[async_trait]
impl DnsBackend for MockDnsBackend {
    async fn lookup(&self, name: &str, record_type: DnsQueryType) -> TaskResult<Vec<DnsRecord>> {
        self.lookups.fetch_add(1, Ordering::SeqCst);
        self.queried
            .lock()
            .unwrap()
            .push((name.to_string(), record_type));
        self.wait_for(name).await;
        self.answer(name, record_type)
    }

    async fn lookup_soa(&self, name: &str) -> TaskResult<DnsRecord> {
        self.lookups.fetch_add(1, Ordering::SeqCst);
        self.wait_for(name).await;
        self.answer(name, DnsQueryType::Soa)?
            .into_iter()
            .next()
            .ok_or(LookupFailure::NotFound)
    }

    async fn reverse(&self, ip: IpAddr) -> TaskResult<Vec<String>> {
        self.ptr.get(&ip).cloned().unwrap_or(Err(LookupFailure::NotFound))
    }
}

// ===== MockHttpFetcher =====

/// Routes requests by URL. A route registered without a query string also
/// matches requests that carry one.
#[derive(Default)]
pub struct MockHttpFetcher {
    routes: HashMap<String, Result<FetchedResponse, FetchError>>,
    head_routes: HashMap<String, Result<FetchedResponse, FetchError>>,
    delays: HashMap<String, Duration>,
    requests: Mutex<Vec<(FetchMethod, String)>>,
}

pub fn response(status: u16, headers: &[(&str, &str)]) -> FetchedResponse {
    FetchedResponse {
        status,
        headers: headers
            .iter()
            .map(|(name, value)| HttpHeader {
                name: name.to_ascii_lowercase(),
                value: (*value).to_string(),
            })
            .collect(),
        final_url: String::new(),
        body: None,
    }
}

impl MockHttpFetcher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_response(mut self, url: &str, response: FetchedResponse) -> Self {
        self.routes.insert(url.to_string(), Ok(response));
        self
    }

    pub fn with_status(self, url: &str, status: u16, headers: &[(&str, &str)]) -> Self {
        self.with_response(url, response(status, headers))
    }

    pub fn with_redirect(self, url: &str, status: u16, location: &str) -> Self {
        self.with_response(url, response(status, &[("location", location)]))
    }

    pub fn with_json(self, url: &str, body: &str) -> Self {
        let mut ok = response(200, &[("content-type", "application/dns-json")]);
        ok.body = Some(body.to_string());
        self.with_response(url, ok)
    }

    pub fn with_error(mut self, url: &str, kind: NetworkErrorKind, message: &str) -> Self {
        self.routes
            .insert(url.to_string(), Err(FetchError::new(kind, message)));
        self
    }

    /// Answer HEAD requests for `url` differently from GET.
    pub fn with_head(mut self, url: &str, result: Result<FetchedResponse, FetchError>) -> Self {
        self.head_routes.insert(url.to_string(), result);
        self
    }

    pub fn with_delay(mut self, url: &str, delay: Duration) -> Self {
        self.delays.insert(url.to_string(), delay);
        self
    }

    pub fn requests(&self) -> Vec<(FetchMethod, String)> {
        self.requests.lock().unwrap().clone()
    }

    pub fn request_count(&self, url: &str) -> usize {
        self.requests().iter().filter(|(_, u)| u == url).count()
    }

    fn lookup<'a>(
        table: &'a HashMap<String, Result<FetchedResponse, FetchError>>,
        url: &str,
    ) -> Option<&'a Result<FetchedResponse, FetchError>> {
        table
            .get(url)
            .or_else(|| url.split_once('?').and_then(|(base, _)| table.get(base)))
    }
}

#[async_trait]
impl HttpFetcher for MockHttpFetcher {
    async fn fetch(&self, request: FetchRequest) -> Result<FetchedResponse, FetchError> {
        self.requests
            .lock()
            .unwrap()
            .push((request.method, request.url.clone()));

        if let Some(delay) = self.delays.get(&request.url) {
            sleep(*delay).await;
        }

        let route = if request.method == FetchMethod::Head {
            Self::lookup(&self.head_routes, &request.url)
                .or_else(|| Self::lookup(&self.routes, &request.url))
        } else {
            Self::lookup(&self.routes, &request.url)
        };

        let mut result = route.cloned().unwrap_or_else(|| {
            Err(FetchError::new(
                NetworkErrorKind::ConnectionRefused,
                format!("no route for {}", request.url),
            ))
        })?;
        if result.final_url.is_empty() {
            result.final_url.clone_from(&request.url);
        }
        if !request.read_body {
            result.body = None;
        }
        Ok(result)
    }
}
