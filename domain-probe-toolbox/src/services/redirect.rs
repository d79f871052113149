//! Hop-by-hop redirect tracing.

use std::collections::HashSet;
use std::time::Instant;

use log::{debug, trace};
use url::Url;

use crate::config::RedirectConfig;
use crate::error::{ToolboxError, ToolboxResult};
use crate::types::{RedirectHop, RedirectTraceReport};

use super::fetch::{FetchRequest, FetchedResponse, HttpFetcher, fetch_with_timeout};

/// Hops followed from a start URL.
#[derive(Debug)]
pub struct RedirectChain {
    /// Fetched hops, plus a trailing marker hop when a loop was detected.
    pub hops: Vec<RedirectHop>,
    /// Response of the last fetched hop.
    pub last_response: FetchedResponse,
    pub is_loop: bool,
    /// The hop cap was reached while the last response still redirected.
    pub truncated: bool,
}

impl RedirectChain {
    /// Hops that were actually fetched (the loop marker excluded).
    pub fn fetched(&self) -> &[RedirectHop] {
        if self.is_loop {
            &self.hops[..self.hops.len().saturating_sub(1)]
        } else {
            &self.hops
        }
    }

    pub fn last_fetched(&self) -> Option<&RedirectHop> {
        self.fetched().last()
    }
}

/// Follows redirects manually, one request per hop.
pub struct RedirectTracer<'a> {
    fetcher: &'a dyn HttpFetcher,
    config: RedirectConfig,
}

impl<'a> RedirectTracer<'a> {
    pub fn new(fetcher: &'a dyn HttpFetcher, config: RedirectConfig) -> Self {
        Self { fetcher, config }
    }

    /// Follow `start` until a non-redirect response, a loop or the hop cap.
    ///
    /// A transport failure on any hop aborts the whole trace.
    pub async fn trace(&self, start: &Url) -> ToolboxResult<RedirectChain> {
        let max_hops = self.config.max_hops.max(1);
        let mut visited: HashSet<String> = HashSet::new();
        let mut hops: Vec<RedirectHop> = Vec::new();
        let mut current = start.clone();
        let mut last_response = FetchedResponse::default();
        let mut is_loop = false;
        let mut truncated = false;

        while hops.len() < max_hops {
            if self.config.detect_loops && !visited.insert(current.to_string()) {
                debug!("[Redirect] Loop detected at {current}");
                hops.push(RedirectHop {
                    url: current.to_string(),
                    status: 0,
                    location: None,
                    response_time: 0,
                });
                is_loop = true;
                break;
            }

            let started = Instant::now();
            let request = FetchRequest::get(current.as_str(), self.config.hop_timeout());
            let response = fetch_with_timeout(self.fetcher, request)
                .await
                .map_err(|e| {
                    ToolboxError::NetworkError(format!("Request to {current} failed: {e}"))
                })?;
            // u128 -> u64: elapsed millis for one hop will never exceed u64::MAX
            #[allow(clippy::cast_possible_truncation)]
            let response_time = started.elapsed().as_millis() as u64;

            let location = response.location().map(str::to_string);
            trace!(
                "[Redirect] {current} -> {} ({response_time}ms)",
                response.status
            );
            hops.push(RedirectHop {
                url: current.to_string(),
                status: response.status,
                location: location.clone(),
                response_time,
            });

            let next = if response.is_redirect() {
                location.and_then(|l| current.join(&l).ok())
            } else {
                None
            };
            last_response = response;

            match next {
                Some(next) => {
                    if hops.len() == max_hops {
                        truncated = true;
                    }
                    current = next;
                }
                None => break,
            }
        }

        Ok(RedirectChain {
            hops,
            last_response,
            is_loop,
            truncated,
        })
    }
}

/// Trace the redirect chain of `url` into a report.
pub async fn trace_redirects(
    fetcher: &dyn HttpFetcher,
    url: &Url,
    config: &RedirectConfig,
) -> ToolboxResult<RedirectTraceReport> {
    debug!("[Redirect] Tracing {url}");
    let chain = RedirectTracer::new(fetcher, config.clone()).trace(url).await?;

    let (final_url, final_status) = chain
        .last_fetched()
        .map_or_else(|| (url.to_string(), 0), |hop| (hop.url.clone(), hop.status));

    let message = if chain.is_loop {
        Some(format!(
            "Redirect loop detected: {final_url} redirects to an already visited URL"
        ))
    } else if chain.truncated {
        Some(format!("Stopped after {} hops", chain.hops.len()))
    } else {
        None
    };

    let total_response_time = chain.hops.iter().map(|h| h.response_time).sum();

    Ok(RedirectTraceReport {
        url: url.to_string(),
        total_hops: chain.hops.len(),
        hops: chain.hops,
        final_url,
        final_status,
        total_response_time,
        is_loop: chain.is_loop,
        message,
    })
}
