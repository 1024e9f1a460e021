//! One fetch, end to end: descriptor in, envelope JSON out.

use std::time::Duration;

use crate::config::RequestIntent;
use crate::error::Result;
use crate::fingerprint::BrowserProfile;
use crate::request::ComposedRequest;
use crate::response::{self, ResponseEnvelope};
use crate::retry::{send_with_retry, RetryPolicy, Sleep, TokioSleep};
use crate::timeouts::Timeouts;
use crate::transport::{BrowserTransport, RedirectPolicy, Transport};

/// Runs the decode → compose → send → normalize pipeline for a profile.
pub struct Fetcher<T = BrowserTransport, S = TokioSleep> {
    profile: BrowserProfile,
    transport: T,
    policy: RetryPolicy,
    sleeper: S,
    read_idle: Option<Duration>,
}

impl Fetcher {
    /// Production fetcher: [`BrowserTransport`] for `profile`, real sleeps.
    pub fn browser(profile: BrowserProfile, timeouts: Timeouts, redirects: RedirectPolicy) -> Self {
        let read_idle = timeouts.read_idle;
        let transport = BrowserTransport::builder(&profile)
            .timeouts(timeouts)
            .redirects(redirects)
            .build();
        Self {
            profile,
            transport,
            policy: RetryPolicy::default(),
            sleeper: TokioSleep,
            read_idle,
        }
    }
}

impl<T: Transport> Fetcher<T, TokioSleep> {
    pub fn new(profile: BrowserProfile, transport: T) -> Self {
        Self {
            profile,
            transport,
            policy: RetryPolicy::default(),
            sleeper: TokioSleep,
            read_idle: None,
        }
    }
}

impl<T: Transport, S: Sleep> Fetcher<T, S> {
    pub fn retry_policy(mut self, policy: RetryPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn read_idle(mut self, timeout: Option<Duration>) -> Self {
        self.read_idle = timeout;
        self
    }

    pub fn with_sleeper<S2: Sleep>(self, sleeper: S2) -> Fetcher<T, S2> {
        Fetcher {
            profile: self.profile,
            transport: self.transport,
            policy: self.policy,
            sleeper,
            read_idle: self.read_idle,
        }
    }

    pub fn profile(&self) -> &BrowserProfile {
        &self.profile
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    /// Fetch what `raw_config` describes and return the envelope.
    pub async fn fetch(&self, raw_config: &str) -> Result<ResponseEnvelope> {
        let intent = RequestIntent::decode(raw_config)?;
        tracing::debug!("got request: {:?}", intent);
        tracing::info!("{} {} as {}", intent.method, intent.url, self.transport.profile_id());

        let request = ComposedRequest::compose(&intent, &self.profile)?;
        let raw = send_with_retry(&request, &self.transport, &self.policy, &self.sleeper).await?;
        tracing::info!("Received {}", raw.status_text());

        response::normalize(raw, self.read_idle).await
    }

    /// [`Fetcher::fetch`] then encode. Nothing is returned unless the whole
    /// JSON document was produced.
    pub async fn run(&self, raw_config: &str) -> Result<String> {
        self.fetch(raw_config).await?.to_json()
    }
}
