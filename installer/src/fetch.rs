//! Content fetching over HTTP(S).
//!
//! Some installer hosts refuse requests unless they carry a particular
//! header or a license-acceptance cookie. Those rules live in small ordered
//! tables ([`REQUEST_QUIRKS`] and [`LICENSE_COOKIES`]) that are applied to
//! every outgoing request by matching on the request URL; callers cannot turn
//! them off.

use crate::config::DEFAULT_FETCH_TIMEOUT;
use log::{debug, warn};
use std::fmt;
use std::io::Read;
use std::time::Duration;
use ureq::http::Uri;

/// The only HTTP status accepted as a successful fetch.
const HTTP_OK: u16 = 200;

/// How a quirk decides whether it applies to a request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UrlPattern {
    /// The full request URL contains the given text.
    Contains(&'static str),
}

impl UrlPattern {
    /// Returns `true` when `url` matches this pattern.
    #[must_use]
    pub fn matches(&self, url: &str) -> bool {
        match self {
            Self::Contains(needle) => url.contains(needle),
        }
    }
}

/// A change applied to an outgoing request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequestMutation {
    /// Set a request header, replacing any default value.
    Header {
        /// Header name.
        name: &'static str,
        /// Header value.
        value: &'static str,
    },
}

/// One row of the request quirk table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RequestQuirk {
    /// Human-readable name of the host family the quirk exists for.
    pub vendor: &'static str,
    /// Which requests the quirk applies to.
    pub pattern: UrlPattern,
    /// What the quirk does to a matching request.
    pub mutation: RequestMutation,
}

/// Request quirks, applied in order to every request whose URL matches.
pub const REQUEST_QUIRKS: &[RequestQuirk] = &[
    // The redirector rejects default user agents.
    RequestQuirk {
        vendor: "CodePlex download redirector",
        pattern: UrlPattern::Contains("download-codeplex.sec.s-msft.com"),
        mutation: RequestMutation::Header {
            name: "User-Agent",
            value: "chocolatey command line",
        },
    },
    RequestQuirk {
        vendor: "AMD Catalyst",
        pattern: UrlPattern::Contains("ati.com"),
        mutation: RequestMutation::Header {
            name: "Referer",
            value: "http://support.amd.com/",
        },
    },
];

/// A cookie pre-seeded into the agent's jar for a fixed base URL.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CookieSeed {
    /// URL the cookie is bound to; the request path does not matter.
    pub base_url: &'static str,
    /// Cookie in `name=value` form.
    pub cookie: &'static str,
}

/// License-acceptance cookies checked by the vendor's download gate.
///
/// The gate inspects the cookie jar rather than the request path, so the
/// cookie is seeded for both hosts regardless of what is being fetched.
pub const LICENSE_COOKIES: &[CookieSeed] = &[
    CookieSeed {
        base_url: "http://download.oracle.com",
        cookie: "oraclelicense=accept-securebackup-cookie",
    },
    CookieSeed {
        base_url: "https://edelivery.oracle.com",
        cookie: "oraclelicense=accept-securebackup-cookie",
    },
];

/// Return the quirks that apply to `url`, in table order.
///
/// # Examples
///
/// ```
/// use pantry_installer::fetch::quirks_for;
///
/// let quirks: Vec<_> = quirks_for("http://www2.ati.com/drivers/setup.exe").collect();
/// assert_eq!(quirks.len(), 1);
/// assert_eq!(quirks[0].vendor, "AMD Catalyst");
/// ```
pub fn quirks_for(url: &str) -> impl Iterator<Item = &'static RequestQuirk> + '_ {
    REQUEST_QUIRKS
        .iter()
        .filter(move |quirk| quirk.pattern.matches(url))
}

/// Errors arising from fetch operations.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum FetchError {
    /// The URL could not be turned into a request.
    #[error("invalid URL {url}: {reason}")]
    InvalidUrl {
        /// The rejected URL.
        url: String,
        /// Why it was rejected.
        reason: String,
    },

    /// Connection or transport failure.
    #[error("request to {url} failed: {reason}")]
    Network {
        /// The URL that was requested.
        url: String,
        /// A human-readable description of the failure.
        reason: String,
    },

    /// The server answered with something other than 200 OK.
    #[error("unexpected HTTP response code from {url}: wanted 200 but got {status}")]
    UnexpectedStatus {
        /// The URL that was requested.
        url: String,
        /// The status code received.
        status: u16,
    },
}

/// A response whose body has not been read yet.
pub struct FetchResponse {
    /// HTTP status code.
    pub status: u16,
    /// Declared `Content-Length`, when the server sent a usable one.
    pub content_length: Option<u64>,
    /// Streaming response body.
    pub body: Box<dyn Read>,
}

impl FetchResponse {
    /// Reject any response that is not 200 OK.
    ///
    /// # Errors
    ///
    /// Returns [`FetchError::UnexpectedStatus`] for every other status.
    pub fn require_ok(self, url: &str) -> Result<Self, FetchError> {
        if self.status == HTTP_OK {
            Ok(self)
        } else {
            Err(FetchError::UnexpectedStatus {
                url: url.to_owned(),
                status: self.status,
            })
        }
    }
}

impl fmt::Debug for FetchResponse {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FetchResponse")
            .field("status", &self.status)
            .field("content_length", &self.content_length)
            .finish_non_exhaustive()
    }
}

/// Trait for issuing GET requests, enabling test mocking.
#[cfg_attr(test, mockall::automock)]
pub trait ContentFetcher {
    /// Issue a GET for `url`.
    ///
    /// `timeout` bounds the whole request, body included. `None` applies the
    /// fetcher's default to connecting and to waiting for the response head
    /// only, so large downloads on slow links are not cut off. Any HTTP status is returned as a response; interpreting it
    /// is the caller's job.
    ///
    /// # Errors
    ///
    /// Returns [`FetchError::InvalidUrl`] for URLs that cannot be requested
    /// and [`FetchError::Network`] for transport failures.
    fn fetch(&self, url: &str, timeout: Option<Duration>) -> Result<FetchResponse, FetchError>;
}

/// HTTP fetcher backed by a `ureq` agent with a pre-seeded cookie jar.
pub struct HttpFetcher {
    agent: ureq::Agent,
    default_timeout: Duration,
}

impl HttpFetcher {
    /// Create a fetcher whose connects and response heads time out after
    /// `default_timeout` unless a call supplies its own timeout.
    #[must_use]
    pub fn new(default_timeout: Duration) -> Self {
        let config = ureq::Agent::config_builder()
            .http_status_as_error(false)
            .build();
        let agent = ureq::Agent::new_with_config(config);
        seed_license_cookies(&agent);
        Self {
            agent,
            default_timeout,
        }
    }

    /// The timeout applied when a call does not supply one.
    #[must_use]
    pub fn default_timeout(&self) -> Duration {
        self.default_timeout
    }
}

impl Default for HttpFetcher {
    fn default() -> Self {
        Self::new(DEFAULT_FETCH_TIMEOUT)
    }
}

impl ContentFetcher for HttpFetcher {
    fn fetch(&self, url: &str, timeout: Option<Duration>) -> Result<FetchResponse, FetchError> {
        let mut request = self.agent.get(url);
        for quirk in quirks_for(url) {
            debug!("applying {} request quirk to {url}", quirk.vendor);
            request = match quirk.mutation {
                RequestMutation::Header { name, value } => request.header(name, value),
            };
        }

        let config = request.config();
        let config = match RequestTimeout::for_call(timeout, self.default_timeout) {
            RequestTimeout::Whole(limit) => config.timeout_global(Some(limit)),
            RequestTimeout::Head(limit) => config
                .timeout_connect(Some(limit))
                .timeout_recv_response(Some(limit)),
        };
        let response = config
            .build()
            .call()
            .map_err(|e| map_ureq_error(url, e))?;

        let status = response.status().as_u16();
        let content_length = response
            .headers()
            .get("content-length")
            .and_then(|value| value.to_str().ok())
            .and_then(|value| value.trim().parse().ok());
        debug!("GET {url} answered {status} (content length {content_length:?})");

        Ok(FetchResponse {
            status,
            content_length,
            body: Box::new(response.into_body().into_reader()),
        })
    }
}

/// The limit placed on one request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum RequestTimeout {
    /// Bound the whole request, body transfer included.
    Whole(Duration),
    /// Bound connecting and waiting for the response head; the body may
    /// take as long as it needs.
    Head(Duration),
}

impl RequestTimeout {
    fn for_call(explicit: Option<Duration>, default: Duration) -> Self {
        explicit.map_or(Self::Head(default), Self::Whole)
    }
}

/// Seed the license cookies, degrading to a cookie-less agent on failure.
///
/// Most hosts never look at these cookies, so a failure is only a warning.
fn seed_license_cookies(agent: &ureq::Agent) {
    let mut jar = agent.cookie_jar_lock();
    for seed in LICENSE_COOKIES {
        let seeded = seed
            .base_url
            .parse::<Uri>()
            .map_err(|e| e.to_string())
            .and_then(|uri| {
                let cookie = ureq::Cookie::parse(seed.cookie, &uri).map_err(|e| e.to_string())?;
                jar.insert(cookie, &uri).map_err(|e| e.to_string())
            });
        if let Err(reason) = seeded {
            warn!(
                "could not seed license cookie for {}; continuing without it: {reason}",
                seed.base_url
            );
        }
    }
}

/// Map a ureq error to a [`FetchError`].
fn map_ureq_error(url: &str, err: ureq::Error) -> FetchError {
    match err {
        ureq::Error::BadUri(reason) => FetchError::InvalidUrl {
            url: url.to_owned(),
            reason,
        },
        ureq::Error::Http(source) => FetchError::InvalidUrl {
            url: url.to_owned(),
            reason: source.to_string(),
        },
        other => FetchError::Network {
            url: url.to_owned(),
            reason: other.to_string(),
        },
    }
}
