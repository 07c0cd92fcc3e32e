// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Image fetching: one outbound read per request, no retries

use std::net::{IpAddr, Ipv4Addr, Ipv6Addr, SocketAddr};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use bytes::{Bytes, BytesMut};
use futures::StreamExt;
use reqwest::dns::{Addrs, Name, Resolve, Resolving};
use reqwest::{redirect, Client};
use thiserror::Error;
use tracing::{debug, warn};
use url::{Host, Url};

use crate::vision::image_utils::MAX_IMAGE_SIZE;

/// Default timeout for a single image download
pub const DEFAULT_FETCH_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Debug, Error)]
pub enum FetchError {
    #[error("Timed out fetching image after {0:?}")]
    Timeout(Duration),

    #[error("Image host unreachable: {0}")]
    Unreachable(String),

    #[error("Image host returned HTTP {0}")]
    Status(u16),

    #[error("Image is too large: more than {0} bytes")]
    TooLarge(usize),

    #[error("Image download returned an empty body")]
    EmptyBody,

    #[error("Invalid image reference: {0}")]
    InvalidReference(String),

    #[error("Image file is not accessible: {0}")]
    NotAccessible(String),

    #[error("Transport error: {0}")]
    Transport(String),
}

/// Retrieves raw image bytes for an opaque reference
#[async_trait]
pub trait ImageFetcher: Send + Sync {
    async fn fetch(&self, reference: &str) -> Result<Bytes, FetchError>;
}

/// Settings shared by the HTTP-based fetchers
#[derive(Debug, Clone, Copy)]
pub struct FetchConfig {
    pub timeout: Duration,
    pub max_bytes: usize,
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            timeout: DEFAULT_FETCH_TIMEOUT,
            max_bytes: MAX_IMAGE_SIZE,
        }
    }
}

/// Maximum redirects followed for one image URL
const MAX_REDIRECTS: usize = 5;

/// Fetches images from plain http(s) URLs
///
/// By default only public addresses are reachable: loopback, private,
/// link-local and similar ranges are refused before connecting, after DNS
/// resolution and on every redirect hop.
#[derive(Debug, Clone)]
pub struct HttpImageFetcher {
    client: Client,
    config: FetchConfig,
    allow_private_hosts: bool,
}

impl HttpImageFetcher {
    pub fn new(config: FetchConfig) -> anyhow::Result<Self> {
        Self::build(config, false)
    }

    /// Fetcher that may also reach loopback and private-network hosts
    pub fn allowing_private_hosts(config: FetchConfig) -> anyhow::Result<Self> {
        Self::build(config, true)
    }

    fn build(config: FetchConfig, allow_private_hosts: bool) -> anyhow::Result<Self> {
        let mut builder = Client::builder().timeout(config.timeout);
        if !allow_private_hosts {
            builder = builder
                .dns_resolver(Arc::new(PublicOnlyResolver))
                .redirect(redirect::Policy::custom(|attempt| {
                    if attempt.previous().len() >= MAX_REDIRECTS {
                        attempt.error("too many redirects")
                    } else if attempt.url().host().is_some_and(|h| !is_public_literal(&h)) {
                        attempt.error("redirect to a non-public address")
                    } else {
                        attempt.follow()
                    }
                }));
        }
        let client = builder.build()?;
        Ok(Self {
            client,
            config,
            allow_private_hosts,
        })
    }
}

#[async_trait]
impl ImageFetcher for HttpImageFetcher {
    async fn fetch(&self, reference: &str) -> Result<Bytes, FetchError> {
        let url = Url::parse(reference)
            .map_err(|e| FetchError::InvalidReference(format!("{}: {}", reference, e)))?;

        if url.scheme() != "http" && url.scheme() != "https" {
            return Err(FetchError::InvalidReference(format!(
                "unsupported scheme '{}'",
                url.scheme()
            )));
        }

        if !self.allow_private_hosts {
            ensure_public_host(&url).await?;
        }

        download_bytes(&self.client, url.as_str(), &self.config).await
    }
}

/// Whether `ip` is routable on the public internet
pub fn is_public_ip(ip: IpAddr) -> bool {
    match ip {
        IpAddr::V4(v4) => is_public_v4(v4),
        IpAddr::V6(v6) => match v6.to_ipv4_mapped() {
            Some(v4) => is_public_v4(v4),
            None => is_public_v6(v6),
        },
    }
}

fn is_public_v4(ip: Ipv4Addr) -> bool {
    let [a, b, ..] = ip.octets();
    let this_network = a == 0;
    let shared = a == 100 && (b & 0xc0) == 64;
    !(ip.is_loopback()
        || ip.is_private()
        || ip.is_link_local()
        || ip.is_unspecified()
        || ip.is_broadcast()
        || ip.is_documentation()
        || this_network
        || shared)
}

fn is_public_v6(ip: Ipv6Addr) -> bool {
    let first = ip.segments()[0];
    let unique_local = (first & 0xfe00) == 0xfc00;
    let link_local = (first & 0xffc0) == 0xfe80;
    !(ip.is_loopback() || ip.is_unspecified() || unique_local || link_local)
}

/// Literal IP hosts must be public; domain names are checked at resolution
fn is_public_literal(host: &Host<&str>) -> bool {
    match host {
        Host::Ipv4(ip) => is_public_v4(*ip),
        Host::Ipv6(ip) => is_public_ip(IpAddr::V6(*ip)),
        Host::Domain(_) => true,
    }
}

async fn ensure_public_host(url: &Url) -> Result<(), FetchError> {
    let host = url
        .host()
        .ok_or_else(|| FetchError::InvalidReference("URL has no host".to_string()))?;

    let addrs: Vec<IpAddr> = match host {
        Host::Ipv4(ip) => vec![IpAddr::V4(ip)],
        Host::Ipv6(ip) => vec![IpAddr::V6(ip)],
        Host::Domain(domain) => {
            let port = url.port_or_known_default().unwrap_or(80);
            tokio::net::lookup_host((domain, port))
                .await
                .map_err(|e| FetchError::Unreachable(format!("{}: {}", domain, e)))?
                .map(|addr| addr.ip())
                .collect()
        }
    };

    if let Some(blocked) = addrs.iter().find(|ip| !is_public_ip(**ip)) {
        warn!("🚫 Refusing image URL that points at {}", blocked);
        return Err(FetchError::InvalidReference(
            "image host is not a public address".to_string(),
        ));
    }
    Ok(())
}

/// DNS resolver that drops non-public addresses, so a name cannot be
/// rebound to an internal host between the check and the connect
struct PublicOnlyResolver;

impl Resolve for PublicOnlyResolver {
    fn resolve(&self, name: Name) -> Resolving {
        Box::pin(async move {
            let host = name.as_str().to_string();
            let addrs: Vec<SocketAddr> = tokio::net::lookup_host((host.as_str(), 0))
                .await?
                .filter(|addr| is_public_ip(addr.ip()))
                .collect();
            if addrs.is_empty() {
                return Err(format!("{} has no public address", host).into());
            }
            let addrs: Addrs = Box::new(addrs.into_iter());
            Ok(addrs)
        })
    }
}

/// GET `url` and collect the body, enforcing status, timeout and size limits
pub async fn download_bytes(
    client: &Client,
    url: &str,
    config: &FetchConfig,
) -> Result<Bytes, FetchError> {
    debug!("📥 Downloading image (limit {} bytes)", config.max_bytes);

    let response = client
        .get(url)
        .timeout(config.timeout)
        .send()
        .await
        .map_err(|e| map_transport_error(e, config.timeout))?;

    let status = response.status();
    if !status.is_success() {
        return Err(FetchError::Status(status.as_u16()));
    }

    if let Some(len) = response.content_length() {
        if len > config.max_bytes as u64 {
            return Err(FetchError::TooLarge(config.max_bytes));
        }
    }

    let mut body = BytesMut::new();
    let mut stream = response.bytes_stream();
    while let Some(chunk) = stream.next().await {
        let chunk = chunk.map_err(|e| map_transport_error(e, config.timeout))?;
        if body.len() + chunk.len() > config.max_bytes {
            return Err(FetchError::TooLarge(config.max_bytes));
        }
        body.extend_from_slice(&chunk);
    }

    if body.is_empty() {
        return Err(FetchError::EmptyBody);
    }

    debug!("Downloaded {} bytes", body.len());
    Ok(body.freeze())
}

pub(crate) fn map_transport_error(err: reqwest::Error, timeout: Duration) -> FetchError {
    if err.is_timeout() {
        FetchError::Timeout(timeout)
    } else if err.is_connect() {
        FetchError::Unreachable(err.to_string())
    } else if let Some(status) = err.status() {
        FetchError::Status(status.as_u16())
    } else {
        FetchError::Transport(err.to_string())
    }
}
