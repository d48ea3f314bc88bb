//! Stream grants issued by the media backend

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A time-limited, proxy-fronted URL for a remote source
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StreamGrant {
    /// URL served by the local stream proxy
    pub proxy_url: String,

    /// Instant after which the upstream location stops working
    pub expires_at: DateTime<Utc>,
}

impl StreamGrant {
    /// Create a new grant
    pub fn new(proxy_url: impl Into<String>, expires_at: DateTime<Utc>) -> Self {
        Self {
            proxy_url: proxy_url.into(),
            expires_at,
        }
    }
}
