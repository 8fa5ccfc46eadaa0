use std::convert::Infallible;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::str::FromStr;
use std::sync::LazyLock;

use percent_encoding::percent_decode_str;
use regex::Regex;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use tracing::trace;

/// Scheme prefix every valid DSN starts with.
pub const SCHEME: &str = "redis://";

/// Port used when a host DSN does not name one.
pub const DEFAULT_PORT: u16 = 6379;

/// Trailing `/<database>` segment: digits, `%param%` or `env_NAME_<hex>`.
static DATABASE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(.*)/([0-9]+|%[^%]+%|env_[0-9A-Za-z_]+_[[:xdigit:]]{32,})$")
        .expect("database regex is valid")
});

/// `<host-or-socket>[:<port>]`, port accepting the same placeholder forms.
static TARGET_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^([^:]+)(?::([0-9]+|%[^%]+%|env_[0-9A-Za-z_]+_[[:xdigit:]]{32,}))?$")
        .expect("target regex is valid")
});

/// A whole segment that is a `%param%` or `env_NAME_<hex>` placeholder.
static PLACEHOLDER_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(?:%[^%]+%|env_[0-9A-Za-z_]+_[[:xdigit:]]{32,})$")
        .expect("placeholder regex is valid")
});

/// A parsed Redis connection target.
///
/// Equality, hashing and the serde representation all use the original DSN
/// string. The [`Debug`] output never includes the password.
#[derive(Clone, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub struct RedisDsn {
    dsn: String,
    password: Option<String>,
    host: Option<String>,
    port: Option<u16>,
    socket: Option<String>,
    database: Option<i64>,
    weight: Option<i64>,
    alias: Option<String>,
    placeholders: bool,
}

impl RedisDsn {
    /// Parse a DSN string. Never fails; unmatched fragments stay unset.
    pub fn parse(dsn: &str) -> Self {
        let mut parsed = Self {
            dsn: dsn.to_owned(),
            password: None,
            host: None,
            port: None,
            socket: None,
            database: None,
            weight: None,
            alias: None,
            placeholders: false,
        };

        let mut rest = dsn.strip_prefix(SCHEME).unwrap_or(dsn);

        // The right-most `@` separates credentials, so passwords may contain `@`
        // as long as the host part does not.
        if let Some(pos) = rest.rfind('@') {
            let credentials = &rest[..pos];
            let secret = credentials
                .split_once(':')
                .map_or(credentials, |(_user, password)| password);
            parsed.placeholders |= PLACEHOLDER_RE.is_match(secret);
            parsed.password = Some(form_decode(secret));
            rest = &rest[pos + 1..];
        }

        if let Some(pos) = rest.find('?') {
            parsed.apply_parameters(&rest[pos + 1..]);
            rest = &rest[..pos];
        }

        if let Some(caps) = DATABASE_RE.captures(rest) {
            parsed.database = caps[2].parse().ok();
            parsed.placeholders |= PLACEHOLDER_RE.is_match(&caps[2]);
            rest = caps.get(1).map_or("", |m| m.as_str());
        }

        if let Some(caps) = TARGET_RE.captures(rest) {
            let target = &caps[1];
            parsed.placeholders |= PLACEHOLDER_RE.is_match(target)
                || caps.get(2).is_some_and(|m| PLACEHOLDER_RE.is_match(m.as_str()));
            if target.starts_with('/') {
                parsed.socket = Some(target.to_owned());
            } else {
                parsed.host = Some(target.to_owned());
                parsed.port = caps
                    .get(2)
                    .and_then(|m| m.as_str().parse::<u16>().ok())
                    .filter(|port| *port != 0);
            }
        } else {
            trace!("DSN target segment did not match, host and socket left unset");
        }

        parsed
    }

    fn apply_parameters(&mut self, query: &str) {
        let Ok(pairs) = serde_urlencoded::from_str::<Vec<(String, String)>>(query) else {
            trace!("ignoring malformed DSN query string");
            return;
        };

        for (key, value) in pairs {
            if value.is_empty() || value == "0" {
                continue;
            }
            match key.as_str() {
                "weight" => {
                    if let Ok(weight) = value.parse() {
                        self.weight = Some(weight);
                    }
                }
                "alias" => self.alias = Some(value),
                _ => {}
            }
        }
    }

    /// The DSN exactly as it was given.
    pub fn as_str(&self) -> &str {
        &self.dsn
    }

    pub fn host(&self) -> Option<&str> {
        self.host.as_deref()
    }

    /// Unix socket path; when set, [`port`](Self::port) is always `None`.
    pub fn socket(&self) -> Option<&str> {
        self.socket.as_deref()
    }

    /// The TCP port, defaulting to [`DEFAULT_PORT`] unless a socket is used.
    pub fn port(&self) -> Option<u16> {
        if self.socket.is_some() {
            return None;
        }
        Some(self.port.unwrap_or(DEFAULT_PORT))
    }

    /// Logical database index. `None` when absent or given as a placeholder.
    pub fn database(&self) -> Option<i64> {
        self.database
    }

    /// Decoded password (`+` becomes a space, `%XX` escapes are resolved).
    /// Any username in front of it is discarded.
    pub fn password(&self) -> Option<&str> {
        self.password.as_deref()
    }

    pub fn weight(&self) -> Option<i64> {
        self.weight
    }

    pub fn alias(&self) -> Option<&str> {
        self.alias.as_deref()
    }

    /// Stable identifier for persistent connections, derived from the raw DSN.
    pub fn persistent_id(&self) -> String {
        hex::encode(Sha256::digest(self.dsn.as_bytes()))
    }

    /// Whether any segment is an unresolved `%param%` or `env_*` placeholder.
    ///
    /// Such DSNs are valid configuration but cannot be connected to until the
    /// placeholders are substituted.
    pub fn has_placeholders(&self) -> bool {
        self.placeholders
    }

    /// Whether the DSN carries the `redis://` scheme and a usable target.
    pub fn is_valid(&self) -> bool {
        if !self.dsn.starts_with(SCHEME) {
            return false;
        }
        (self.host.is_some() && self.port().is_some()) || self.socket.is_some()
    }
}

/// Form-style decoding of a credential: `+` is a space, `%XX` an escaped byte.
fn form_decode(raw: &str) -> String {
    let spaced = raw.replace('+', " ");
    percent_decode_str(&spaced).decode_utf8_lossy().into_owned()
}

impl FromStr for RedisDsn {
    type Err = Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self::parse(s))
    }
}

impl From<String> for RedisDsn {
    fn from(dsn: String) -> Self {
        Self::parse(&dsn)
    }
}

impl From<&str> for RedisDsn {
    fn from(dsn: &str) -> Self {
        Self::parse(dsn)
    }
}

impl From<RedisDsn> for String {
    fn from(dsn: RedisDsn) -> Self {
        dsn.dsn
    }
}

impl PartialEq for RedisDsn {
    fn eq(&self, other: &Self) -> bool {
        self.dsn == other.dsn
    }
}

impl Eq for RedisDsn {}

impl Hash for RedisDsn {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.dsn.hash(state);
    }
}

impl fmt::Debug for RedisDsn {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RedisDsn")
            .field("host", &self.host)
            .field("socket", &self.socket)
            .field("port", &self.port())
            .field("database", &self.database)
            .field("password", &self.password.as_ref().map(|_| "[REDACTED]"))
            .field("weight", &self.weight)
            .field("alias", &self.alias)
            .finish()
    }
}
