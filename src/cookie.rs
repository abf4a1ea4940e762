//! Cookie header translation and best-effort injection into the session

use crate::{CookieParam, Error, Result, Session};
use log::{debug, warn};
use std::collections::BTreeMap;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

/// Lifetime given to every injected cookie
pub const COOKIE_LIFETIME: Duration = Duration::from_secs(60 * 60);

/// Cookie name to value, as read from a raw `Cookie:` header
pub type CookieMap = BTreeMap<String, String>;

/// Parse a raw cookie header such as `"a=1; b=2"` into a [`CookieMap`].
///
/// Each `;`-separated segment is split on its first `=`, so values may
/// contain `=` themselves. Blank segments (e.g. a trailing `;`) are skipped.
/// A segment without `=` or with an empty name is a [`Error::ParseError`].
///
/// ```
/// let cookies = tss::cookie::parse_cookie_header("a=1; b=2").unwrap();
/// assert_eq!(cookies["a"], "1");
/// assert_eq!(cookies["b"], "2");
/// ```
pub fn parse_cookie_header(raw: &str) -> Result<CookieMap> {
    let mut cookies = CookieMap::new();
    if raw.trim().is_empty() {
        return Ok(cookies);
    }

    for (idx, segment) in raw.split(';').enumerate() {
        let segment = segment.trim();
        if segment.is_empty() {
            continue;
        }

        let (name, value) = segment.split_once('=').ok_or_else(|| {
            Error::ParseError(format!("segment {} ({:?}) has no '=' separator", idx, segment))
        })?;

        let name = name.trim();
        if name.is_empty() {
            return Err(Error::ParseError(format!("segment {} ({:?}) has an empty name", idx, segment)));
        }

        cookies.insert(name.to_string(), value.trim().to_string());
    }

    Ok(cookies)
}

/// Result of pushing one cookie into the browser
#[derive(Debug)]
pub struct CookieOutcome {
    pub name: String,
    pub result: Result<()>,
}

/// Set every cookie in `cookies` on the session, scoped to the host of `url`.
///
/// Injection is not transactional: a failing cookie is recorded in the
/// returned outcome list and the remaining cookies are still attempted. The
/// caller decides what to do with failures. An empty map is a no-op and the
/// URL is not inspected.
pub fn inject_cookies(session: &dyn Session, url: &str, cookies: &CookieMap) -> Result<Vec<CookieOutcome>> {
    if cookies.is_empty() {
        return Ok(Vec::new());
    }

    let domain = cookie_domain(url)?;
    let expires = expiry_from_now(COOKIE_LIFETIME);
    debug!("Injecting {} cookie(s) for {}", cookies.len(), domain);

    let outcomes = cookies
        .iter()
        .map(|(name, value)| {
            let param = CookieParam {
                name: name.clone(),
                value: value.clone(),
                domain: Some(domain.clone()),
                path: None,
                expires: Some(expires),
                http_only: false,
                secure: false,
            };
            CookieOutcome {
                name: name.clone(),
                result: session.set_cookie(&param),
            }
        })
        .collect();

    Ok(outcomes)
}

/// Log failed outcomes; returns how many cookies were rejected.
///
/// Failures are only surfaced at warn level when `debug` is set.
pub fn report_outcomes(outcomes: &[CookieOutcome], debug: bool) -> usize {
    let mut failed = 0;
    for outcome in outcomes {
        if let Err(e) = &outcome.result {
            failed += 1;
            if debug {
                warn!("Could not set cookie {:?}: {}", outcome.name, e);
            } else {
                debug!("Could not set cookie {:?}: {}", outcome.name, e);
            }
        }
    }
    failed
}

fn cookie_domain(raw_url: &str) -> Result<String> {
    let parsed = url::Url::parse(raw_url)
        .map_err(|e| Error::NavigationError(format!("Invalid URL {:?}: {}", raw_url, e)))?;
    parsed
        .host_str()
        .map(|h| h.to_string())
        .ok_or_else(|| Error::NavigationError(format!("URL {:?} has no host to scope cookies to", raw_url)))
}

fn expiry_from_now(lifetime: Duration) -> f64 {
    let now = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default();
    (now + lifetime).as_secs_f64()
}
