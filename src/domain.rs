//! Domain canonicalization and signature helpers

use regex::Regex;
use std::sync::OnceLock;
use url::Url;

use crate::model::{Automation, Category};

/// Separator between domains in a signature
pub const SIGNATURE_SEPARATOR: &str = " → ";

/// URL prefixes that belong to the browser itself and are never recorded
const INTERNAL_PREFIXES: &[&str] = &["chrome://", "chrome-extension://", "edge://", "about:"];

fn domain_regex() -> &'static Regex {
    static DOMAIN_RE: OnceLock<Regex> = OnceLock::new();
    DOMAIN_RE.get_or_init(|| {
        Regex::new(r"(?i)^([a-z0-9]+(-[a-z0-9]+)*\.)+[a-z]{2,}$").expect("static domain regex")
    })
}

/// Lowercase a domain and strip a leading `www.`
///
/// Full `http(s)://` URLs are reduced to their host first.
pub fn normalize_domain(input: &str) -> String {
    let trimmed = input.trim();
    if trimmed.is_empty() {
        return String::new();
    }

    let host = if trimmed.starts_with("http://") || trimmed.starts_with("https://") {
        Url::parse(trimmed)
            .ok()
            .and_then(|u| u.host_str().map(str::to_string))
            .unwrap_or_else(|| trimmed.to_string())
    } else {
        trimmed.to_string()
    };

    let lower = host.to_lowercase();
    match lower.strip_prefix("www.") {
        Some(rest) => rest.to_string(),
        None => lower,
    }
}

/// Extract the normalized host of a URL, or `None` if it does not parse
pub fn extract_domain(url: &str) -> Option<String> {
    let parsed = Url::parse(url).ok()?;
    let host = parsed.host_str()?;
    Some(normalize_domain(host))
}

/// Drop query string and fragment so nothing sensitive ends up in the log
pub fn sanitize_url(url: &str) -> String {
    match Url::parse(url) {
        Ok(parsed) => match parsed.host_str() {
            Some(host) => format!("{}://{}{}", parsed.scheme(), host, parsed.path()),
            None => url.to_string(),
        },
        Err(_) => url.to_string(),
    }
}

pub fn is_internal_url(url: &str) -> bool {
    INTERNAL_PREFIXES.iter().any(|p| url.starts_with(p))
}

pub fn is_valid_domain(domain: &str) -> bool {
    domain_regex().is_match(domain)
}

/// Normalize and validate a user-supplied domain
pub fn validate_domain(input: &str) -> Option<String> {
    let normalized = normalize_domain(input);
    is_valid_domain(&normalized).then_some(normalized)
}

/// Turn an action domain into something a tab can open
pub fn to_open_url(domain: &str) -> String {
    if domain.starts_with("http") {
        domain.to_string()
    } else {
        format!("https://{}", domain)
    }
}

pub fn signature<S: AsRef<str>>(domains: &[S]) -> String {
    domains
        .iter()
        .map(|d| d.as_ref())
        .collect::<Vec<_>>()
        .join(SIGNATURE_SEPARATOR)
}

pub fn reverse_signature<S: AsRef<str>>(domains: &[S]) -> String {
    domains
        .iter()
        .rev()
        .map(|d| d.as_ref())
        .collect::<Vec<_>>()
        .join(SIGNATURE_SEPARATOR)
}

/// Canonical signature of an automation: normalized trigger followed by actions
pub fn automation_signature(automation: &Automation) -> String {
    let mut domains = Vec::with_capacity(automation.actions.len() + 1);
    domains.push(normalize_domain(&automation.trigger.domain));
    domains.extend(automation.actions.iter().map(|a| normalize_domain(&a.domain)));
    signature(&domains)
}

/// Guess a category from keywords in the domain
pub fn category_for_domain(domain: &str) -> Category {
    let lower = domain.to_lowercase();
    let has = |keys: &[&str]| keys.iter().any(|k| lower.contains(k));

    if has(&["slack", "teams", "zoom", "meet"]) {
        Category::Work
    } else if has(&["facebook", "twitter", "instagram", "linkedin"]) {
        Category::Social
    } else if has(&["youtube", "netflix", "spotify", "twitch"]) {
        Category::Entertainment
    } else if has(&["amazon", "ebay", "shop", "store"]) {
        Category::Shopping
    } else if has(&["news", "cnn", "bbc", "nytimes"]) {
        Category::News
    } else if has(&["edu", "coursera", "udemy", "khan"]) {
        Category::Education
    } else {
        Category::Other
    }
}

/// Human sentence for a domain sequence
pub fn describe(domains: &[String]) -> String {
    match domains {
        [] => String::new(),
        [only] => format!("When you visit {}", only),
        [first, second] => format!("When you visit {}, you then open {}", first, second),
        [first, second, third] => format!(
            "When you visit {}, you then open {} and {}",
            first, second, third
        ),
        [first, middle @ .., last] => format!(
            "When you visit {}, you then open {}, and {}",
            first,
            middle.join(", "),
            last
        ),
    }
}
