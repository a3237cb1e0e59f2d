//! Best-effort PII masking for text that leaves the process.
//!
//! Only the copy sent to the AI gateway is redacted; stored history keeps the
//! user's original words. The patterns are heuristics and will miss some
//! formats (international phone numbers, emails with unusual TLDs, SSNs
//! written without dashes).

use std::sync::LazyLock;

use regex::Regex;

pub const EMAIL_PLACEHOLDER: &str = "[REDACTED_EMAIL]";
pub const PHONE_PLACEHOLDER: &str = "[REDACTED_PHONE]";
pub const SSN_PLACEHOLDER: &str = "[REDACTED_SSN]";

static EMAIL_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\b[A-Za-z0-9._%+-]+@[A-Za-z0-9.-]+\.[A-Za-z]{2,}\b").expect("valid email regex")
});
static PHONE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\(?\d{3}\)?[-.\s]?\d{3}[-.\s]?\d{4}").expect("valid phone regex")
});
static SSN_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\b\d{3}-\d{2}-\d{4}\b").expect("valid ssn regex"));

/// Mask emails, then phone numbers, then SSNs.
pub fn redact_pii(text: &str) -> String {
    let text = EMAIL_RE.replace_all(text, EMAIL_PLACEHOLDER);
    let text = PHONE_RE.replace_all(&text, PHONE_PLACEHOLDER);
    SSN_RE.replace_all(&text, SSN_PLACEHOLDER).into_owned()
}
