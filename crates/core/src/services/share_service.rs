use std::cmp::Ordering;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::models::portfolio::PortfolioEntry;
use crate::models::token::Token;

/// Portfolio entries carried by a share link.
pub const SHARE_LINK_ENTRIES: usize = 10;

/// Logo used for tokens that are not in the default catalog.
pub const PLACEHOLDER_LOGO: &str = "/placeholder.svg";

/// One entry decoded from a share link.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SharedEntry {
    pub token: Token,
    pub percentage: f64,
    /// `true` if the symbol was not found in the default catalog
    pub custom: bool,
}

/// Encodes the top of a portfolio into a query string and back.
///
/// Layout: `t1=BTC&s1=45.20&t2=ETH&s2=30.10&...`. A symbol missing from the
/// default catalog also carries its display name under a parameter named by
/// the symbol itself (`MYTOKEN=My%20Token`).
pub struct ShareService;

impl ShareService {
    pub fn new() -> Self {
        Self
    }

    /// Build the query string (without the leading `?`).
    pub fn encode_query(&self, portfolio: &[PortfolioEntry], default_catalog: &[Token]) -> String {
        let mut params: Vec<(String, String)> = Vec::new();

        for (i, entry) in portfolio.iter().take(SHARE_LINK_ENTRIES).enumerate() {
            let n = i + 1;
            let symbol = &entry.token.symbol;
            params.push((format!("t{n}"), symbol.clone()));
            params.push((format!("s{n}"), format!("{:.2}", entry.percentage)));

            if !default_catalog.iter().any(|t| &t.symbol == symbol) {
                params.push((symbol.clone(), entry.token.name.clone()));
            }
        }

        params
            .iter()
            .map(|(k, v)| format!("{}={}", percent_encode(k), percent_encode(v)))
            .collect::<Vec<_>>()
            .join("&")
    }

    /// Read entries `t1/s1, t2/s2, ...` until a pair is missing, largest
    /// share first.
    ///
    /// A percentage is read from the leading number of its value, so `12.5%`
    /// reads as 12.5. Entries with an empty symbol or no leading number are
    /// skipped without ending the scan.
    pub fn decode_query(&self, query: &str, default_catalog: &[Token]) -> Vec<SharedEntry> {
        let params = parse_query(query);

        let mut entries = Vec::new();
        let mut n = 1;
        while let (Some(symbol), Some(share)) = (
            lookup(&params, &format!("t{n}")),
            lookup(&params, &format!("s{n}")),
        ) {
            let percentage = parse_leading_number(share).filter(|p| p.is_finite());

            match percentage {
                Some(percentage) if !symbol.is_empty() => {
                    let entry = match default_catalog.iter().find(|t| t.symbol == symbol) {
                        Some(token) => SharedEntry {
                            token: token.clone(),
                            percentage,
                            custom: false,
                        },
                        None => SharedEntry {
                            token: Token::new(
                                format!("custom-{n}"),
                                lookup(&params, symbol).unwrap_or(symbol),
                                symbol,
                                PLACEHOLDER_LOGO,
                                0.0,
                            ),
                            percentage,
                            custom: true,
                        },
                    };
                    entries.push(entry);
                }
                _ => debug!(index = n, "skipping malformed share entry"),
            }
            n += 1;
        }

        entries.sort_by(|a, b| {
            b.percentage
                .partial_cmp(&a.percentage)
                .unwrap_or(Ordering::Equal)
        });
        entries
    }
}

impl Default for ShareService {
    fn default() -> Self {
        Self::new()
    }
}

/// Split `a=1&b=2` into decoded key/value pairs. A leading `?` is ignored
/// and `+` reads as a space, as in HTML form encoding.
fn parse_query(query: &str) -> Vec<(String, String)> {
    let decode = |s: &str| percent_decode(&s.replace('+', " "));
    query
        .trim_start_matches('?')
        .split('&')
        .filter(|part| !part.is_empty())
        .map(|part| match part.split_once('=') {
            Some((k, v)) => (decode(k), decode(v)),
            None => (decode(part), String::new()),
        })
        .collect()
}

/// Longest numeric prefix after leading whitespace: optional sign, digits
/// with an optional fraction, optional exponent. Trailing text is ignored.
fn parse_leading_number(s: &str) -> Option<f64> {
    let s = s.trim_start();
    let bytes = s.as_bytes();
    let digits_from = |mut i: usize| {
        while i < bytes.len() && bytes[i].is_ascii_digit() {
            i += 1;
        }
        i
    };

    let mut end = usize::from(matches!(bytes.first(), Some(b'+' | b'-')));
    let int_end = digits_from(end);
    let mut has_digits = int_end > end;
    end = int_end;

    if bytes.get(end) == Some(&b'.') {
        let frac_end = digits_from(end + 1);
        if has_digits || frac_end > end + 1 {
            has_digits = true;
            end = frac_end;
        }
    }
    if !has_digits {
        return None;
    }

    if matches!(bytes.get(end), Some(b'e' | b'E')) {
        let sign = usize::from(matches!(bytes.get(end + 1), Some(b'+' | b'-')));
        let exp_end = digits_from(end + 1 + sign);
        if exp_end > end + 1 + sign {
            end = exp_end;
        }
    }

    s[..end].parse().ok()
}

fn lookup<'a>(params: &'a [(String, String)], key: &str) -> Option<&'a str> {
    params
        .iter()
        .find(|(k, _)| k == key)
        .map(|(_, v)| v.as_str())
}

/// Percent-encode everything outside the URL-unreserved set.
fn percent_encode(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for b in s.bytes() {
        match b {
            b'A'..=b'Z' | b'a'..=b'z' | b'0'..=b'9' | b'-' | b'_' | b'.' | b'~' => {
                out.push(b as char)
            }
            _ => out.push_str(&format!("%{b:02X}")),
        }
    }
    out
}

/// Decode `%XX` escapes. Broken escapes pass through as-is.
pub(crate) fn percent_decode(s: &str) -> String {
    let bytes = s.as_bytes();
    let mut out = Vec::with_capacity(bytes.len());
    let mut i = 0;
    while i < bytes.len() {
        match bytes[i] {
            b'%' if i + 2 < bytes.len() => {
                let hex = std::str::from_utf8(&bytes[i + 1..i + 3]).ok();
                match hex.and_then(|h| u8::from_str_radix(h, 16).ok()) {
                    Some(v) => {
                        out.push(v);
                        i += 3;
                    }
                    None => {
                        out.push(b'%');
                        i += 1;
                    }
                }
            }
            b => {
                out.push(b);
                i += 1;
            }
        }
    }
    String::from_utf8_lossy(&out).into_owned()
}
