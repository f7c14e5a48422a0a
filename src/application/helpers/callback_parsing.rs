//! Normalizes ToyyibPay callback payloads.
//!
//! The gateway is inconsistent about transport: the same callback may arrive as
//! JSON, as a form-encoded body, with a wrong or missing content type, or (on the
//! legacy path) as GET query parameters. Everything is reduced to one flat field
//! map first, then the known fields are lifted into [`CanonicalCallback`] while the
//! full map is kept for the audit log.

use serde_json::{Map, Value as JsonValue};

use crate::{
    app_error::{AppError, AppResult},
    domain::entities::gateway_status::GatewayOutcome,
};

/// A gateway callback reduced to the fields reconciliation needs.
#[derive(Debug, Clone, PartialEq)]
pub struct CanonicalCallback {
    pub bill_code: String,
    pub order_id: Option<String>,
    pub status: Option<String>,
    pub status_id: Option<String>,
    pub transaction_id: Option<String>,
    pub amount: Option<String>,
    /// Every field as received, including ones not lifted above.
    pub passthrough: Map<String, JsonValue>,
}

impl CanonicalCallback {
    pub fn from_fields(fields: Map<String, JsonValue>) -> AppResult<Self> {
        let bill_code = field(&fields, "billcode")
            .or_else(|| field(&fields, "bill_code"))
            .ok_or_else(|| AppError::InvalidInput("Missing bill code".into()))?;

        Ok(Self {
            bill_code,
            order_id: field(&fields, "order_id"),
            status: field(&fields, "status"),
            status_id: field(&fields, "status_id"),
            transaction_id: field(&fields, "transaction_id"),
            amount: field(&fields, "amount"),
            passthrough: fields,
        })
    }

    pub fn outcome(&self) -> GatewayOutcome {
        GatewayOutcome::from_callback(self.status.as_deref(), self.status_id.as_deref())
    }

    /// Callback amount in cents, if present and well-formed.
    pub fn amount_cents(&self) -> Option<i64> {
        self.amount.as_deref().and_then(parse_amount_cents)
    }

    pub fn raw_payload(&self) -> JsonValue {
        JsonValue::Object(self.passthrough.clone())
    }
}

/// Parse a callback from an HTTP request.
///
/// `GET` requests take their fields from `query`; everything else from `body`.
pub fn parse_callback(
    content_type: Option<&str>,
    method: &str,
    body: &[u8],
    query: Option<&str>,
) -> AppResult<CanonicalCallback> {
    let fields = if method.eq_ignore_ascii_case("GET") {
        parse_query_fields(query.unwrap_or_default())
    } else {
        parse_body_fields(content_type, body)
    }
    .ok_or_else(|| AppError::InvalidInput("Could not parse payload".into()))?;

    CanonicalCallback::from_fields(fields)
}

/// Reduce a request body to a field map.
///
/// A JSON content type is parsed strictly as JSON first. Any other (or missing)
/// content type, and a JSON body that fails to parse, falls through the chain
/// JSON -> form-urlencoded -> loose `key=value` / `key: value` splitting.
pub fn parse_body_fields(content_type: Option<&str>, body: &[u8]) -> Option<Map<String, JsonValue>> {
    let content_type = content_type.unwrap_or_default().to_ascii_lowercase();

    if content_type.contains("application/x-www-form-urlencoded") {
        return parse_form(body).or_else(|| parse_loose_pairs(body));
    }

    parse_json_object(body)
        .or_else(|| parse_form(body))
        .or_else(|| parse_loose_pairs(body))
}

pub fn parse_query_fields(query: &str) -> Option<Map<String, JsonValue>> {
    parse_form(query.as_bytes())
}

fn parse_json_object(body: &[u8]) -> Option<Map<String, JsonValue>> {
    match serde_json::from_slice::<JsonValue>(body) {
        Ok(JsonValue::Object(map)) if !map.is_empty() => Some(map),
        _ => None,
    }
}

fn parse_form(body: &[u8]) -> Option<Map<String, JsonValue>> {
    let pairs: Vec<(String, String)> = serde_urlencoded::from_bytes(body).ok()?;
    usable(pairs)
}

fn parse_loose_pairs(body: &[u8]) -> Option<Map<String, JsonValue>> {
    let text = std::str::from_utf8(body).ok()?;
    let pairs = text
        .split(['&', '\n', '\r', ';'])
        .filter_map(|piece| piece.split_once('=').or_else(|| piece.split_once(':')))
        .map(|(k, v)| (k.trim().to_string(), v.trim().to_string()))
        .collect();
    usable(pairs)
}

/// A pair list counts as a payload only if at least one pair has both a key and a value.
fn usable(pairs: Vec<(String, String)>) -> Option<Map<String, JsonValue>> {
    let map: Map<String, JsonValue> = pairs
        .into_iter()
        .filter(|(k, _)| !k.is_empty())
        .map(|(k, v)| (k, JsonValue::String(v)))
        .collect();

    let has_value = map
        .values()
        .any(|v| v.as_str().is_some_and(|s| !s.is_empty()));
    has_value.then_some(map)
}

/// Read a scalar field as a non-empty string. Numbers and booleans are stringified.
fn field(fields: &Map<String, JsonValue>, key: &str) -> Option<String> {
    let value = match fields.get(key)? {
        JsonValue::String(s) => s.trim().to_string(),
        JsonValue::Number(n) => n.to_string(),
        JsonValue::Bool(b) => b.to_string(),
        _ => return None,
    };
    (!value.is_empty()).then_some(value)
}

/// Parse a decimal amount such as `"50.00"` into cents.
pub fn parse_amount_cents(raw: &str) -> Option<i64> {
    let raw = raw.trim();
    let (whole, frac) = match raw.split_once('.') {
        Some((w, f)) => (w, f),
        None => (raw, ""),
    };

    if whole.is_empty() || !whole.chars().all(|c| c.is_ascii_digit()) {
        return None;
    }
    if frac.len() > 2 || !frac.chars().all(|c| c.is_ascii_digit()) {
        return None;
    }

    let whole: i64 = whole.parse().ok()?;
    let frac_cents: i64 = match frac.len() {
        0 => 0,
        1 => frac.parse::<i64>().ok()? * 10,
        _ => frac.parse().ok()?,
    };

    whole.checked_mul(100)?.checked_add(frac_cents)
}
