//! ToyyibPay status vocabulary.
//!
//! The gateway reports outcomes as numeric codes: `1` = success, `3` = failed,
//! anything else (`0`, `2`, missing) = still pending. Depending on the API the
//! code arrives as a JSON string or a JSON number (integer or integral float),
//! so all of those forms are accepted.
//! The webhook and the status poller classify through this module so they can
//! never disagree about the same code.

use serde::{Deserialize, Deserializer, Serialize};

pub const SUCCESS_CODE: i64 = 1;
pub const FAILED_CODE: i64 = 3;

/// A raw status code as delivered by the gateway.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum GatewayStatusCode {
    Number(i64),
    Text(String),
}

impl<'de> Deserialize<'de> for GatewayStatusCode {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Raw {
            Int(i64),
            Float(f64),
            Text(String),
        }

        Ok(match Raw::deserialize(deserializer)? {
            Raw::Int(n) => GatewayStatusCode::Number(n),
            // `1.0` is the same code as `1`.
            Raw::Float(f) if f.is_finite() && f.fract() == 0.0 => {
                GatewayStatusCode::Number(f as i64)
            }
            Raw::Float(f) => GatewayStatusCode::Text(f.to_string()),
            Raw::Text(s) => GatewayStatusCode::Text(s),
        })
    }
}

impl GatewayStatusCode {
    /// Status used when the gateway has no transaction for a bill yet.
    pub fn pending() -> Self {
        GatewayStatusCode::Text("pending".to_string())
    }

    fn is_code(&self, code: i64) -> bool {
        match self {
            GatewayStatusCode::Number(n) => *n == code,
            GatewayStatusCode::Text(s) => s == &code.to_string(),
        }
    }

    pub fn is_successful(&self) -> bool {
        self.is_code(SUCCESS_CODE)
    }

    pub fn is_failed(&self) -> bool {
        self.is_code(FAILED_CODE)
    }

    pub fn outcome(&self) -> GatewayOutcome {
        if self.is_successful() {
            GatewayOutcome::Successful
        } else if self.is_failed() {
            GatewayOutcome::Failed
        } else {
            GatewayOutcome::Pending
        }
    }
}

impl Default for GatewayStatusCode {
    fn default() -> Self {
        GatewayStatusCode::pending()
    }
}

impl From<&str> for GatewayStatusCode {
    fn from(s: &str) -> Self {
        GatewayStatusCode::Text(s.to_string())
    }
}

impl From<i64> for GatewayStatusCode {
    fn from(n: i64) -> Self {
        GatewayStatusCode::Number(n)
    }
}

impl std::fmt::Display for GatewayStatusCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            GatewayStatusCode::Number(n) => write!(f, "{}", n),
            GatewayStatusCode::Text(s) => write!(f, "{}", s),
        }
    }
}

/// Classified payment outcome.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GatewayOutcome {
    Successful,
    Failed,
    Pending,
}

impl GatewayOutcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            GatewayOutcome::Successful => "successful",
            GatewayOutcome::Failed => "failed",
            GatewayOutcome::Pending => "pending",
        }
    }

    pub fn is_terminal(&self) -> bool {
        !matches!(self, GatewayOutcome::Pending)
    }

    /// Classify a callback from its `status` word and `status_id` code.
    ///
    /// Success needs both `status == "success"` (any case) and `status_id == "1"`.
    /// Failure needs either `status_id == "3"` or `status == "failed"`.
    pub fn from_callback(status: Option<&str>, status_id: Option<&str>) -> Self {
        let status_word = status.map(str::to_ascii_lowercase);
        let code = status_id.map(GatewayStatusCode::from);

        let code_is = |f: fn(&GatewayStatusCode) -> bool| code.as_ref().is_some_and(f);

        if status_word.as_deref() == Some("success") && code_is(GatewayStatusCode::is_successful)
        {
            GatewayOutcome::Successful
        } else if code_is(GatewayStatusCode::is_failed) || status_word.as_deref() == Some("failed")
        {
            GatewayOutcome::Failed
        } else {
            GatewayOutcome::Pending
        }
    }
}

impl std::fmt::Display for GatewayOutcome {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn success_accepts_string_and_number() {
        assert!(GatewayStatusCode::from("1").is_successful());
        assert!(GatewayStatusCode::from(1i64).is_successful());
        assert!(!GatewayStatusCode::from("3").is_successful());
        assert!(!GatewayStatusCode::from("01").is_successful());
        assert!(!GatewayStatusCode::pending().is_successful());
    }

    #[test]
    fn failure_accepts_string_and_number() {
        assert!(GatewayStatusCode::from("3").is_failed());
        assert!(GatewayStatusCode::from(3i64).is_failed());
        assert!(!GatewayStatusCode::from("1").is_failed());
        assert!(!GatewayStatusCode::from(0i64).is_failed());
    }

    #[test]
    fn other_codes_are_pending() {
        for code in [
            GatewayStatusCode::from("0"),
            GatewayStatusCode::from("2"),
            GatewayStatusCode::from(4i64),
            GatewayStatusCode::from(""),
            GatewayStatusCode::pending(),
        ] {
            assert_eq!(code.outcome(), GatewayOutcome::Pending, "code {code}");
        }
    }

    #[test]
    fn deserializes_both_json_forms() {
        let n: GatewayStatusCode = serde_json::from_str("1").unwrap();
        let s: GatewayStatusCode = serde_json::from_str("\"1\"").unwrap();
        assert_eq!(n.outcome(), GatewayOutcome::Successful);
        assert_eq!(s.outcome(), GatewayOutcome::Successful);
    }

    #[test]
    fn integral_floats_are_codes() {
        let paid: GatewayStatusCode = serde_json::from_str("1.0").unwrap();
        let failed: GatewayStatusCode = serde_json::from_str("3.0").unwrap();
        let odd: GatewayStatusCode = serde_json::from_str("1.5").unwrap();

        assert_eq!(paid, GatewayStatusCode::Number(1));
        assert_eq!(paid.outcome(), GatewayOutcome::Successful);
        assert_eq!(failed.outcome(), GatewayOutcome::Failed);
        assert_eq!(odd.outcome(), GatewayOutcome::Pending);
    }

    #[test]
    fn callback_success_requires_word_and_code() {
        assert_eq!(
            GatewayOutcome::from_callback(Some("SUCCESS"), Some("1")),
            GatewayOutcome::Successful
        );
        assert_eq!(
            GatewayOutcome::from_callback(None, Some("1")),
            GatewayOutcome::Pending
        );
        assert_eq!(
            GatewayOutcome::from_callback(Some("success"), Some("2")),
            GatewayOutcome::Pending
        );
    }

    #[test]
    fn callback_failure_on_either_signal() {
        assert_eq!(
            GatewayOutcome::from_callback(None, Some("3")),
            GatewayOutcome::Failed
        );
        assert_eq!(
            GatewayOutcome::from_callback(Some("Failed"), None),
            GatewayOutcome::Failed
        );
    }

    #[test]
    fn webhook_and_poller_agree_on_each_code() {
        // The gateway pairs each code with its status word.
        let cases = [("1", "success"), ("3", "failed"), ("0", "pending"), ("2", "pending")];
        for (code, word) in cases {
            let poller = GatewayStatusCode::from(code).outcome();
            let webhook = GatewayOutcome::from_callback(Some(word), Some(code));
            assert_eq!(poller, webhook, "code {code}");
        }
    }
}
