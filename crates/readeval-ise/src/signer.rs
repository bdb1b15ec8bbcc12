//! Request signing for the engine's WebSocket endpoint.
//!
//! The engine authenticates a connection by query parameters on the upgrade
//! URL. The signature is an HMAC-SHA256 over the host, the RFC 1123 date and
//! the request line, keyed with the API secret. A new URL is signed for every
//! connection attempt because the engine rejects stale dates.

use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use chrono::{DateTime, Utc};
use hmac::{Hmac, Mac};
use sha2::Sha256;
use url::Url;

use readeval_core::error::EvalError;

type HmacSha256 = Hmac<Sha256>;

/// Signing inputs. The secret never appears in `Debug` output.
#[derive(Clone)]
pub struct Credentials {
    pub app_id: String,
    pub api_key: String,
    pub api_secret: String,
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials")
            .field("app_id", &self.app_id)
            .field("api_key", &"***")
            .field("api_secret", &"***")
            .finish()
    }
}

/// Where to connect and what to sign.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Endpoint {
    /// Base URL without query, e.g. `ws://ise-api.xfyun.cn/v2/open-ise`.
    pub url: Url,
    /// Host named in the signature.
    pub host: String,
    /// Path named in the signed request line.
    pub path: String,
}

impl Endpoint {
    /// Parse a base URL, taking host and path from it unless overridden.
    pub fn parse(url: &str, host: Option<&str>, path: Option<&str>) -> Result<Self, EvalError> {
        let parsed =
            Url::parse(url).map_err(|e| EvalError::AuthFailure(format!("invalid engine url {url:?}: {e}")))?;
        let host = host
            .map(str::to_string)
            .or_else(|| parsed.host_str().map(str::to_string))
            .unwrap_or_default();
        let path = path.unwrap_or(parsed.path()).to_string();
        Ok(Self {
            url: parsed,
            host,
            path,
        })
    }
}

/// Produces signed connection URLs for one set of credentials.
#[derive(Debug, Clone)]
pub struct Signer {
    credentials: Credentials,
    endpoint: Endpoint,
}

impl Signer {
    /// Fails with `AuthFailure` if any signing input is empty.
    pub fn new(credentials: Credentials, endpoint: Endpoint) -> Result<Self, EvalError> {
        let missing = [
            ("app_id", credentials.app_id.as_str()),
            ("api_key", credentials.api_key.as_str()),
            ("api_secret", credentials.api_secret.as_str()),
            ("host", endpoint.host.as_str()),
        ]
        .into_iter()
        .filter(|(_, value)| value.trim().is_empty())
        .map(|(name, _)| name)
        .collect::<Vec<_>>();

        if !missing.is_empty() {
            return Err(EvalError::AuthFailure(format!(
                "missing signing inputs: {}",
                missing.join(", ")
            )));
        }

        Ok(Self {
            credentials,
            endpoint,
        })
    }

    pub fn app_id(&self) -> &str {
        &self.credentials.app_id
    }

    pub fn endpoint(&self) -> &Endpoint {
        &self.endpoint
    }

    /// The three signed lines joined by `\n`.
    pub fn canonical_string(&self, date: &str) -> String {
        format!(
            "host: {}\ndate: {}\nGET {} HTTP/1.1",
            self.endpoint.host, date, self.endpoint.path
        )
    }

    /// Signed connection URL for the given instant.
    pub fn signed_url(&self, now: DateTime<Utc>) -> Result<Url, EvalError> {
        let date = rfc1123(now);

        let mut mac = HmacSha256::new_from_slice(self.credentials.api_secret.as_bytes())
            .map_err(|e| EvalError::AuthFailure(format!("unusable api secret: {e}")))?;
        mac.update(self.canonical_string(&date).as_bytes());
        let signature = STANDARD.encode(mac.finalize().into_bytes());

        let descriptor = format!(
            r#"api_key="{}", algorithm="hmac-sha256", headers="host date request-line", signature="{}""#,
            self.credentials.api_key, signature
        );
        let authorization = STANDARD.encode(descriptor);

        let mut url = self.endpoint.url.clone();
        url.set_query(None);
        url.query_pairs_mut()
            .append_pair("authorization", &authorization)
            .append_pair("date", &date)
            .append_pair("host", &self.endpoint.host);
        Ok(url)
    }
}

/// HTTP date, e.g. `Tue, 07 Jan 2025 08:30:00 GMT`.
pub fn rfc1123(time: DateTime<Utc>) -> String {
    time.format("%a, %d %b %Y %H:%M:%S GMT").to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use std::collections::HashMap;

    fn credentials() -> Credentials {
        Credentials {
            app_id: "app123".into(),
            api_key: "key456".into(),
            api_secret: "secret789".into(),
        }
    }

    fn signer() -> Signer {
        let endpoint = Endpoint::parse("ws://ise-api.xfyun.cn/v2/open-ise", None, None).unwrap();
        Signer::new(credentials(), endpoint).unwrap()
    }

    fn fixed_time() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 1, 7, 8, 30, 0).unwrap()
    }

    fn query(url: &Url) -> HashMap<String, String> {
        url.query_pairs().into_owned().collect()
    }

    #[test]
    fn endpoint_defaults_from_url() {
        let endpoint = Endpoint::parse("wss://example.com:8443/v2/open-ise", None, None).unwrap();
        assert_eq!(endpoint.host, "example.com");
        assert_eq!(endpoint.path, "/v2/open-ise");

        let overridden =
            Endpoint::parse("ws://127.0.0.1:9000/ise", Some("ise-api.xfyun.cn"), Some("/v2/open-ise"))
                .unwrap();
        assert_eq!(overridden.host, "ise-api.xfyun.cn");
        assert_eq!(overridden.path, "/v2/open-ise");
    }

    #[test]
    fn date_format() {
        assert_eq!(rfc1123(fixed_time()), "Tue, 07 Jan 2025 08:30:00 GMT");
    }

    #[test]
    fn canonical_string_has_three_lines() {
        let s = signer().canonical_string("Tue, 07 Jan 2025 08:30:00 GMT");
        assert_eq!(
            s,
            "host: ise-api.xfyun.cn\ndate: Tue, 07 Jan 2025 08:30:00 GMT\nGET /v2/open-ise HTTP/1.1"
        );
    }

    #[test]
    fn query_parameters_in_order() {
        let url = signer().signed_url(fixed_time()).unwrap();
        let keys: Vec<String> = url.query_pairs().map(|(k, _)| k.into_owned()).collect();
        assert_eq!(keys, ["authorization", "date", "host"]);
        assert!(url.as_str().starts_with("ws://ise-api.xfyun.cn/v2/open-ise?authorization="));

        let q = query(&url);
        assert_eq!(q["date"], "Tue, 07 Jan 2025 08:30:00 GMT");
        assert_eq!(q["host"], "ise-api.xfyun.cn");
    }

    #[test]
    fn signature_verifies_with_secret() {
        let signer = signer();
        let url = signer.signed_url(fixed_time()).unwrap();
        let q = query(&url);

        let descriptor = String::from_utf8(STANDARD.decode(&q["authorization"]).unwrap()).unwrap();
        assert!(descriptor.starts_with(r#"api_key="key456", algorithm="hmac-sha256", headers="host date request-line", signature=""#));

        let signature = descriptor
            .rsplit("signature=\"")
            .next()
            .unwrap()
            .trim_end_matches('"');
        let signature = STANDARD.decode(signature).unwrap();

        let mut mac = HmacSha256::new_from_slice(b"secret789").unwrap();
        mac.update(signer.canonical_string(&q["date"]).as_bytes());
        mac.verify_slice(&signature).unwrap();
    }

    #[test]
    fn signing_is_deterministic_for_fixed_time() {
        let signer = signer();
        assert_eq!(
            signer.signed_url(fixed_time()).unwrap(),
            signer.signed_url(fixed_time()).unwrap()
        );
    }

    #[test]
    fn empty_inputs_are_auth_failures() {
        let endpoint = Endpoint::parse("ws://ise-api.xfyun.cn/v2/open-ise", None, None).unwrap();
        let mut creds = credentials();
        creds.api_secret = String::new();
        creds.app_id = " ".into();

        let err = Signer::new(creds, endpoint).unwrap_err();
        assert!(err.is_permanent());
        let msg = err.to_string();
        assert!(msg.contains("app_id") && msg.contains("api_secret"), "{msg}");
    }

    #[test]
    fn invalid_url_is_auth_failure() {
        let err = Endpoint::parse("not a url", None, None).unwrap_err();
        assert!(matches!(err, EvalError::AuthFailure(_)));
    }

    #[test]
    fn debug_masks_secrets() {
        let debug = format!("{:?}", credentials());
        assert!(!debug.contains("secret789"));
        assert!(!debug.contains("key456"));
        assert!(debug.contains("app123"));
    }
}
