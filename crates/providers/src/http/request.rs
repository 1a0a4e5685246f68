use tracing::debug;
use witness_core::ByteRange;

use crate::{
    http::{host_port, parse_url, request_target, HttpProviderParams, HttpProviderSecretParams},
    CreateRequestResult, HttpProviderConfig, ProviderError,
};

/// Builds the request for a claim.
///
/// The lines holding the secrets are laid out next to each other so a single
/// redaction covers all of them.
pub(crate) fn create_request(
    config: &HttpProviderConfig,
    secret_params: &HttpProviderSecretParams,
    params: &HttpProviderParams,
) -> Result<CreateRequestResult, ProviderError> {
    let mut auth = Vec::with_capacity(2);
    if let Some(cookie) = secret_params.cookie_str.as_deref().filter(|s| !s.is_empty()) {
        auth.push(format!("Cookie: {}", cookie));
    }
    if let Some(authorisation) = secret_params
        .authorisation_header
        .as_deref()
        .filter(|s| !s.is_empty())
    {
        auth.push(format!("Authorization: {}", authorisation));
    }

    if auth.is_empty() {
        return Err(ProviderError::validation(
            "neither a cookie nor an authorisation header is set",
        ));
    }

    for (name, value) in &params.headers {
        if name.is_empty() || name.contains(':') {
            return Err(ProviderError::validation(format!(
                "invalid header name {:?}",
                name
            )));
        }
        check_line(name)?;
        check_line(value)?;
    }
    for line in &auth {
        check_line(line)?;
    }

    let url = parse_url(&params.url)?;

    let mut lines = vec![
        format!("{} {} HTTP/1.1", params.method, request_target(&url)),
        format!("Host: {}", host_port(&url)?),
    ];
    lines.extend(
        params
            .headers
            .iter()
            .map(|(name, value)| format!("{}: {}", name, value)),
    );

    let auth_start: usize = lines.iter().map(|line| line.len() + 2).sum();
    let auth_len = auth.join("\r\n").len();

    lines.extend(auth);
    lines.extend([
        "Content-Length: 0".to_string(),
        "Connection: close".to_string(),
        format!("User-Agent: {}", config.user_agent()),
        "accept-encoding: identity".to_string(),
        "\r\n".to_string(),
    ]);

    let data = lines.join("\r\n").into_bytes();
    let redaction = ByteRange::new(auth_start, auth_start + auth_len);

    debug!(
        "created request of {} bytes, redacting {}",
        data.len(),
        redaction
    );

    Ok(CreateRequestResult {
        data,
        redactions: vec![redaction],
    })
}

fn check_line(value: &str) -> Result<(), ProviderError> {
    if value.contains(['\r', '\n']) {
        return Err(ProviderError::validation(
            "header must not contain line breaks",
        ));
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::ErrorKind;

    fn params(url: &str) -> HttpProviderParams {
        serde_json::from_value(json!({
            "url": url,
            "method": "GET",
            "responseSelections": [{ "responseMatch": "ok" }],
        }))
        .unwrap()
    }

    fn cookie(cookie: &str) -> HttpProviderSecretParams {
        HttpProviderSecretParams {
            cookie_str: Some(cookie.to_string()),
            authorisation_header: None,
        }
    }

    #[test]
    fn test_cookie_redaction() {
        let config = HttpProviderConfig::default();
        let req = create_request(&config, &cookie("sid=abc"), &params("https://example.com/"))
            .unwrap();

        let text = String::from_utf8(req.data).unwrap();
        let start = text.find("Cookie:").unwrap();

        assert_eq!(
            req.redactions,
            vec![ByteRange::new(start, start + "Cookie: sid=abc".len())]
        );
        assert_eq!(
            text,
            format!(
                "GET / HTTP/1.1\r\n\
                 Host: example.com\r\n\
                 Cookie: sid=abc\r\n\
                 Content-Length: 0\r\n\
                 Connection: close\r\n\
                 User-Agent: {}\r\n\
                 accept-encoding: identity\r\n\r\n",
                config.user_agent()
            )
        );
    }

    #[test]
    fn test_redaction_covers_both_secrets() {
        let mut params = params("https://example.com:8443/api/me?full=1");
        params.headers.insert("Accept".into(), "application/json".into());
        let secrets = HttpProviderSecretParams {
            cookie_str: Some("sid=abc".to_string()),
            authorisation_header: Some("Bearer t0k3n".to_string()),
        };

        let req = create_request(&HttpProviderConfig::default(), &secrets, &params).unwrap();
        let text = String::from_utf8(req.data.clone()).unwrap();

        assert!(text.starts_with(
            "GET /api/me?full=1 HTTP/1.1\r\nHost: example.com:8443\r\nAccept: application/json\r\n"
        ));
        assert_eq!(req.redactions.len(), 1);
        assert_eq!(
            &req.data[req.redactions[0].as_range()],
            b"Cookie: sid=abc\r\nAuthorization: Bearer t0k3n"
        );
    }

    #[test]
    fn test_missing_auth() {
        let secrets = HttpProviderSecretParams {
            cookie_str: Some(String::new()),
            authorisation_header: None,
        };

        let err = create_request(
            &HttpProviderConfig::default(),
            &secrets,
            &params("https://example.com/"),
        )
        .unwrap_err();

        assert_eq!(err.kind(), ErrorKind::Validation);
    }

    #[test]
    fn test_header_injection_is_rejected() {
        let config = HttpProviderConfig::default();

        let mut injected = params("https://example.com/");
        injected
            .headers
            .insert("X-Test".into(), "a\r\nConnection: keep-alive".into());
        let err = create_request(&config, &cookie("sid=abc"), &injected).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Validation);

        let err = create_request(
            &config,
            &cookie("sid=abc\r\nX: y"),
            &params("https://example.com/"),
        )
        .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Validation);
    }
}
