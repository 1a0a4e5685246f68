use tracing::debug;
use witness_core::TlsReceipt;
use witness_formats::http::RequestHead;

use crate::{
    http::{parse_url, request_target, HttpProviderParams},
    ErrorKind, HttpProviderConfig, ProviderError, ReceiptCheck,
};

const OK_STATUS_LINE: &[u8] = b"HTTP/1.1 200 OK";

/// Checks that a receipt supports a claim.
///
/// The checks are evaluated in the order of [`ReceiptCheck`] and the first
/// failure is returned.
pub(crate) fn assert_valid_provider_receipt(
    config: &HttpProviderConfig,
    receipt: &TlsReceipt,
    params: &HttpProviderParams,
) -> Result<(), ProviderError> {
    let request = receipt.client_request_data(config.redaction_char());
    let head = RequestHead::parse(&request)
        .map_err(|e| ProviderError::new(ErrorKind::Receipt(ReceiptCheck::Method), e))?;

    if !head.method.eq_ignore_ascii_case(params.method.as_str()) {
        return Err(ProviderError::receipt(
            ReceiptCheck::Method,
            format!("expected {}, found {:?}", params.method, head.method),
        ));
    }

    let url = parse_url(&params.url)?;

    let target = request_target(&url);
    if head.target != target {
        return Err(ProviderError::receipt(
            ReceiptCheck::Path,
            format!("expected {:?}, found {:?}", target, head.target),
        ));
    }

    let host_port = format!(
        "{}:{}",
        url.host_str().unwrap_or_default(),
        url.port().unwrap_or(config.default_port())
    );
    if receipt.host_port != host_port {
        return Err(ProviderError::receipt(
            ReceiptCheck::HostPort,
            format!("expected {:?}, found {:?}", host_port, receipt.host_port),
        ));
    }

    let response = receipt.visible_server_data();
    if !response
        .windows(OK_STATUS_LINE.len())
        .any(|window| window == OK_STATUS_LINE)
    {
        return Err(ProviderError::receipt(
            ReceiptCheck::Status,
            "response is not HTTP/1.1 200 OK",
        ));
    }

    if head.header("connection") != Some("close") {
        return Err(ProviderError::receipt(
            ReceiptCheck::ConnectionHeader,
            format!("expected close, found {:?}", head.header("connection")),
        ));
    }

    for (i, selection) in params.response_selections.iter().enumerate() {
        if !selection.response_match.is_match(&response) {
            return Err(ProviderError::receipt(
                ReceiptCheck::ResponseMatch(i),
                format!("{:?} does not match", selection.response_match.pattern()),
            ));
        }
    }

    debug!(
        "receipt from {} is valid for {} selections",
        receipt.host_port,
        params.response_selections.len()
    );

    Ok(())
}
