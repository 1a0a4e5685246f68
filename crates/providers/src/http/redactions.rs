use tracing::debug;
use witness_core::ByteRange;
use witness_formats::{html::locate_element, http::ParsedHttpResponse, json::locate_value};

use crate::{
    http::{HttpProviderParams, ResponseSelection},
    ErrorKind, ProviderError,
};

/// Returns the ranges of a raw response which are not needed to support a
/// claim.
///
/// The status line and headers are always revealed, as is every selected
/// element. Everything else is redacted.
pub(crate) fn response_redactions(
    response: &[u8],
    params: &HttpProviderParams,
) -> Result<Vec<ByteRange>, ProviderError> {
    if params.response_selections.is_empty() {
        return Ok(Vec::new());
    }

    let res = ParsedHttpResponse::parse(response)?;

    let mut reveals = vec![ByteRange::new(0, res.body_start_index)];
    for (i, selection) in params.response_selections.iter().enumerate() {
        let element = select(&res.body, selection)?;

        if !selection.response_match.is_match(&res.body[element.as_range()]) {
            return Err(ProviderError::new(
                ErrorKind::Match,
                format!(
                    "selection {} does not match {:?}",
                    i,
                    selection.response_match.pattern()
                ),
            ));
        }

        if element.is_empty() {
            continue;
        }

        reveals.push(res.raw_range(element));
    }

    if reveals.len() == 1 {
        debug!("no part of the body is selected, revealing everything");
        return Ok(Vec::new());
    }

    let reveals = merge(reveals);
    let redactions = complement(&reveals, response.len());

    debug!(
        "revealing {} ranges, redacting {} ranges",
        reveals.len(),
        redactions.len()
    );

    Ok(redactions)
}

/// Returns the range of the decoded body holding the selected element.
fn select(body: &[u8], selection: &ResponseSelection) -> Result<ByteRange, ProviderError> {
    let mut element = ByteRange::new(0, body.len());

    if let Some(x_path) = &selection.x_path {
        element = locate_element(body, x_path, selection.json_path.is_some())?;
    }

    if let Some(json_path) = &selection.json_path {
        let value = locate_value(&body[element.as_range()], json_path)?;
        element = ByteRange::new(
            element.from_index + value.from_index,
            element.from_index + value.to_index,
        );
    }

    Ok(element)
}

/// Sorts ranges and joins those which overlap or touch.
fn merge(mut ranges: Vec<ByteRange>) -> Vec<ByteRange> {
    ranges.sort_by_key(|range| (range.from_index, range.to_index));

    let mut merged: Vec<ByteRange> = Vec::with_capacity(ranges.len());
    for range in ranges {
        match merged.last_mut() {
            Some(last) if range.from_index <= last.to_index => {
                last.to_index = last.to_index.max(range.to_index);
            }
            _ => merged.push(range),
        }
    }

    merged
}

/// Returns the gaps between sorted, disjoint ranges within `[0, len)`.
fn complement(ranges: &[ByteRange], len: usize) -> Vec<ByteRange> {
    let mut gaps = Vec::new();
    let mut cursor = 0;

    for range in ranges {
        if cursor < range.from_index {
            gaps.push(ByteRange::new(cursor, range.from_index));
        }
        cursor = cursor.max(range.to_index);
    }

    if cursor < len {
        gaps.push(ByteRange::new(cursor, len));
    }

    gaps
}

#[cfg(test)]
mod tests {
    use rstest::rstest;

    use super::*;

    #[test]
    fn test_merge() {
        let merged = merge(vec![
            ByteRange::new(10, 12),
            ByteRange::new(0, 4),
            ByteRange::new(3, 6),
            ByteRange::new(12, 14),
        ]);

        assert_eq!(merged, vec![ByteRange::new(0, 6), ByteRange::new(10, 14)]);
    }

    #[rstest]
    #[case::gaps(&[(2, 4), (6, 7)], 10, &[(0, 2), (4, 6), (7, 10)])]
    #[case::full(&[(0, 10)], 10, &[])]
    #[case::leading(&[(0, 3)], 5, &[(3, 5)])]
    fn test_complement(
        #[case] ranges: &[(usize, usize)],
        #[case] len: usize,
        #[case] expected: &[(usize, usize)],
    ) {
        let ranges: Vec<_> = ranges.iter().map(|(a, b)| ByteRange::new(*a, *b)).collect();
        let expected: Vec<_> = expected.iter().map(|(a, b)| ByteRange::new(*a, *b)).collect();

        assert_eq!(complement(&ranges, len), expected);
    }

    #[test]
    fn test_select_json_within_html() {
        let body = br#"<html><body><script id="d">{"a":{"b":"x1"}}</script></body></html>"#;
        let selection: ResponseSelection = serde_json::from_str(
            r#"{"xPath":"//script[@id='d']","jsonPath":"a.b","responseMatch":"x\\d"}"#,
        )
        .unwrap();

        let element = select(body, &selection).unwrap();

        assert_eq!(&body[element.as_range()], br#""x1""#);
    }
}
