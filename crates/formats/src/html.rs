//! Locating elements in HTML text.
//!
//! Elements are selected with a restricted XPath-like [`HtmlPath`]:
//!
//! - steps are separated by `/`, a `//` separator selects descendants,
//! - a path starting with `/` is absolute, otherwise its first step may
//!   match anywhere in the document,
//! - a step is `*` or a tag name, followed by any number of `.class`
//!   filters and `[..]` predicates, either a 1-based position `[2]` or an
//!   attribute test `[@id]` / `[@id='main']`,
//! - a final `text()` step selects the content of the element rather than
//!   the element itself.
//!
//! Tag names match ASCII case-insensitively and the first match in document
//! order wins. The tokenizer is forgiving, in the way browsers are: it knows
//! about comments, void and self-closing elements, raw text elements such as
//! `<script>`, and elements which are closed implicitly.

use std::str::FromStr;

use tracing::debug;
use witness_core::ByteRange;

const VOID_ELEMENTS: &[&str] = &[
    "area", "base", "br", "col", "embed", "hr", "img", "input", "link", "meta", "param", "source",
    "track", "wbr",
];

const RAW_TEXT_ELEMENTS: &[&str] = &["script", "style", "textarea", "title"];

const BLOCK_ELEMENTS: &[&str] = &[
    "address", "article", "aside", "blockquote", "div", "dl", "fieldset", "footer", "form", "h1",
    "h2", "h3", "h4", "h5", "h6", "header", "hr", "main", "nav", "ol", "p", "pre", "section",
    "table", "ul",
];

/// Returns the range of the source text holding the element at `path`.
///
/// The range covers the element from its opening tag through its closing tag.
/// If `as_text` is set, or the path ends with `text()`, the range only covers
/// the content between the tags.
pub fn locate_element(src: &[u8], path: &str, as_text: bool) -> Result<ByteRange, HtmlError> {
    let path: HtmlPath = path.parse()?;
    let doc = Document::parse(src);

    let element = doc
        .select(&path)
        .map(|id| &doc.elements[id])
        .ok_or_else(|| HtmlError::new(ErrorKind::ElementNotFound, "no element matches path"))?;

    let (start, end) = if as_text || path.selects_text() {
        element.inner
    } else {
        element.outer
    };

    debug!("located <{}> at {}..{}", element.name, start, end);

    Ok(ByteRange::new(start, end))
}

/// A parsed element path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HtmlPath {
    steps: Vec<Step>,
    text: bool,
}

impl HtmlPath {
    /// Returns `true` if the path selects the content of the element.
    pub fn selects_text(&self) -> bool {
        self.text
    }
}

impl FromStr for HtmlPath {
    type Err = HtmlError;

    fn from_str(path: &str) -> Result<Self, Self::Err> {
        let path = path.trim();

        let (rest, mut axis) = if let Some(rest) = path.strip_prefix("//") {
            (rest, Axis::Descendant)
        } else if let Some(rest) = path.strip_prefix('/') {
            (rest, Axis::Child)
        } else if let Some(rest) = path.strip_prefix(".//") {
            (rest, Axis::Descendant)
        } else {
            (path.strip_prefix("./").unwrap_or(path), Axis::Descendant)
        };

        let segments = split_segments(rest)?;
        let mut steps = Vec::new();
        let mut text = false;

        for (i, segment) in segments.iter().enumerate() {
            if text {
                return Err(HtmlError::invalid_path("text() must be the last step"));
            }

            if segment.is_empty() {
                if i == 0 || axis == Axis::Descendant {
                    return Err(HtmlError::invalid_path("empty step"));
                }
                axis = Axis::Descendant;
                continue;
            }

            if *segment == "text()" {
                if steps.is_empty() {
                    return Err(HtmlError::invalid_path("text() requires an element"));
                }
                text = true;
                continue;
            }

            steps.push(Step::parse(segment, axis)?);
            axis = Axis::Child;
        }

        if steps.is_empty() || axis == Axis::Descendant {
            return Err(HtmlError::invalid_path("path selects no element"));
        }

        Ok(Self { steps, text })
    }
}

/// Splits a path on `/`, ignoring separators inside predicates.
fn split_segments(path: &str) -> Result<Vec<&str>, HtmlError> {
    let mut segments = Vec::new();
    let mut depth = 0usize;
    let mut quote = None;
    let mut start = 0;

    for (i, c) in path.char_indices() {
        match (c, quote) {
            ('\'' | '"', None) if depth > 0 => quote = Some(c),
            (c, Some(q)) if c == q => quote = None,
            (_, Some(_)) => {}
            ('[', None) => depth += 1,
            (']', None) => {
                depth = depth
                    .checked_sub(1)
                    .ok_or_else(|| HtmlError::invalid_path("unbalanced ']'"))?
            }
            ('/', None) if depth == 0 => {
                segments.push(&path[start..i]);
                start = i + 1;
            }
            _ => {}
        }
    }

    if depth != 0 || quote.is_some() {
        return Err(HtmlError::invalid_path("unterminated predicate"));
    }

    segments.push(&path[start..]);

    Ok(segments)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Axis {
    Child,
    Descendant,
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct Step {
    axis: Axis,
    /// Lower-cased tag name, `None` matches any element.
    name: Option<String>,
    classes: Vec<String>,
    attributes: Vec<(String, Option<String>)>,
    /// 1-based position among the matching children of a node.
    position: Option<usize>,
}

impl Step {
    fn parse(segment: &str, axis: Axis) -> Result<Self, HtmlError> {
        let (head, mut predicates) = segment.split_at(segment.find('[').unwrap_or(segment.len()));

        let mut parts = head.split('.');
        let name = match parts.next() {
            Some("*") => None,
            Some(name) if is_name(name) => Some(name.to_ascii_lowercase()),
            _ => return Err(HtmlError::invalid_path(format!("invalid step {:?}", segment))),
        };

        let classes = parts
            .map(|class| {
                if class.is_empty() {
                    Err(HtmlError::invalid_path(format!("empty class in {:?}", segment)))
                } else {
                    Ok(class.to_string())
                }
            })
            .collect::<Result<Vec<_>, _>>()?;

        let mut attributes = Vec::new();
        let mut position = None;
        while !predicates.is_empty() {
            let end = predicates
                .strip_prefix('[')
                .and_then(|rest| rest.find(']'))
                .ok_or_else(|| {
                    HtmlError::invalid_path(format!("invalid predicate in {:?}", segment))
                })?;
            let predicate = predicates[1..end + 1].trim();
            predicates = &predicates[end + 2..];

            if let Some(attribute) = predicate.strip_prefix('@') {
                attributes.push(parse_attribute_test(attribute)?);
            } else {
                match predicate.parse::<usize>() {
                    Ok(n) if n > 0 && position.is_none() => position = Some(n),
                    _ => {
                        return Err(HtmlError::invalid_path(format!(
                            "invalid position {:?}",
                            predicate
                        )))
                    }
                }
            }
        }

        Ok(Self {
            axis,
            name,
            classes,
            attributes,
            position,
        })
    }

    fn matches(&self, element: &Element) -> bool {
        (self.name.is_none() || self.name.as_deref() == Some(element.name.as_str()))
            && self
                .classes
                .iter()
                .all(|class| element.classes().any(|c| c == class))
            && self.attributes.iter().all(|(name, value)| {
                element.attribute(name).is_some_and(|actual| match value {
                    Some(value) => actual == Some(value.as_str()),
                    None => true,
                })
            })
    }
}

fn parse_attribute_test(test: &str) -> Result<(String, Option<String>), HtmlError> {
    let Some((name, value)) = test.split_once('=') else {
        return if is_name(test.trim()) {
            Ok((test.trim().to_ascii_lowercase(), None))
        } else {
            Err(HtmlError::invalid_path(format!("invalid attribute {:?}", test)))
        };
    };

    let name = name.trim();
    let value = value.trim();
    let unquoted = value
        .strip_prefix('\'')
        .and_then(|v| v.strip_suffix('\''))
        .or_else(|| value.strip_prefix('"').and_then(|v| v.strip_suffix('"')));

    match unquoted {
        Some(value) if is_name(name) => Ok((name.to_ascii_lowercase(), Some(value.to_string()))),
        _ => Err(HtmlError::invalid_path(format!("invalid attribute test {:?}", test))),
    }
}

fn is_name(name: &str) -> bool {
    !name.is_empty()
        && name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_' || c == ':')
}

#[derive(Debug)]
struct Element {
    /// Lower-cased tag name, empty for the document root.
    name: String,
    attributes: Vec<(String, Option<String>)>,
    children: Vec<usize>,
    /// From the start of the opening tag to the end of the closing tag.
    outer: (usize, usize),
    /// From the end of the opening tag to the start of the closing tag.
    inner: (usize, usize),
}

impl Element {
    fn attribute(&self, name: &str) -> Option<Option<&str>> {
        self.attributes
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, value)| value.as_deref())
    }

    fn classes(&self) -> impl Iterator<Item = &str> {
        self.attribute("class")
            .flatten()
            .unwrap_or_default()
            .split_ascii_whitespace()
    }
}

/// A tokenized document. Elements are stored in document order, the first
/// element is the document root.
#[derive(Debug)]
struct Document {
    elements: Vec<Element>,
}

impl Document {
    fn parse(src: &[u8]) -> Self {
        let mut doc = Document {
            elements: vec![Element {
                name: String::new(),
                attributes: Vec::new(),
                children: Vec::new(),
                outer: (0, src.len()),
                inner: (0, src.len()),
            }],
        };
        let mut open = vec![0usize];
        let mut pos = 0;

        while pos < src.len() {
            let rest = &src[pos..];

            if rest[0] != b'<' {
                pos += rest.iter().position(|b| *b == b'<').unwrap_or(rest.len());
            } else if rest.starts_with(b"<!--") {
                pos = find_from(src, pos + 4, b"-->").map_or(src.len(), |i| i + 3);
            } else if rest.starts_with(b"</") {
                let name_end = pos
                    + 2
                    + rest[2..]
                        .iter()
                        .position(|b| b.is_ascii_whitespace() || *b == b'>')
                        .unwrap_or(rest.len() - 2);
                let name = String::from_utf8_lossy(&src[pos + 2..name_end]).to_ascii_lowercase();
                let end = find_from(src, name_end, b">").map_or(src.len(), |i| i + 1);

                doc.close(&mut open, &name, pos, end);
                pos = end;
            } else if rest.starts_with(b"<!") || rest.starts_with(b"<?") {
                pos = find_from(src, pos, b">").map_or(src.len(), |i| i + 1);
            } else if rest.get(1).is_some_and(u8::is_ascii_alphabetic) {
                pos = doc.open(&mut open, src, pos);
            } else {
                pos += 1;
            }
        }

        doc
    }

    /// Handles a start tag at `pos`, returning the position after it.
    fn open(&mut self, open: &mut Vec<usize>, src: &[u8], pos: usize) -> usize {
        let tag = StartTag::read(src, pos);

        while let Some(&top) = open.last() {
            if top == 0 || !closes_implicitly(&self.elements[top].name, &tag.name) {
                break;
            }
            open.pop();
            self.elements[top].inner.1 = pos;
            self.elements[top].outer.1 = pos;
        }

        let parent = open.last().copied().unwrap_or(0);
        let id = self.elements.len();
        self.elements[parent].children.push(id);

        let mut element = Element {
            name: tag.name,
            attributes: tag.attributes,
            children: Vec::new(),
            outer: (pos, src.len()),
            inner: (tag.end, src.len()),
        };

        let end = if tag.self_closing || VOID_ELEMENTS.contains(&element.name.as_str()) {
            element.outer.1 = tag.end;
            element.inner.1 = tag.end;
            tag.end
        } else if RAW_TEXT_ELEMENTS.contains(&element.name.as_str()) {
            match find_end_tag(src, tag.end, &element.name) {
                Some(close) => {
                    let close_end = find_from(src, close, b">").map_or(src.len(), |i| i + 1);
                    element.inner.1 = close;
                    element.outer.1 = close_end;
                    close_end
                }
                None => src.len(),
            }
        } else {
            open.push(id);
            tag.end
        };

        self.elements.push(element);

        end
    }

    /// Handles an end tag spanning `start..end`. Elements left open inside the
    /// closed one are closed implicitly, stray end tags are ignored.
    fn close(&mut self, open: &mut Vec<usize>, name: &str, start: usize, end: usize) {
        let Some(depth) = open
            .iter()
            .rposition(|id| *id != 0 && self.elements[*id].name == name)
        else {
            return;
        };

        for id in open.drain(depth + 1..) {
            self.elements[id].inner.1 = start;
            self.elements[id].outer.1 = start;
        }

        if let Some(id) = open.pop() {
            self.elements[id].inner.1 = start;
            self.elements[id].outer.1 = end;
        }
    }

    /// Returns the first element in document order selected by `path`.
    fn select(&self, path: &HtmlPath) -> Option<usize> {
        let mut context = vec![0];

        for step in &path.steps {
            let mut selected = Vec::new();
            for &node in &context {
                match step.axis {
                    Axis::Child => self.select_children(node, step, &mut selected),
                    Axis::Descendant => {
                        for node in self.subtree(node) {
                            self.select_children(node, step, &mut selected);
                        }
                    }
                }
            }

            selected.sort_unstable();
            selected.dedup();

            if selected.is_empty() {
                return None;
            }
            context = selected;
        }

        context.first().copied()
    }

    fn select_children(&self, node: usize, step: &Step, selected: &mut Vec<usize>) {
        let mut matches = self.elements[node]
            .children
            .iter()
            .copied()
            .filter(|id| step.matches(&self.elements[*id]));

        match step.position {
            Some(n) => selected.extend(matches.nth(n - 1)),
            None => selected.extend(matches),
        }
    }

    /// Returns `node` and all its descendants in document order.
    fn subtree(&self, node: usize) -> Vec<usize> {
        let mut nodes = Vec::new();
        let mut stack = vec![node];
        while let Some(id) = stack.pop() {
            nodes.push(id);
            stack.extend(self.elements[id].children.iter().rev());
        }

        nodes
    }
}

struct StartTag {
    name: String,
    attributes: Vec<(String, Option<String>)>,
    self_closing: bool,
    /// Position after the closing `>`.
    end: usize,
}

impl StartTag {
    fn read(src: &[u8], pos: usize) -> Self {
        let is_delimiter = |b: u8| b.is_ascii_whitespace() || b == b'/' || b == b'>';

        let mut i = pos + 1;
        while i < src.len() && !is_delimiter(src[i]) {
            i += 1;
        }
        let name = String::from_utf8_lossy(&src[pos + 1..i]).to_ascii_lowercase();

        let mut attributes = Vec::new();
        let mut self_closing = false;

        loop {
            while i < src.len() && src[i].is_ascii_whitespace() {
                i += 1;
            }

            match src.get(i) {
                None => break,
                Some(b'>') => {
                    i += 1;
                    break;
                }
                Some(b'/') => {
                    i += 1;
                    if src.get(i) == Some(&b'>') {
                        self_closing = true;
                        i += 1;
                        break;
                    }
                    continue;
                }
                Some(_) => {}
            }

            let name_start = i;
            while i < src.len() && !is_delimiter(src[i]) && src[i] != b'=' {
                i += 1;
            }
            if i == name_start {
                // A stray '=' without a name.
                i += 1;
                continue;
            }
            let attr_name = String::from_utf8_lossy(&src[name_start..i]).to_ascii_lowercase();

            while i < src.len() && src[i].is_ascii_whitespace() {
                i += 1;
            }

            let mut value = None;
            if src.get(i) == Some(&b'=') {
                i += 1;
                while i < src.len() && src[i].is_ascii_whitespace() {
                    i += 1;
                }

                let value_start;
                let value_end;
                match src.get(i) {
                    Some(&quote @ (b'"' | b'\'')) => {
                        value_start = i + 1;
                        value_end = src[value_start..]
                            .iter()
                            .position(|b| *b == quote)
                            .map_or(src.len(), |n| value_start + n);
                        i = (value_end + 1).min(src.len());
                    }
                    _ => {
                        value_start = i;
                        while i < src.len() && !src[i].is_ascii_whitespace() && src[i] != b'>' {
                            i += 1;
                        }
                        value_end = i;
                    }
                }

                value = Some(String::from_utf8_lossy(&src[value_start..value_end]).into_owned());
            }

            attributes.push((attr_name, value));
        }

        Self {
            name,
            attributes,
            self_closing,
            end: i,
        }
    }
}

/// Returns `true` if opening `next` implicitly closes an open `current`.
fn closes_implicitly(current: &str, next: &str) -> bool {
    match current {
        "p" => BLOCK_ELEMENTS.contains(&next),
        "li" => next == "li",
        "dt" | "dd" => matches!(next, "dt" | "dd"),
        "tr" => next == "tr",
        "td" | "th" => matches!(next, "td" | "th" | "tr"),
        "option" => matches!(next, "option" | "optgroup"),
        _ => false,
    }
}

fn find_from(src: &[u8], from: usize, needle: &[u8]) -> Option<usize> {
    src.get(from..)?
        .windows(needle.len())
        .position(|window| window == needle)
        .map(|i| from + i)
}

/// Finds the start of the end tag of a raw text element, matching the name
/// case-insensitively.
fn find_end_tag(src: &[u8], from: usize, name: &str) -> Option<usize> {
    let len = name.len() + 2;
    src.get(from..)?
        .windows(len)
        .position(|window| {
            window.starts_with(b"</") && window[2..].eq_ignore_ascii_case(name.as_bytes())
        })
        .map(|i| from + i)
}

/// Error for [`locate_element`].
#[derive(Debug, thiserror::Error)]
#[error("html error: {kind}: {msg}")]
pub struct HtmlError {
    kind: ErrorKind,
    msg: String,
}

impl HtmlError {
    fn new(kind: ErrorKind, msg: impl Into<String>) -> Self {
        Self {
            kind,
            msg: msg.into(),
        }
    }

    fn invalid_path(msg: impl Into<String>) -> Self {
        Self::new(ErrorKind::InvalidPath, msg)
    }

    /// Returns the kind of the error.
    pub fn kind(&self) -> ErrorKind {
        self.kind
    }
}

/// Kind of [`HtmlError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[non_exhaustive]
pub enum ErrorKind {
    /// The path is not well formed.
    InvalidPath,
    /// No element matches the path.
    ElementNotFound,
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ErrorKind::InvalidPath => f.write_str("invalid path"),
            ErrorKind::ElementNotFound => f.write_str("element not found"),
        }
    }
}

#[cfg(test)]
mod tests {
    use rstest::rstest;

    use super::*;

    const DOC: &str = r#"<!DOCTYPE html>
<html>
<head><title>a <b> title</title></head>
<body>
<!-- <div class="a1">commented out</div> -->
<div class="card a1" id="main">
<img src="x.png"><br/>
<span class="a5">first</span>
<span class="a5 bold">second</span>
<p>para<p>next para
<ul><li>one<li>two</ul>
<script>if (a < b) { document.write("</div>") }</script>
</div>
<div class="a1"><span class=a5>third</span></div>
</body>
</html>"#;

    fn locate(path: &str) -> Result<&'static str, HtmlError> {
        locate_element(DOC.as_bytes(), path, false).map(|range| &DOC[range.as_range()])
    }

    #[rstest]
    #[case::absolute("/html/body/div/span", r#"<span class="a5">first</span>"#)]
    #[case::relative("div.a1/span.a5", r#"<span class="a5">first</span>"#)]
    #[case::descendant("//span.bold", r#"<span class="a5 bold">second</span>"#)]
    #[case::dot_relative("./html/body/div[2]/span", r#"<span class=a5>third</span>"#)]
    #[case::position("/html/body/div.a1[1]/span[2]", r#"<span class="a5 bold">second</span>"#)]
    #[case::attribute("//div[@id='main']/img", r#"<img src="x.png">"#)]
    #[case::self_closing("//br", "<br/>")]
    #[case::implicit_p("//p[1]", "<p>para")]
    #[case::implicit_li("//ul/li[2]", "<li>two")]
    #[case::wildcard("/html/head/*", "<title>a <b> title</title>")]
    #[case::case_insensitive("/HTML/BODY/DIV[2]/SPAN", r#"<span class=a5>third</span>"#)]
    fn test_locate(#[case] path: &str, #[case] expected: &str) {
        assert_eq!(locate(path).unwrap(), expected);
    }

    #[test]
    fn test_raw_text_elements() {
        assert_eq!(locate("//title/text()").unwrap(), "a <b> title");
        assert_eq!(
            locate("//script/text()").unwrap(),
            r#"if (a < b) { document.write("</div>") }"#
        );
        // The </div> inside the script does not close the div.
        assert!(locate("/html/body/div[1]").unwrap().ends_with("</script>\n</div>"));
    }

    #[test]
    fn test_as_text() {
        let range = locate_element(DOC.as_bytes(), "//span.bold", true).unwrap();

        assert_eq!(&DOC[range.as_range()], "second");
    }

    #[rstest]
    #[case::element("//div/span", false)]
    #[case::text("//div/span/text()", true)]
    #[case::relative_text("span/text()", true)]
    fn test_selects_text(#[case] path: &str, #[case] expected: bool) {
        assert_eq!(path.parse::<HtmlPath>().unwrap().selects_text(), expected);
    }

    #[test]
    fn test_comments_are_skipped() {
        assert_eq!(
            locate("//div.a1[1]/span").unwrap(),
            r#"<span class="a5">first</span>"#
        );
        assert!(locate("//div[@class='a1']/span").unwrap().contains("third"));
    }

    #[rstest]
    #[case::missing("//table")]
    #[case::class("//span.a9")]
    #[case::position("//ul/li[3]")]
    #[case::child_of_root("/body")]
    fn test_element_not_found(#[case] path: &str) {
        assert_eq!(locate(path).unwrap_err().kind(), ErrorKind::ElementNotFound);
    }

    #[rstest]
    #[case::empty("")]
    #[case::trailing_slash("/html/")]
    #[case::triple_slash("///html")]
    #[case::zero_position("//li[0]")]
    #[case::empty_class("//div.")]
    #[case::unbalanced("//div[1")]
    #[case::text_not_last("//div/text()/span")]
    fn test_invalid_path(#[case] path: &str) {
        assert_eq!(path.parse::<HtmlPath>().unwrap_err().kind(), ErrorKind::InvalidPath);
    }
}
