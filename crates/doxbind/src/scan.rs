//! Template scanner: finds `%%name body%%` directive spans.
//!
//! Scanning is line-by-line; a directive never spans lines. Each line is
//! scanned left-to-right for the two-character open marker, then forward for
//! the close marker on the same line. Text outside directive spans passes
//! through verbatim, and scanning resumes after each close marker, so one
//! line may carry several directives.
//!
//! The column of the opening marker is recorded with each directive: it is
//! the indentation hint for multi-line emission.

use thiserror::Error;

/// The two-character directive delimiter.
pub const MARKER: &str = "%%";

/// Scanner syntax errors, annotated with the 1-based source line.
#[derive(Debug, Error, PartialEq)]
pub enum ScanError {
    /// An open marker with no close marker on the same line.
    #[error("unterminated directive marker on line {line}")]
    Unterminated { line: usize },

    /// A delimited span that does not parse as `name body`.
    #[error("malformed directive '{span}' on line {line}")]
    Malformed { span: String, line: usize },
}

/// One piece of a scanned line.
#[derive(Debug, Clone, PartialEq)]
pub enum Segment<'a> {
    /// Verbatim pass-through text.
    Text(&'a str),
    /// A directive invocation.
    Directive(Directive<'a>),
}

/// A single directive span.
#[derive(Debug, Clone, PartialEq)]
pub struct Directive<'a> {
    /// Directive name (selects the macro).
    pub name: &'a str,
    /// The rest of the span, handed to the macro's own grammar.
    pub body: &'a str,
    /// 1-based source line.
    pub line: usize,
    /// 0-based column of the opening marker within the line.
    pub column: usize,
}

/// Scan one line (newline included, if present) into segments.
pub fn scan_line(line: &str, line_no: usize) -> Result<Vec<Segment<'_>>, ScanError> {
    let mut segments = Vec::new();
    let mut rest = line;
    let mut offset = 0usize;
    loop {
        let Some(start) = rest.find(MARKER) else {
            if !rest.is_empty() {
                segments.push(Segment::Text(rest));
            }
            return Ok(segments);
        };
        if start > 0 {
            segments.push(Segment::Text(&rest[..start]));
        }
        let after_open = &rest[start + MARKER.len()..];
        let close = after_open
            .find(MARKER)
            .ok_or(ScanError::Unterminated { line: line_no })?;
        let span = &after_open[..close];
        let (name, body) = split_span(span).ok_or_else(|| ScanError::Malformed {
            span: span.to_string(),
            line: line_no,
        })?;
        segments.push(Segment::Directive(Directive {
            name,
            body,
            line: line_no,
            column: offset + start,
        }));
        offset += start + MARKER.len() + close + MARKER.len();
        rest = &after_open[close + MARKER.len()..];
    }
}

/// Split a delimited span into `name` and `body`.
///
/// The name is a word (`[A-Za-z_][A-Za-z0-9_]*`); whatever follows it,
/// whitespace-trimmed, is the body.
fn split_span(span: &str) -> Option<(&str, &str)> {
    let span = span.trim();
    let end = span
        .char_indices()
        .find(|(_, c)| !(c.is_ascii_alphanumeric() || *c == '_'))
        .map(|(i, _)| i)
        .unwrap_or(span.len());
    let (name, body) = span.split_at(end);
    if name.is_empty() || name.starts_with(|c: char| c.is_ascii_digit()) {
        return None;
    }
    Some((name, body.trim()))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn directives(line: &str) -> Vec<(String, String, usize)> {
        scan_line(line, 1)
            .unwrap()
            .into_iter()
            .filter_map(|s| match s {
                Segment::Directive(d) => Some((d.name.to_string(), d.body.to_string(), d.column)),
                Segment::Text(_) => None,
            })
            .collect()
    }

    #[test]
    fn plain_text_passes_through() {
        let segments = scan_line("no directives here\n", 1).unwrap();
        assert_eq!(segments, vec![Segment::Text("no directives here\n")]);
    }

    #[test]
    fn single_directive_with_body() {
        let found = directives("    %%class(Foo, noncopyable=true)%%\n");
        assert_eq!(
            found,
            vec![(
                "class".to_string(),
                "(Foo, noncopyable=true)".to_string(),
                4
            )]
        );
    }

    #[test]
    fn text_before_and_after_is_preserved() {
        let segments = scan_line("head %%doc(Foo)%% tail\n", 1).unwrap();
        assert_eq!(segments.len(), 3);
        assert_eq!(segments[0], Segment::Text("head "));
        assert_eq!(segments[2], Segment::Text(" tail\n"));
    }

    #[test]
    fn multiple_directives_per_line_record_their_own_columns() {
        let found = directives("%%end_class%% %%end_namespace%%\n");
        assert_eq!(found.len(), 2);
        assert_eq!(found[0], ("end_class".to_string(), String::new(), 0));
        assert_eq!(found[1], ("end_namespace".to_string(), String::new(), 14));
    }

    #[test]
    fn unterminated_marker_reports_line() {
        let err = scan_line("text %%doc(Foo)\n", 7).unwrap_err();
        assert_eq!(err, ScanError::Unterminated { line: 7 });
    }

    #[test]
    fn empty_span_is_malformed() {
        let err = scan_line("%%%%\n", 3).unwrap_err();
        assert!(matches!(err, ScanError::Malformed { line: 3, .. }));
    }

    #[test]
    fn name_cannot_start_with_a_digit() {
        let err = scan_line("%%1bad%%\n", 1).unwrap_err();
        assert!(matches!(err, ScanError::Malformed { .. }));
    }

    #[test]
    fn body_is_trimmed() {
        let found = directives("%%namespace (ns) %%\n");
        assert_eq!(found[0].1, "(ns)");
    }
}
