//! Directive option schemas and the argument grammar.
//!
//! Every directive declares a typed option schema ([`OptionSpec`] list) with
//! defaults. A directive body is an optional parenthesized argument list:
//! positional values are matched against the schema in declared order, and
//! parsing switches permanently to `key=value` keyword form at the first
//! `=`. Unknown keys and delimiter/type mismatches are grammar errors.
//!
//! ## Value grammar
//!
//! ```text
//! value(str)  := '"' ... '"'          (backslash-escaped quotes allowed)
//! value(code) := '{' balanced '}'     (string literals respected)
//! value(list) := '[' ref, ... ']'
//! value(bool) := true | True | 1 | false | False | 0
//! value(ref)  := word ('::' word)* ('[' label (',' label)* ']')?
//! ```

use thiserror::Error;
use winnow::ascii::multispace0;
use winnow::combinator::{delimited, opt, separated};
use winnow::error::{ErrMode, ParserError};
use winnow::prelude::*;
use winnow::token::{any, take_while};
use winnow::ModalResult;

/// Errors produced while parsing a directive body against its schema.
#[derive(Debug, Error, PartialEq)]
pub enum OptionError {
    /// The argument list does not match the value grammar.
    #[error("error parsing directive arguments: {message}")]
    Grammar { message: String },

    /// A keyword argument names an option the directive does not declare.
    #[error("unknown option '{name}'")]
    UnknownOption { name: String },

    /// A delimiter-typed value does not fit the positional option's kind.
    #[error("{found} values are not supported for option '{name}'")]
    TypeMismatch { name: String, found: &'static str },

    /// A required option was left unset.
    #[error("missing required option '{name}'")]
    MissingRequired { name: String },
}

fn grammar(message: impl Into<String>) -> OptionError {
    OptionError::Grammar {
        message: message.into(),
    }
}

/// The kind of value an option accepts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OptionKind {
    Str,
    Bool,
    Code,
    Ref,
    List,
}

/// A cross-reference argument: `::`-separated segments with an optional
/// `[label, ...]` subscript.
#[derive(Debug, Clone, PartialEq)]
pub struct RefSpec {
    pub path: Vec<String>,
    pub labels: Option<Vec<String>>,
}

impl RefSpec {
    /// Display form of the path.
    pub fn qualified_name(&self) -> String {
        self.path.join("::")
    }
}

/// A parsed option value.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum OptionValue {
    /// Unset (the schema declared no default).
    #[default]
    None,
    Str(String),
    Bool(bool),
    Code(String),
    Ref(RefSpec),
    List(Vec<RefSpec>),
}

/// One option of a directive's schema.
#[derive(Debug, Clone)]
pub struct OptionSpec {
    pub name: &'static str,
    pub kind: OptionKind,
    pub default: OptionValue,
}

impl OptionSpec {
    pub fn reference(name: &'static str) -> Self {
        OptionSpec {
            name,
            kind: OptionKind::Ref,
            default: OptionValue::None,
        }
    }

    pub fn string(name: &'static str) -> Self {
        OptionSpec {
            name,
            kind: OptionKind::Str,
            default: OptionValue::None,
        }
    }

    pub fn string_with(name: &'static str, default: &str) -> Self {
        OptionSpec {
            name,
            kind: OptionKind::Str,
            default: OptionValue::Str(default.to_string()),
        }
    }

    pub fn boolean(name: &'static str, default: bool) -> Self {
        OptionSpec {
            name,
            kind: OptionKind::Bool,
            default: OptionValue::Bool(default),
        }
    }

    pub fn code(name: &'static str) -> Self {
        OptionSpec {
            name,
            kind: OptionKind::Code,
            default: OptionValue::None,
        }
    }

    pub fn code_with(name: &'static str, default: &str) -> Self {
        OptionSpec {
            name,
            kind: OptionKind::Code,
            default: OptionValue::Code(default.to_string()),
        }
    }

    pub fn list(name: &'static str) -> Self {
        OptionSpec {
            name,
            kind: OptionKind::List,
            default: OptionValue::None,
        }
    }
}

/// Parsed option values for one directive invocation, defaults applied.
#[derive(Debug, Clone, Default)]
pub struct OptionSet {
    values: Vec<(&'static str, OptionValue)>,
}

impl OptionSet {
    fn defaults(schema: &[OptionSpec]) -> Self {
        OptionSet {
            values: schema
                .iter()
                .map(|spec| (spec.name, spec.default.clone()))
                .collect(),
        }
    }

    fn set(&mut self, name: &'static str, value: OptionValue) {
        if let Some(slot) = self.values.iter_mut().find(|(n, _)| *n == name) {
            slot.1 = value;
        }
    }

    /// The stored value, or `None` for names outside the schema.
    pub fn get(&self, name: &str) -> Option<&OptionValue> {
        self.values.iter().find(|(n, _)| *n == name).map(|(_, v)| v)
    }

    pub fn str_opt(&self, name: &str) -> Option<&str> {
        match self.get(name) {
            Some(OptionValue::Str(s)) => Some(s),
            _ => None,
        }
    }

    pub fn code_opt(&self, name: &str) -> Option<&str> {
        match self.get(name) {
            Some(OptionValue::Code(s)) => Some(s),
            _ => None,
        }
    }

    pub fn bool_flag(&self, name: &str) -> bool {
        matches!(self.get(name), Some(OptionValue::Bool(true)))
    }

    pub fn ref_opt(&self, name: &str) -> Option<&RefSpec> {
        match self.get(name) {
            Some(OptionValue::Ref(r)) => Some(r),
            _ => None,
        }
    }

    /// List value; unset lists read as empty.
    pub fn list(&self, name: &str) -> &[RefSpec] {
        match self.get(name) {
            Some(OptionValue::List(items)) => items,
            _ => &[],
        }
    }

    /// A reference option that must be present.
    pub fn require_ref(&self, name: &str) -> Result<&RefSpec, OptionError> {
        self.ref_opt(name).ok_or(OptionError::MissingRequired {
            name: name.to_string(),
        })
    }
}

// ============================================================================
// Parser implementation using winnow
// ============================================================================

fn word<'a>(input: &mut &'a str) -> ModalResult<&'a str> {
    take_while(1.., |c: char| c.is_ascii_alphanumeric() || c == '_').parse_next(input)
}

/// A double-quoted string; `\"` escapes a quote, other escapes pass through.
fn quoted(input: &mut &str) -> ModalResult<String> {
    '"'.parse_next(input)?;
    let mut out = String::new();
    loop {
        let chunk: &str =
            take_while(0.., |c: char| c != '"' && c != '\\').parse_next(input)?;
        out.push_str(chunk);
        match any.parse_next(input)? {
            '"' => return Ok(out),
            '\\' => {
                let escaped: char = any.parse_next(input)?;
                if escaped != '"' {
                    out.push('\\');
                }
                out.push(escaped);
            }
            _ => unreachable!("take_while stops only at quote or backslash"),
        }
    }
}

/// A brace-balanced code fragment; braces inside string literals don't count.
fn code(input: &mut &str) -> ModalResult<String> {
    '{'.parse_next(input)?;
    let mut out = String::new();
    let mut depth = 1usize;
    loop {
        let c: char = any.parse_next(input)?;
        match c {
            '{' => {
                depth += 1;
                out.push('{');
            }
            '}' => {
                depth -= 1;
                if depth == 0 {
                    return Ok(out);
                }
                out.push('}');
            }
            '"' => {
                out.push('"');
                string_tail(input, &mut out)?;
            }
            _ => out.push(c),
        }
    }
}

/// Copy a string literal's remainder (opening quote already consumed),
/// closing quote included.
fn string_tail(input: &mut &str, out: &mut String) -> ModalResult<()> {
    loop {
        let c: char = any.parse_next(input)?;
        out.push(c);
        match c {
            '"' => return Ok(()),
            '\\' => {
                let escaped: char = any.parse_next(input)?;
                out.push(escaped);
            }
            _ => {}
        }
    }
}

fn label_list(input: &mut &str) -> ModalResult<Vec<String>> {
    let labels: Vec<&str> = delimited(
        '[',
        separated(1.., delimited(multispace0, word, multispace0), ','),
        ']',
    )
    .parse_next(input)?;
    Ok(labels.into_iter().map(str::to_string).collect())
}

fn ref_spec(input: &mut &str) -> ModalResult<RefSpec> {
    let first = word.parse_next(input)?;
    let mut path = vec![first.to_string()];
    while input.starts_with("::") {
        let _: &str = "::".parse_next(input)?;
        path.push(word.parse_next(input)?.to_string());
    }
    let labels = opt(label_list).parse_next(input)?;
    Ok(RefSpec { path, labels })
}

fn list_value(input: &mut &str) -> ModalResult<Vec<RefSpec>> {
    delimited(
        '[',
        separated(0.., delimited(multispace0, ref_spec, multispace0), ','),
        (multispace0, ']'),
    )
    .parse_next(input)
}

fn bool_value(input: &mut &str) -> ModalResult<bool> {
    let value = word.parse_next(input)?;
    match value {
        "true" | "True" | "1" => Ok(true),
        "false" | "False" | "0" => Ok(false),
        _ => Err(ErrMode::from_input(input)),
    }
}

fn skip_ws(input: &mut &str) {
    let _: ModalResult<&str> = multispace0.parse_next(input);
}

/// Decide whether the next argument is a keyword argument: an `=` appears
/// before the next top-level `,` or `)`.
fn looks_like_keyword(input: &str) -> bool {
    let mut brackets = 0i32;
    for c in input.chars() {
        match c {
            '=' if brackets == 0 => return true,
            ',' | ')' if brackets == 0 => return false,
            '[' | '<' => brackets += 1,
            ']' | '>' => brackets -= 1,
            _ => {}
        }
    }
    false
}

fn parse_value_of_kind(
    name: &str,
    kind: OptionKind,
    input: &mut &str,
) -> Result<OptionValue, OptionError> {
    let value = match kind {
        OptionKind::Str => quoted(input).map(OptionValue::Str),
        OptionKind::Code => code(input).map(OptionValue::Code),
        OptionKind::List => list_value(input).map(OptionValue::List),
        OptionKind::Bool => bool_value(input).map(OptionValue::Bool),
        OptionKind::Ref => ref_spec(input).map(OptionValue::Ref),
    };
    value.map_err(|_| grammar(format!("cannot parse value for option '{name}'")))
}

/// Parse a directive body against its schema.
///
/// An empty body yields the schema defaults.
pub fn parse_options(schema: &[OptionSpec], body: &str) -> Result<OptionSet, OptionError> {
    let mut set = OptionSet::defaults(schema);
    let body = body.trim();
    if body.is_empty() {
        return Ok(set);
    }
    let mut input = body;
    let open: ModalResult<char> = '('.parse_next(&mut input);
    open.map_err(|_| grammar("expected '(' to open the argument list"))?;

    let mut positional = 0usize;
    let mut keyword_mode = false;
    loop {
        skip_ws(&mut input);
        if let Some(rest) = input.strip_prefix(')') {
            input = rest;
            break;
        }
        if input.is_empty() {
            return Err(grammar("unexpected end of directive arguments"));
        }

        if !keyword_mode && positional < schema.len() {
            let spec = &schema[positional];
            let value = match input.chars().next() {
                Some('{') => {
                    require_kind(spec, OptionKind::Code, "code")?;
                    parse_value_of_kind(spec.name, OptionKind::Code, &mut input)?
                }
                Some('[') => {
                    require_kind(spec, OptionKind::List, "list")?;
                    parse_value_of_kind(spec.name, OptionKind::List, &mut input)?
                }
                Some('"') => {
                    require_kind(spec, OptionKind::Str, "string")?;
                    parse_value_of_kind(spec.name, OptionKind::Str, &mut input)?
                }
                _ => {
                    if looks_like_keyword(input) {
                        keyword_mode = true;
                        continue;
                    }
                    match spec.kind {
                        OptionKind::Ref | OptionKind::Bool => {
                            parse_value_of_kind(spec.name, spec.kind, &mut input)?
                        }
                        _ => {
                            return Err(grammar(format!(
                                "cannot parse positional value for option '{}'",
                                spec.name
                            )))
                        }
                    }
                }
            };
            set.set(spec.name, value);
            positional += 1;
        } else {
            let key = word(&mut input)
                .map_err(|_| grammar("expected an option name"))?
                .to_string();
            skip_ws(&mut input);
            let eq: ModalResult<char> = '='.parse_next(&mut input);
            eq.map_err(|_| grammar(format!("expected '=' after option '{key}'")))?;
            skip_ws(&mut input);
            let spec = schema
                .iter()
                .find(|spec| spec.name == key)
                .ok_or(OptionError::UnknownOption { name: key })?;
            let value = parse_value_of_kind(spec.name, spec.kind, &mut input)?;
            set.set(spec.name, value);
        }

        skip_ws(&mut input);
        if let Some(rest) = input.strip_prefix(',') {
            input = rest;
            continue;
        }
        if let Some(rest) = input.strip_prefix(')') {
            input = rest;
            break;
        }
        return Err(grammar("expected ',' or ')' between arguments"));
    }
    skip_ws(&mut input);
    if !input.is_empty() {
        return Err(grammar("unexpected text after the argument list"));
    }
    Ok(set)
}

fn require_kind(
    spec: &OptionSpec,
    kind: OptionKind,
    found: &'static str,
) -> Result<(), OptionError> {
    if spec.kind == kind {
        Ok(())
    } else {
        Err(OptionError::TypeMismatch {
            name: spec.name.to_string(),
            found,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn class_like_schema() -> Vec<OptionSpec> {
        vec![
            OptionSpec::reference("target"),
            OptionSpec::string("rename"),
            OptionSpec::code_with("init", "bp::no_init"),
            OptionSpec::boolean("const_aware", true),
            OptionSpec::boolean("noncopyable", false),
            OptionSpec::string_with("include_regex", ".*"),
            OptionSpec::list("ignore_list"),
        ]
    }

    #[test]
    fn empty_body_yields_defaults() {
        let opts = parse_options(&class_like_schema(), "").unwrap();
        assert!(opts.ref_opt("target").is_none());
        assert!(opts.bool_flag("const_aware"));
        assert!(!opts.bool_flag("noncopyable"));
        assert_eq!(opts.code_opt("init"), Some("bp::no_init"));
        assert_eq!(opts.str_opt("include_regex"), Some(".*"));
    }

    #[test]
    fn positional_reference_with_labels() {
        let opts = parse_options(&class_like_schema(), "(ns::Foo[a, b])").unwrap();
        let target = opts.ref_opt("target").unwrap();
        assert_eq!(target.path, vec!["ns".to_string(), "Foo".to_string()]);
        assert_eq!(
            target.labels,
            Some(vec!["a".to_string(), "b".to_string()])
        );
    }

    #[test]
    fn keyword_arguments_after_positional() {
        let opts =
            parse_options(&class_like_schema(), "(Foo, noncopyable=true, rename=\"Bar\")").unwrap();
        assert_eq!(opts.ref_opt("target").unwrap().qualified_name(), "Foo");
        assert!(opts.bool_flag("noncopyable"));
        assert_eq!(opts.str_opt("rename"), Some("Bar"));
    }

    #[test]
    fn code_values_balance_braces() {
        let opts = parse_options(
            &class_like_schema(),
            "(Foo, init={bp::init< int >(( bp::arg(\"n\") ))})",
        )
        .unwrap();
        assert_eq!(
            opts.code_opt("init"),
            Some("bp::init< int >(( bp::arg(\"n\") ))")
        );
    }

    #[test]
    fn nested_braces_in_code_values() {
        let schema = vec![OptionSpec::code("body")];
        let opts = parse_options(&schema, "(body={ if (x) { y(); } })").unwrap();
        assert_eq!(opts.code_opt("body"), Some(" if (x) { y(); } "));
    }

    #[test]
    fn braces_inside_strings_do_not_count() {
        let schema = vec![OptionSpec::code("body")];
        let opts = parse_options(&schema, "(body={ print(\"}\") })").unwrap();
        assert_eq!(opts.code_opt("body"), Some(" print(\"}\") "));
    }

    #[test]
    fn list_of_references_with_labels() {
        let schema = vec![OptionSpec::list("include_list")];
        let opts = parse_options(&schema, "(include_list=[bar[a], baz])").unwrap();
        let list = opts.list("include_list");
        assert_eq!(list.len(), 2);
        assert_eq!(list[0].qualified_name(), "bar");
        assert_eq!(list[0].labels, Some(vec!["a".to_string()]));
        assert_eq!(list[1].labels, None);
    }

    #[test]
    fn unknown_option_is_rejected() {
        let err = parse_options(&class_like_schema(), "(Foo, mystery=true)").unwrap_err();
        assert_eq!(
            err,
            OptionError::UnknownOption {
                name: "mystery".to_string()
            }
        );
    }

    #[test]
    fn positional_type_mismatch_is_rejected() {
        // "rename" is second positionally, and a code value can't fill it.
        let err = parse_options(&class_like_schema(), "(Foo, {not code})").unwrap_err();
        assert_eq!(
            err,
            OptionError::TypeMismatch {
                name: "rename".to_string(),
                found: "code"
            }
        );
    }

    #[test]
    fn missing_close_paren_is_a_grammar_error() {
        let err = parse_options(&class_like_schema(), "(Foo").unwrap_err();
        assert!(matches!(err, OptionError::Grammar { .. }));
    }

    #[test]
    fn escaped_quotes_in_strings() {
        let schema = vec![OptionSpec::string("rename")];
        let opts = parse_options(&schema, "(rename=\"a \\\"b\\\"\")").unwrap();
        assert_eq!(opts.str_opt("rename"), Some("a \"b\""));
    }

    #[test]
    fn require_ref_reports_missing_target() {
        let opts = parse_options(&class_like_schema(), "").unwrap();
        assert_eq!(
            opts.require_ref("target").unwrap_err(),
            OptionError::MissingRequired {
                name: "target".to_string()
            }
        );
    }
}
