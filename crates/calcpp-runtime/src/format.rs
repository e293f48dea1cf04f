#![forbid(unsafe_code)]

//! Error message formatting.
//!
//! Structured engine errors carry a message code and positional parameters.
//! [`MessageCatalog`] maps codes to printf-style templates and renders them.
//!
//! Supported conversions: `%s`, `%d`, positional `%1$s` / `%2$d`, and `%%`.
//! `%d` takes the integer prefix of its parameter (`"3.0"` prints `3`).
//! Substituted parameters are never re-expanded.
//!
//! # Failure Modes
//!
//! - Unknown code, malformed template, missing parameter, or a `%d`
//!   parameter with no leading digits: [`MessageCatalog::render`] falls back to the plain rendering
//!   of the error (`code at position N`).

use std::collections::HashMap;

use calcpp_engine::{EngineError, ParseException};

/// Built-in English templates, keyed by message code.
const ENGLISH: &[(&str, &str)] = &[
    ("syntax_error", "Syntax error at position %d"),
    ("unexpected_end", "Unexpected end of expression"),
    ("unexpected_symbol", "Unexpected symbol '%s' at position %d"),
    ("expected_symbol", "Expected '%s'"),
    ("unbalanced_brackets", "Unbalanced brackets"),
    ("unknown_function", "Unknown function: %s"),
    ("unknown_variable", "Unknown variable: %s"),
    ("wrong_arg_count", "Function %1$s expects %2$d arguments"),
    ("division_by_zero", "Division by zero"),
    ("not_a_number", "Result is not a number"),
    ("invalid_number", "Invalid number: %s"),
    ("invalid_base_digit", "Digit '%s' is not valid in base %d"),
    ("overflow", "Result is too large"),
    ("not_supported", "Operation is not supported: %s"),
];

/// Message code to template mapping.
#[derive(Debug, Clone, Default)]
pub struct MessageCatalog {
    templates: HashMap<String, String>,
}

impl MessageCatalog {
    /// Empty catalog.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Catalog with the built-in English templates.
    #[must_use]
    pub fn english() -> Self {
        let mut catalog = Self::new();
        for (code, template) in ENGLISH {
            catalog.insert(*code, *template);
        }
        catalog
    }

    pub fn insert(&mut self, code: impl Into<String>, template: impl Into<String>) {
        self.templates.insert(code.into(), template.into());
    }

    #[must_use]
    pub fn get(&self, code: &str) -> Option<&str> {
        self.templates.get(code).map(String::as_str)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.templates.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.templates.is_empty()
    }

    /// Format the template for `code`. `None` if the code is unknown or the
    /// parameters do not fit the template.
    #[must_use]
    pub fn format<S: AsRef<str>>(&self, code: &str, params: &[S]) -> Option<String> {
        sprintf(self.get(code)?, params)
    }

    /// Render an engine error for display.
    #[must_use]
    pub fn render(&self, error: &EngineError) -> String {
        match error {
            EngineError::Message(message) => message.clone(),
            EngineError::Parse(exception) => self.render_exception(exception),
        }
    }

    fn render_exception(&self, exception: &ParseException) -> String {
        self.format(&exception.message_code, &exception.params)
            .unwrap_or_else(|| {
                tracing::debug!(
                    target: "calcpp.calc",
                    code = %exception.message_code,
                    "no usable template; using plain error text"
                );
                EngineError::Parse(exception.clone()).to_string()
            })
    }
}

/// printf-style substitution over string parameters.
fn sprintf<S: AsRef<str>>(template: &str, params: &[S]) -> Option<String> {
    let mut out = String::with_capacity(template.len());
    let mut chars = template.chars().peekable();
    let mut next_arg = 0_usize;

    while let Some(c) = chars.next() {
        if c != '%' {
            out.push(c);
            continue;
        }
        if chars.peek() == Some(&'%') {
            chars.next();
            out.push('%');
            continue;
        }

        // Optional `N$` position.
        let mut digits = String::new();
        while let Some(d) = chars.peek().copied().filter(char::is_ascii_digit) {
            digits.push(d);
            chars.next();
        }
        let index = if digits.is_empty() {
            next_arg += 1;
            next_arg - 1
        } else {
            if chars.next() != Some('$') {
                return None;
            }
            digits.parse::<usize>().ok()?.checked_sub(1)?
        };

        let param = params.get(index)?.as_ref();
        match chars.next()? {
            's' => out.push_str(param),
            'd' => out.push_str(&leading_integer(param)?.to_string()),
            _ => return None,
        }
    }
    Some(out)
}

/// Integer prefix of `s` after leading whitespace, so `"3.0"` and `"12px"`
/// read as 3 and 12. `None` when no digit follows the optional sign.
fn leading_integer(s: &str) -> Option<i64> {
    let s = s.trim_start();
    let sign_len = usize::from(s.starts_with(['+', '-']));
    let digits = s[sign_len..]
        .find(|c: char| !c.is_ascii_digit())
        .unwrap_or(s.len() - sign_len);
    if digits == 0 {
        return None;
    }
    s[..sign_len + digits].parse().ok()
}
