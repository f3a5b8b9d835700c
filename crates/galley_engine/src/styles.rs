use std::collections::BTreeMap;

use cssparser::{
    BasicParseErrorKind, Delimiter, ParseError, ParseErrorKind, Parser, ParserInput, Token,
};
use galley_base::error::ErrorKind;
use galley_base::{GalleyError, GalleyResult};

/// Styles extracted from a stylesheet: selector text mapped to its
/// accumulated declaration string.
pub type StyleMap = BTreeMap<String, String>;

/// Parse errors specific to the style extractor.
#[derive(Debug, Clone, PartialEq)]
enum StyleParseError {
    EmptySelector,
    EmptyValue,
}

/// Extract a [`StyleMap`] from CSS text.
///
/// Each qualified rule contributes one declaration string per selector in its
/// selector list. Declarations are rendered as `name: value;` and joined with
/// single spaces, keeping the value text exactly as written in the stylesheet.
/// A selector that appears in several rules accumulates: later declaration
/// strings are appended after a single space, earlier ones are never replaced.
///
/// At-rules such as `@media` or `@import` are skipped in their entirety,
/// including any rules nested inside them. Anything else that does not parse
/// as a rule is an error carrying the offending line and column.
///
/// # Examples
///
/// ```
/// use galley_engine::styles::extract_styles;
///
/// let styles = extract_styles("h1 { color: red; }").unwrap();
/// assert_eq!(styles["h1"], "color: red;");
/// ```
pub fn extract_styles(css: &str) -> GalleyResult<StyleMap> {
    let mut input = ParserInput::new(css);
    let mut parser = Parser::new(&mut input);
    let mut styles = StyleMap::new();

    loop {
        if parser.is_exhausted() {
            break;
        }
        let state = parser.state();
        let token = match parser.next() {
            Ok(token) => token.clone(),
            Err(_) => break,
        };

        if matches!(token, Token::AtKeyword(_)) {
            // Skip the whole at-rule: statement at-rules end at the semicolon,
            // block at-rules at their closing brace.
            let skipped: Result<(), ParseError<'_, StyleParseError>> = parser
                .parse_until_after(Delimiter::Semicolon | Delimiter::CurlyBracketBlock, |_| {
                    Ok(())
                });
            skipped.map_err(style_error)?;
            continue;
        }

        parser.reset(&state);
        let selectors = parser
            .parse_until_before(Delimiter::CurlyBracketBlock, parse_selector_list)
            .map_err(style_error)?;
        parser
            .expect_curly_bracket_block()
            .map_err(|e| style_error(e.into()))?;
        let declarations = parser
            .parse_nested_block(parse_declarations)
            .map_err(style_error)?;

        let declaration_text = declarations.join(" ");
        for selector in selectors {
            let entry = styles.entry(selector).or_default();
            if entry.is_empty() {
                *entry = declaration_text.clone();
            } else {
                entry.push(' ');
                entry.push_str(&declaration_text);
            }
        }
    }

    Ok(styles)
}

/// Parse a comma separated selector list, keeping each selector's text
/// exactly as written. Commas nested in functional selectors such as
/// `:not(.a, .b)` do not split the list.
fn parse_selector_list<'i>(
    parser: &mut Parser<'i, '_>,
) -> Result<Vec<String>, ParseError<'i, StyleParseError>> {
    parser.parse_comma_separated(|parser| {
        parser.skip_whitespace();
        let start = parser.position();
        while parser.next().is_ok() {}
        let selector = parser.slice_from(start).trim_end().to_string();
        if selector.is_empty() {
            return Err(parser.new_custom_error(StyleParseError::EmptySelector));
        }
        Ok(selector)
    })
}

/// Parse the inside of a declaration block into `name: value;` strings.
fn parse_declarations<'i>(
    parser: &mut Parser<'i, '_>,
) -> Result<Vec<String>, ParseError<'i, StyleParseError>> {
    let mut declarations = Vec::new();
    loop {
        parser.skip_whitespace();
        if parser.is_exhausted() {
            break;
        }
        let name = parser.expect_ident_cloned()?;
        parser.expect_colon()?;
        parser.skip_whitespace();
        let start = parser.position();
        parser.parse_until_before(Delimiter::Semicolon, |parser| {
            while parser.next().is_ok() {}
            Ok::<(), ParseError<'i, StyleParseError>>(())
        })?;
        let value = parser.slice_from(start).trim_end().to_string();
        if value.is_empty() {
            return Err(parser.new_custom_error(StyleParseError::EmptyValue));
        }
        declarations.push(format!("{}: {};", name, value));
        // Consume the semicolon, if the block did not end here.
        let _ = parser.next();
    }
    Ok(declarations)
}

fn style_error(error: ParseError<'_, StyleParseError>) -> Box<GalleyError> {
    let message = match &error.kind {
        ParseErrorKind::Basic(BasicParseErrorKind::EndOfInput) => {
            "unexpected end of stylesheet".to_string()
        }
        ParseErrorKind::Basic(kind) => kind.to_string(),
        ParseErrorKind::Custom(StyleParseError::EmptySelector) => "selector is empty".to_string(),
        ParseErrorKind::Custom(StyleParseError::EmptyValue) => {
            "declaration value is empty".to_string()
        }
    };
    Box::new(GalleyError::new(ErrorKind::StyleError {
        // Parser locations count lines from zero
        line: error.location.line + 1,
        column: error.location.column,
        message,
    }))
}
