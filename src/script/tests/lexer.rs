use crate::script::errors::LexError;
use crate::script::lexer::{tokenize, TokenKind};

fn kinds(source: &str) -> Vec<TokenKind> {
    tokenize(source)
        .unwrap()
        .into_iter()
        .map(|t| t.kind)
        .collect()
}

#[test]
fn test_keywords_and_identifiers() {
    assert_eq!(
        kinds("let fn foo_bar not"),
        vec![
            TokenKind::KwLet,
            TokenKind::KwFn,
            TokenKind::Identifier("foo_bar".to_string()),
            TokenKind::KwNot,
            TokenKind::Eof,
        ]
    );
}

#[test]
fn test_unicode_identifier() {
    assert_eq!(
        kinds("任务"),
        vec![TokenKind::Identifier("任务".to_string()), TokenKind::Eof]
    );
}

#[test]
fn test_numbers() {
    assert_eq!(
        kinds("42 3.5 1_000"),
        vec![
            TokenKind::Number(42.0),
            TokenKind::Number(3.5),
            TokenKind::Number(1000.0),
            TokenKind::Eof,
        ]
    );
    // A dot not followed by a digit is field access.
    assert_eq!(
        kinds("1.x"),
        vec![
            TokenKind::Number(1.0),
            TokenKind::Dot,
            TokenKind::Identifier("x".to_string()),
            TokenKind::Eof,
        ]
    );
}

#[test]
fn test_operators() {
    assert_eq!(
        kinds("== != <= >= < > = + - * / %"),
        vec![
            TokenKind::EqEq,
            TokenKind::Neq,
            TokenKind::Le,
            TokenKind::Ge,
            TokenKind::Lt,
            TokenKind::Gt,
            TokenKind::Eq,
            TokenKind::Plus,
            TokenKind::Minus,
            TokenKind::Star,
            TokenKind::Slash,
            TokenKind::Percent,
            TokenKind::Eof,
        ]
    );
}

#[test]
fn test_string_escapes() {
    assert_eq!(
        kinds(r#""a\tb\n\"q\"""#),
        vec![TokenKind::Str("a\tb\n\"q\"".to_string()), TokenKind::Eof]
    );
}

#[test]
fn test_comments_are_skipped() {
    assert_eq!(
        kinds("// nothing here\nx // trailing"),
        vec![TokenKind::Identifier("x".to_string()), TokenKind::Eof]
    );
}

#[test]
fn test_spans_track_lines() {
    let tokens = tokenize("a\n  b").unwrap();
    assert_eq!(tokens[0].span.start.line, 1);
    assert_eq!(tokens[1].span.start.line, 2);
    assert_eq!(tokens[1].span.start.column, 3);
}

#[test]
fn test_lex_errors() {
    assert!(matches!(
        tokenize("let @"),
        Err(LexError::UnexpectedChar { ch: '@', .. })
    ));
    assert!(matches!(
        tokenize("\"open"),
        Err(LexError::UnterminatedString { .. })
    ));
    assert!(matches!(
        tokenize(r#""\q""#),
        Err(LexError::InvalidEscape { ch: 'q', .. })
    ));
    assert!(matches!(
        tokenize("12ab"),
        Err(LexError::InvalidNumber { .. })
    ));
    assert_eq!(
        tokenize("\n  !").unwrap_err().to_string(),
        "2:3: unexpected character '!'"
    );
}
