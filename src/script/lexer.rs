//! Lexer for code islands using logos

use logos::Logos;

use crate::error::{ScriptError, Span};

#[derive(Logos, Debug, Clone, PartialEq)]
#[logos(skip r"[ \t\n\r]+")]
pub enum Token {
    // Statement keywords
    #[token("echo")]
    Echo,
    #[token("unset")]
    Unset,
    #[token("if")]
    If,
    #[token("elseif")]
    ElseIf,
    #[token("else")]
    Else,
    #[token("endif")]
    EndIf,
    #[token("foreach")]
    Foreach,
    #[token("as")]
    As,
    #[token("endforeach")]
    EndForeach,
    #[token("for")]
    For,
    #[token("endfor")]
    EndFor,
    #[token("while")]
    While,
    #[token("endwhile")]
    EndWhile,

    // Literal keywords
    #[token("true")]
    True,
    #[token("false")]
    False,
    #[token("null")]
    Null,
    #[token("array")]
    Array,

    // Word operators
    #[token("and")]
    And,
    #[token("or")]
    Or,

    // Operators (longer patterns first for readability; logos picks the longest match)
    #[token("->")]
    Arrow,
    #[token("=>")]
    FatArrow,
    #[token("===")]
    Identical,
    #[token("!==")]
    NotIdentical,
    #[token("==")]
    EqualEqual,
    #[token("!=")]
    NotEqual,
    #[token("<=")]
    LessOrEqual,
    #[token(">=")]
    GreaterOrEqual,
    #[token("<")]
    Less,
    #[token(">")]
    Greater,
    #[token("&&")]
    AndAnd,
    #[token("||")]
    OrOr,
    #[token("??")]
    Coalesce,
    #[token("?")]
    Question,
    #[token("++")]
    Increment,
    #[token("--")]
    Decrement,
    #[token("+=")]
    PlusAssign,
    #[token("-=")]
    MinusAssign,
    #[token(".=")]
    ConcatAssign,
    #[token("=")]
    Assign,
    #[token("!")]
    Bang,
    #[token("+")]
    Plus,
    #[token("-")]
    Minus,
    #[token("*")]
    Star,
    #[token("/")]
    Slash,
    #[token("%")]
    Percent,
    #[token(".")]
    Dot,

    // Delimiters
    #[token("(")]
    ParenOpen,
    #[token(")")]
    ParenClose,
    #[token("[")]
    BracketOpen,
    #[token("]")]
    BracketClose,
    #[token(",")]
    Comma,
    #[token(";")]
    Semicolon,
    #[token(":")]
    Colon,

    // Literals - identifiers must come after keywords
    #[regex(r"\$[a-zA-Z_][a-zA-Z0-9_]*", |lex| lex.slice()[1..].to_string())]
    Variable(String),

    #[regex(r"[a-zA-Z_][a-zA-Z0-9_]*", |lex| lex.slice().to_string(), priority = 1)]
    Ident(String),

    #[regex(r"'([^'\\]|\\.)*'", |lex| unescape_single(lex.slice()))]
    #[regex(r#""([^"\\]|\\.)*""#, |lex| unescape_double(lex.slice()))]
    Str(String),

    #[regex(r"[0-9]+\.[0-9]+", |lex| lex.slice().parse::<f64>().ok())]
    Float(f64),

    #[regex(r"[0-9]+", |lex| lex.slice().parse::<i64>().ok())]
    Int(i64),

    // Comments (skip)
    #[regex(r"/\*([^*]|\*[^/])*\*/", logos::skip)]
    BlockComment,

    #[regex(r"//[^\n]*", logos::skip)]
    LineComment,
}

/// Single-quoted strings only understand `\'` and `\\`
fn unescape_single(slice: &str) -> String {
    let inner = &slice[1..slice.len() - 1];
    let mut out = String::with_capacity(inner.len());
    let mut chars = inner.chars();
    while let Some(c) = chars.next() {
        if c == '\\' {
            match chars.next() {
                Some(next @ ('\'' | '\\')) => out.push(next),
                Some(next) => {
                    out.push('\\');
                    out.push(next);
                }
                None => out.push('\\'),
            }
        } else {
            out.push(c);
        }
    }
    out
}

/// Double-quoted strings take the usual escapes; variables are not interpolated
fn unescape_double(slice: &str) -> String {
    let inner = &slice[1..slice.len() - 1];
    let mut out = String::with_capacity(inner.len());
    let mut chars = inner.chars();
    while let Some(c) = chars.next() {
        if c != '\\' {
            out.push(c);
            continue;
        }
        match chars.next() {
            Some('n') => out.push('\n'),
            Some('t') => out.push('\t'),
            Some('r') => out.push('\r'),
            Some(next @ ('"' | '\\' | '$')) => out.push(next),
            Some(next) => {
                out.push('\\');
                out.push(next);
            }
            None => out.push('\\'),
        }
    }
    out
}

/// Lex one code island into tokens with absolute spans
///
/// `offset` is the position of `input` within the whole script, so spans can
/// be reported against the full compiled text.
pub fn lex(input: &str, offset: usize) -> Result<Vec<(Token, Span)>, Span> {
    Token::lexer(input)
        .spanned()
        .map(|(tok, span)| {
            let span = span.start + offset..span.end + offset;
            match tok {
                Ok(tok) => Ok((tok, span)),
                Err(()) => Err(span),
            }
        })
        .collect()
}

/// Human-readable form of a token for error messages
pub fn format_token(tok: &Token) -> String {
    match tok {
        Token::Variable(name) => format!("variable ${}", name),
        Token::Ident(name) => format!("identifier '{}'", name),
        Token::Str(s) => format!("string '{}'", s),
        Token::Int(i) => format!("number {}", i),
        Token::Float(f) => format!("number {}", f),
        Token::Echo => "'echo'".to_string(),
        Token::Unset => "'unset'".to_string(),
        Token::If => "'if'".to_string(),
        Token::ElseIf => "'elseif'".to_string(),
        Token::Else => "'else'".to_string(),
        Token::EndIf => "'endif'".to_string(),
        Token::Foreach => "'foreach'".to_string(),
        Token::As => "'as'".to_string(),
        Token::EndForeach => "'endforeach'".to_string(),
        Token::For => "'for'".to_string(),
        Token::EndFor => "'endfor'".to_string(),
        Token::While => "'while'".to_string(),
        Token::EndWhile => "'endwhile'".to_string(),
        Token::True => "'true'".to_string(),
        Token::False => "'false'".to_string(),
        Token::Null => "'null'".to_string(),
        Token::Array => "'array'".to_string(),
        Token::And => "'and'".to_string(),
        Token::Or => "'or'".to_string(),
        Token::Arrow => "'->'".to_string(),
        Token::FatArrow => "'=>'".to_string(),
        Token::Identical => "'==='".to_string(),
        Token::NotIdentical => "'!=='".to_string(),
        Token::EqualEqual => "'=='".to_string(),
        Token::NotEqual => "'!='".to_string(),
        Token::LessOrEqual => "'<='".to_string(),
        Token::GreaterOrEqual => "'>='".to_string(),
        Token::Less => "'<'".to_string(),
        Token::Greater => "'>'".to_string(),
        Token::AndAnd => "'&&'".to_string(),
        Token::OrOr => "'||'".to_string(),
        Token::Coalesce => "'??'".to_string(),
        Token::Question => "'?'".to_string(),
        Token::Increment => "'++'".to_string(),
        Token::Decrement => "'--'".to_string(),
        Token::PlusAssign => "'+='".to_string(),
        Token::MinusAssign => "'-='".to_string(),
        Token::ConcatAssign => "'.='".to_string(),
        Token::Assign => "'='".to_string(),
        Token::Bang => "'!'".to_string(),
        Token::Plus => "'+'".to_string(),
        Token::Minus => "'-'".to_string(),
        Token::Star => "'*'".to_string(),
        Token::Slash => "'/'".to_string(),
        Token::Percent => "'%'".to_string(),
        Token::Dot => "'.'".to_string(),
        Token::ParenOpen => "'('".to_string(),
        Token::ParenClose => "')'".to_string(),
        Token::BracketOpen => "'['".to_string(),
        Token::BracketClose => "']'".to_string(),
        Token::Comma => "','".to_string(),
        Token::Semicolon => "';'".to_string(),
        Token::Colon => "':'".to_string(),
        Token::BlockComment | Token::LineComment => "comment".to_string(),
    }
}

/// Turn a lexing failure into a script error
pub(crate) fn unknown_character(source: &str, span: Span, line: usize) -> ScriptError {
    let found = source.get(span.clone()).unwrap_or("?").to_string();
    ScriptError::Syntax {
        span,
        line,
        message: format!("Unexpected character '{}'", found),
        expected: vec![],
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tokens(input: &str) -> Vec<Token> {
        lex(input, 0).unwrap().into_iter().map(|(t, _)| t).collect()
    }

    #[test]
    fn test_keywords_and_identifiers() {
        assert_eq!(
            tokens("if iffy endif foreach"),
            vec![
                Token::If,
                Token::Ident("iffy".to_string()),
                Token::EndIf,
                Token::Foreach
            ]
        );
    }

    #[test]
    fn test_variables_drop_sigil() {
        assert_eq!(
            tokens("$__env->make"),
            vec![
                Token::Variable("__env".to_string()),
                Token::Arrow,
                Token::Ident("make".to_string())
            ]
        );
    }

    #[test]
    fn test_operators_take_longest_match() {
        assert_eq!(
            tokens("=== == = => !== != ?? ? ++ +="),
            vec![
                Token::Identical,
                Token::EqualEqual,
                Token::Assign,
                Token::FatArrow,
                Token::NotIdentical,
                Token::NotEqual,
                Token::Coalesce,
                Token::Question,
                Token::Increment,
                Token::PlusAssign
            ]
        );
    }

    #[test]
    fn test_string_escapes() {
        assert_eq!(tokens(r"'it\'s'"), vec![Token::Str("it's".to_string())]);
        assert_eq!(tokens(r"'a\nb'"), vec![Token::Str(r"a\nb".to_string())]);
        assert_eq!(tokens(r#""a\nb""#), vec![Token::Str("a\nb".to_string())]);
    }

    #[test]
    fn test_numbers() {
        assert_eq!(tokens("42 2.5"), vec![Token::Int(42), Token::Float(2.5)]);
    }

    #[test]
    fn test_comments_are_skipped() {
        assert_eq!(tokens("/**/ echo /* note */ 1"), vec![Token::Echo, Token::Int(1)]);
        assert!(tokens("/**/").is_empty());
    }

    #[test]
    fn test_spans_are_offset() {
        let lexed = lex("echo", 10).unwrap();
        assert_eq!(lexed[0].1, 10..14);
    }

    #[test]
    fn test_unknown_character_is_an_error() {
        assert_eq!(lex("echo @", 3), Err(8..9));
    }
}
