//! SQL tokenizer using nom.
//!
//! Only fine enough to tell keywords apart from literals, quoted
//! identifiers and comments. Unterminated literals and comments are errors.

use nom::{
    IResult,
    branch::alt,
    bytes::complete::{is_not, tag, take_until, take_while},
    character::complete::{anychar, char, digit0, digit1, satisfy},
    combinator::{cut, map, opt, recognize, value},
    multi::many0,
    sequence::{pair, preceded, terminated, tuple},
};
use thiserror::Error;

/// A lexical token borrowed from the input.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Token<'a> {
    /// Bare word: keyword, function or unquoted identifier.
    Word(&'a str),
    Number(&'a str),
    /// Single-quoted string, quotes included.
    StringLit(&'a str),
    /// Double-quoted or backtick-quoted identifier, quotes included.
    QuotedIdent(&'a str),
    LineComment(&'a str),
    BlockComment(&'a str),
    /// Bind parameter: `?`, `$1`, `%s` or `:name`.
    Placeholder(&'a str),
    Semicolon,
    LParen,
    RParen,
    Punct(&'a str),
}

impl Token<'_> {
    pub fn is_comment(&self) -> bool {
        matches!(self, Token::LineComment(_) | Token::BlockComment(_))
    }

    /// Case-insensitive keyword test for bare words.
    pub fn is_word(&self, keyword: &str) -> bool {
        matches!(self, Token::Word(w) if w.eq_ignore_ascii_case(keyword))
    }
}

/// Input the tokenizer could not consume.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unterminated {what} at offset {offset}")]
pub struct LexError {
    pub offset: usize,
    pub what: &'static str,
}

/// Split `input` into tokens, skipping whitespace.
pub fn tokenize(input: &str) -> Result<Vec<Token<'_>>, LexError> {
    let mut tokens = Vec::new();
    let mut rest = input.trim_start();

    while !rest.is_empty() {
        match token(rest) {
            Ok((remaining, tok)) => {
                tokens.push(tok);
                rest = remaining.trim_start();
            }
            Err(_) => {
                return Err(LexError {
                    offset: input.len() - rest.len(),
                    what: describe(rest),
                });
            }
        }
    }

    Ok(tokens)
}

fn describe(rest: &str) -> &'static str {
    if rest.starts_with("/*") {
        "block comment"
    } else if rest.starts_with('\'') {
        "string literal"
    } else {
        "quoted identifier"
    }
}

fn token(input: &str) -> IResult<&str, Token<'_>> {
    alt((
        map(block_comment, Token::BlockComment),
        map(line_comment, Token::LineComment),
        map(string_literal, Token::StringLit),
        map(quoted_identifier, Token::QuotedIdent),
        map(tag("::"), Token::Punct),
        map(placeholder, Token::Placeholder),
        map(number, Token::Number),
        map(word, Token::Word),
        value(Token::Semicolon, char(';')),
        value(Token::LParen, char('(')),
        value(Token::RParen, char(')')),
        map(recognize(anychar), Token::Punct),
    ))(input)
}

/// `/* ... */`, not nested.
fn block_comment(input: &str) -> IResult<&str, &str> {
    recognize(preceded(tag("/*"), cut(terminated(take_until("*/"), tag("*/")))))(input)
}

/// `-- ...` or `# ...` up to the end of the line.
fn line_comment(input: &str) -> IResult<&str, &str> {
    recognize(pair(alt((tag("--"), tag("#"))), opt(is_not("\n"))))(input)
}

/// `'...'` with `''` as the escaped quote.
fn string_literal(input: &str) -> IResult<&str, &str> {
    recognize(preceded(
        char('\''),
        cut(terminated(many0(alt((is_not("'"), tag("''")))), char('\''))),
    ))(input)
}

fn quoted_identifier(input: &str) -> IResult<&str, &str> {
    alt((
        recognize(preceded(
            char('"'),
            cut(terminated(many0(alt((is_not("\""), tag("\"\"")))), char('"'))),
        )),
        recognize(preceded(char('`'), cut(terminated(opt(is_not("`")), char('`'))))),
    ))(input)
}

fn placeholder(input: &str) -> IResult<&str, &str> {
    alt((
        tag("?"),
        tag("%s"),
        recognize(pair(char('$'), digit1)),
        recognize(pair(char(':'), word)),
    ))(input)
}

fn number(input: &str) -> IResult<&str, &str> {
    recognize(tuple((digit1, opt(pair(char('.'), digit0)))))(input)
}

fn word(input: &str) -> IResult<&str, &str> {
    recognize(pair(
        satisfy(|c| c.is_alphabetic() || c == '_'),
        take_while(|c: char| c.is_alphanumeric() || c == '_' || c == '$'),
    ))(input)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tokenize_select() {
        let tokens = tokenize("SELECT a, 'it''s' FROM \"my table\" WHERE b = ?;").unwrap();
        assert_eq!(
            tokens,
            vec![
                Token::Word("SELECT"),
                Token::Word("a"),
                Token::Punct(","),
                Token::StringLit("'it''s'"),
                Token::Word("FROM"),
                Token::QuotedIdent("\"my table\""),
                Token::Word("WHERE"),
                Token::Word("b"),
                Token::Punct("="),
                Token::Placeholder("?"),
                Token::Semicolon,
            ]
        );
    }

    #[test]
    fn test_keywords_inside_literals_are_not_words() {
        let tokens = tokenize("SELECT 'DROP TABLE x' AS \"delete\"").unwrap();
        assert!(!tokens.iter().any(|t| t.is_word("drop") || t.is_word("delete")));
    }

    #[test]
    fn test_comments() {
        let tokens = tokenize("SELECT 1 -- trailing\n/* block */ FROM t").unwrap();
        assert_eq!(tokens.iter().filter(|t| t.is_comment()).count(), 2);
    }

    #[test]
    fn test_placeholders_and_casts() {
        let tokens = tokenize("SELECT x::INT FROM t LIMIT %s OFFSET $2 WHERE n = :name").unwrap();
        assert!(tokens.contains(&Token::Punct("::")));
        assert!(tokens.contains(&Token::Word("INT")));
        assert!(tokens.contains(&Token::Placeholder("%s")));
        assert!(tokens.contains(&Token::Placeholder("$2")));
        assert!(tokens.contains(&Token::Placeholder(":name")));
    }

    #[test]
    fn test_unterminated_input() {
        let err = tokenize("SELECT 'abc FROM t").unwrap_err();
        assert_eq!(err.what, "string literal");
        assert_eq!(err.offset, 7);

        let err = tokenize("SELECT 1 /* open").unwrap_err();
        assert_eq!(err.what, "block comment");

        assert!(tokenize("SELECT \"abc").is_err());
    }
}
