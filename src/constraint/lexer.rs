//! Logos-based lexer for the constraint mini-language.
//!
//! Whitespace is tokenized, not skipped, so round-trip tooling can
//! reproduce the input; the parser discards it. The token stream is
//! always terminated by exactly one `Eof` or `Error` token.

use logos::Logos;
use smol_str::SmolStr;
use text_size::TextSize;

/// Token kinds of the constraint language.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TokenKind {
    Whitespace,
    Identifier,
    Number,
    LPar,
    RPar,
    /// Boolean negation `!`.
    Not,
    /// Arithmetic negation `~`.
    Neg,
    Or,
    And,
    Xor,
    /// `=` or `==`.
    Equal,
    NotEqual,
    Less,
    LessEqual,
    Greater,
    GreaterEqual,
    /// `->`.
    Implies,
    /// `<->`.
    Equivalent,
    /// The `excludes` keyword.
    Excludes,
    Plus,
    Minus,
    Star,
    Slash,
    Eof,
    /// An unexpected character; terminates the stream.
    Error,
}

/// A token with its kind, text, and byte offset.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Token {
    pub kind: TokenKind,
    pub text: SmolStr,
    pub offset: TextSize,
}

impl Token {
    fn new(kind: TokenKind, text: &str, offset: usize) -> Self {
        Self {
            kind,
            text: SmolStr::new(text),
            offset: TextSize::new(offset as u32),
        }
    }
}

/// Logos token enum - maps to [`TokenKind`].
#[derive(Logos, Debug, Clone, Copy, PartialEq)]
pub(crate) enum LogosToken {
    #[regex(r"[ \t\r\n]+")]
    Whitespace,

    // `excludes` outranks the identifier regex by logos priority
    #[token("excludes")]
    ExcludesKw,

    #[regex(r"[A-Za-z_][A-Za-z0-9_]*")]
    Ident,

    #[regex(r"[0-9]+")]
    Number,

    // multi-character operators (longest match wins in logos)
    #[token("<->")]
    Equivalent,
    #[token("->")]
    Implies,
    #[token("<=")]
    LtEq,
    #[token(">=")]
    GtEq,
    #[token("==")]
    EqEq,
    #[token("!=")]
    BangEq,

    #[token("(")]
    LPar,
    #[token(")")]
    RPar,
    #[token("!")]
    Bang,
    #[token("~")]
    Tilde,
    #[token("|")]
    Pipe,
    #[token("&")]
    Amp,
    #[token("^")]
    Caret,
    #[token("=")]
    Eq,
    #[token("<")]
    Lt,
    #[token(">")]
    Gt,
    #[token("+")]
    Plus,
    #[token("-")]
    Minus,
    #[token("*")]
    Star,
    #[token("/")]
    Slash,

    // an embedded NUL ends the stream, like EOF
    #[token("\0")]
    Nul,
}

impl From<LogosToken> for TokenKind {
    fn from(token: LogosToken) -> Self {
        match token {
            LogosToken::Whitespace => TokenKind::Whitespace,
            LogosToken::ExcludesKw => TokenKind::Excludes,
            LogosToken::Ident => TokenKind::Identifier,
            LogosToken::Number => TokenKind::Number,
            LogosToken::Equivalent => TokenKind::Equivalent,
            LogosToken::Implies => TokenKind::Implies,
            LogosToken::LtEq => TokenKind::LessEqual,
            LogosToken::GtEq => TokenKind::GreaterEqual,
            LogosToken::EqEq | LogosToken::Eq => TokenKind::Equal,
            LogosToken::BangEq => TokenKind::NotEqual,
            LogosToken::LPar => TokenKind::LPar,
            LogosToken::RPar => TokenKind::RPar,
            LogosToken::Bang => TokenKind::Not,
            LogosToken::Tilde => TokenKind::Neg,
            LogosToken::Pipe => TokenKind::Or,
            LogosToken::Amp => TokenKind::And,
            LogosToken::Caret => TokenKind::Xor,
            LogosToken::Lt => TokenKind::Less,
            LogosToken::Gt => TokenKind::Greater,
            LogosToken::Plus => TokenKind::Plus,
            LogosToken::Minus => TokenKind::Minus,
            LogosToken::Star => TokenKind::Star,
            LogosToken::Slash => TokenKind::Slash,
            LogosToken::Nul => TokenKind::Eof,
        }
    }
}

/// Tokenize an entire constraint string.
///
/// The returned list always ends with exactly one `Eof` or `Error` token;
/// nothing past the first `Error` (or embedded NUL) is tokenized.
pub fn tokenize(input: &str) -> Vec<Token> {
    let mut tokens = Vec::new();
    let mut lexer = LogosToken::lexer(input);
    while let Some(result) = lexer.next() {
        let span = lexer.span();
        match result {
            Ok(LogosToken::Nul) => {
                tokens.push(Token::new(TokenKind::Eof, "", span.start));
                return tokens;
            }
            Ok(token) => tokens.push(Token::new(token.into(), lexer.slice(), span.start)),
            Err(()) => {
                tokens.push(Token::new(TokenKind::Error, lexer.slice(), span.start));
                return tokens;
            }
        }
    }
    tokens.push(Token::new(TokenKind::Eof, "", input.len()));
    tokens
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lex_error_terminates_stream() {
        let tokens = tokenize("feature_A@feature_B");
        assert_eq!(tokens.len(), 2);
        assert_eq!(tokens[0].kind, TokenKind::Identifier);
        assert_eq!(tokens[1].kind, TokenKind::Error);
        assert_eq!(tokens[1].text, "@");
    }

    #[test]
    fn test_lex_embedded_nul_acts_as_eof() {
        let tokens = tokenize("feature_A\0feature_B");
        assert_eq!(tokens.len(), 2);
        assert_eq!(tokens[0].kind, TokenKind::Identifier);
        assert_eq!(tokens[1].kind, TokenKind::Eof);
    }

    #[test]
    fn test_lex_equivalent_lookahead() {
        let tokens = tokenize("feature_A<->feature_B");
        let kinds: Vec<_> = tokens.iter().map(|t| t.kind).collect();
        assert_eq!(
            kinds,
            vec![
                TokenKind::Identifier,
                TokenKind::Equivalent,
                TokenKind::Identifier,
                TokenKind::Eof,
            ]
        );
        assert_eq!(tokens[0].text, "feature_A");
        assert_eq!(tokens[2].text, "feature_B");
    }

    #[test]
    fn test_lex_minus_extends_to_implies() {
        let kinds: Vec<_> = tokenize("a->b-c").iter().map(|t| t.kind).collect();
        assert_eq!(
            kinds,
            vec![
                TokenKind::Identifier,
                TokenKind::Implies,
                TokenKind::Identifier,
                TokenKind::Minus,
                TokenKind::Identifier,
                TokenKind::Eof,
            ]
        );
    }

    #[test]
    fn test_lex_less_family() {
        let kinds: Vec<_> = tokenize("a<b <=c <->d").iter().map(|t| t.kind).collect();
        assert!(kinds.contains(&TokenKind::Less));
        assert!(kinds.contains(&TokenKind::LessEqual));
        assert!(kinds.contains(&TokenKind::Equivalent));
    }

    #[test]
    fn test_lex_preserves_whitespace() {
        let tokens = tokenize("a  & b");
        assert_eq!(tokens[1].kind, TokenKind::Whitespace);
        assert_eq!(tokens[1].text, "  ");
        assert_eq!(u32::from(tokens[1].offset), 1);
    }

    #[test]
    fn test_lex_excludes_keyword() {
        let tokens = tokenize("A excludes B");
        assert_eq!(tokens[2].kind, TokenKind::Excludes);
        // but an identifier merely containing the keyword stays one token
        let tokens = tokenize("excludesAll");
        assert_eq!(tokens[0].kind, TokenKind::Identifier);
        assert_eq!(tokens[0].text, "excludesAll");
    }

    #[test]
    fn test_lex_both_equal_spellings() {
        assert_eq!(tokenize("a = b")[2].kind, TokenKind::Equal);
        assert_eq!(tokenize("a == b")[2].kind, TokenKind::Equal);
    }
}
