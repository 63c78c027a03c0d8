//! Collected token stream with error accounting

use super::token::Token;
use crate::utils::Spanned;

/// A fully collected stream of spanned tokens
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TokenStream {
    tokens: Vec<Spanned<Token>>,
}

impl TokenStream {
    pub fn new() -> Self {
        Self { tokens: Vec::new() }
    }

    pub fn from_vec(tokens: Vec<Spanned<Token>>) -> Self {
        Self { tokens }
    }

    pub fn push(&mut self, token: Spanned<Token>) {
        self.tokens.push(token);
    }

    pub fn len(&self) -> usize {
        self.tokens.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tokens.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Spanned<Token>> {
        self.tokens.iter()
    }

    pub fn tokens(&self) -> &[Spanned<Token>] {
        &self.tokens
    }

    /// Tokens that carry parser-relevant content, newlines excluded
    pub fn significant(&self) -> impl Iterator<Item = &Spanned<Token>> {
        self.tokens
            .iter()
            .filter(|t| !matches!(t.value, Token::Newline | Token::Eof))
    }

    pub fn errors(&self) -> impl Iterator<Item = &Spanned<Token>> {
        self.tokens.iter().filter(|t| t.value.is_error())
    }

    pub fn error_count(&self) -> usize {
        self.errors().count()
    }

    pub fn has_errors(&self) -> bool {
        self.tokens.iter().any(|t| t.value.is_error())
    }

    /// Whether the stream was terminated by an Eof token
    pub fn is_terminated(&self) -> bool {
        matches!(self.tokens.last().map(|t| &t.value), Some(Token::Eof))
    }
}

impl IntoIterator for TokenStream {
    type Item = Spanned<Token>;
    type IntoIter = std::vec::IntoIter<Spanned<Token>>;

    fn into_iter(self) -> Self::IntoIter {
        self.tokens.into_iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tokens::token::ErrorKind;
    use crate::utils::{Position, Span, Spanned};

    fn spanned(token: Token) -> Spanned<Token> {
        Spanned::new(token, Span::single(Position::start()))
    }

    #[test]
    fn test_stream_accounting() {
        let mut stream = TokenStream::new();
        stream.push(spanned(Token::Word("admin".to_string())));
        stream.push(spanned(Token::Error(ErrorKind::EmptyGroup)));
        stream.push(spanned(Token::Newline));
        stream.push(spanned(Token::Eof));

        assert_eq!(stream.len(), 4);
        assert_eq!(stream.significant().count(), 2);
        assert_eq!(stream.error_count(), 1);
        assert!(stream.has_errors());
        assert!(stream.is_terminated());
    }

    #[test]
    fn test_empty_stream() {
        let stream = TokenStream::new();
        assert!(stream.is_empty());
        assert!(!stream.has_errors());
        assert!(!stream.is_terminated());
    }
}
