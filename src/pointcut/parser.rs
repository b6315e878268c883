//! Recursive-descent parser for pointcut expressions.
//!
//! Grammar (precedence low to high):
//!
//! ```text
//! expr     := and (('||' | 'or') and)*
//! and      := unary (('&&' | 'and') unary)*
//! unary    := ('!' | 'not') unary | '(' expr ')' | designator
//! ```
//!
//! Names and type patterns are "words": runs of adjacent identifier, `*`, `.`,
//! `..`, `+` and `[]` tokens. Whitespace ends a word, so `* get*(..)` holds the
//! two words `*` and `get*`.

use smol_str::SmolStr;
use text_size::{TextRange, TextSize};
use thiserror::Error;

use super::ast::{ArgPattern, MethodPattern, Pointcut, modifier_keyword};
use super::lexer::{Token, TokenKind, tokenize};
use super::pattern::{NamePattern, TypePattern};
use crate::java::Modifiers;

/// Designators of the AspectJ language that proxy-based AOP does not support.
pub const UNSUPPORTED_DESIGNATORS: &[&str] = &[
    "call",
    "get",
    "set",
    "handler",
    "cflow",
    "cflowbelow",
    "initialization",
    "preinitialization",
    "staticinitialization",
    "withincode",
    "adviceexecution",
    "if",
    "@this",
    "@withincode",
];

/// A syntax error in a pointcut expression.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("{message} at offset {}", u32::from(.range.start()))]
pub struct PointcutParseError {
    pub message: String,
    pub range: TextRange,
}

impl PointcutParseError {
    pub fn new(message: impl Into<String>, range: TextRange) -> Self {
        Self {
            message: message.into(),
            range,
        }
    }
}

/// Parse a complete pointcut expression.
pub fn parse(expression: &str) -> Result<Pointcut, PointcutParseError> {
    let mut parser = Parser::new(expression);
    let pointcut = parser.parse_expr()?;
    if !parser.at_eof() {
        return Err(parser.error(format!("unexpected '{}'", parser.current_text())));
    }
    Ok(pointcut)
}

/// Parse a standalone type pattern, as used by `declare-parents`.
pub fn parse_type_pattern(pattern: &str) -> Result<TypePattern, PointcutParseError> {
    let mut parser = Parser::new(pattern);
    let parsed = parser.parse_type_expr()?;
    if !parser.at_eof() {
        return Err(parser.error(format!("unexpected '{}'", parser.current_text())));
    }
    Ok(parsed)
}

struct Parser<'a> {
    source: &'a str,
    tokens: Vec<Token<'a>>,
    pos: usize,
}

impl<'a> Parser<'a> {
    fn new(source: &'a str) -> Self {
        Self {
            source,
            tokens: tokenize(source),
            pos: 0,
        }
    }

    // ------------------------------------------------------------------------
    // Token helpers
    // ------------------------------------------------------------------------

    fn current(&self) -> Option<&Token<'a>> {
        self.tokens.get(self.pos)
    }

    fn current_kind(&self) -> Option<TokenKind> {
        self.current().map(|t| t.kind)
    }

    fn current_text(&self) -> &'a str {
        self.current().map(|t| t.text).unwrap_or("")
    }

    fn at(&self, kind: TokenKind) -> bool {
        self.current_kind() == Some(kind)
    }

    fn at_keyword(&self, keyword: &str) -> bool {
        self.at(TokenKind::Ident) && self.current_text() == keyword
    }

    fn at_eof(&self) -> bool {
        self.pos >= self.tokens.len()
    }

    fn bump(&mut self) {
        if !self.at_eof() {
            self.pos += 1;
        }
    }

    fn eat(&mut self, kind: TokenKind) -> bool {
        if self.at(kind) {
            self.bump();
            true
        } else {
            false
        }
    }

    fn expect(&mut self, kind: TokenKind, what: &str) -> Result<(), PointcutParseError> {
        if self.eat(kind) {
            Ok(())
        } else if self.at_eof() {
            Err(self.error(format!("expected {what} but reached end of expression")))
        } else {
            Err(self.error(format!("expected {what} but found '{}'", self.current_text())))
        }
    }

    fn error(&self, message: impl Into<String>) -> PointcutParseError {
        let range = self
            .current()
            .map(|t| t.range())
            .unwrap_or_else(|| TextRange::empty(TextSize::of(self.source)));
        PointcutParseError::new(message, range)
    }

    /// Consume one word and return its source text.
    fn word(&mut self, what: &str) -> Result<&'a str, PointcutParseError> {
        let Some(first) = self.current().filter(|t| t.kind.is_word_part()) else {
            return Err(if self.at_eof() {
                self.error(format!("expected {what} but reached end of expression"))
            } else {
                self.error(format!("expected {what} but found '{}'", self.current_text()))
            });
        };
        let start = first.offset;
        let mut end = first.range().end();
        self.bump();
        while let Some(next) = self.current() {
            if !next.kind.is_word_part() || next.offset != end {
                break;
            }
            end = next.range().end();
            self.bump();
        }
        Ok(&self.source[TextRange::new(start, end)])
    }

    fn type_word(&mut self, what: &str) -> Result<TypePattern, PointcutParseError> {
        let start = self.pos;
        let word = self.word(what)?;
        TypePattern::parse_word(word).map_err(|message| self.error_at(start, message))
    }

    fn error_at(&self, token: usize, message: impl Into<String>) -> PointcutParseError {
        let range = self
            .tokens
            .get(token)
            .map(|t| t.range())
            .unwrap_or_else(|| TextRange::empty(TextSize::of(self.source)));
        PointcutParseError::new(message, range)
    }

    // ------------------------------------------------------------------------
    // Expressions
    // ------------------------------------------------------------------------

    fn parse_expr(&mut self) -> Result<Pointcut, PointcutParseError> {
        let mut left = self.parse_and()?;
        while self.eat(TokenKind::OrOr) || self.eat_keyword("or") {
            let right = self.parse_and()?;
            left = Pointcut::or(left, right);
        }
        Ok(left)
    }

    fn parse_and(&mut self) -> Result<Pointcut, PointcutParseError> {
        let mut left = self.parse_unary()?;
        while self.eat(TokenKind::AndAnd) || self.eat_keyword("and") {
            let right = self.parse_unary()?;
            left = Pointcut::and(left, right);
        }
        Ok(left)
    }

    fn parse_unary(&mut self) -> Result<Pointcut, PointcutParseError> {
        if self.eat(TokenKind::Bang) || self.eat_keyword("not") {
            return Ok(Pointcut::not(self.parse_unary()?));
        }
        if self.eat(TokenKind::LParen) {
            let inner = self.parse_expr()?;
            self.expect(TokenKind::RParen, "')'")?;
            return Ok(inner);
        }
        self.parse_designator()
    }

    fn eat_keyword(&mut self, keyword: &str) -> bool {
        if self.at_keyword(keyword) {
            self.bump();
            true
        } else {
            false
        }
    }

    fn parse_designator(&mut self) -> Result<Pointcut, PointcutParseError> {
        let start = self.pos;
        let name = if self.eat(TokenKind::At) {
            let word = self.word("annotation designator")?;
            format!("@{word}")
        } else {
            self.word("pointcut designator")?.to_string()
        };

        if UNSUPPORTED_DESIGNATORS.contains(&name.as_str()) {
            return Err(self.error_at(
                start,
                format!("pointcut designator '{name}' is not supported"),
            ));
        }
        self.expect(TokenKind::LParen, "'('")?;

        let pointcut = match name.as_str() {
            "execution" => Pointcut::Execution(Box::new(self.parse_method_pattern()?)),
            "within" => Pointcut::Within(self.parse_type_expr()?),
            "this" => Pointcut::This(self.type_word("type or binding")?),
            "target" => Pointcut::Target(self.type_word("type or binding")?),
            "args" => Pointcut::Args(self.parse_arg_list()?),
            "@annotation" => Pointcut::AtAnnotation(self.type_word("annotation type")?),
            "@within" => Pointcut::AtWithin(self.type_word("annotation type")?),
            "@target" => Pointcut::AtTarget(self.type_word("annotation type")?),
            "@args" => Pointcut::AtArgs(self.parse_arg_list()?),
            "bean" => return self.parse_bean(),
            other if other.starts_with('@') => {
                return Err(self.error_at(start, format!("unknown designator '{other}'")));
            }
            reference => {
                let args = self.parse_reference_args()?;
                let (declaring_type, name) = match reference.rsplit_once('.') {
                    Some((owner, name)) => (Some(SmolStr::new(owner)), SmolStr::new(name)),
                    None => (None, SmolStr::new(reference)),
                };
                if reference.contains('*') || reference.contains("..") || name.is_empty() {
                    return Err(self.error_at(start, format!("invalid pointcut reference '{reference}'")));
                }
                Pointcut::Reference {
                    declaring_type,
                    name,
                    args,
                }
            }
        };
        self.expect(TokenKind::RParen, "')'")?;
        Ok(pointcut)
    }

    fn parse_reference_args(&mut self) -> Result<Vec<SmolStr>, PointcutParseError> {
        let mut args = Vec::new();
        while !self.at(TokenKind::RParen) && !self.at_eof() {
            args.push(SmolStr::new(self.word("argument")?));
            if !self.eat(TokenKind::Comma) {
                break;
            }
        }
        Ok(args)
    }

    /// `bean(...)`: the raw text up to the closing paren is the name pattern.
    fn parse_bean(&mut self) -> Result<Pointcut, PointcutParseError> {
        let start = self
            .current()
            .map(|t| t.offset)
            .unwrap_or_else(|| TextSize::of(self.source));
        while !self.at(TokenKind::RParen) {
            if self.at_eof() {
                return Err(self.error("expected ')' but reached end of expression"));
            }
            self.bump();
        }
        let end = self.current().map(|t| t.offset).unwrap_or(start);
        self.bump();

        let text = self.source[TextRange::new(start, end)].trim();
        let (negated, text) = match text.strip_prefix('!') {
            Some(rest) => (true, rest.trim()),
            None => (false, text),
        };
        let pattern = NamePattern::bean(text)
            .map_err(|message| PointcutParseError::new(message, TextRange::new(start, end)))?;
        Ok(Pointcut::Bean { pattern, negated })
    }

    // ------------------------------------------------------------------------
    // Patterns
    // ------------------------------------------------------------------------

    /// `type_expr := type_and ('||' type_and)*` for `within(..)`.
    fn parse_type_expr(&mut self) -> Result<TypePattern, PointcutParseError> {
        let mut left = self.parse_type_and()?;
        while self.eat(TokenKind::OrOr) {
            let right = self.parse_type_and()?;
            left = TypePattern::Or(Box::new(left), Box::new(right));
        }
        Ok(left)
    }

    fn parse_type_and(&mut self) -> Result<TypePattern, PointcutParseError> {
        let mut left = self.parse_type_unary()?;
        while self.eat(TokenKind::AndAnd) {
            let right = self.parse_type_unary()?;
            left = TypePattern::And(Box::new(left), Box::new(right));
        }
        Ok(left)
    }

    fn parse_type_unary(&mut self) -> Result<TypePattern, PointcutParseError> {
        if self.eat(TokenKind::Bang) {
            return Ok(TypePattern::Not(Box::new(self.parse_type_unary()?)));
        }
        if self.eat(TokenKind::LParen) {
            let inner = self.parse_type_expr()?;
            self.expect(TokenKind::RParen, "')'")?;
            return Ok(inner);
        }
        self.type_word("type pattern")
    }

    fn parse_arg_list(&mut self) -> Result<Vec<ArgPattern>, PointcutParseError> {
        let mut args = Vec::new();
        while !self.at(TokenKind::RParen) && !self.at_eof() {
            args.push(self.parse_arg()?);
            if !self.eat(TokenKind::Comma) {
                break;
            }
        }
        Ok(args)
    }

    fn parse_arg(&mut self) -> Result<ArgPattern, PointcutParseError> {
        if self.at(TokenKind::DotDot) {
            let start = self.pos;
            let word = self.word("argument")?;
            if word != ".." {
                return Err(self.error_at(start, format!("invalid argument pattern '{word}'")));
            }
            return Ok(ArgPattern::Ellipsis);
        }
        Ok(ArgPattern::Type(self.parse_type_unary()?))
    }

    /// `[@Annotation]* [!]modifier* ReturnType [DeclaringType.]name(params) [throws T, ..]`
    fn parse_method_pattern(&mut self) -> Result<MethodPattern, PointcutParseError> {
        let mut annotations = Vec::new();
        while self.eat(TokenKind::At) {
            annotations.push(self.type_word("annotation type")?);
        }

        let mut words: Vec<(bool, usize, &'a str)> = Vec::new();
        while !self.at(TokenKind::LParen) {
            let negated = self.eat(TokenKind::Bang);
            let start = self.pos;
            let word = self.word("method signature")?;
            words.push((negated, start, word));
        }
        if words.len() < 2 {
            return Err(self.error("expected return type and method name before '('"));
        }

        let (_, name_pos, name_word) = words[words.len() - 1];
        let (ret_negated, ret_pos, ret_word) = words[words.len() - 2];
        if ret_negated {
            return Err(self.error_at(ret_pos, "return type pattern cannot be negated here"));
        }

        let mut modifiers = Modifiers::empty();
        let mut excluded_modifiers = Modifiers::empty();
        for &(negated, pos, word) in &words[..words.len() - 2] {
            let modifier = modifier_keyword(word)
                .ok_or_else(|| self.error_at(pos, format!("unexpected '{word}' in method pattern")))?;
            if negated {
                excluded_modifiers = excluded_modifiers | modifier;
            } else {
                modifiers = modifiers | modifier;
            }
        }

        let return_type =
            TypePattern::parse_word(ret_word).map_err(|message| self.error_at(ret_pos, message))?;
        let (declaring, name) = split_declaring(name_word);
        let declaring_type = declaring
            .map(|d| TypePattern::parse_word(&d))
            .transpose()
            .map_err(|message| self.error_at(name_pos, message))?;
        let name = NamePattern::new(name).map_err(|message| self.error_at(name_pos, message))?;

        self.expect(TokenKind::LParen, "'('")?;
        let params = self.parse_arg_list()?;
        self.expect(TokenKind::RParen, "')'")?;

        let mut throws = Vec::new();
        if self.eat_keyword("throws") {
            loop {
                throws.push(self.parse_type_unary()?);
                if !self.eat(TokenKind::Comma) {
                    break;
                }
            }
        }

        Ok(MethodPattern {
            annotations,
            modifiers,
            excluded_modifiers,
            return_type,
            declaring_type,
            name,
            params,
            throws,
        })
    }
}

/// Split `com.acme.Service.get*` into its declaring type and member name.
fn split_declaring(word: &str) -> (Option<String>, &str) {
    match word.rfind('.') {
        Some(idx) if idx > 0 && word.as_bytes()[idx - 1] == b'.' => {
            (Some(format!("{}*", &word[..=idx])), &word[idx + 1..])
        }
        Some(idx) => (Some(word[..idx].to_string()), &word[idx + 1..]),
        None => (None, word),
    }
}
