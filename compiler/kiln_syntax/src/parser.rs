//! Recursive-descent reader for `(rule literal? child*)` trees.

use kiln_ir::{AstNode, Literal, Rule, Span};
use kiln_stack::ensure_sufficient_stack;
use logos::Logos;

use crate::lexer::Token;
use crate::LoadError;

struct Parser {
    tokens: Vec<(Token, Span)>,
    pos: usize,
    /// Empty span at the end of the text, for errors at end of input.
    end: Span,
}

pub(crate) fn parse(text: &str) -> Result<AstNode, LoadError> {
    let mut tokens = Vec::new();
    for (token, range) in Token::lexer(text).spanned() {
        let span = Span::from_range(range);
        match token {
            Ok(token) => tokens.push((token, span)),
            Err(()) => return Err(LoadError::BadToken { span }),
        }
    }
    let len = u32::try_from(text.len()).unwrap_or(u32::MAX);
    let mut parser = Parser {
        tokens,
        pos: 0,
        end: Span::new(len, len),
    };
    if parser.tokens.is_empty() {
        return Err(LoadError::Empty);
    }
    let root = parser.node()?;
    if let Some((_, span)) = parser.tokens.get(parser.pos) {
        return Err(LoadError::TrailingInput { span: *span });
    }
    Ok(root)
}

fn describe(token: &Token) -> String {
    match token {
        Token::Open => "`(`".to_string(),
        Token::Close => "`)`".to_string(),
        Token::Bool(b) => format!("`{b}`"),
        Token::Int(v) => format!("integer `{v}`"),
        Token::Float(v) => format!("float `{v}`"),
        Token::Str(s) => format!("string {s:?}"),
        Token::Word(w) => format!("`{w}`"),
    }
}

impl Parser {
    fn peek(&self) -> Option<&(Token, Span)> {
        self.tokens.get(self.pos)
    }

    fn bump(&mut self) -> Option<(Token, Span)> {
        let tok = self.tokens.get(self.pos).cloned();
        self.pos += 1;
        tok
    }

    fn node(&mut self) -> Result<AstNode, LoadError> {
        ensure_sufficient_stack(|| self.node_inner())
    }

    fn node_inner(&mut self) -> Result<AstNode, LoadError> {
        let open = match self.bump() {
            Some((Token::Open, span)) => span,
            Some((other, span)) => {
                return Err(LoadError::Unexpected {
                    span,
                    expected: "`(`",
                    found: describe(&other),
                })
            }
            None => {
                return Err(LoadError::Unexpected {
                    span: self.end,
                    expected: "`(`",
                    found: "end of input".to_string(),
                })
            }
        };

        let rule = match self.bump() {
            Some((Token::Word(name), span)) => {
                Rule::from_name(&name).ok_or(LoadError::UnknownRule { span, name })?
            }
            Some((other, span)) => {
                return Err(LoadError::Unexpected {
                    span,
                    expected: "a rule name",
                    found: describe(&other),
                })
            }
            None => return Err(LoadError::Unclosed { span: open }),
        };

        let mut node = AstNode::new(rule, open);
        loop {
            let Some((token, span)) = self.peek().cloned() else {
                return Err(LoadError::Unclosed { span: open });
            };
            let literal = match token {
                Token::Close => {
                    self.pos += 1;
                    node.span = open.merge(span);
                    return Ok(node);
                }
                Token::Open => {
                    let child = self.node()?;
                    node.children.push(child);
                    continue;
                }
                Token::Bool(b) => Literal::Bool(b),
                Token::Int(v) => Literal::Int(v),
                Token::Float(v) => Literal::Float(v),
                Token::Str(s) => Literal::Str(s),
                Token::Word(w) => Literal::Symbol(w),
            };
            if node.literal.is_some() || !node.children.is_empty() {
                return Err(LoadError::MisplacedLiteral {
                    span,
                    rule: rule.name(),
                });
            }
            self.pos += 1;
            node.literal = Some(literal);
        }
    }
}
