//! Reader for the IR text format printed by `IrExpr`'s `Display`.
//!
//! Data literals (`##…`) are output-only and are rejected here; the builtin
//! library never needs them.

use std::fmt::Display;

use crate::ir::IrExpr;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IrParseError {
    pub message: String,
    pub offset: usize,
}

impl Display for IrParseError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} at byte {}", self.message, self.offset)
    }
}

impl std::error::Error for IrParseError {}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Tok {
    LParen,
    RParen,
    LBrace,
    RBrace,
    Comma,
    Arrow,
    Eq,
    Semi,
    Int(i128),
    Bytes(Vec<u8>),
    Str(String),
    Name(String),
}

fn is_name_start(c: char) -> bool {
    c.is_ascii_alphabetic() || c == '_' || c == '$'
}

fn is_name_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || matches!(c, '_' | '$' | '[' | ']' | '@')
}

fn tokenize(src: &str) -> Result<Vec<(Tok, usize)>, IrParseError> {
    let bytes: Vec<char> = src.chars().collect();
    let mut offsets = Vec::with_capacity(bytes.len());
    let mut off = 0;
    for c in &bytes {
        offsets.push(off);
        off += c.len_utf8();
    }
    let err = |i: usize, message: String| IrParseError {
        message,
        offset: offsets.get(i).copied().unwrap_or(src.len()),
    };

    let mut out = Vec::new();
    let mut i = 0;
    while i < bytes.len() {
        let c = bytes[i];
        let at = offsets[i];
        match c {
            c if c.is_whitespace() => i += 1,
            '/' if bytes.get(i + 1) == Some(&'/') => {
                while i < bytes.len() && bytes[i] != '\n' {
                    i += 1;
                }
            }
            '(' => {
                out.push((Tok::LParen, at));
                i += 1;
            }
            ')' => {
                out.push((Tok::RParen, at));
                i += 1;
            }
            '{' => {
                out.push((Tok::LBrace, at));
                i += 1;
            }
            '}' => {
                out.push((Tok::RBrace, at));
                i += 1;
            }
            ',' => {
                out.push((Tok::Comma, at));
                i += 1;
            }
            '=' => {
                out.push((Tok::Eq, at));
                i += 1;
            }
            ';' => {
                out.push((Tok::Semi, at));
                i += 1;
            }
            '-' if bytes.get(i + 1) == Some(&'>') => {
                out.push((Tok::Arrow, at));
                i += 2;
            }
            '-' | '0'..='9' => {
                let start = i;
                i += 1;
                while i < bytes.len() && bytes[i].is_ascii_digit() {
                    i += 1;
                }
                let text: String = bytes[start..i].iter().collect();
                let v = text
                    .parse::<i128>()
                    .map_err(|_| err(start, format!("invalid integer literal {text:?}")))?;
                out.push((Tok::Int(v), at));
            }
            '#' => {
                if bytes.get(i + 1) == Some(&'#') {
                    return Err(err(i, "data literals cannot be parsed".to_string()));
                }
                let start = i + 1;
                i += 1;
                while i < bytes.len() && bytes[i].is_ascii_hexdigit() {
                    i += 1;
                }
                let text: String = bytes[start..i].iter().collect();
                let v = hex::decode(&text)
                    .map_err(|e| err(start, format!("invalid bytes literal #{text}: {e}")))?;
                out.push((Tok::Bytes(v), at));
            }
            '"' => {
                let start = i;
                i += 1;
                let mut s = String::new();
                loop {
                    let Some(&c) = bytes.get(i) else {
                        return Err(err(start, "unterminated string literal".to_string()));
                    };
                    i += 1;
                    match c {
                        '"' => break,
                        '\\' => {
                            let Some(&e) = bytes.get(i) else {
                                return Err(err(start, "unterminated string literal".to_string()));
                            };
                            i += 1;
                            match e {
                                '"' => s.push('"'),
                                '\\' => s.push('\\'),
                                '/' => s.push('/'),
                                'n' => s.push('\n'),
                                't' => s.push('\t'),
                                'r' => s.push('\r'),
                                'u' => {
                                    let hex: String = bytes.iter().skip(i).take(4).collect();
                                    let code = u32::from_str_radix(&hex, 16)
                                        .ok()
                                        .and_then(char::from_u32)
                                        .ok_or_else(|| err(i, format!("invalid \\u escape {hex:?}")))?;
                                    s.push(code);
                                    i += 4;
                                }
                                other => {
                                    return Err(err(i - 1, format!("invalid escape \\{other}")));
                                }
                            }
                        }
                        other => s.push(other),
                    }
                }
                out.push((Tok::Str(s), at));
            }
            c if is_name_start(c) => {
                let start = i;
                while i < bytes.len() && is_name_char(bytes[i]) {
                    i += 1;
                }
                out.push((Tok::Name(bytes[start..i].iter().collect()), at));
            }
            other => return Err(err(i, format!("unexpected character {other:?}"))),
        }
    }
    Ok(out)
}

struct Parser {
    toks: Vec<(Tok, usize)>,
    pos: usize,
    end: usize,
}

impl Parser {
    fn peek(&self) -> Option<&Tok> {
        self.toks.get(self.pos).map(|(t, _)| t)
    }

    fn peek_at(&self, n: usize) -> Option<&Tok> {
        self.toks.get(self.pos + n).map(|(t, _)| t)
    }

    fn offset(&self) -> usize {
        self.toks.get(self.pos).map(|(_, o)| *o).unwrap_or(self.end)
    }

    fn fail<T>(&self, message: impl Into<String>) -> Result<T, IrParseError> {
        Err(IrParseError {
            message: message.into(),
            offset: self.offset(),
        })
    }

    fn next(&mut self) -> Option<Tok> {
        let t = self.toks.get(self.pos).map(|(t, _)| t.clone());
        if t.is_some() {
            self.pos += 1;
        }
        t
    }

    fn expect(&mut self, want: Tok, what: &str) -> Result<(), IrParseError> {
        if self.peek() == Some(&want) {
            self.pos += 1;
            Ok(())
        } else {
            self.fail(format!("expected {what}"))
        }
    }

    fn expr(&mut self) -> Result<IrExpr, IrParseError> {
        let mut e = self.primary()?;
        while self.peek() == Some(&Tok::LParen) {
            self.pos += 1;
            let mut args = Vec::new();
            if self.peek() == Some(&Tok::RParen) {
                self.pos += 1;
            } else {
                loop {
                    args.push(self.expr()?);
                    match self.next() {
                        Some(Tok::Comma) => continue,
                        Some(Tok::RParen) => break,
                        _ => {
                            self.pos = self.pos.saturating_sub(1);
                            return self.fail("expected ',' or ')' in argument list");
                        }
                    }
                }
            }
            e = IrExpr::call(e, args);
        }
        Ok(e)
    }

    fn lambda_tail(&mut self, params: Vec<String>) -> Result<IrExpr, IrParseError> {
        self.expect(Tok::Arrow, "'->'")?;
        self.expect(Tok::LBrace, "'{'")?;
        let body = self.expr()?;
        self.expect(Tok::RBrace, "'}'")?;
        Ok(IrExpr::lambda(params, body))
    }

    fn primary(&mut self) -> Result<IrExpr, IrParseError> {
        match self.peek().cloned() {
            Some(Tok::LParen) => {
                if self.peek_at(1) == Some(&Tok::RParen) {
                    if self.peek_at(2) == Some(&Tok::Arrow) {
                        self.pos += 2;
                        return self.lambda_tail(Vec::new());
                    }
                    self.pos += 2;
                    return Ok(IrExpr::unit());
                }
                self.pos += 1;
                let mut params = Vec::new();
                loop {
                    match self.next() {
                        Some(Tok::Name(n)) => params.push(n),
                        _ => {
                            self.pos = self.pos.saturating_sub(1);
                            return self.fail("expected parameter name");
                        }
                    }
                    match self.next() {
                        Some(Tok::Comma) => continue,
                        Some(Tok::RParen) => break,
                        _ => {
                            self.pos = self.pos.saturating_sub(1);
                            return self.fail("expected ',' or ')' in parameter list");
                        }
                    }
                }
                self.lambda_tail(params)
            }
            Some(Tok::Int(i)) => {
                self.pos += 1;
                Ok(IrExpr::int(i))
            }
            Some(Tok::Bytes(b)) => {
                self.pos += 1;
                Ok(IrExpr::bytes(b))
            }
            Some(Tok::Str(s)) => {
                self.pos += 1;
                Ok(IrExpr::str(s))
            }
            Some(Tok::Name(n)) => {
                self.pos += 1;
                match n.as_str() {
                    "true" => Ok(IrExpr::bool(true)),
                    "false" => Ok(IrExpr::bool(false)),
                    "error" if self.peek() == Some(&Tok::LParen) => {
                        self.pos += 1;
                        let msg = match self.next() {
                            Some(Tok::Str(s)) => s,
                            _ => {
                                self.pos = self.pos.saturating_sub(1);
                                return self.fail("expected string message in error(...)");
                            }
                        };
                        self.expect(Tok::RParen, "')'")?;
                        Ok(IrExpr::error(msg))
                    }
                    _ => Ok(IrExpr::Name(n)),
                }
            }
            Some(_) => self.fail("expected expression"),
            None => self.fail("unexpected end of input"),
        }
    }
}

pub fn parse_ir(src: &str) -> Result<IrExpr, IrParseError> {
    let mut p = Parser {
        toks: tokenize(src)?,
        pos: 0,
        end: src.len(),
    };
    let e = p.expr()?;
    if p.peek().is_some() {
        return p.fail("trailing input after expression");
    }
    Ok(e)
}

/// Reads `name = expr;` definitions.
pub fn parse_definitions(src: &str) -> Result<Vec<(String, IrExpr)>, IrParseError> {
    let mut p = Parser {
        toks: tokenize(src)?,
        pos: 0,
        end: src.len(),
    };
    let mut out = Vec::new();
    while p.peek().is_some() {
        let name = match p.next() {
            Some(Tok::Name(n)) => n,
            _ => {
                p.pos = p.pos.saturating_sub(1);
                return p.fail("expected definition name");
            }
        };
        p.expect(Tok::Eq, "'='")?;
        let e = p.expr()?;
        p.expect(Tok::Semi, "';'")?;
        out.push((name, e));
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn printed_ir_reparses() {
        let src = r#"(self, $0__x) -> {
            __core__ifThenElse(
                __core__equalsInteger(self, -1),
                () -> { #00ff },
                () -> { error("bad \"value\"") }
            )()
        }(__vallum__list[__vallum__map[__vallum__int@__vallum__bool]]__length, ())"#;
        let e = parse_ir(src).expect("parse");
        let again = parse_ir(&e.to_string()).expect("reparse printed form");
        assert_eq!(e, again);
        assert!(e
            .free_names()
            .contains(&"__vallum__list[__vallum__map[__vallum__int@__vallum__bool]]__length".to_string()));
    }

    #[test]
    fn unit_versus_thunk() {
        assert_eq!(parse_ir("()").expect("unit"), IrExpr::unit());
        assert_eq!(
            parse_ir("() -> { () }").expect("thunk"),
            IrExpr::delay(IrExpr::unit())
        );
        assert_eq!(
            parse_ir("f()").expect("force"),
            IrExpr::force(IrExpr::name("f"))
        );
    }

    #[test]
    fn definitions_block() {
        let defs = parse_definitions(
            "// identity\na = (x) -> { x };\nb = a(1);",
        )
        .expect("parse");
        assert_eq!(defs.len(), 2);
        assert_eq!(defs[1].0, "b");
    }

    #[test]
    fn errors_carry_offsets() {
        let err = parse_ir("(x) -> { x").expect_err("unterminated");
        assert!(err.message.contains("'}'"), "{err}");
        assert!(parse_ir("##d87980").is_err());
    }
}
