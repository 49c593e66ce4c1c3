//! Recursive-descent parser: turns the lexer's flat token stream into a
//! tree of [`Node`]s. Each action's inner content was already whitespace-
//! normalized by the lexer, so keyword dispatch here is a plain prefix
//! match.

use super::ast::{Builtin, Expr, Literal, Node, RangeBinding};
use super::lexer::RawToken;
use crate::error::EngineError;

pub(crate) fn parse(tokens: Vec<RawToken>) -> Result<Vec<Node>, EngineError> {
    let mut ts = TokenStream {
        tokens: &tokens,
        pos: 0,
    };
    let body = parse_sequence(&mut ts)?;
    if let Some(tok) = ts.peek_content() {
        return Err(syntax(format!("unexpected {{{{{}}}}} with no open block", tok)));
    }
    Ok(body)
}

struct TokenStream<'a> {
    tokens: &'a [RawToken],
    pos: usize,
}

impl<'a> TokenStream<'a> {
    fn peek(&self) -> Option<&'a RawToken> {
        self.tokens.get(self.pos)
    }

    fn peek_content(&self) -> Option<&'a str> {
        match self.peek() {
            Some(RawToken::Action { content, .. }) => Some(content.as_str()),
            _ => None,
        }
    }

    fn next(&mut self) -> Option<&'a RawToken> {
        let tok = self.tokens.get(self.pos);
        if tok.is_some() {
            self.pos += 1;
        }
        tok
    }
}

fn syntax(message: impl Into<String>) -> EngineError {
    EngineError::Syntax {
        offset: 0,
        message: message.into(),
    }
}

/// Parses nodes until a terminating `end`/`else`/`else if ...` action is
/// reached (left unconsumed) or the stream runs out.
fn parse_sequence(ts: &mut TokenStream) -> Result<Vec<Node>, EngineError> {
    let mut nodes = Vec::new();
    loop {
        match ts.peek() {
            None => return Ok(nodes),
            Some(RawToken::Text(_)) => {
                if let Some(RawToken::Text(t)) = ts.next() {
                    nodes.push(Node::Text(t.clone()));
                }
            }
            Some(RawToken::Action { content, .. }) => {
                if is_terminator(content) {
                    return Ok(nodes);
                }
                let content = content.clone();
                ts.next();
                nodes.push(parse_action(&content, ts)?);
            }
        }
    }
}

fn is_terminator(content: &str) -> bool {
    content == "end" || content == "else" || content.starts_with("else ")
}

fn parse_action(content: &str, ts: &mut TokenStream) -> Result<Node, EngineError> {
    if content.starts_with("/*") {
        return Ok(Node::Comment);
    }
    if let Some(rest) = content.strip_prefix("if ") {
        let cond = parse_expr_str(rest.trim())?;
        let then_body = parse_sequence(ts)?;
        let else_body = parse_else(ts)?;
        return Ok(Node::If {
            cond,
            then_body,
            else_body,
        });
    }
    if let Some(rest) = content.strip_prefix("range ") {
        let (binding, expr_str) = parse_range_header(rest)?;
        let expr = parse_expr_str(&expr_str)?;
        let body = parse_sequence(ts)?;
        let empty_body = parse_range_else(ts)?;
        return Ok(Node::Range {
            expr,
            binding,
            body,
            empty_body,
        });
    }
    if let Some(rest) = content.strip_prefix("with ") {
        let (binding, expr_str) = parse_with_header(rest)?;
        let expr = parse_expr_str(&expr_str)?;
        let body = parse_sequence(ts)?;
        let else_body = parse_else(ts)?;
        return Ok(Node::With {
            expr,
            binding,
            body,
            else_body,
        });
    }
    if let Some(rest) = content.strip_prefix("define ") {
        let name = parse_quoted_name(rest.trim())?;
        let body = parse_sequence(ts)?;
        expect_end(ts)?;
        return Ok(Node::Define { name, body });
    }
    if let Some(rest) = content.strip_prefix("block ") {
        let (name, data_str) = split_name_and_rest(rest.trim())?;
        let data = if data_str.is_empty() {
            None
        } else {
            Some(parse_expr_str(&data_str)?)
        };
        let body = parse_sequence(ts)?;
        expect_end(ts)?;
        return Ok(Node::Block { name, data, body });
    }
    if let Some(rest) = content.strip_prefix("template ") {
        let (name, data_str) = split_name_and_rest(rest.trim())?;
        let data = if data_str.is_empty() {
            None
        } else {
            Some(parse_expr_str(&data_str)?)
        };
        return Ok(Node::Invoke { name, data });
    }
    if content == "end" || content == "else" || content.starts_with("else ") {
        return Err(syntax(format!("unexpected {{{{{}}}}}", content)));
    }
    Ok(Node::Interpolation(parse_expr_str(content)?))
}

/// Consumes the terminator for an `if`/`with` body: either a bare `end`,
/// an `else` block (terminated by `end`), or a chain of `else if ...`.
fn parse_else(ts: &mut TokenStream) -> Result<Option<Vec<Node>>, EngineError> {
    match ts.peek_content() {
        Some("end") => {
            ts.next();
            Ok(None)
        }
        Some("else") => {
            ts.next();
            let body = parse_sequence(ts)?;
            expect_end(ts)?;
            Ok(Some(body))
        }
        Some(content) if content.starts_with("else if ") => {
            let cond_str = content.strip_prefix("else if ").unwrap().trim().to_string();
            ts.next();
            let cond = parse_expr_str(&cond_str)?;
            let then_body = parse_sequence(ts)?;
            let else_body = parse_else(ts)?;
            Ok(Some(vec![Node::If {
                cond,
                then_body,
                else_body,
            }]))
        }
        _ => Err(syntax("expected {{else}} or {{end}}")),
    }
}

/// `range` has no `else if` chaining; its else-branch only runs when the
/// target is empty.
fn parse_range_else(ts: &mut TokenStream) -> Result<Option<Vec<Node>>, EngineError> {
    match ts.peek_content() {
        Some("end") => {
            ts.next();
            Ok(None)
        }
        Some("else") => {
            ts.next();
            let body = parse_sequence(ts)?;
            expect_end(ts)?;
            Ok(Some(body))
        }
        _ => Err(syntax("expected {{else}} or {{end}} to close {{range}}")),
    }
}

fn expect_end(ts: &mut TokenStream) -> Result<(), EngineError> {
    match ts.peek_content() {
        Some("end") => {
            ts.next();
            Ok(())
        }
        _ => Err(syntax("expected {{end}}")),
    }
}

/// Splits `range`'s header into an optional binding and the remaining
/// expression text: `$i, $v := .Items`, `$v := .Items`, or plain `.Items`.
fn parse_range_header(rest: &str) -> Result<(Option<RangeBinding>, String), EngineError> {
    if let Some(idx) = rest.find(":=") {
        let (lhs, rhs) = rest.split_at(idx);
        let rhs = rhs[2..].trim().to_string();
        let vars: Vec<&str> = lhs.split(',').map(|s| s.trim()).collect();
        let binding = match vars.as_slice() {
            [single] => RangeBinding::Value(strip_var(single)?),
            [key, value] => RangeBinding::KeyValue(strip_var(key)?, strip_var(value)?),
            _ => return Err(syntax("range binds at most two variables")),
        };
        Ok((Some(binding), rhs))
    } else {
        Ok((None, rest.trim().to_string()))
    }
}

/// Splits `with`'s header into an optional single-variable binding and the
/// remaining expression text: `$x := .Foo`, or plain `.Foo`. `with` binds
/// at most one variable, unlike `range`'s optional key/value pair.
fn parse_with_header(rest: &str) -> Result<(Option<String>, String), EngineError> {
    if let Some(idx) = rest.find(":=") {
        let (lhs, rhs) = rest.split_at(idx);
        let rhs = rhs[2..].trim().to_string();
        let name = strip_var(lhs.trim())?;
        Ok((Some(name), rhs))
    } else {
        Ok((None, rest.trim().to_string()))
    }
}

fn strip_var(tok: &str) -> Result<String, EngineError> {
    tok.strip_prefix('$')
        .filter(|name| !name.is_empty())
        .map(|name| name.to_string())
        .ok_or_else(|| syntax(format!("expected a $variable, found {:?}", tok)))
}

fn parse_quoted_name(s: &str) -> Result<String, EngineError> {
    if s.len() >= 2 && s.starts_with('"') && s.ends_with('"') {
        Ok(s[1..s.len() - 1].to_string())
    } else {
        Err(syntax(format!("expected a quoted name, found {:?}", s)))
    }
}

/// Splits `template`/`block`'s header into its quoted name and the
/// remaining (possibly empty) data expression text.
fn split_name_and_rest(s: &str) -> Result<(String, String), EngineError> {
    let tokens = split_tokens(s);
    let (first, rest) = tokens
        .split_first()
        .ok_or_else(|| syntax("expected a quoted name"))?;
    let name = parse_quoted_name(first)?;
    Ok((name, rest.join(" ")))
}

pub(crate) fn parse_expr_str(s: &str) -> Result<Expr, EngineError> {
    let tokens = split_tokens(s);
    let mut cur = ExprCursor {
        tokens: &tokens,
        pos: 0,
    };
    let expr = parse_expr(&mut cur)?;
    if cur.peek().is_some() {
        return Err(syntax(format!("unexpected trailing tokens in {:?}", s)));
    }
    Ok(expr)
}

struct ExprCursor<'a> {
    tokens: &'a [String],
    pos: usize,
}

impl<'a> ExprCursor<'a> {
    fn peek(&self) -> Option<&'a str> {
        self.tokens.get(self.pos).map(String::as_str)
    }

    fn next(&mut self) -> Option<&'a str> {
        let tok = self.tokens.get(self.pos).map(String::as_str);
        if tok.is_some() {
            self.pos += 1;
        }
        tok
    }

    fn expect(&mut self, want: &str) -> Result<(), EngineError> {
        match self.next() {
            Some(tok) if tok == want => Ok(()),
            Some(tok) => Err(syntax(format!("expected {:?}, found {:?}", want, tok))),
            None => Err(syntax(format!("expected {:?}, found end of expression", want))),
        }
    }
}

fn parse_expr(cur: &mut ExprCursor) -> Result<Expr, EngineError> {
    let tok = cur
        .next()
        .ok_or_else(|| syntax("expected an expression"))?;
    if tok == "(" {
        let inner = parse_expr(cur)?;
        cur.expect(")")?;
        return Ok(inner);
    }
    if let Some(builtin) = Builtin::from_name(tok) {
        let (min, max) = builtin_arity(builtin);
        let mut args = Vec::new();
        loop {
            if Some(args.len()) == max {
                break;
            }
            match cur.peek() {
                None | Some(")") => break,
                _ => args.push(parse_expr(cur)?),
            }
        }
        if args.len() < min {
            return Err(syntax(format!(
                "{:?} expects at least {} argument(s), found {}",
                builtin,
                min,
                args.len()
            )));
        }
        return Ok(Expr::Call(builtin, args));
    }
    parse_atom(tok)
}

fn builtin_arity(builtin: Builtin) -> (usize, Option<usize>) {
    match builtin {
        Builtin::Eq | Builtin::Ne | Builtin::Lt | Builtin::Le | Builtin::Gt | Builtin::Ge => {
            (2, Some(2))
        }
        Builtin::And | Builtin::Or => (2, None),
        Builtin::Not => (1, Some(1)),
        Builtin::Len => (1, Some(1)),
        Builtin::Index => (2, None),
    }
}

fn parse_atom(tok: &str) -> Result<Expr, EngineError> {
    if tok == "." {
        return Ok(Expr::Dot);
    }
    if tok == "$" {
        return Ok(Expr::Root);
    }
    if let Some(rest) = tok.strip_prefix('$') {
        let mut parts = rest.split('.');
        let var_name = parts.next().filter(|s| !s.is_empty()).ok_or_else(|| {
            syntax(format!("invalid variable reference {:?}", tok))
        })?;
        let mut expr = Expr::Var(var_name.to_string());
        for field in parts {
            if field.is_empty() {
                return Err(syntax(format!("invalid field path {:?}", tok)));
            }
            expr = Expr::Field(Box::new(expr), field.to_string());
        }
        return Ok(expr);
    }
    if let Some(rest) = tok.strip_prefix('.') {
        let mut expr = Expr::Dot;
        for field in rest.split('.') {
            if field.is_empty() {
                return Err(syntax(format!("invalid field path {:?}", tok)));
            }
            expr = Expr::Field(Box::new(expr), field.to_string());
        }
        return Ok(expr);
    }
    if tok.len() >= 2 && tok.starts_with('"') && tok.ends_with('"') {
        return Ok(Expr::Literal(Literal::Str(tok[1..tok.len() - 1].to_string())));
    }
    match tok {
        "true" => return Ok(Expr::Literal(Literal::Bool(true))),
        "false" => return Ok(Expr::Literal(Literal::Bool(false))),
        "nil" => return Ok(Expr::Literal(Literal::Nil)),
        _ => {}
    }
    if let Ok(n) = tok.parse::<f64>() {
        return Ok(Expr::Literal(Literal::Number(n)));
    }
    Err(syntax(format!("unrecognized expression token {:?}", tok)))
}

/// Splits an action's inner text into tokens, keeping quoted strings and
/// parens intact (the lexer already collapsed surrounding whitespace).
fn split_tokens(s: &str) -> Vec<String> {
    let mut tokens = Vec::new();
    let mut current = String::new();
    let mut chars = s.chars().peekable();
    while let Some(c) = chars.next() {
        match c {
            '"' => {
                current.push(c);
                for next in chars.by_ref() {
                    current.push(next);
                    if next == '"' {
                        break;
                    }
                }
            }
            '(' | ')' => {
                if !current.is_empty() {
                    tokens.push(std::mem::take(&mut current));
                }
                tokens.push(c.to_string());
            }
            c if c.is_whitespace() => {
                if !current.is_empty() {
                    tokens.push(std::mem::take(&mut current));
                }
            }
            _ => current.push(c),
        }
    }
    if !current.is_empty() {
        tokens.push(current);
    }
    tokens
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::template::lexer::lex;

    fn parse_source(src: &str) -> Vec<Node> {
        parse(lex(src).unwrap()).unwrap()
    }

    #[test]
    fn parses_plain_interpolation() {
        let nodes = parse_source("Hi {{.Name}}");
        assert_eq!(
            nodes,
            vec![
                Node::Text("Hi ".to_string()),
                Node::Interpolation(Expr::Field(Box::new(Expr::Dot), "Name".to_string())),
            ]
        );
    }

    #[test]
    fn parses_if_else() {
        let nodes = parse_source("{{if .Show}}yes{{else}}no{{end}}");
        assert_eq!(
            nodes,
            vec![Node::If {
                cond: Expr::Field(Box::new(Expr::Dot), "Show".to_string()),
                then_body: vec![Node::Text("yes".to_string())],
                else_body: Some(vec![Node::Text("no".to_string())]),
            }]
        );
    }

    #[test]
    fn parses_else_if_chain() {
        let nodes = parse_source("{{if .A}}a{{else if .B}}b{{else}}c{{end}}");
        match &nodes[0] {
            Node::If { else_body, .. } => match else_body.as_ref().unwrap().as_slice() {
                [Node::If { else_body, .. }] => {
                    assert_eq!(else_body.as_ref().unwrap(), &vec![Node::Text("c".to_string())]);
                }
                other => panic!("expected nested if, got {:?}", other),
            },
            other => panic!("expected if, got {:?}", other),
        }
    }

    #[test]
    fn parses_with_bound_variable() {
        let nodes = parse_source("{{with $x := .Foo}}{{$x}}{{end}}");
        match &nodes[0] {
            Node::With { binding, expr, .. } => {
                assert_eq!(binding, &Some("x".to_string()));
                assert_eq!(expr, &Expr::Field(Box::new(Expr::Dot), "Foo".to_string()));
            }
            other => panic!("expected with, got {:?}", other),
        }
    }

    #[test]
    fn parses_plain_with_without_a_binding() {
        let nodes = parse_source("{{with .Foo}}{{.}}{{end}}");
        match &nodes[0] {
            Node::With { binding, .. } => assert_eq!(binding, &None),
            other => panic!("expected with, got {:?}", other),
        }
    }

    #[test]
    fn parses_range_with_key_value_binding() {
        let nodes = parse_source("{{range $i, $v := .Items}}{{$v}}{{end}}");
        match &nodes[0] {
            Node::Range { binding, .. } => {
                assert_eq!(
                    binding,
                    &Some(RangeBinding::KeyValue("i".to_string(), "v".to_string()))
                );
            }
            other => panic!("expected range, got {:?}", other),
        }
    }

    #[test]
    fn parses_builtin_call() {
        let nodes = parse_source("{{if eq .Status \"ok\"}}ok{{end}}");
        match &nodes[0] {
            Node::If { cond, .. } => {
                assert_eq!(
                    cond,
                    &Expr::Call(
                        Builtin::Eq,
                        vec![
                            Expr::Field(Box::new(Expr::Dot), "Status".to_string()),
                            Expr::Literal(Literal::Str("ok".to_string())),
                        ]
                    )
                );
            }
            other => panic!("expected if, got {:?}", other),
        }
    }

    #[test]
    fn unknown_keyword_is_plain_expression_and_fails() {
        let err = parse(lex("{{frobnicate .X}}").unwrap()).unwrap_err();
        assert!(matches!(err, EngineError::Syntax { .. }));
    }

    #[test]
    fn mismatched_end_is_syntax_error() {
        let err = parse(lex("{{end}}").unwrap()).unwrap_err();
        assert!(matches!(err, EngineError::Syntax { .. }));
    }
}
