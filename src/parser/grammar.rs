//! Pest grammar parser for Slate fragments

use pest::iterators::Pair;
use pest::Parser;
use pest_derive::Parser;

use crate::error::{Result, SlateError};
use crate::parser::ast::*;

#[derive(Parser)]
#[grammar = "../grammar/slate.pest"]
pub struct SlateParser;

/// Language keywords, exposed for completion.
pub const KEYWORDS: &[&str] = &[
    "and", "else", "false", "fn", "for", "if", "in", "not", "null", "or", "raise", "return",
    "true",
];

/// Check whether `s` is a valid Slate identifier (and not a keyword).
pub fn is_identifier(s: &str) -> bool {
    let mut chars = s.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' => {}
        _ => return false,
    }
    if !chars.all(|c| c.is_ascii_alphanumeric() || c == '_') {
        return false;
    }
    !KEYWORDS.contains(&s)
}

/// Parse a fragment into an AST
pub fn parse_program(input: &str) -> Result<Program> {
    let pairs = SlateParser::parse(Rule::program, input)
        .map_err(|e| SlateError::ParseFault(e.to_string()))?;

    let pair = pairs
        .into_iter()
        .next()
        .ok_or_else(|| SlateError::ParseFault("empty input".to_string()))?;

    let mut statements = Vec::new();
    for inner in pair.into_inner() {
        if inner.as_rule() == Rule::statement {
            statements.push(parse_statement(inner)?);
        }
    }

    Ok(Program { statements })
}

fn parse_statement(pair: Pair<Rule>) -> Result<Stmt> {
    let inner = pair
        .into_inner()
        .next()
        .ok_or_else(|| SlateError::ParseFault("expected statement content".to_string()))?;

    match inner.as_rule() {
        Rule::fn_def => Ok(Stmt::FnDef(parse_fn_def(inner)?)),
        Rule::if_stmt => Ok(Stmt::If(parse_if(inner)?)),
        Rule::for_stmt => Ok(Stmt::For(parse_for(inner)?)),
        Rule::raise_stmt => {
            let expr = inner
                .into_inner()
                .find(|p| p.as_rule() == Rule::expr)
                .ok_or_else(|| SlateError::ParseFault("expected expression after raise".to_string()))?;
            Ok(Stmt::Raise(parse_expr(expr)?))
        }
        Rule::return_stmt => {
            let expr = inner
                .into_inner()
                .find(|p| p.as_rule() == Rule::expr)
                .map(parse_expr)
                .transpose()?;
            Ok(Stmt::Return(expr))
        }
        Rule::assign => parse_assign(inner),
        Rule::expr => Ok(Stmt::Expr(parse_expr(inner)?)),
        _ => Err(SlateError::ParseFault(format!(
            "unexpected rule in statement: {:?}",
            inner.as_rule()
        ))),
    }
}

fn parse_assign(pair: Pair<Rule>) -> Result<Stmt> {
    let mut name = None;
    let mut value = None;

    for p in pair.into_inner() {
        match p.as_rule() {
            Rule::ident => name = Some(p.as_str().to_string()),
            Rule::expr => value = Some(parse_expr(p)?),
            _ => {}
        }
    }

    Ok(Stmt::Assign(AssignStmt {
        name: name.ok_or_else(|| SlateError::ParseFault("expected assignment target".to_string()))?,
        value: value.ok_or_else(|| SlateError::ParseFault("expected assigned value".to_string()))?,
    }))
}

fn parse_fn_def(pair: Pair<Rule>) -> Result<FnDecl> {
    let source = pair.as_str().trim().to_string();

    let mut name = None;
    let mut params = Vec::new();
    let mut body = Vec::new();

    for p in pair.into_inner() {
        match p.as_rule() {
            Rule::ident => name = Some(p.as_str().to_string()),
            Rule::param_list => {
                params = p
                    .into_inner()
                    .filter(|i| i.as_rule() == Rule::ident)
                    .map(|i| i.as_str().to_string())
                    .collect();
            }
            Rule::block => body = parse_block(p)?,
            _ => {}
        }
    }

    // A leading string literal is the doc string, Python style.
    let doc = match body.first() {
        Some(Stmt::Expr(Expr::Literal(Literal::Str(_)))) => match body.remove(0) {
            Stmt::Expr(Expr::Literal(Literal::Str(s))) => Some(s),
            _ => unreachable!(),
        },
        _ => None,
    };

    Ok(FnDecl {
        name: name.ok_or_else(|| SlateError::ParseFault("expected function name".to_string()))?,
        params,
        doc,
        body,
        source,
    })
}

fn parse_if(pair: Pair<Rule>) -> Result<IfStmt> {
    let mut condition = None;
    let mut then_body = None;
    let mut else_body = None;

    for p in pair.into_inner() {
        match p.as_rule() {
            Rule::expr => condition = Some(parse_expr(p)?),
            Rule::block => {
                if then_body.is_none() {
                    then_body = Some(parse_block(p)?);
                } else {
                    else_body = Some(parse_block(p)?);
                }
            }
            Rule::if_stmt => else_body = Some(vec![Stmt::If(parse_if(p)?)]),
            _ => {}
        }
    }

    Ok(IfStmt {
        condition: condition
            .ok_or_else(|| SlateError::ParseFault("expected condition in if".to_string()))?,
        then_body: then_body
            .ok_or_else(|| SlateError::ParseFault("expected block in if".to_string()))?,
        else_body,
    })
}

fn parse_for(pair: Pair<Rule>) -> Result<ForStmt> {
    let mut var = None;
    let mut iterable = None;
    let mut body = None;

    for p in pair.into_inner() {
        match p.as_rule() {
            Rule::ident => var = Some(p.as_str().to_string()),
            Rule::expr => iterable = Some(parse_expr(p)?),
            Rule::block => body = Some(parse_block(p)?),
            _ => {}
        }
    }

    Ok(ForStmt {
        var: var.ok_or_else(|| SlateError::ParseFault("expected loop variable".to_string()))?,
        iterable: iterable
            .ok_or_else(|| SlateError::ParseFault("expected iterable in for".to_string()))?,
        body: body.ok_or_else(|| SlateError::ParseFault("expected block in for".to_string()))?,
    })
}

fn parse_block(pair: Pair<Rule>) -> Result<Vec<Stmt>> {
    let mut statements = Vec::new();
    for p in pair.into_inner() {
        if p.as_rule() == Rule::statement {
            statements.push(parse_statement(p)?);
        }
    }
    Ok(statements)
}

fn parse_expr(pair: Pair<Rule>) -> Result<Expr> {
    let inner = pair
        .into_inner()
        .next()
        .ok_or_else(|| SlateError::ParseFault("expected expression".to_string()))?;
    parse_or(inner)
}

fn parse_or(pair: Pair<Rule>) -> Result<Expr> {
    let mut inner = pair.into_inner();
    let first = inner
        .next()
        .ok_or_else(|| SlateError::ParseFault("expected operand".to_string()))?;
    let mut expr = parse_and(first)?;

    for p in inner {
        if p.as_rule() == Rule::and_expr {
            expr = Expr::Binary {
                op: BinaryOp::Or,
                lhs: Box::new(expr),
                rhs: Box::new(parse_and(p)?),
            };
        }
    }
    Ok(expr)
}

fn parse_and(pair: Pair<Rule>) -> Result<Expr> {
    let mut inner = pair.into_inner();
    let first = inner
        .next()
        .ok_or_else(|| SlateError::ParseFault("expected operand".to_string()))?;
    let mut expr = parse_comparison(first)?;

    for p in inner {
        if p.as_rule() == Rule::comparison {
            expr = Expr::Binary {
                op: BinaryOp::And,
                lhs: Box::new(expr),
                rhs: Box::new(parse_comparison(p)?),
            };
        }
    }
    Ok(expr)
}

fn parse_comparison(pair: Pair<Rule>) -> Result<Expr> {
    let mut inner = pair.into_inner();
    let first = inner
        .next()
        .ok_or_else(|| SlateError::ParseFault("expected operand".to_string()))?;
    let mut expr = parse_sum(first)?;

    let mut op = None;
    for p in inner {
        match p.as_rule() {
            Rule::cmp_op => {
                op = Some(match p.as_str().trim() {
                    "==" => BinaryOp::Eq,
                    "!=" => BinaryOp::Ne,
                    "<=" => BinaryOp::Le,
                    ">=" => BinaryOp::Ge,
                    "<" => BinaryOp::Lt,
                    _ => BinaryOp::Gt,
                });
            }
            Rule::sum => {
                let rhs = parse_sum(p)?;
                let operator = op.take().ok_or_else(|| {
                    SlateError::ParseFault("comparison missing operator".to_string())
                })?;
                expr = Expr::Binary {
                    op: operator,
                    lhs: Box::new(expr),
                    rhs: Box::new(rhs),
                };
            }
            _ => {}
        }
    }
    Ok(expr)
}

fn parse_sum(pair: Pair<Rule>) -> Result<Expr> {
    let mut inner = pair.into_inner();
    let first = inner
        .next()
        .ok_or_else(|| SlateError::ParseFault("expected operand".to_string()))?;
    let mut expr = parse_product(first)?;

    let mut op = None;
    for p in inner {
        match p.as_rule() {
            Rule::add_op => {
                op = Some(if p.as_str().trim() == "+" {
                    BinaryOp::Add
                } else {
                    BinaryOp::Sub
                });
            }
            Rule::product => {
                let rhs = parse_product(p)?;
                let operator = op
                    .take()
                    .ok_or_else(|| SlateError::ParseFault("sum missing operator".to_string()))?;
                expr = Expr::Binary {
                    op: operator,
                    lhs: Box::new(expr),
                    rhs: Box::new(rhs),
                };
            }
            _ => {}
        }
    }
    Ok(expr)
}

fn parse_product(pair: Pair<Rule>) -> Result<Expr> {
    let mut inner = pair.into_inner();
    let first = inner
        .next()
        .ok_or_else(|| SlateError::ParseFault("expected operand".to_string()))?;
    let mut expr = parse_unary(first)?;

    let mut op = None;
    for p in inner {
        match p.as_rule() {
            Rule::mul_op => {
                op = Some(match p.as_str().trim() {
                    "*" => BinaryOp::Mul,
                    "/" => BinaryOp::Div,
                    _ => BinaryOp::Rem,
                });
            }
            Rule::unary => {
                let rhs = parse_unary(p)?;
                let operator = op
                    .take()
                    .ok_or_else(|| SlateError::ParseFault("product missing operator".to_string()))?;
                expr = Expr::Binary {
                    op: operator,
                    lhs: Box::new(expr),
                    rhs: Box::new(rhs),
                };
            }
            _ => {}
        }
    }
    Ok(expr)
}

fn parse_unary(pair: Pair<Rule>) -> Result<Expr> {
    let mut ops = Vec::new();
    let mut operand = None;

    for p in pair.into_inner() {
        match p.as_rule() {
            Rule::un_op => ops.push(p.as_str().trim().to_string()),
            Rule::postfix => operand = Some(parse_postfix(p)?),
            _ => {}
        }
    }

    let mut expr =
        operand.ok_or_else(|| SlateError::ParseFault("expected unary operand".to_string()))?;
    for op in ops.into_iter().rev() {
        expr = Expr::Unary {
            op: if op == "-" { UnaryOp::Neg } else { UnaryOp::Not },
            operand: Box::new(expr),
        };
    }
    Ok(expr)
}

fn parse_postfix(pair: Pair<Rule>) -> Result<Expr> {
    let mut inner = pair.into_inner();
    let first = inner
        .next()
        .ok_or_else(|| SlateError::ParseFault("expected primary expression".to_string()))?;
    let mut expr = parse_primary(first)?;

    for p in inner {
        match p.as_rule() {
            Rule::call_args => {
                let args = p
                    .into_inner()
                    .filter(|a| a.as_rule() == Rule::expr)
                    .map(parse_expr)
                    .collect::<Result<Vec<_>>>()?;
                expr = Expr::Call {
                    callee: Box::new(expr),
                    args,
                };
            }
            Rule::attr => {
                let name = p
                    .into_inner()
                    .next()
                    .ok_or_else(|| SlateError::ParseFault("expected attribute name".to_string()))?
                    .as_str()
                    .to_string();
                expr = Expr::Attr {
                    object: Box::new(expr),
                    name,
                };
            }
            Rule::index => {
                let idx = p
                    .into_inner()
                    .next()
                    .ok_or_else(|| SlateError::ParseFault("expected index expression".to_string()))?;
                expr = Expr::Index {
                    object: Box::new(expr),
                    index: Box::new(parse_expr(idx)?),
                };
            }
            _ => {}
        }
    }
    Ok(expr)
}

fn parse_primary(pair: Pair<Rule>) -> Result<Expr> {
    let inner = pair
        .into_inner()
        .next()
        .ok_or_else(|| SlateError::ParseFault("expected primary expression".to_string()))?;

    match inner.as_rule() {
        Rule::literal => Ok(Expr::Literal(parse_literal(inner)?)),
        Rule::list => {
            let items = inner
                .into_inner()
                .filter(|p| p.as_rule() == Rule::expr)
                .map(parse_expr)
                .collect::<Result<Vec<_>>>()?;
            Ok(Expr::List(items))
        }
        Rule::map => {
            let mut entries = Vec::new();
            for entry in inner.into_inner() {
                if entry.as_rule() == Rule::map_entry {
                    entries.push(parse_map_entry(entry)?);
                }
            }
            Ok(Expr::Map(entries))
        }
        Rule::paren => {
            let e = inner
                .into_inner()
                .find(|p| p.as_rule() == Rule::expr)
                .ok_or_else(|| SlateError::ParseFault("empty parentheses".to_string()))?;
            parse_expr(e)
        }
        Rule::ident => Ok(Expr::Ident(inner.as_str().to_string())),
        _ => Err(SlateError::ParseFault(format!(
            "unexpected rule: {:?}",
            inner.as_rule()
        ))),
    }
}

fn parse_map_entry(pair: Pair<Rule>) -> Result<(String, Expr)> {
    let mut key = None;
    let mut value = None;

    for p in pair.into_inner() {
        match p.as_rule() {
            Rule::string => key = Some(parse_string(p)?),
            Rule::expr => value = Some(parse_expr(p)?),
            _ => {}
        }
    }

    Ok((
        key.ok_or_else(|| SlateError::ParseFault("expected map key".to_string()))?,
        value.ok_or_else(|| SlateError::ParseFault("expected map value".to_string()))?,
    ))
}

fn parse_literal(pair: Pair<Rule>) -> Result<Literal> {
    let inner = pair
        .into_inner()
        .next()
        .ok_or_else(|| SlateError::ParseFault("expected literal".to_string()))?;

    match inner.as_rule() {
        Rule::float => inner
            .as_str()
            .parse::<f64>()
            .map(Literal::Float)
            .map_err(|e| SlateError::ParseFault(format!("invalid float literal: {}", e))),
        Rule::int => inner
            .as_str()
            .parse::<i64>()
            .map(Literal::Int)
            .map_err(|e| SlateError::ParseFault(format!("invalid int literal: {}", e))),
        Rule::string => Ok(Literal::Str(parse_string(inner)?)),
        Rule::boolean => Ok(Literal::Bool(inner.as_str().trim() == "true")),
        Rule::null => Ok(Literal::Null),
        _ => Err(SlateError::ParseFault(format!(
            "unexpected literal rule: {:?}",
            inner.as_rule()
        ))),
    }
}

fn parse_string(pair: Pair<Rule>) -> Result<String> {
    let inner = pair
        .into_inner()
        .find(|p| p.as_rule() == Rule::str_inner)
        .ok_or_else(|| SlateError::ParseFault("malformed string literal".to_string()))?;
    Ok(unescape(inner.as_str()))
}

fn unescape(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    let mut chars = raw.chars();
    while let Some(c) = chars.next() {
        if c == '\\' {
            match chars.next() {
                Some('n') => out.push('\n'),
                Some('t') => out.push('\t'),
                Some('r') => out.push('\r'),
                Some(other) => out.push(other),
                None => {}
            }
        } else {
            out.push(c);
        }
    }
    out
}
