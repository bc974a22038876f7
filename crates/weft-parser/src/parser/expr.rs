//! Expressions: infix chains, values, parentheses, string interpolation,
//! and dotted attribute access.
//!
//! Infix lowering is left-associative and eager: each operator allocates a
//! positional synthetic variable, emits an expression node binding it, and
//! chains the next step from that node. The chain container (`addition` /
//! `multiplication`) only materializes when an operator was consumed.

use weft_ast::{
    AttributeMutator, Expression, Literal, NodeKind, NodeRef, OpChain, Parenthesis, Provenance,
    Scan,
};
use weft_lexer::{unescape_string, TokenKind};

use super::{branch, record, ParseError, Parser};

/// `expression := infix | record`
pub(super) fn expression(p: &mut Parser) -> Result<NodeRef, ParseError> {
    if p.cursor.check(TokenKind::OpenBracket) {
        record::record(
            p,
            record::RecordOpts {
                action: p.default_record_action(),
                ..Default::default()
            },
        )
    } else {
        infix(p)
    }
}

/// `infix := addition`
pub(super) fn infix(p: &mut Parser) -> Result<NodeRef, ParseError> {
    addition(p)
}

/// `addition := multiplication (AddInfix multiplication)*`
fn addition(p: &mut Parser) -> Result<NodeRef, ParseError> {
    let mut left = multiplication(p)?;
    let mut emitted: Vec<NodeRef> = Vec::new();
    let mut chain_variable = None;

    while p.cursor.check(TokenKind::AddInfix) {
        let op_ix = p.cursor.advance().expect("BUG: peeked operator vanished");
        let op = p.cursor.get(op_ix);
        let right = multiplication(p)?;

        let lhs = p.as_value(left)?;
        let rhs = p.as_value(right)?;
        let variable = p.synthetic(&op.image, op.line, op.col, vec![Provenance::Token(op_ix)]);
        let node = p.make(
            NodeKind::Expression(Expression {
                op: op.image.clone(),
                args: vec![lhs, rhs],
                variable: Some(variable),
            }),
            vec![
                Provenance::Token(op_ix),
                Provenance::Node(lhs),
                Provenance::Node(rhs),
            ],
        );
        p.block().expression(node);
        emitted.push(node);
        chain_variable = Some(variable);
        left = node;
    }

    if emitted.is_empty() {
        Ok(left)
    } else {
        let from = emitted.iter().copied().map(Provenance::Node).collect();
        Ok(p.make(
            NodeKind::Addition(OpChain {
                expressions: emitted,
                variable: chain_variable,
            }),
            from,
        ))
    }
}

/// `multiplication := infixValue (MultInfix infixValue)*`
fn multiplication(p: &mut Parser) -> Result<NodeRef, ParseError> {
    let mut left = infix_value(p)?;
    let mut emitted: Vec<NodeRef> = Vec::new();
    let mut chain_variable = None;

    while p.cursor.check(TokenKind::MultInfix) {
        let op_ix = p.cursor.advance().expect("BUG: peeked operator vanished");
        let op = p.cursor.get(op_ix);
        let right = infix_value(p)?;

        let lhs = p.as_value(left)?;
        let rhs = p.as_value(right)?;
        let variable = p.synthetic(&op.image, op.line, op.col, vec![Provenance::Token(op_ix)]);
        let node = p.make(
            NodeKind::Expression(Expression {
                op: op.image.clone(),
                args: vec![lhs, rhs],
                variable: Some(variable),
            }),
            vec![
                Provenance::Token(op_ix),
                Provenance::Node(lhs),
                Provenance::Node(rhs),
            ],
        );
        p.block().expression(node);
        emitted.push(node);
        chain_variable = Some(variable);
        left = node;
    }

    if emitted.is_empty() {
        Ok(left)
    } else {
        let from = emitted.iter().copied().map(Provenance::Node).collect();
        Ok(p.make(
            NodeKind::Multiplication(OpChain {
                expressions: emitted,
                variable: chain_variable,
            }),
            from,
        ))
    }
}

/// `infixValue := attributeAccess | functionRecord | isExpression
///              | variable | value | parenthesis`
fn infix_value(p: &mut Parser) -> Result<NodeRef, ParseError> {
    match p.cursor.peek_kind() {
        Some(TokenKind::Identifier) => match p.cursor.peek_nth_kind(1) {
            Some(TokenKind::Dot) => attribute_access(p),
            Some(TokenKind::OpenBracket) => record::function_record(p),
            _ => {
                let ix = p.cursor.advance().expect("BUG: peeked identifier vanished");
                let image = p.cursor.get(ix).image.clone();
                Ok(p.to_variable(&image, false, vec![Provenance::Token(ix)]))
            }
        },
        Some(TokenKind::Is) if p.cursor.peek_nth_kind(1) == Some(TokenKind::OpenParen) => {
            branch::is_expression(p)
        }
        Some(TokenKind::OpenParen) => parenthesis(p),
        Some(TokenKind::StringOpen) => string_interpolation(p),
        Some(TokenKind::Num) => {
            let ix = p.cursor.advance().expect("BUG: peeked number vanished");
            let token = p.cursor.get(ix);
            let value: f64 = token.image.parse().map_err(|_| {
                ParseError::invalid_syntax(
                    format!("malformed number {:?}", token.image),
                    (token.line, token.col),
                )
            })?;
            Ok(p.constant(Literal::Num(value), vec![Provenance::Token(ix)]))
        }
        Some(TokenKind::True) | Some(TokenKind::False) => {
            let ix = p.cursor.advance().expect("BUG: peeked boolean vanished");
            let token = p.cursor.get(ix);
            Ok(p.constant(
                Literal::Bool(token.kind == TokenKind::True),
                vec![Provenance::Token(ix)],
            ))
        }
        Some(TokenKind::Uuid) => {
            let ix = p.cursor.advance().expect("BUG: peeked uuid vanished");
            let token = p.cursor.get(ix);
            let inner = token
                .image
                .trim_start_matches('⦑')
                .trim_end_matches('⦒')
                .to_string();
            Ok(p.constant(Literal::Str(inner), vec![Provenance::Token(ix)]))
        }
        _ => Err(ParseError::unexpected(
            p.cursor.peek(),
            "in expression",
            p.position(),
        )),
    }
}

/// `parenthesis := "(" expression+ ")"` — a single item collapses to the
/// item; multiple items form a parenthesis node for multi-output bindings.
fn parenthesis(p: &mut Parser) -> Result<NodeRef, ParseError> {
    let open_ix = p.cursor.expect(TokenKind::OpenParen, "`(`")?;
    let mut items = Vec::new();
    loop {
        match p.cursor.peek_kind() {
            Some(TokenKind::CloseParen) => break,
            Some(TokenKind::Comment) => {
                p.cursor.advance();
            }
            None => {
                return Err(ParseError::unexpected(
                    None,
                    "inside a parenthesis",
                    p.position(),
                ));
            }
            Some(_) => items.push(expression(p)?),
        }
    }
    let close_ix = p.cursor.expect(TokenKind::CloseParen, "`)`")?;

    match items.len() {
        0 => Err(ParseError::invalid_syntax(
            "a parenthesis needs at least one expression",
            p.position(),
        )),
        1 => Ok(items[0]),
        _ => Ok(p.make(
            NodeKind::Parenthesis(Parenthesis { items }),
            vec![Provenance::Token(open_ix), Provenance::Token(close_ix)],
        )),
    }
}

/// `stringInterpolation := '"' (StringChars | "{{" infix "}}")* '"'`
///
/// Adjacent literal runs merge into one constant; a string that reduces to
/// a single constant collapses, anything else becomes a `concat` expression
/// over the parts in source order.
fn string_interpolation(p: &mut Parser) -> Result<NodeRef, ParseError> {
    let open_ix = p.cursor.expect(TokenKind::StringOpen, "a string")?;
    let open = p.cursor.get(open_ix);

    let mut parts: Vec<NodeRef> = Vec::new();
    let mut literal = String::new();
    let mut literal_from: Vec<Provenance> = Vec::new();

    loop {
        match p.cursor.peek_kind() {
            Some(TokenKind::StringChars) => {
                let ix = p.cursor.advance().expect("BUG: peeked chars vanished");
                literal.push_str(&unescape_string(&p.cursor.get(ix).image));
                literal_from.push(Provenance::Token(ix));
            }
            Some(TokenKind::StringEmbedOpen) => {
                p.cursor.advance();
                if !literal_from.is_empty() {
                    let from = std::mem::take(&mut literal_from);
                    let constant = p.constant(Literal::Str(std::mem::take(&mut literal)), from);
                    parts.push(constant);
                }
                let embedded = infix(p)?;
                parts.push(p.as_value(embedded)?);
                p.cursor
                    .expect(TokenKind::StringEmbedClose, "`}}` closing the embed")?;
            }
            Some(TokenKind::StringClose) => {
                p.cursor.advance();
                break;
            }
            _ => {
                return Err(ParseError::unexpected(
                    p.cursor.peek(),
                    "inside a string",
                    p.position(),
                ));
            }
        }
    }
    if !literal_from.is_empty() {
        let from = std::mem::take(&mut literal_from);
        let constant = p.constant(Literal::Str(std::mem::take(&mut literal)), from);
        parts.push(constant);
    }

    if parts.is_empty() {
        return Ok(p.constant(
            Literal::Str(String::new()),
            vec![Provenance::Token(open_ix)],
        ));
    }
    if parts.len() == 1 && p.nodes[parts[0]].as_constant().is_some() {
        return Ok(parts[0]);
    }

    let variable = p.synthetic("concat", open.line, open.col, vec![Provenance::Token(open_ix)]);
    let mut from = vec![Provenance::Token(open_ix)];
    from.extend(parts.iter().copied().map(Provenance::Node));
    let node = p.make(
        NodeKind::Expression(Expression {
            op: "concat".to_string(),
            args: parts,
            variable: Some(variable),
        }),
        from,
    );
    p.block().expression(node);
    Ok(node)
}

/// `attributeAccess := variable ("." Identifier)+`
///
/// Each dot step scans the current entity for the attribute into a fresh
/// positional value variable, which becomes the next step's entity. Only
/// the first step requires a pre-bound entity.
pub(super) fn attribute_access(p: &mut Parser) -> Result<NodeRef, ParseError> {
    let base_ix = p.cursor.expect(TokenKind::Identifier, "an identifier")?;
    let base_image = p.cursor.get(base_ix).image.clone();
    let mut entity = p.to_variable(&base_image, false, vec![Provenance::Token(base_ix)]);
    let mut needs_entity = true;

    while p.cursor.check(TokenKind::Dot) {
        p.cursor.advance();
        let attr_ix = p
            .cursor
            .expect(TokenKind::Identifier, "an attribute name after `.`")?;
        let attr = p.cursor.get(attr_ix);

        let value = p.synthetic(&attr.image, attr.line, attr.col, vec![Provenance::Token(attr_ix)]);
        let attribute = p.constant(
            Literal::Str(attr.image.clone()),
            vec![Provenance::Token(attr_ix)],
        );
        let scan = p.make(
            NodeKind::Scan(Scan {
                entity,
                attribute,
                value,
                needs_entity,
                scopes: p.scopes.clone(),
            }),
            vec![
                Provenance::Token(attr_ix),
                Provenance::Node(entity),
                Provenance::Node(value),
            ],
        );
        p.block().scan(scan);
        needs_entity = false;
        entity = value;
    }

    Ok(entity)
}

/// The write-target form of a dotted path: scans every step except the
/// last, returning a mutator node that carries the final attribute and its
/// parent. The enclosing operation decides the write.
pub(super) fn attribute_mutator(p: &mut Parser) -> Result<NodeRef, ParseError> {
    let base_ix = p.cursor.expect(TokenKind::Identifier, "an identifier")?;
    let base_image = p.cursor.get(base_ix).image.clone();
    let mut parent = p.to_variable(&base_image, false, vec![Provenance::Token(base_ix)]);

    let mut steps = Vec::new();
    while p.cursor.check(TokenKind::Dot) {
        p.cursor.advance();
        steps.push(
            p.cursor
                .expect(TokenKind::Identifier, "an attribute name after `.`")?,
        );
    }
    let last_ix = steps.pop().ok_or_else(|| {
        ParseError::expected("`.` and an attribute name", p.cursor.peek(), p.position())
    })?;

    let mut needs_entity = true;
    for step_ix in steps {
        let attr = p.cursor.get(step_ix);
        let value = p.synthetic(&attr.image, attr.line, attr.col, vec![Provenance::Token(step_ix)]);
        let attribute = p.constant(
            Literal::Str(attr.image.clone()),
            vec![Provenance::Token(step_ix)],
        );
        let scan = p.make(
            NodeKind::Scan(Scan {
                entity: parent,
                attribute,
                value,
                needs_entity,
                scopes: p.scopes.clone(),
            }),
            vec![
                Provenance::Token(step_ix),
                Provenance::Node(parent),
                Provenance::Node(value),
            ],
        );
        p.block().scan(scan);
        needs_entity = false;
        parent = value;
    }

    let last = p.cursor.get(last_ix);
    Ok(p.make(
        NodeKind::AttributeMutator(AttributeMutator {
            attribute: last.image.clone(),
            parent,
        }),
        vec![Provenance::Token(last_ix), Provenance::Node(parent)],
    ))
}
