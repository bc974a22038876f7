//! Conditional branches and `is(...)` conjunctions.

use weft_ast::{Expression, IfBranch, IfExpression, NodeKind, NodeRef, Provenance};
use weft_lexer::TokenKind;

use super::{expr, statement, ParseError, Parser};

/// `isExpression := "is" "(" comparison* ")"`
///
/// Each comparison runs non-filtering, so every operator yields a result
/// variable; the conjunction of those results binds a fresh variable.
pub(super) fn is_expression(p: &mut Parser) -> Result<NodeRef, ParseError> {
    let is_ix = p.cursor.expect(TokenKind::Is, "`is`")?;
    let is_token = p.cursor.get(is_ix);
    p.cursor.expect(TokenKind::OpenParen, "`(` after `is`")?;

    let mut args = Vec::new();
    loop {
        match p.cursor.peek_kind() {
            Some(TokenKind::CloseParen) => break,
            Some(TokenKind::Comment) => {
                p.cursor.advance();
            }
            None => {
                return Err(ParseError::unexpected(None, "inside is(...)", p.position()));
            }
            Some(_) => {
                let comparison = statement::comparison(p, true)?;
                args.push(p.as_value(comparison)?);
            }
        }
    }
    p.cursor.expect(TokenKind::CloseParen, "`)` closing is(...)")?;

    let variable = p.synthetic("is", is_token.line, is_token.col, vec![Provenance::Token(is_ix)]);
    let mut from = vec![Provenance::Token(is_ix)];
    from.extend(args.iter().copied().map(Provenance::Node));
    let node = p.make(
        NodeKind::Expression(Expression {
            op: "and".to_string(),
            args,
            variable: Some(variable),
        }),
        from,
    );
    p.block().expression(node);
    Ok(node)
}

/// `ifExpression := ifBranch (ifBranch | elseIfBranch)* elseBranch?`
///
/// The node is a value; the consuming equality attaches its outputs and
/// appends it to the enclosing block's scan-like list.
pub(super) fn if_expression(p: &mut Parser) -> Result<NodeRef, ParseError> {
    let mut branches = vec![if_branch(p, false)?];
    loop {
        match p.cursor.peek_kind() {
            Some(TokenKind::If) => branches.push(if_branch(p, false)?),
            Some(TokenKind::Else) => {
                let else_ix = p.cursor.advance().expect("BUG: peeked `else` vanished");
                if p.cursor.check(TokenKind::If) {
                    branches.push(if_branch(p, true)?);
                } else {
                    branches.push(else_branch(p, else_ix)?);
                    break;
                }
            }
            _ => break,
        }
    }

    let from = branches.iter().copied().map(Provenance::Node).collect();
    Ok(p.make(
        NodeKind::IfExpression(IfExpression {
            branches,
            outputs: Vec::new(),
        }),
        from,
    ))
}

/// `ifBranch := "if" statement+ "then" expression`
fn if_branch(p: &mut Parser, exclusive: bool) -> Result<NodeRef, ParseError> {
    let if_ix = p.cursor.expect(TokenKind::If, "`if`")?;
    p.push_sub_block(None, vec![Provenance::Token(if_ix)]);
    let result = if_branch_body(p, if_ix);
    let sub = p.pop_block();
    let outputs = result?;

    Ok(p.make(
        NodeKind::IfBranch(IfBranch {
            block: Box::new(sub),
            outputs,
            exclusive,
        }),
        vec![Provenance::Token(if_ix)],
    ))
}

fn if_branch_body(p: &mut Parser, if_ix: usize) -> Result<Vec<NodeRef>, ParseError> {
    let mut statements = 0usize;
    loop {
        match p.cursor.peek_kind() {
            Some(TokenKind::Then) => break,
            Some(TokenKind::Comment) => {
                p.cursor.advance();
            }
            None => {
                return Err(ParseError::unexpected(
                    None,
                    "inside an if branch",
                    p.position(),
                ));
            }
            Some(_) => {
                statement::statement(p)?;
                statements += 1;
            }
        }
    }
    if statements == 0 {
        let token = p.cursor.get(if_ix);
        return Err(ParseError::invalid_syntax(
            "an if branch needs at least one condition before `then`",
            (token.line, token.col),
        ));
    }
    p.cursor.expect(TokenKind::Then, "`then`")?;
    let output = expr::expression(p)?;
    p.if_outputs(output)
}

/// `elseBranch := "else" expression` — no condition, always exclusive.
/// The `else` keyword is consumed by the caller.
fn else_branch(p: &mut Parser, else_ix: usize) -> Result<NodeRef, ParseError> {
    p.push_sub_block(None, vec![Provenance::Token(else_ix)]);
    let result = else_branch_body(p);
    let sub = p.pop_block();
    let outputs = result?;

    Ok(p.make(
        NodeKind::IfBranch(IfBranch {
            block: Box::new(sub),
            outputs,
            exclusive: true,
        }),
        vec![Provenance::Token(else_ix)],
    ))
}

fn else_branch_body(p: &mut Parser) -> Result<Vec<NodeRef>, ParseError> {
    let output = expr::expression(p)?;
    p.if_outputs(output)
}
