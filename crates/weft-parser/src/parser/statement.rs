//! Match statements, comparison/equality chains, and action statements.

use weft_ast::{
    Action, ActionValue, BlockKind, Expression, Literal, NodeKind, NodeRef, OpChain, Provenance,
    Scan,
};
use weft_lexer::TokenKind;

use super::{branch, expr, record, ParseError, Parser};

/// `statement := comparison | notStatement | comment`
pub(super) fn statement(p: &mut Parser) -> Result<(), ParseError> {
    match p.cursor.peek_kind() {
        Some(TokenKind::Not) if p.cursor.peek_nth_kind(1) == Some(TokenKind::OpenParen) => {
            not_statement(p)
        }
        Some(TokenKind::Comment) => {
            p.cursor.advance();
            Ok(())
        }
        _ => comparison(p, false).map(|_| ()),
    }
}

/// `notStatement := "not" "(" statement* ")"` — the nested statements lower
/// into a sub-block that joins the outer block as a scan.
fn not_statement(p: &mut Parser) -> Result<(), ParseError> {
    let not_ix = p.cursor.expect(TokenKind::Not, "`not`")?;
    p.cursor.expect(TokenKind::OpenParen, "`(` after `not`")?;

    p.push_sub_block(Some(BlockKind::Not), vec![Provenance::Token(not_ix)]);
    let mut result = Ok(());
    loop {
        match p.cursor.peek_kind() {
            Some(TokenKind::CloseParen) => break,
            Some(TokenKind::Comment) => {
                p.cursor.advance();
            }
            None => {
                result = Err(ParseError::unexpected(None, "inside not(...)", p.position()));
                break;
            }
            Some(_) => {
                if let Err(err) = statement(p) {
                    result = Err(err);
                    break;
                }
            }
        }
    }
    let sub = p.pop_block();
    result?;

    p.cursor.expect(TokenKind::CloseParen, "`)` closing not(...)")?;
    p.block().scan(sub);
    Ok(())
}

/// `comparison := expression ((Comparison|Equality) (expression|ifExpression))*`
///
/// Chained operators are pairwise: the left operand advances to the
/// just-consumed right. With `non_filtering` set (inside `is(...)`), every
/// operator, equality included, produces an expression node with a fresh
/// result variable instead of equalities and filters.
pub(super) fn comparison(p: &mut Parser, non_filtering: bool) -> Result<NodeRef, ParseError> {
    let mut left = expr::expression(p)?;
    let mut emitted: Vec<NodeRef> = Vec::new();
    let mut chain_variable = None;

    while matches!(
        p.cursor.peek_kind(),
        Some(TokenKind::Comparison) | Some(TokenKind::Equality)
    ) {
        let op_ix = p.cursor.advance().expect("BUG: peeked operator vanished");
        let op = p.cursor.get(op_ix);
        let is_equality = op.kind == TokenKind::Equality;

        let right = if is_equality && p.cursor.check(TokenKind::If) {
            branch::if_expression(p)?
        } else {
            expr::expression(p)?
        };

        if non_filtering {
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
        } else if is_equality {
            lower_equality(p, left, right, op_ix)?;
        } else {
            let lhs = p.as_value(left)?;
            let rhs = p.as_value(right)?;
            let node = p.make(
                NodeKind::Expression(Expression {
                    op: op.image.clone(),
                    args: vec![lhs, rhs],
                    variable: None,
                }),
                vec![
                    Provenance::Token(op_ix),
                    Provenance::Node(lhs),
                    Provenance::Node(rhs),
                ],
            );
            p.block().expression(node);
            emitted.push(node);
        }

        left = right;
    }

    if emitted.is_empty() {
        Ok(left)
    } else {
        let from = emitted.iter().copied().map(Provenance::Node).collect();
        Ok(p.make(
            NodeKind::Comparison(OpChain {
                expressions: emitted,
                variable: chain_variable,
            }),
            from,
        ))
    }
}

/// Lower one filtering equality.
fn lower_equality(
    p: &mut Parser,
    left: NodeRef,
    right: NodeRef,
    op_ix: usize,
) -> Result<(), ParseError> {
    let right_is_if = matches!(p.nodes[right].kind, NodeKind::IfExpression(_));
    let right_is_function = matches!(p.nodes[right].kind, NodeKind::FunctionRecord(_));
    let left_is_paren = p.nodes[left].as_parenthesis().is_some();

    if right_is_if {
        let outputs = p.if_outputs(left)?;
        let if_node = p.nodes[right]
            .as_if_expression_mut()
            .expect("BUG: kind checked above");
        if_node.outputs = outputs;
        p.nodes[right].from.push(Provenance::Token(op_ix));
        p.block().scan(right);
        Ok(())
    } else if right_is_function && left_is_paren {
        let items = p.nodes[left]
            .as_parenthesis()
            .expect("BUG: kind checked above")
            .items
            .clone();
        let returns: Vec<NodeRef> = items
            .iter()
            .map(|&item| p.as_value(item))
            .collect::<Result<_, _>>()?;
        let first = *returns.first().expect("parenthesis holds at least one item");
        let function_variable = p.nodes[right]
            .result_variable()
            .expect("BUG: function record carries a variable");
        p.nodes[right]
            .as_function_record_mut()
            .expect("BUG: kind checked above")
            .returns = returns;
        p.block().equality(first, function_variable);
        Ok(())
    } else if left_is_paren {
        let op = p.cursor.get(op_ix);
        Err(ParseError::invariant(
            "a parenthesis on the left of an equality needs a function or if on the right",
            (op.line, op.col),
        ))
    } else {
        let lhs = p.as_value(left)?;
        let rhs = p.as_value(right)?;
        p.block().equality(lhs, rhs);
        Ok(())
    }
}

/// `actionStatement := record | actionEqualityRecord | actionOperation | comment`
pub(super) fn action_statement(p: &mut Parser) -> Result<(), ParseError> {
    match p.cursor.peek_kind() {
        Some(TokenKind::Comment) => {
            p.cursor.advance();
            Ok(())
        }
        Some(TokenKind::OpenBracket) => {
            record::record(
                p,
                record::RecordOpts {
                    action: p.default_record_action(),
                    ..Default::default()
                },
            )?;
            Ok(())
        }
        Some(TokenKind::Identifier) => match p.cursor.peek_nth_kind(1) {
            Some(TokenKind::Equality) => action_equality_record(p),
            Some(TokenKind::Set) | Some(TokenKind::Merge) | Some(TokenKind::Mutate) => {
                record_operation(p)
            }
            Some(TokenKind::Dot) => attribute_operation(p),
            _ => Err(ParseError::unexpected(
                p.cursor.peek_nth(1),
                "after the variable of an action statement",
                p.position(),
            )),
        },
        _ => Err(ParseError::unexpected(
            p.cursor.peek(),
            "in an action section",
            p.position(),
        )),
    }
}

/// `actionEqualityRecord := variable "=" record` — the record's identity is
/// the surface variable.
fn action_equality_record(p: &mut Parser) -> Result<(), ParseError> {
    let var_ix = p.cursor.expect(TokenKind::Identifier, "a variable")?;
    let image = p.cursor.get(var_ix).image.clone();
    let variable = p.to_variable(&image, false, vec![Provenance::Token(var_ix)]);
    p.cursor.expect(TokenKind::Equality, "`=`")?;

    if !p.cursor.check(TokenKind::OpenBracket) {
        return Err(ParseError::expected(
            "a record on the right of an action equality",
            p.cursor.peek(),
            p.position(),
        ));
    }
    record::record(
        p,
        record::RecordOpts {
            action: p.default_record_action(),
            variable: Some(variable),
            ..Default::default()
        },
    )?;
    Ok(())
}

/// `recordOperation := variable (":=" "none" | "<-" record | ("+="|"-=") (tag|name))`
fn record_operation(p: &mut Parser) -> Result<(), ParseError> {
    let var_ix = p.cursor.expect(TokenKind::Identifier, "a variable")?;
    let image = p.cursor.get(var_ix).image.clone();
    let variable = p.to_variable(&image, false, vec![Provenance::Token(var_ix)]);

    match p.cursor.peek_kind() {
        Some(TokenKind::Set) => {
            let op_ix = p.cursor.advance().expect("BUG: peeked `:=` vanished");
            p.cursor.expect(TokenKind::None, "`none`")?;
            let action = p.make(
                NodeKind::Action(Action {
                    action: "erase".to_string(),
                    entity: variable,
                    attribute: None,
                    value: ActionValue::Erase,
                }),
                vec![Provenance::Token(op_ix), Provenance::Node(variable)],
            );
            p.append_by_section(action);
            Ok(())
        }
        Some(TokenKind::Merge) => {
            p.cursor.advance();
            p.nodes[variable]
                .as_variable_mut()
                .expect("BUG: merge target is a variable")
                .non_projecting = true;
            record::record(
                p,
                record::RecordOpts {
                    action: Some("<-".to_string()),
                    variable: Some(variable),
                    needs_entity: true,
                    ..Default::default()
                },
            )?;
            Ok(())
        }
        Some(TokenKind::Mutate) => {
            let op_ix = p.cursor.advance().expect("BUG: peeked mutate vanished");
            let action_op = if p.cursor.get(op_ix).image == "+=" {
                "+"
            } else {
                "-"
            };
            let (attribute, sigil_name, sigil_node) = match p.cursor.peek_kind() {
                Some(TokenKind::Hash) => {
                    let (name, node) = record::tag(p)?;
                    ("tag", name, node)
                }
                Some(TokenKind::At) => {
                    let (name, node) = record::name(p)?;
                    ("name", name, node)
                }
                _ => {
                    return Err(ParseError::expected(
                        "a #tag or @name",
                        p.cursor.peek(),
                        p.position(),
                    ));
                }
            };
            let value = p.constant(Literal::Str(sigil_name), vec![Provenance::Node(sigil_node)]);
            let action = p.make(
                NodeKind::Action(Action {
                    action: action_op.to_string(),
                    entity: variable,
                    attribute: Some(attribute.to_string()),
                    value: ActionValue::Value(value),
                }),
                vec![
                    Provenance::Token(op_ix),
                    Provenance::Node(variable),
                    Provenance::Node(sigil_node),
                ],
            );
            p.append_by_section(action);
            Ok(())
        }
        _ => Err(ParseError::expected(
            "`:=`, `<-`, `+=`, or `-=`",
            p.cursor.peek(),
            p.position(),
        )),
    }
}

/// `attributeOperation := attributeMutator ("<-" record | ":=" … | ("+="|"-=") …)`
fn attribute_operation(p: &mut Parser) -> Result<(), ParseError> {
    let mutator = expr::attribute_mutator(p)?;
    let (attribute, parent) = match &p.nodes[mutator].kind {
        NodeKind::AttributeMutator(m) => (m.attribute.clone(), m.parent),
        _ => unreachable!("BUG: attribute_mutator returns a mutator node"),
    };

    match p.cursor.peek_kind() {
        Some(TokenKind::Merge) => {
            let op_ix = p.cursor.advance().expect("BUG: peeked `<-` vanished");
            let op = p.cursor.get(op_ix);
            // Merge needs the attribute's current value bound: scan it, then
            // parse the merging record against that value variable.
            let value_variable =
                p.synthetic(&attribute, op.line, op.col, vec![Provenance::Node(mutator)]);
            let attribute_constant = p.constant(
                Literal::Str(attribute.clone()),
                vec![Provenance::Node(mutator)],
            );
            let scan = p.make(
                NodeKind::Scan(Scan {
                    entity: parent,
                    attribute: attribute_constant,
                    value: value_variable,
                    needs_entity: true,
                    scopes: p.scopes.clone(),
                }),
                vec![Provenance::Node(mutator), Provenance::Node(value_variable)],
            );
            p.block().scan(scan);
            record::record(
                p,
                record::RecordOpts {
                    action: Some("<-".to_string()),
                    variable: Some(value_variable),
                    needs_entity: true,
                    ..Default::default()
                },
            )?;
            Ok(())
        }
        Some(TokenKind::Set) => {
            let op_ix = p.cursor.advance().expect("BUG: peeked `:=` vanished");
            let value = match p.cursor.peek_kind() {
                Some(TokenKind::None) => {
                    p.cursor.advance();
                    ActionValue::Erase
                }
                Some(TokenKind::OpenBracket) => {
                    let rec = record::record(
                        p,
                        record::RecordOpts {
                            action: p.default_record_action(),
                            ..Default::default()
                        },
                    )?;
                    ActionValue::Value(p.as_value(rec)?)
                }
                _ => {
                    let v = expr::infix(p)?;
                    ActionValue::Value(p.as_value(v)?)
                }
            };
            let action = p.make(
                NodeKind::Action(Action {
                    action: ":=".to_string(),
                    entity: parent,
                    attribute: Some(attribute),
                    value,
                }),
                vec![Provenance::Token(op_ix), Provenance::Node(mutator)],
            );
            p.append_by_section(action);
            Ok(())
        }
        Some(TokenKind::Mutate) => {
            let op_ix = p.cursor.advance().expect("BUG: peeked mutate vanished");
            let action_op = if p.cursor.get(op_ix).image == "+=" {
                "+"
            } else {
                "-"
            };
            let value = action_attribute_expression(p)?;
            let action = p.make(
                NodeKind::Action(Action {
                    action: action_op.to_string(),
                    entity: parent,
                    attribute: Some(attribute),
                    value: ActionValue::Value(value),
                }),
                vec![Provenance::Token(op_ix), Provenance::Node(mutator)],
            );
            p.append_by_section(action);
            Ok(())
        }
        _ => Err(ParseError::expected(
            "`:=`, `<-`, `+=`, or `-=`",
            p.cursor.peek(),
            p.position(),
        )),
    }
}

/// The computed value of a `+=` / `-=` attribute mutation: a tag, a name,
/// or an infix expression.
fn action_attribute_expression(p: &mut Parser) -> Result<NodeRef, ParseError> {
    match p.cursor.peek_kind() {
        Some(TokenKind::Hash) => {
            let (name, node) = record::tag(p)?;
            Ok(p.constant(Literal::Str(name), vec![Provenance::Node(node)]))
        }
        Some(TokenKind::At) => {
            let (name, node) = record::name(p)?;
            Ok(p.constant(Literal::Str(name), vec![Provenance::Node(node)]))
        }
        _ => {
            let v = expr::infix(p)?;
            p.as_value(v)
        }
    }
}
