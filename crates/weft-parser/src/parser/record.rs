//! Records, attributes, and function records.
//!
//! A record is a bracketed list of attribute forms. The record's identity
//! variable is allocated before the attributes parse so that negated
//! attributes can scan against it; the pipe `|` flips a flag marking every
//! later attribute non-projecting.

use weft_ast::{
    Attribute, BlockKind, Expression, FunctionRecord, Literal, NodeKind, NodeRef, Provenance,
    Record, Scan, SigilName,
};
use weft_lexer::TokenKind;

use super::{expr, ParseError, Parser};

/// How a record parse is wired into its context.
#[derive(Debug, Default)]
pub(super) struct RecordOpts {
    /// Mutation operator carried for downstream interpretation.
    pub action: Option<String>,
    /// A caller-supplied identity (surface binding); a fresh non-projecting
    /// synthetic is allocated when absent.
    pub variable: Option<NodeRef>,
    pub needs_entity: bool,
    /// Suppresses both the identity variable and the block append; used by
    /// function records, whose bracket is an argument list.
    pub no_var: bool,
}

/// `record := "[" (attribute | "|")* "]"`
pub(super) fn record(p: &mut Parser, opts: RecordOpts) -> Result<NodeRef, ParseError> {
    let open_ix = p.cursor.expect(TokenKind::OpenBracket, "`[`")?;
    let open = p.cursor.get(open_ix);

    let variable = if opts.no_var {
        None
    } else {
        Some(match opts.variable {
            Some(variable) => variable,
            None => {
                let variable =
                    p.synthetic("record", open.line, open.col, vec![Provenance::Token(open_ix)]);
                p.nodes[variable]
                    .as_variable_mut()
                    .expect("BUG: synthetic is a variable")
                    .non_projecting = true;
                variable
            }
        })
    };

    let mut attributes = Vec::new();
    let mut non_projecting = false;
    loop {
        match p.cursor.peek_kind() {
            Some(TokenKind::CloseBracket) => break,
            Some(TokenKind::Pipe) => {
                p.cursor.advance();
                non_projecting = true;
            }
            Some(TokenKind::Comment) => {
                p.cursor.advance();
            }
            None => {
                return Err(ParseError::unexpected(None, "inside a record", p.position()));
            }
            Some(_) => {
                for attr in record_attribute(p, variable)? {
                    if non_projecting {
                        p.nodes[attr]
                            .as_attribute_mut()
                            .expect("BUG: record attributes are attribute nodes")
                            .non_projecting = true;
                    }
                    attributes.push(attr);
                }
            }
        }
    }
    let close_ix = p.cursor.expect(TokenKind::CloseBracket, "`]`")?;

    let mut from = vec![Provenance::Token(open_ix), Provenance::Token(close_ix)];
    from.extend(attributes.iter().copied().map(Provenance::Node));
    let node = p.make(
        NodeKind::Record(Record {
            attributes,
            action: opts.action,
            scopes: p.scopes.clone(),
            variable,
            needs_entity: opts.needs_entity,
            extra_projection: false,
        }),
        from,
    );
    if !opts.no_var {
        p.append_by_section(node);
    }
    Ok(node)
}

/// One attribute form inside a record. Most forms yield one attribute
/// node; a multi-record equality yields one per record, and a negation
/// yields none (it is consumed into a sub-block).
fn record_attribute(
    p: &mut Parser,
    record_variable: Option<NodeRef>,
) -> Result<Vec<NodeRef>, ParseError> {
    match p.cursor.peek_kind() {
        Some(TokenKind::Hash) => {
            let (name, node) = tag(p)?;
            let value = p.constant(Literal::Str(name), vec![Provenance::Node(node)]);
            Ok(vec![p.make(
                NodeKind::Attribute(Attribute {
                    attribute: "tag".to_string(),
                    value,
                    non_projecting: false,
                }),
                vec![Provenance::Node(node), Provenance::Node(value)],
            )])
        }
        Some(TokenKind::At) => {
            let (name, node) = name(p)?;
            let value = p.constant(Literal::Str(name), vec![Provenance::Node(node)]);
            Ok(vec![p.make(
                NodeKind::Attribute(Attribute {
                    attribute: "name".to_string(),
                    value,
                    non_projecting: false,
                }),
                vec![Provenance::Node(node), Provenance::Node(value)],
            )])
        }
        Some(TokenKind::Not) if p.cursor.peek_nth_kind(1) == Some(TokenKind::OpenParen) => {
            attribute_not(p, record_variable)?;
            Ok(Vec::new())
        }
        Some(TokenKind::Identifier) | Some(TokenKind::Num) => match p.cursor.peek_nth_kind(1) {
            Some(TokenKind::Equality) => attribute_equality(p),
            Some(TokenKind::Comparison) => attribute_comparison(p).map(|attr| vec![attr]),
            _ => {
                if p.cursor.peek_kind() == Some(TokenKind::Num) {
                    return Err(ParseError::unexpected(
                        p.cursor.peek(),
                        "in a record (a bare number is not an attribute)",
                        p.position(),
                    ));
                }
                let ix = p.cursor.advance().expect("BUG: peeked identifier vanished");
                let image = p.cursor.get(ix).image.clone();
                let value = p.to_variable(&image, false, vec![Provenance::Token(ix)]);
                Ok(vec![p.make(
                    NodeKind::Attribute(Attribute {
                        attribute: image,
                        value,
                        non_projecting: false,
                    }),
                    vec![Provenance::Token(ix), Provenance::Node(value)],
                )])
            }
        },
        _ => Err(ParseError::unexpected(
            p.cursor.peek(),
            "in a record",
            p.position(),
        )),
    }
}

/// `attributeEquality := (Identifier|Num) "=" (infix | record+)`
///
/// Multiple trailing records form a multi-valued attribute; every record
/// is auto-indexed (`eve-auto-index`) from 1 in source order once a second
/// record appears.
fn attribute_equality(p: &mut Parser) -> Result<Vec<NodeRef>, ParseError> {
    let name_ix = p.cursor.advance().expect("BUG: peeked attribute name vanished");
    let name = p.cursor.get(name_ix).image.clone();
    p.cursor.expect(TokenKind::Equality, "`:` or `=`")?;

    if p.cursor.check(TokenKind::OpenBracket) {
        let mut records = Vec::new();
        while p.cursor.check(TokenKind::OpenBracket) {
            records.push(record(
                p,
                RecordOpts {
                    action: p.default_record_action(),
                    ..Default::default()
                },
            )?);
        }
        if records.len() > 1 {
            for (index, &rec) in records.iter().enumerate() {
                let index_value =
                    p.constant(Literal::Num((index + 1) as f64), vec![Provenance::Node(rec)]);
                let index_attr = p.make(
                    NodeKind::Attribute(Attribute {
                        attribute: "eve-auto-index".to_string(),
                        value: index_value,
                        non_projecting: false,
                    }),
                    vec![Provenance::Node(rec), Provenance::Node(index_value)],
                );
                p.nodes[rec]
                    .as_record_mut()
                    .expect("BUG: record parse returns records")
                    .attributes
                    .push(index_attr);
            }
        }

        let mut attributes = Vec::new();
        for rec in records {
            let value = p.as_value(rec)?;
            attributes.push(p.make(
                NodeKind::Attribute(Attribute {
                    attribute: name.clone(),
                    value,
                    non_projecting: false,
                }),
                vec![Provenance::Token(name_ix), Provenance::Node(value)],
            ));
        }
        Ok(attributes)
    } else {
        let v = expr::infix(p)?;
        let value = p.as_value(v)?;
        Ok(vec![p.make(
            NodeKind::Attribute(Attribute {
                attribute: name,
                value,
                non_projecting: false,
            }),
            vec![Provenance::Token(name_ix), Provenance::Node(value)],
        )])
    }
}

/// `attributeComparison := Identifier Comparison expression` — binds a
/// fresh attribute variable and filters it.
pub(super) fn attribute_comparison(p: &mut Parser) -> Result<NodeRef, ParseError> {
    let name_ix = p.cursor.expect(TokenKind::Identifier, "an attribute name")?;
    let name = p.cursor.get(name_ix);
    let name_image = name.image.clone();
    let variable = p.synthetic(&name.image, name.line, name.col, vec![Provenance::Token(name_ix)]);

    let op_ix = p.cursor.expect(TokenKind::Comparison, "a comparison operator")?;
    let op_image = p.cursor.get(op_ix).image.clone();

    let rhs = expr::expression(p)?;
    let rhs_value = p.as_value(rhs)?;
    let filter = p.make(
        NodeKind::Expression(Expression {
            op: op_image,
            args: vec![variable, rhs_value],
            variable: None,
        }),
        vec![
            Provenance::Token(op_ix),
            Provenance::Node(variable),
            Provenance::Node(rhs_value),
        ],
    );
    p.block().expression(filter);

    Ok(p.make(
        NodeKind::Attribute(Attribute {
            attribute: name_image,
            value: variable,
            non_projecting: false,
        }),
        vec![Provenance::Token(name_ix), Provenance::Node(variable)],
    ))
}

/// `attributeNot := "not" "(" (attributeComparison | singularAttribute) ")"`
///
/// The negated attribute lowers into a `not` sub-block holding a scan of
/// the enclosing record's identity against the attribute; the sub-block
/// joins the outer block as a scan and no attribute node is produced.
fn attribute_not(p: &mut Parser, record_variable: Option<NodeRef>) -> Result<(), ParseError> {
    let not_ix = p.cursor.expect(TokenKind::Not, "`not`")?;
    p.cursor.expect(TokenKind::OpenParen, "`(` after `not`")?;
    let parent = record_variable.ok_or_else(|| {
        ParseError::invariant("not(...) needs an enclosing record identity", p.position())
    })?;

    p.push_sub_block(Some(BlockKind::Not), vec![Provenance::Token(not_ix)]);
    let result = attribute_not_body(p, parent);
    let sub = p.pop_block();
    result?;

    p.cursor.expect(TokenKind::CloseParen, "`)` closing not(...)")?;
    p.block().scan(sub);
    Ok(())
}

fn attribute_not_body(p: &mut Parser, parent: NodeRef) -> Result<(), ParseError> {
    let (attribute_name, value) = match p.cursor.peek_kind() {
        Some(TokenKind::Identifier)
            if p.cursor.peek_nth_kind(1) == Some(TokenKind::Comparison) =>
        {
            let attr = attribute_comparison(p)?;
            let attr_node = p.nodes[attr]
                .as_attribute()
                .expect("BUG: attribute_comparison returns an attribute");
            (attr_node.attribute.clone(), attr_node.value)
        }
        Some(TokenKind::Hash) => {
            let (tag_name, node) = tag(p)?;
            let value = p.constant(Literal::Str(tag_name), vec![Provenance::Node(node)]);
            ("tag".to_string(), value)
        }
        Some(TokenKind::At) => {
            let (entity_name, node) = name(p)?;
            let value = p.constant(Literal::Str(entity_name), vec![Provenance::Node(node)]);
            ("name".to_string(), value)
        }
        Some(TokenKind::Identifier) => {
            // Force-generated so the negated name does not join an outer
            // variable of the same spelling.
            let ix = p.cursor.advance().expect("BUG: peeked identifier vanished");
            let token = p.cursor.get(ix);
            let value = p.synthetic(&token.image, token.line, token.col, vec![Provenance::Token(ix)]);
            (token.image.clone(), value)
        }
        _ => {
            return Err(ParseError::unexpected(
                p.cursor.peek(),
                "inside not(...)",
                p.position(),
            ));
        }
    };

    let attribute = p.constant(Literal::Str(attribute_name), vec![Provenance::Node(parent)]);
    let scan = p.make(
        NodeKind::Scan(Scan {
            entity: parent,
            attribute,
            value,
            needs_entity: false,
            scopes: p.scopes.clone(),
        }),
        vec![Provenance::Node(parent), Provenance::Node(value)],
    );
    p.block().scan(scan);

    // The negation joins on the record identity: record it among the
    // sub-block's used variables.
    let parent_name = p.nodes[parent]
        .as_variable()
        .expect("BUG: record identity is a variable")
        .name
        .clone();
    p.block().variables.insert(parent_name, parent);
    Ok(())
}

/// `functionRecord := Identifier record`
///
/// `lookup` is first-class: its argument record destructures into the scan
/// slots directly. Every other identifier becomes a functionRecord
/// expression with a positional return variable.
pub(super) fn function_record(p: &mut Parser) -> Result<NodeRef, ParseError> {
    let op_ix = p.cursor.expect(TokenKind::Identifier, "a function name")?;
    let op = p.cursor.get(op_ix);
    let argument = record(
        p,
        RecordOpts {
            no_var: true,
            ..Default::default()
        },
    )?;

    if op.image == "lookup" {
        let attrs = p.nodes[argument]
            .as_record()
            .expect("BUG: record parse returns records")
            .attributes
            .clone();
        let mut entity = None;
        let mut attribute = None;
        let mut value = None;
        for attr_ref in attrs {
            let attr = p.nodes[attr_ref]
                .as_attribute()
                .expect("BUG: record attributes are attribute nodes");
            match attr.attribute.as_str() {
                "record" => entity = Some(attr.value),
                "attribute" => attribute = Some(attr.value),
                "value" => value = Some(attr.value),
                // The `node` slot is accepted but not carried at this layer.
                _ => {}
            }
        }
        let entity = lookup_slot(p, entity, "record", op_ix);
        let attribute = lookup_slot(p, attribute, "attribute", op_ix);
        let value = lookup_slot(p, value, "value", op_ix);
        let scan = p.make(
            NodeKind::Scan(Scan {
                entity,
                attribute,
                value,
                needs_entity: false,
                scopes: p.scopes.clone(),
            }),
            vec![Provenance::Token(op_ix), Provenance::Node(argument)],
        );
        p.block().scan(scan);
        Ok(scan)
    } else {
        let variable = p.synthetic(&op.image, op.line, op.col, vec![Provenance::Token(op_ix)]);
        let node = p.make(
            NodeKind::FunctionRecord(FunctionRecord {
                op: op.image.clone(),
                record: argument,
                variable,
                returns: Vec::new(),
            }),
            vec![Provenance::Token(op_ix), Provenance::Node(argument)],
        );
        p.block().expression(node);
        Ok(node)
    }
}

/// An unsupplied `lookup` slot binds a fresh positional variable.
fn lookup_slot(p: &mut Parser, slot: Option<NodeRef>, stem: &str, op_ix: usize) -> NodeRef {
    match slot {
        Some(value) => value,
        None => {
            let op = p.cursor.get(op_ix);
            p.synthetic(stem, op.line, op.col, vec![Provenance::Token(op_ix)])
        }
    }
}

/// `tag := "#" Identifier`
pub(super) fn tag(p: &mut Parser) -> Result<(String, NodeRef), ParseError> {
    let hash_ix = p.cursor.expect(TokenKind::Hash, "`#`")?;
    let ident_ix = p.cursor.expect(TokenKind::Identifier, "a tag name")?;
    let image = p.cursor.get(ident_ix).image.clone();
    let node = p.make(
        NodeKind::Tag(SigilName {
            name: image.clone(),
        }),
        vec![Provenance::Token(hash_ix), Provenance::Token(ident_ix)],
    );
    Ok((image, node))
}

/// `name := "@" Identifier`
pub(super) fn name(p: &mut Parser) -> Result<(String, NodeRef), ParseError> {
    let at_ix = p.cursor.expect(TokenKind::At, "`@`")?;
    let ident_ix = p.cursor.expect(TokenKind::Identifier, "a name")?;
    let image = p.cursor.get(ident_ix).image.clone();
    let node = p.make(
        NodeKind::Name(SigilName {
            name: image.clone(),
        }),
        vec![Provenance::Token(at_ix), Provenance::Token(ident_ix)],
    );
    Ok((image, node))
}
