//! Composition flattening: resolves every `define`/`template`/`block`
//! into directly renderable nodes before the tree builder ever sees the
//! template. Downstream code (keys, tree, fingerprint) never has to know
//! what a template name referred to.

use std::collections::HashMap;

use super::ast::Node;
use crate::error::EngineError;

pub(crate) fn flatten(nodes: Vec<Node>) -> Result<Vec<Node>, EngineError> {
    let defines = collect_defines(&nodes);
    let mut stack = Vec::new();
    flatten_nodes(nodes, &defines, &mut stack)
}

/// `define` bodies are collected from the whole top-level node list
/// before flattening starts, independent of where they appear relative
/// to a `block`'s own default body or to the template's main output. A
/// `block` contributes its body as a fallback only when no `define` of
/// the same name exists.
fn collect_defines(nodes: &[Node]) -> HashMap<String, Vec<Node>> {
    let mut defines = HashMap::new();
    for node in nodes {
        if let Node::Define { name, body } = node {
            defines.insert(name.clone(), body.clone());
        }
    }
    for node in nodes {
        if let Node::Block { name, body, .. } = node {
            defines.entry(name.clone()).or_insert_with(|| body.clone());
        }
    }
    defines
}

fn flatten_nodes(
    nodes: Vec<Node>,
    defines: &HashMap<String, Vec<Node>>,
    stack: &mut Vec<String>,
) -> Result<Vec<Node>, EngineError> {
    let mut out = Vec::with_capacity(nodes.len());
    for node in nodes {
        flatten_node(node, defines, stack, &mut out)?;
    }
    Ok(out)
}

fn flatten_node(
    node: Node,
    defines: &HashMap<String, Vec<Node>>,
    stack: &mut Vec<String>,
    out: &mut Vec<Node>,
) -> Result<(), EngineError> {
    match node {
        Node::Text(_) | Node::Interpolation(_) => out.push(node),
        Node::If {
            cond,
            then_body,
            else_body,
        } => {
            let then_body = flatten_nodes(then_body, defines, stack)?;
            let else_body = else_body
                .map(|body| flatten_nodes(body, defines, stack))
                .transpose()?;
            out.push(Node::If {
                cond,
                then_body,
                else_body,
            });
        }
        Node::Range {
            expr,
            binding,
            body,
            empty_body,
        } => {
            let body = flatten_nodes(body, defines, stack)?;
            let empty_body = empty_body
                .map(|body| flatten_nodes(body, defines, stack))
                .transpose()?;
            out.push(Node::Range {
                expr,
                binding,
                body,
                empty_body,
            });
        }
        Node::With {
            expr,
            binding,
            body,
            else_body,
        } => {
            let body = flatten_nodes(body, defines, stack)?;
            let else_body = else_body
                .map(|body| flatten_nodes(body, defines, stack))
                .transpose()?;
            out.push(Node::With {
                expr,
                binding,
                body,
                else_body,
            });
        }
        Node::Define { .. } => {
            // No direct output: already collected by `collect_defines`.
        }
        Node::Comment => {
            // No direct output.
        }
        Node::Invoke { name, data } => {
            let body = inline(&name, stack, defines)?;
            out.push(Node::Scoped { expr: data, body });
        }
        Node::Block { name, data, .. } => {
            let body = inline(&name, stack, defines)?;
            out.push(Node::Scoped { expr: data, body });
        }
        Node::Scoped { expr, body } => {
            let body = flatten_nodes(body, defines, stack)?;
            out.push(Node::Scoped { expr, body });
        }
    }
    Ok(())
}

fn inline(
    name: &str,
    stack: &mut Vec<String>,
    defines: &HashMap<String, Vec<Node>>,
) -> Result<Vec<Node>, EngineError> {
    if stack.iter().any(|n| n == name) {
        let mut path = stack.clone();
        path.push(name.to_string());
        return Err(EngineError::Cycle {
            path: path.join(" -> "),
        });
    }
    let body = defines
        .get(name)
        .ok_or_else(|| EngineError::MissingTemplate {
            name: name.to_string(),
        })?
        .clone();
    stack.push(name.to_string());
    let flattened = flatten_nodes(body, defines, stack);
    stack.pop();
    flattened
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::template::ast::Expr;
    use crate::template::lexer::lex;
    use crate::template::parser::parse;

    fn flatten_source(src: &str) -> Vec<Node> {
        flatten(parse(lex(src).unwrap()).unwrap()).unwrap()
    }

    #[test]
    fn invoke_is_replaced_by_scoped_body() {
        let nodes = flatten_source(r#"{{define "row"}}<li>{{.Name}}</li>{{end}}{{template "row" .}}"#);
        assert_eq!(
            nodes,
            vec![Node::Scoped {
                expr: Some(Expr::Dot),
                body: vec![
                    Node::Text("<li>".to_string()),
                    Node::Interpolation(Expr::Field(Box::new(Expr::Dot), "Name".to_string())),
                    Node::Text("</li>".to_string()),
                ],
            }]
        );
    }

    #[test]
    fn block_falls_back_to_its_own_body_when_not_overridden() {
        let nodes = flatten_source(r#"{{block "greeting" .}}hi{{end}}"#);
        assert_eq!(
            nodes,
            vec![Node::Scoped {
                expr: Some(Expr::Dot),
                body: vec![Node::Text("hi".to_string())],
            }]
        );
    }

    #[test]
    fn block_is_overridden_by_a_later_define() {
        let nodes =
            flatten_source(r#"{{block "greeting" .}}hi{{end}}{{define "greeting"}}yo{{end}}"#);
        assert_eq!(
            nodes[0],
            Node::Scoped {
                expr: Some(Expr::Dot),
                body: vec![Node::Text("yo".to_string())],
            }
        );
    }

    #[test]
    fn missing_template_is_an_error() {
        let nodes = parse(lex(r#"{{template "missing" .}}"#).unwrap()).unwrap();
        let err = flatten(nodes).unwrap_err();
        assert!(matches!(err, EngineError::MissingTemplate { .. }));
    }

    #[test]
    fn self_referential_template_is_a_cycle_error() {
        let nodes = parse(
            lex(r#"{{define "loop"}}{{template "loop" .}}{{end}}{{template "loop" .}}"#).unwrap(),
        )
        .unwrap();
        let err = flatten(nodes).unwrap_err();
        assert!(matches!(err, EngineError::Cycle { .. }));
    }
}
