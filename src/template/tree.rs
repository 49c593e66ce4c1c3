//! The runtime tree: renders a flattened node list against a [`Value`]
//! context into the wire shape `{"s": [...], "0": ..., "1": ..., ...}`.

use serde::ser::{SerializeMap, SerializeSeq};
use serde::{Serialize, Serializer};

use super::ast::{Builtin, Expr, Literal, Node, RangeBinding};
use crate::error::EngineError;
use crate::value::Value;

/// One renderable unit: a static skeleton interleaved with dynamic
/// slots. `statics.len() == dynamics.len() + 1` always holds.
#[derive(Debug, Clone, PartialEq)]
pub struct Leaf {
    pub statics: Vec<String>,
    pub dynamics: Vec<Dynamic>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Dynamic {
    Str(String),
    Leaf(Box<Leaf>),
    List(Vec<Leaf>),
}

impl Serialize for Leaf {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(1 + self.dynamics.len()))?;
        map.serialize_entry("s", &self.statics)?;
        for (i, dynamic) in self.dynamics.iter().enumerate() {
            map.serialize_entry(&i.to_string(), dynamic)?;
        }
        map.end()
    }
}

impl Serialize for Dynamic {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Dynamic::Str(s) => s.serialize(serializer),
            Dynamic::Leaf(leaf) => leaf.serialize(serializer),
            Dynamic::List(items) => {
                let mut seq = serializer.serialize_seq(Some(items.len()))?;
                for item in items {
                    seq.serialize_element(item)?;
                }
                seq.end()
            }
        }
    }
}

/// The lexical context a node list is rendered against: the current
/// context (`.`), the outermost root (`$`), and variables bound by an
/// enclosing `range`/`with`. Cloning a scope is cheap: `Value` variants
/// are `Arc`-backed.
#[derive(Clone)]
pub struct Scope {
    dot: Value,
    root: Value,
    vars: Vec<(String, Value)>,
}

impl Scope {
    pub fn root(data: Value) -> Self {
        Scope {
            dot: data.clone(),
            root: data,
            vars: Vec::new(),
        }
    }

    fn with_dot(&self, dot: Value) -> Self {
        Scope {
            dot,
            root: self.root.clone(),
            vars: self.vars.clone(),
        }
    }

    fn bind(&self, name: String, value: Value) -> Self {
        let mut scope = self.clone();
        scope.vars.push((name, value));
        scope
    }

    fn var(&self, name: &str) -> Value {
        self.vars
            .iter()
            .rev()
            .find(|(n, _)| n == name)
            .map(|(_, v)| v.clone())
            .unwrap_or(Value::Null)
    }
}

/// Bounds how deep a render may recurse, guarding against cyclic host
/// data (a `range`/`with` chain that never bottoms out).
pub struct TreeBuilder {
    max_depth: usize,
}

impl TreeBuilder {
    pub fn new(max_depth: usize) -> Self {
        TreeBuilder { max_depth }
    }

    pub fn build(&self, body: &[Node], scope: &Scope) -> Result<Leaf, EngineError> {
        self.build_at_depth(body, scope, 0)
    }

    /// Each dynamic slot's key is simply its position in `dynamics`: nodes
    /// are visited in left-to-right document order and each one that emits
    /// a dynamic pushes onto `dynamics` exactly once, so the `enumerate()`
    /// index `Leaf::serialize` and `diff()` key by is already the
    /// decimal key spec.md's key generator describes — a separate counter
    /// would just recompute the same number.
    fn build_at_depth(&self, body: &[Node], scope: &Scope, depth: usize) -> Result<Leaf, EngineError> {
        if depth > self.max_depth {
            return Err(EngineError::Eval {
                message: "max traversal depth exceeded (cyclic data?)".to_string(),
            });
        }

        let mut statics = Vec::new();
        let mut dynamics = Vec::new();
        let mut current = String::new();

        for node in body {
            match node {
                Node::Text(text) => current.push_str(text),
                Node::Comment => {}
                Node::Interpolation(expr) => {
                    let value = eval_expr(expr, scope, depth, self.max_depth)?;
                    statics.push(std::mem::take(&mut current));
                    dynamics.push(Dynamic::Str(value.to_display_string()));
                }
                Node::If {
                    cond,
                    then_body,
                    else_body,
                } => {
                    let truthy = eval_expr(cond, scope, depth, self.max_depth)?.is_truthy();
                    let dynamic = if truthy {
                        Dynamic::Leaf(Box::new(self.build_at_depth(then_body, scope, depth + 1)?))
                    } else if let Some(else_body) = else_body {
                        Dynamic::Leaf(Box::new(self.build_at_depth(else_body, scope, depth + 1)?))
                    } else {
                        Dynamic::Str(String::new())
                    };
                    statics.push(std::mem::take(&mut current));
                    dynamics.push(dynamic);
                }
                Node::With {
                    expr,
                    binding,
                    body,
                    else_body,
                } => {
                    let value = eval_expr(expr, scope, depth, self.max_depth)?;
                    let dynamic = if value.is_truthy() {
                        let mut inner_scope = scope.with_dot(value.clone());
                        if let Some(name) = binding {
                            inner_scope = inner_scope.bind(name.clone(), value);
                        }
                        Dynamic::Leaf(Box::new(self.build_at_depth(body, &inner_scope, depth + 1)?))
                    } else if let Some(else_body) = else_body {
                        Dynamic::Leaf(Box::new(self.build_at_depth(else_body, scope, depth + 1)?))
                    } else {
                        Dynamic::Str(String::new())
                    };
                    statics.push(std::mem::take(&mut current));
                    dynamics.push(dynamic);
                }
                Node::Range {
                    expr,
                    binding,
                    body,
                    empty_body,
                } => {
                    let target = eval_expr(expr, scope, depth, self.max_depth)?;
                    let entries = target.iter_entries();
                    let dynamic = if entries.is_empty() {
                        if let Some(empty_body) = empty_body {
                            Dynamic::Leaf(Box::new(self.build_at_depth(empty_body, scope, depth + 1)?))
                        } else {
                            Dynamic::Str(String::new())
                        }
                    } else {
                        let mut items = Vec::with_capacity(entries.len());
                        for (key, item_value) in entries {
                            let item_scope = bind_range_vars(scope, binding, key, item_value.clone())
                                .with_dot(item_value);
                            items.push(self.build_at_depth(body, &item_scope, depth + 1)?);
                        }
                        Dynamic::List(items)
                    };
                    statics.push(std::mem::take(&mut current));
                    dynamics.push(dynamic);
                }
                Node::Scoped { expr, body } => {
                    let new_dot = match expr {
                        Some(expr) => eval_expr(expr, scope, depth, self.max_depth)?,
                        None => scope.dot.clone(),
                    };
                    let inner_scope = scope.with_dot(new_dot);
                    let inner = self.build_at_depth(body, &inner_scope, depth + 1)?;
                    statics.push(std::mem::take(&mut current));
                    dynamics.push(Dynamic::Leaf(Box::new(inner)));
                }
                Node::Define { .. } | Node::Invoke { .. } | Node::Block { .. } => {
                    return Err(EngineError::Eval {
                        message: "unresolved template composition reached the tree builder"
                            .to_string(),
                    });
                }
            }
        }
        statics.push(current);

        Ok(Leaf { statics, dynamics })
    }
}

fn bind_range_vars(
    scope: &Scope,
    binding: &Option<RangeBinding>,
    key: Option<String>,
    value: Value,
) -> Scope {
    match binding {
        None => scope.clone(),
        Some(RangeBinding::Value(name)) => scope.bind(name.clone(), value),
        Some(RangeBinding::KeyValue(key_name, value_name)) => {
            let key_value = key.map(Value::str).unwrap_or(Value::Null);
            scope
                .bind(key_name.clone(), key_value)
                .bind(value_name.clone(), value)
        }
    }
}

fn eval_expr(expr: &Expr, scope: &Scope, depth: usize, max_depth: usize) -> Result<Value, EngineError> {
    if depth > max_depth {
        return Err(EngineError::Eval {
            message: "max traversal depth exceeded (cyclic data?)".to_string(),
        });
    }
    match expr {
        Expr::Dot => Ok(scope.dot.clone()),
        Expr::Root => Ok(scope.root.clone()),
        Expr::Var(name) => Ok(scope.var(name)),
        Expr::Field(base, name) => {
            let base_value = eval_expr(base, scope, depth + 1, max_depth)?;
            base_value.field(name).ok_or_else(|| {
                tracing::warn!(field = name.as_str(), "field access on a non-map value");
                EngineError::Eval {
                    message: format!("cannot access field {:?} on a non-map value", name),
                }
            })
        }
        Expr::Literal(lit) => Ok(match lit {
            Literal::Str(s) => Value::str(s.clone()),
            Literal::Number(n) => Value::Number(*n),
            Literal::Bool(b) => Value::Bool(*b),
            Literal::Nil => Value::Null,
        }),
        Expr::Call(builtin, args) => eval_builtin(*builtin, args, scope, depth, max_depth),
    }
}

fn eval_builtin(
    builtin: Builtin,
    args: &[Expr],
    scope: &Scope,
    depth: usize,
    max_depth: usize,
) -> Result<Value, EngineError> {
    let values = args
        .iter()
        .map(|arg| eval_expr(arg, scope, depth + 1, max_depth))
        .collect::<Result<Vec<_>, _>>()?;

    match builtin {
        Builtin::Eq => Ok(Value::Bool(values[0] == values[1])),
        Builtin::Ne => Ok(Value::Bool(values[0] != values[1])),
        Builtin::Lt => Ok(Value::Bool(compare(&values[0], &values[1]) == std::cmp::Ordering::Less)),
        Builtin::Le => Ok(Value::Bool(compare(&values[0], &values[1]) != std::cmp::Ordering::Greater)),
        Builtin::Gt => Ok(Value::Bool(compare(&values[0], &values[1]) == std::cmp::Ordering::Greater)),
        Builtin::Ge => Ok(Value::Bool(compare(&values[0], &values[1]) != std::cmp::Ordering::Less)),
        Builtin::And => Ok(Value::Bool(values.iter().all(Value::is_truthy))),
        Builtin::Or => Ok(Value::Bool(values.iter().any(Value::is_truthy))),
        Builtin::Not => Ok(Value::Bool(!values[0].is_truthy())),
        Builtin::Len => values[0].len().map(|n| Value::Number(n as f64)).ok_or_else(|| {
            EngineError::Eval {
                message: "len: value has no length".to_string(),
            }
        }),
        Builtin::Index => {
            let mut current = values[0].clone();
            for idx in &values[1..] {
                current = current.index(idx).ok_or_else(|| EngineError::Eval {
                    message: "index: value is not indexable".to_string(),
                })?;
            }
            Ok(current)
        }
    }
}

fn compare(a: &Value, b: &Value) -> std::cmp::Ordering {
    match (a, b) {
        (Value::Number(x), Value::Number(y)) => x.partial_cmp(y).unwrap_or(std::cmp::Ordering::Equal),
        _ => a.to_display_string().cmp(&b.to_display_string()),
    }
}
