//! Compiles template source into a renderable artifact.
//!
//! Compilation runs source text through three fixed stages: lex, parse,
//! flatten. A `Template` holds the result (flattened nodes) and is cheap
//! to render repeatedly against different data.

mod ast;
mod flatten;
mod fingerprint;
mod lexer;
mod parser;
mod tree;

pub use ast::{Builtin, Expr, Literal, Node, RangeBinding};
pub use fingerprint::{fingerprint, Fingerprint};
pub use tree::{Dynamic, Leaf, Scope, TreeBuilder};

use crate::error::EngineError;
use crate::value::Value;

/// A compiled template: source text has been lexed, parsed, and had its
/// `define`/`template`/`block` composition flattened away. Renderable
/// any number of times against different data.
#[derive(Clone)]
pub struct Template {
    body: Vec<Node>,
}

impl Template {
    pub fn compile(source: &str) -> Result<Self, EngineError> {
        let tokens = lexer::lex(source)?;
        let parsed = parser::parse(tokens)?;
        let body = flatten::flatten(parsed)?;
        Ok(Template { body })
    }

    /// Builds the render tree for `data`. `max_depth` bounds recursion
    /// into nested `range`/`with`/`if` constructs, guarding against
    /// cyclic host data.
    #[tracing::instrument(skip_all, fields(max_depth))]
    pub fn build(&self, data: Value, max_depth: usize) -> Result<Leaf, EngineError> {
        let builder = TreeBuilder::new(max_depth);
        let scope = Scope::root(data);
        builder.build(&self.body, &scope)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn compiles_and_renders_a_simple_template() {
        let template = Template::compile("Hello {{.Name}}!").unwrap();
        let leaf = template
            .build(Value::map(vec![("Name".to_string(), Value::str("Ada"))]), 32)
            .unwrap();
        assert_eq!(leaf.statics, vec!["Hello ".to_string(), "!".to_string()]);
        assert_eq!(leaf.dynamics, vec![Dynamic::Str("Ada".to_string())]);
    }

    #[test]
    fn compile_propagates_syntax_errors() {
        let err = Template::compile("{{ .Name").unwrap_err();
        assert!(matches!(err, EngineError::Syntax { .. }));
    }

    #[test]
    fn compile_propagates_composition_errors() {
        let err = Template::compile(r#"{{template "missing" .}}"#).unwrap_err();
        assert!(matches!(err, EngineError::MissingTemplate { .. }));
    }
}
