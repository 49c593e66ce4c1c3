//! Renders a full [`Leaf`] tree to a single HTML string, for the
//! initial HTTP GET before the websocket takes over with sparse diffs.

use crate::template::{Dynamic, Leaf};

pub fn render_full_html(tree: &Leaf) -> String {
    let mut out = String::new();
    render_into(tree, &mut out);
    out
}

fn render_into(tree: &Leaf, out: &mut String) {
    for (i, static_part) in tree.statics.iter().enumerate() {
        out.push_str(static_part);
        if let Some(dynamic) = tree.dynamics.get(i) {
            render_dynamic(dynamic, out);
        }
    }
}

fn render_dynamic(dynamic: &Dynamic, out: &mut String) {
    match dynamic {
        Dynamic::Str(s) => out.push_str(s),
        Dynamic::Leaf(leaf) => render_into(leaf, out),
        Dynamic::List(items) => {
            for item in items {
                render_into(item, out);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::template::Template;
    use crate::value::Value;

    #[test]
    fn interleaves_statics_and_dynamics() {
        let template = Template::compile("<p>Hello {{.Name}}!</p>").unwrap();
        let tree = template
            .build(Value::map(vec![("Name".to_string(), Value::str("Ada"))]), 32)
            .unwrap();
        assert_eq!(render_full_html(&tree), "<p>Hello Ada!</p>");
    }

    #[test]
    fn renders_nested_range_items_in_order() {
        let template = Template::compile("<ul>{{range .Items}}<li>{{.}}</li>{{end}}</ul>").unwrap();
        let tree = template
            .build(
                Value::map(vec![(
                    "Items".to_string(),
                    Value::list(vec![Value::str("a"), Value::str("b")]),
                )]),
                32,
            )
            .unwrap();
        assert_eq!(render_full_html(&tree), "<ul><li>a</li><li>b</li></ul>");
    }
}
