use std::sync::atomic::AtomicBool;
use std::sync::Arc;

use assert_json_diff::assert_json_eq;
use async_trait::async_trait;
use viewtree::{
    diff, ActionContext, Application, ApplicationConfig, EngineError, Model, Template, Value,
};

fn init_tracing() {
    use tracing_subscriber::EnvFilter;
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")))
        .with_test_writer()
        .try_init();
}

fn build(source: &str, data: Value) -> viewtree::Leaf {
    init_tracing();
    Template::compile(source).unwrap().build(data, 64).unwrap()
}

#[test]
fn simple_interpolation_renders_one_dynamic_slot() {
    let leaf = build("Hello {{.Name}}!", Value::map(vec![("Name".to_string(), Value::str("Ada"))]));
    assert_eq!(leaf.statics, vec!["Hello ".to_string(), "!".to_string()]);
    assert_eq!(leaf.dynamics.len(), 1);
}

#[test]
fn conditional_toggles_between_branches() {
    let source = "{{if .Show}}visible{{else}}hidden{{end}}";
    let shown = build(source, Value::map(vec![("Show".to_string(), Value::Bool(true))]));
    let hidden = build(source, Value::map(vec![("Show".to_string(), Value::Bool(false))]));
    let sparse = diff(&hidden, &shown);
    assert!(!sparse.is_empty());
    assert_ne!(
        serde_json::to_value(&shown).unwrap(),
        serde_json::to_value(&hidden).unwrap()
    );
}

#[test]
fn range_middle_item_update_is_a_sparse_list_diff() {
    let source = "{{range .Items}}<li>{{.}}</li>{{end}}";
    let items = |values: &[&str]| {
        Value::map(vec![(
            "Items".to_string(),
            Value::list(values.iter().map(|v| Value::str(*v)).collect()),
        )])
    };

    let before = build(source, items(&["a", "b", "c"]));
    let after = build(source, items(&["a", "B", "c"]));
    let sparse = diff(&before, &after);
    let json = serde_json::to_value(&sparse).unwrap();
    // Only position 1 changed; positions 0 and 2 are omitted entirely.
    assert_json_eq!(json, serde_json::json!({"0": {"1": "B"}}));
}

#[test]
fn range_length_change_sends_the_full_new_list() {
    let source = "{{range .Items}}<li>{{.}}</li>{{end}}";
    let before = build(
        source,
        Value::map(vec![(
            "Items".to_string(),
            Value::list(vec![Value::str("a")]),
        )]),
    );
    let after = build(
        source,
        Value::map(vec![(
            "Items".to_string(),
            Value::list(vec![Value::str("a"), Value::str("b")]),
        )]),
    );
    let sparse = diff(&before, &after);
    let json = serde_json::to_value(&sparse).unwrap();
    assert!(json["0"].is_array());
    assert_eq!(json["0"].as_array().unwrap().len(), 2);
}

#[test]
fn nested_range_with_falsy_inner_conditional_yields_empty_branch_leaves() {
    let source = "{{range .Items}}{{if .Flagged}}!{{end}}{{.Label}}{{end}}";
    let data = Value::map(vec![(
        "Items".to_string(),
        Value::list(vec![
            Value::map(vec![
                ("Flagged".to_string(), Value::Bool(false)),
                ("Label".to_string(), Value::str("one")),
            ]),
            Value::map(vec![
                ("Flagged".to_string(), Value::Bool(true)),
                ("Label".to_string(), Value::str("two")),
            ]),
        ]),
    )]);
    let leaf = build(source, data);
    match &leaf.dynamics[0] {
        viewtree::Dynamic::List(items) => {
            assert_eq!(items.len(), 2);
            assert_eq!(items[0].dynamics[0], viewtree::Dynamic::Str(String::new()));
            assert_eq!(items[1].dynamics[0], viewtree::Dynamic::Str("!".to_string()));
            assert_eq!(items[0].dynamics[1], viewtree::Dynamic::Str("one".to_string()));
            assert_eq!(items[1].dynamics[1], viewtree::Dynamic::Str("two".to_string()));
        }
        other => panic!("expected a list dynamic, got {:?}", other),
    }
}

#[test]
fn template_composition_cycle_is_rejected_at_compile_time() {
    let source = r#"{{define "loop"}}{{template "loop" .}}{{end}}{{template "loop" .}}"#;
    let err = Template::compile(source).unwrap_err();
    assert!(matches!(err, EngineError::Cycle { .. }));
}

struct Counter {
    count: i64,
}

#[async_trait]
impl Model for Counter {
    async fn call(&mut self, method: &str, ctx: &mut ActionContext) -> Result<(), EngineError> {
        match method {
            "Increment" => {
                self.count += ctx.int("by").unwrap_or(1);
                ctx.set_result(Value::map(vec![(
                    "Count".to_string(),
                    Value::number(self.count as f64),
                )]));
                Ok(())
            }
            other => Err(EngineError::UnknownAction {
                action: other.to_string(),
            }),
        }
    }
}

#[tokio::test]
async fn counter_action_dispatch_returns_the_documented_sparse_diff() {
    let app = Application::new(ApplicationConfig::default());
    let template = app.compile_template("Count: {{.Count}}").unwrap();
    let page = app
        .new_page(template, Value::map(vec![("Count".to_string(), Value::number(0.0))]))
        .unwrap();
    app.register_model(&page, "counter", Box::new(Counter { count: 0 })).await;

    let sparse = app
        .dispatch_action(
            &page,
            "counter.Increment",
            serde_json::json!({"by": 3}),
            Arc::new(AtomicBool::new(false)),
        )
        .await
        .unwrap();

    assert_json_eq!(serde_json::to_value(&sparse).unwrap(), serde_json::json!({"0": "3"}));
    assert_eq!(app.render_full_html(&page).await, "Count: 3");
    app.close();
}
