//! A single page's live state: its compiled template, current data and
//! render tree, and the models registered to handle its actions.

use std::collections::HashMap;
use std::sync::Mutex as StdMutex;
use std::time::{Duration, Instant};

use tokio::sync::Mutex;
use uuid::Uuid;

use crate::action::Model;
use crate::error::EngineError;
use crate::template::{Leaf, Template};
use crate::value::Value;

pub(crate) struct PageState {
    pub(crate) data: Value,
    pub(crate) tree: Leaf,
    pub(crate) models: HashMap<String, Box<dyn Model>>,
}

/// One browser tab's worth of live state, addressed by an opaque token.
/// All mutation goes through `state`, a single-writer async mutex: only
/// one action (or the initial build) is ever in flight against a given
/// page at a time.
pub struct Page {
    token: String,
    template: Template,
    max_depth: usize,
    pub(crate) state: Mutex<PageState>,
    last_touched: StdMutex<Instant>,
}

impl Page {
    pub(crate) fn new(template: Template, data: Value, max_depth: usize) -> Result<Self, EngineError> {
        let tree = template.build(data.clone(), max_depth)?;
        Ok(Page {
            token: Uuid::new_v4().to_string(),
            template,
            max_depth,
            state: Mutex::new(PageState {
                data,
                tree,
                models: HashMap::new(),
            }),
            last_touched: StdMutex::new(Instant::now()),
        })
    }

    pub fn token(&self) -> &str {
        &self.token
    }

    pub fn max_depth(&self) -> usize {
        self.max_depth
    }

    pub fn template(&self) -> &Template {
        &self.template
    }

    pub async fn register_model(&self, name: impl Into<String>, model: Box<dyn Model>) {
        let mut state = self.state.lock().await;
        state.models.insert(name.into(), model);
    }

    pub async fn current_tree(&self) -> Leaf {
        self.state.lock().await.tree.clone()
    }

    pub(crate) fn touch(&self) {
        *self.last_touched.lock().unwrap() = Instant::now();
    }

    pub(crate) fn is_expired(&self, ttl: Duration) -> bool {
        self.last_touched.lock().unwrap().elapsed() > ttl
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn new_page_builds_its_initial_tree() {
        let template = Template::compile("Hi {{.Name}}").unwrap();
        let page = Page::new(
            template,
            Value::map(vec![("Name".to_string(), Value::str("Ada"))]),
            32,
        )
        .unwrap();
        let tree = page.current_tree().await;
        assert_eq!(tree.statics, vec!["Hi ".to_string(), "".to_string()]);
    }

    #[tokio::test]
    async fn fresh_page_is_not_expired() {
        let template = Template::compile("x").unwrap();
        let page = Page::new(template, Value::Null, 32).unwrap();
        assert!(!page.is_expired(Duration::from_secs(60)));
    }
}
