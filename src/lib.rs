//! Server-rendered templates that diff down to minimal client update
//! payloads.
//!
//! A host application compiles a [`Template`](template::Template),
//! opens a [`Page`](session::Page) against it with some initial data,
//! and serves that page's token to a client. The client reconnects over
//! a websocket; subsequent interaction dispatches named actions against
//! the page's registered [`Model`](action::Model)s, and each dispatch
//! returns a [`SparseTree`](diff::SparseTree) describing only what
//! changed since the page's last render.

mod action;
mod config;
mod diff;
mod dispatch;
mod error;
mod extract;
mod html;
mod registry;
mod session;
mod template;
mod value;

use std::sync::atomic::AtomicBool;
use std::sync::Arc;

pub use action::{ActionContext, Model};
pub use config::ApplicationConfig;
pub use diff::{diff, SparseDynamic, SparseTree};
pub use error::{EngineError, ErrorBody, ErrorPayload};
pub use extract::LiveViewUpgrade;
pub use session::Page;
pub use template::{fingerprint, Dynamic, Fingerprint, Leaf, Template};
pub use value::{ToValue, Value};

use registry::Registry;

/// The engine's external handle: compiles templates, opens and looks up
/// pages, and dispatches actions against them.
pub struct Application {
    registry: Registry,
    config: ApplicationConfig,
}

impl Application {
    pub fn new(config: ApplicationConfig) -> Arc<Self> {
        let registry = Registry::new(config.session_ttl, config.sweep_interval);
        Arc::new(Application { registry, config })
    }

    pub fn compile_template(&self, source: &str) -> Result<Template, EngineError> {
        Template::compile(source)
    }

    pub fn new_page(&self, template: Template, data: Value) -> Result<Arc<Page>, EngineError> {
        let page = Arc::new(Page::new(template, data, self.config.max_traversal_depth)?);
        self.registry.insert(page.clone());
        Ok(page)
    }

    pub fn lookup_page(&self, token: &str) -> Result<Arc<Page>, EngineError> {
        let page = self.registry.get(token).ok_or(EngineError::NotFound)?;
        if page.is_expired(self.config.session_ttl) {
            self.registry.remove(token);
            return Err(EngineError::Expired);
        }
        page.touch();
        Ok(page)
    }

    pub async fn render_full_html(&self, page: &Page) -> String {
        html::render_full_html(&page.current_tree().await)
    }

    pub async fn register_model(&self, page: &Page, name: impl Into<String>, model: Box<dyn Model>) {
        page.register_model(name, model).await;
    }

    pub async fn dispatch_action(
        &self,
        page: &Page,
        action: &str,
        payload: serde_json::Value,
        canceled: Arc<AtomicBool>,
    ) -> Result<SparseTree, EngineError> {
        dispatch::dispatch_action(page, action, payload, canceled).await
    }

    pub fn close_page(&self, token: &str) {
        self.registry.remove(token);
    }

    /// Stops the background TTL sweeper. Dropping the `Application`
    /// does this too; call it explicitly to shut down without waiting
    /// on the last `Arc` to go away.
    pub fn close(&self) {
        self.registry.shutdown();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn end_to_end_compile_render_and_dispatch() {
        let app = Application::new(ApplicationConfig::default());
        let template = app.compile_template("<p>{{.Name}}</p>").unwrap();
        let page = app
            .new_page(template, Value::map(vec![("Name".to_string(), Value::str("Ada"))]))
            .unwrap();

        assert_eq!(app.render_full_html(&page).await, "<p>Ada</p>");
        assert!(app.lookup_page(page.token()).is_ok());

        app.close_page(page.token());
        assert!(matches!(
            app.lookup_page(page.token()).unwrap_err(),
            EngineError::NotFound
        ));
        app.close();
    }
}
