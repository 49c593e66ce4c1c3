//! Extractor for upgrading an HTTP request to the page's websocket, or
//! falling back to a plain full-page render.

use std::convert::Infallible;
use std::sync::atomic::AtomicBool;
use std::sync::Arc;

use axum::extract::ws::{self, WebSocket, WebSocketUpgrade};
use axum::extract::FromRequestParts;
use axum::response::{Html, IntoResponse, Response};
use futures_util::{sink::SinkExt, stream::StreamExt};
use http::request::Parts;
use serde::Deserialize;

use crate::session::Page;

/// Extractor that is a no-op over a plain HTTP request, and carries the
/// pending upgrade over a websocket request.
#[derive(Debug)]
pub struct LiveViewUpgrade {
    inner: LiveViewUpgradeInner,
}

#[derive(Debug)]
enum LiveViewUpgradeInner {
    Http,
    Ws(Box<WebSocketUpgrade>),
}

impl<S> FromRequestParts<S> for LiveViewUpgrade
where
    S: Send + Sync,
{
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        if let Ok(ws) = WebSocketUpgrade::from_request_parts(parts, state).await {
            Ok(Self {
                inner: LiveViewUpgradeInner::Ws(Box::new(ws)),
            })
        } else {
            Ok(Self {
                inner: LiveViewUpgradeInner::Http,
            })
        }
    }
}

impl LiveViewUpgrade {
    /// On a plain HTTP request, renders `page`'s current tree as a full
    /// HTML document. On a websocket request, upgrades the connection
    /// and serves subsequent action dispatches against `page`.
    pub async fn response(self, page: Arc<Page>) -> Response {
        match self.inner {
            LiveViewUpgradeInner::Http => {
                let tree = page.current_tree().await;
                Html(crate::html::render_full_html(&tree)).into_response()
            }
            LiveViewUpgradeInner::Ws(ws) => ws
                .on_upgrade(move |socket| run_socket(socket, page))
                .into_response(),
        }
    }
}

#[derive(Debug, Deserialize)]
struct InboundAction {
    action: String,
    #[serde(default)]
    data: serde_json::Value,
}

async fn run_socket(socket: WebSocket, page: Arc<Page>) {
    let (write, read) = socket.split();

    let write = write.with(|msg: serde_json::Value| async move {
        let encoded = serde_json::to_string(&msg)?;
        Ok::<_, anyhow::Error>(ws::Message::Text(encoded.into()))
    });
    futures_util::pin_mut!(write);

    let mut read = read;
    while let Some(frame) = read.next().await {
        let frame = match frame {
            Ok(frame) => frame,
            Err(err) => {
                tracing::error!(%err, "websocket receive failed");
                break;
            }
        };
        let ws::Message::Text(text) = frame else {
            continue;
        };
        let inbound: InboundAction = match serde_json::from_str(&text) {
            Ok(inbound) => inbound,
            Err(err) => {
                tracing::error!(%err, "malformed action payload");
                continue;
            }
        };

        let outcome = crate::dispatch::dispatch_action(
            &page,
            &inbound.action,
            inbound.data,
            Arc::new(AtomicBool::new(false)),
        )
        .await;

        let payload = match outcome {
            Ok(sparse) => serde_json::to_value(&sparse),
            Err(err) => serde_json::to_value(&err.to_payload()),
        };
        let payload = match payload {
            Ok(payload) => payload,
            Err(err) => {
                tracing::error!(%err, "failed to encode diff payload");
                continue;
            }
        };

        if let Err(err) = write.send(payload).await {
            tracing::error!(%err, "failed to send diff to socket");
            break;
        }
    }
}
