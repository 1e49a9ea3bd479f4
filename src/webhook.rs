//! LINE webhook HTTP handlers

use axum::{
    Router,
    body::{Body, Bytes},
    extract::State,
    http::{HeaderMap, Request, StatusCode},
    middleware::{self, Next},
    response::Response,
    routing::{get, post},
};
use std::net::SocketAddr;
use tracing::{debug, error, info, warn};

use crate::dispatcher::EventDispatcher;
use crate::signature::{LineSignature, SIGNATURE_HEADER};
use crate::types::WebhookPayload;

/// Webhook path registered in the LINE console
pub const WEBHOOK_PATH: &str = "/line/webhook";

/// Health check path
pub const HEALTH_PATH: &str = "/healthz";

/// Webhook server state
#[derive(Clone)]
pub struct WebhookState {
    pub signature: LineSignature,
    pub dispatcher: EventDispatcher,
    pub debug_mode: bool,
}

/// Build the HTTP router
pub fn router(state: WebhookState) -> Router {
    Router::new()
        .route(WEBHOOK_PATH, post(handle_webhook))
        .route(HEALTH_PATH, get(health_check))
        .layer(middleware::from_fn(log_request))
        .with_state(state)
}

/// Run the webhook HTTP server
pub async fn run_server(addr: SocketAddr, state: WebhookState) -> anyhow::Result<()> {
    let app = router(state);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

/// Health check endpoint
async fn health_check() -> &'static str {
    "ok"
}

/// Middleware to log all incoming HTTP requests
async fn log_request(req: Request<Body>, next: Next) -> Response {
    let method = req.method().clone();
    let path = req.uri().path().to_string();

    info!("🌐 HTTP {} {}", method, path);

    let response = next.run(req).await;

    info!("📤 Response status: {}", response.status());

    response
}

/// Handle a webhook delivery (POST request from LINE)
///
/// Acknowledges as soon as the payload is verified and parsed; the events are
/// translated and answered in the background.
async fn handle_webhook(
    State(state): State<WebhookState>,
    headers: HeaderMap,
    body: Bytes,
) -> StatusCode {
    debug!("Request body length: {} bytes", body.len());

    let signature = headers
        .get(SIGNATURE_HEADER)
        .and_then(|v| v.to_str().ok())
        .unwrap_or("");

    if !state.signature.verify(&body, signature) {
        warn!("Invalid signature in webhook request");
        return StatusCode::BAD_REQUEST;
    }

    if state.debug_mode {
        debug!("Raw webhook payload: {}", String::from_utf8_lossy(&body));
    }

    let payload: WebhookPayload = match serde_json::from_slice(&body) {
        Ok(payload) => payload,
        Err(e) => {
            error!("Cannot parse webhook payload: {}", e);
            return StatusCode::INTERNAL_SERVER_ERROR;
        }
    };

    if payload.events.is_empty() {
        // LINE sends an empty delivery when verifying the webhook URL
        info!("Webhook verification request received");
        return StatusCode::OK;
    }

    let count = payload.events.len();
    match state.dispatcher.submit(payload.events) {
        Ok(batch_id) => info!("📥 Accepted {} event(s) as batch {}", count, batch_id),
        Err(e) => warn!("Dropping {} event(s): {}", count, e),
    }

    StatusCode::OK
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::EventContext;
    use crate::pipeline::tests::{FakeTranslator, GatedTranslator, RecordingReplier, text_event};
    use std::sync::Arc;
    use std::time::Duration;
    use tower::ServiceExt;

    const SECRET: &str = "test_channel_secret";

    struct Harness {
        app: Router,
        translator: Arc<FakeTranslator>,
        replier: Arc<RecordingReplier>,
    }

    fn app(ctx: EventContext, worker_count: usize, queue_capacity: usize) -> Router {
        router(WebhookState {
            signature: LineSignature::new(SECRET),
            dispatcher: EventDispatcher::start(ctx, worker_count, queue_capacity),
            debug_mode: true,
        })
    }

    fn harness() -> Harness {
        let translator = Arc::new(FakeTranslator::default());
        let replier = Arc::new(RecordingReplier::default());
        let ctx = EventContext::new(translator.clone(), replier.clone());
        Harness {
            app: app(ctx, 2, 16),
            translator,
            replier,
        }
    }

    fn webhook_request(body: &str, signature: Option<&str>) -> Request<Body> {
        let mut builder = Request::builder()
            .method("POST")
            .uri(WEBHOOK_PATH)
            .header("content-type", "application/json");
        if let Some(signature) = signature {
            builder = builder.header(SIGNATURE_HEADER, signature);
        }
        builder.body(Body::from(body.to_string())).unwrap()
    }

    fn signed(body: &str) -> Request<Body> {
        let signature = LineSignature::new(SECRET).sign(body.as_bytes());
        webhook_request(body, Some(&signature))
    }

    fn payload(events: Vec<serde_json::Value>) -> String {
        serde_json::json!({ "destination": "U0", "events": events }).to_string()
    }

    /// Poll until `n` replies were recorded
    async fn wait_for_replies(replier: &RecordingReplier, n: usize) -> Vec<(String, String)> {
        for _ in 0..200 {
            {
                let replies = replier.replies.lock().unwrap();
                if replies.len() >= n {
                    return replies.clone();
                }
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        panic!("expected {} replies", n);
    }

    #[tokio::test]
    async fn test_health_check() {
        let h = harness();
        let response = h
            .app
            .oneshot(Request::get(HEALTH_PATH).body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let body = axum::body::to_bytes(response.into_body(), 1024).await.unwrap();
        assert_eq!(&body[..], b"ok");
    }

    #[tokio::test]
    async fn test_signed_text_message_is_acknowledged_then_replied() {
        let h = harness();
        let body = payload(vec![text_event("reply-1", "hello")]);

        let response = h.app.oneshot(signed(&body)).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let replies = wait_for_replies(&h.replier, 1).await;
        assert_eq!(
            replies,
            [("reply-1".to_string(), "[en→th] <hello>".to_string())]
        );
        assert_eq!(*h.translator.calls.lock().unwrap(), ["hello"]);
    }

    #[tokio::test]
    async fn test_bad_signature_rejected_without_processing() {
        let h = harness();
        let body = payload(vec![text_event("reply-1", "hello")]);
        let forged = LineSignature::new("other_secret").sign(body.as_bytes());

        let response = h
            .app
            .clone()
            .oneshot(webhook_request(&body, Some(&forged)))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);

        let response = h.app.oneshot(webhook_request(&body, None)).await.unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);

        tokio::time::sleep(Duration::from_millis(50)).await;
        assert!(h.translator.calls.lock().unwrap().is_empty());
        assert!(h.replier.replies.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_malformed_payload_is_server_error() {
        let h = harness();
        let response = h.app.oneshot(signed("{\"events\": 42}")).await.unwrap();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[tokio::test]
    async fn test_multiple_events_each_translated_in_order() {
        let h = harness();
        let body = payload(vec![
            text_event("r1", "first"),
            text_event("r2", "fail"),
            text_event("r3", "ทดสอบ"),
        ]);

        let response = h.app.oneshot(signed(&body)).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let replies = wait_for_replies(&h.replier, 3).await;
        assert_eq!(replies[0].0, "r1");
        assert_eq!(replies[1].0, "r2");
        assert_eq!(replies[2], ("r3".to_string(), "[th→en] <ทดสอบ>".to_string()));
        assert_eq!(
            *h.translator.calls.lock().unwrap(),
            ["first", "fail", "ทดสอบ"]
        );
    }

    #[tokio::test]
    async fn test_verification_delivery_acknowledged() {
        let h = harness();
        let response = h.app.oneshot(signed(&payload(vec![]))).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn test_standby_event_does_not_fail_delivery() {
        let h = harness();
        let standby = serde_json::json!({
            "type": "message",
            "mode": "standby",
            "timestamp": 1625665242211i64,
            "source": { "type": "user", "userId": "U1" },
            "message": { "type": "text", "id": "1", "text": "hi" }
        });
        let body = payload(vec![standby, text_event("r2", "hello")]);

        let response = h.app.oneshot(signed(&body)).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        wait_for_replies(&h.replier, 1).await;
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert_eq!(
            *h.replier.replies.lock().unwrap(),
            [("r2".to_string(), "[en→th] <hello>".to_string())]
        );
        assert_eq!(*h.translator.calls.lock().unwrap(), ["hello"]);
    }

    #[tokio::test]
    async fn test_full_queue_still_acknowledged_but_dropped() {
        let gate = Arc::new(tokio::sync::Semaphore::new(0));
        let translator = Arc::new(GatedTranslator::new(gate.clone()));
        let replier = Arc::new(RecordingReplier::default());
        let app = app(EventContext::new(translator.clone(), replier.clone()), 1, 1);

        // First request occupies the only worker
        let first = payload(vec![text_event("r1", "first")]);
        let response = app.clone().oneshot(signed(&first)).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        for _ in 0..200 {
            if !translator.calls.lock().unwrap().is_empty() {
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        assert_eq!(*translator.calls.lock().unwrap(), ["first"]);

        // Second waits in the queue, third has nowhere to go
        let second = payload(vec![text_event("r2", "second")]);
        let response = app.clone().oneshot(signed(&second)).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let third = payload(vec![text_event("r3", "third")]);
        let response = app.oneshot(signed(&third)).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        gate.add_permits(3);
        let replies = wait_for_replies(&replier, 2).await;
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert_eq!(replies[0].0, "r1");
        assert_eq!(replies[1].0, "r2");
        assert_eq!(replier.replies.lock().unwrap().len(), 2);
        assert_eq!(*translator.calls.lock().unwrap(), ["first", "second"]);
    }
}
