//! HTTP surface: the embedded viewer page, the MJPEG video feed, and a
//! JSON status endpoint.

use std::convert::Infallible;

use axum::body::Body;
use axum::extract::State;
use axum::http::header;
use axum::response::{Html, IntoResponse};
use axum::routing::get;
use axum::{Json, Router};
use bytes::{BufMut, Bytes, BytesMut};

use crate::engine::EngineHandle;

const INDEX_HTML: &str = include_str!("index.html");

/// Part separator for the `multipart/x-mixed-replace` feed.
const BOUNDARY: &str = "frame";

pub fn build_router(engine: EngineHandle) -> Router {
    Router::new()
        .route("/", get(index))
        .route("/video_feed", get(video_feed))
        .route("/status", get(status))
        .with_state(engine)
}

async fn index() -> Html<&'static str> {
    Html(INDEX_HTML)
}

async fn status(State(engine): State<EngineHandle>) -> impl IntoResponse {
    Json(serde_json::json!({
        "version": env!("CARGO_PKG_VERSION"),
        "engine": engine.status(),
    }))
}

/// Continuous annotated-frame stream.
///
/// Each engine frame becomes one multipart JPEG part; the response ends
/// when the engine session does (sender dropped).
async fn video_feed(State(engine): State<EngineHandle>) -> impl IntoResponse {
    let mut frames = engine.frames();

    let stream = async_stream::stream! {
        loop {
            if frames.changed().await.is_err() {
                break;
            }
            let jpeg = frames.borrow_and_update().clone();
            if let Some(jpeg) = jpeg {
                yield Ok::<Bytes, Infallible>(multipart_part(&jpeg));
            }
        }
    };

    (
        [(
            header::CONTENT_TYPE,
            format!("multipart/x-mixed-replace; boundary={BOUNDARY}"),
        )],
        Body::from_stream(stream),
    )
}

/// Frame one JPEG as a multipart part: boundary line, part headers, payload.
fn multipart_part(jpeg: &[u8]) -> Bytes {
    let headers = format!(
        "--{BOUNDARY}\r\nContent-Type: image/jpeg\r\nContent-Length: {}\r\n\r\n",
        jpeg.len()
    );
    let mut part = BytesMut::with_capacity(headers.len() + jpeg.len() + 2);
    part.put_slice(headers.as_bytes());
    part.put_slice(jpeg);
    part.put_slice(b"\r\n");
    part.freeze()
}
