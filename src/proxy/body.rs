//! Upstream response bodies with a stall bound.

use std::time::Duration;

use axum::body::{Body, Bytes};
use axum::BoxError;
use futures::StreamExt;
use http_body_util::{BodyStream, StreamBody};

use crate::upstream::Service;

#[derive(Debug, thiserror::Error)]
#[error("upstream body sent nothing for {0:?}")]
pub struct BodyStalled(pub Duration);

/// Stream `body` through unchanged, failing it once `idle` passes without
/// a frame. The headers are already out by then, so the client sees the
/// connection close mid-body.
pub fn idle_bounded<B>(body: B, idle: Duration, service: Service) -> Body
where
    B: hyper::body::Body<Data = Bytes> + Send + 'static,
    B::Error: Into<BoxError>,
{
    let frames = Box::pin(BodyStream::new(body));
    let stream = futures::stream::unfold(Some(frames), move |state| async move {
        let mut frames = state?;
        match tokio::time::timeout(idle, frames.next()).await {
            Ok(Some(Ok(frame))) => Some((Ok::<_, BoxError>(frame), Some(frames))),
            Ok(Some(Err(e))) => Some((Err(e.into()), None)),
            Ok(None) => None,
            Err(_) => {
                tracing::warn!(upstream = %service, idle = ?idle, "upstream body stalled, closing");
                Some((Err(BodyStalled(idle).into()), None))
            }
        }
    });
    Body::new(StreamBody::new(stream))
}
