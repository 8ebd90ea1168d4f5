//! Streaming view of controller state.
//!
//! Callbacks ([`crate::progress::ConversionProgressCallback`]) push events;
//! this module offers the pull side: a `Stream` of [`RequestSnapshot`]s that
//! always starts with the current state and then yields the latest snapshot
//! after each change. Intermediate snapshots may be skipped if the consumer
//! is slower than the controller (only the newest value is kept), which is
//! what a renderer wants.
//!
//! ```rust,no_run
//! use futures::StreamExt;
//! use vidconv::{Controller, ControllerConfig};
//!
//! # async fn run() -> Result<(), vidconv::VidConvError> {
//! let controller = Controller::http(ControllerConfig::default())?;
//! let mut snapshots = controller.subscribe();
//! while let Some(s) = snapshots.next().await {
//!     println!("{:?} {:.0}%", s.status, s.progress);
//! }
//! # Ok(())
//! # }
//! ```

use crate::request::RequestSnapshot;
use std::pin::Pin;
use tokio::sync::watch;
use tokio_stream::wrappers::WatchStream;
use tokio_stream::Stream;

/// A boxed stream of controller snapshots.
pub type SnapshotStream = Pin<Box<dyn Stream<Item = RequestSnapshot> + Send>>;

/// Wrap a snapshot receiver as a stream that yields the current value first.
pub fn snapshot_stream(rx: watch::Receiver<RequestSnapshot>) -> SnapshotStream {
    Box::pin(WatchStream::new(rx))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::request::Status;
    use futures::StreamExt;

    #[tokio::test]
    async fn yields_current_then_updates() {
        let (tx, rx) = watch::channel(RequestSnapshot::default());
        let mut stream = snapshot_stream(rx);

        let first = stream.next().await.unwrap();
        assert_eq!(first.status, Status::Idle);

        tx.send_replace(RequestSnapshot {
            status: Status::FileAccepted,
            ..Default::default()
        });
        let second = stream.next().await.unwrap();
        assert_eq!(second.status, Status::FileAccepted);
    }

    #[tokio::test]
    async fn ends_when_sender_dropped() {
        let (tx, rx) = watch::channel(RequestSnapshot::default());
        let mut stream = snapshot_stream(rx);
        stream.next().await.unwrap();
        drop(tx);
        assert!(stream.next().await.is_none());
    }

    #[test]
    fn pending_until_next_change() {
        let (tx, rx) = watch::channel(RequestSnapshot::default());
        let mut stream = snapshot_stream(rx);
        tokio_test::block_on(stream.next()).unwrap();

        let mut next = tokio_test::task::spawn(stream.next());
        tokio_test::assert_pending!(next.poll());

        tx.send_replace(RequestSnapshot {
            progress: 12.5,
            ..Default::default()
        });
        assert!(next.is_woken());
        let s = tokio_test::assert_ready!(next.poll()).unwrap();
        assert_eq!(s.progress, 12.5);
    }
}
