//! JobKind - binds a job type string to a payload type.

use serde::Serialize;
use serde::de::DeserializeOwned;

/// A payload type with a fixed job type.
///
/// ```ignore
/// #[derive(Serialize, Deserialize)]
/// struct PublishInstagram {
///     caption: String,
/// }
///
/// impl JobKind for PublishInstagram {
///     const TYPE: &'static str = "publish-instagram";
/// }
/// ```
///
/// Registering a `Handler<PublishInstagram>` and enqueueing through
/// `JobQueue::enqueue_kind` both key off `TYPE`, so the two cannot drift.
pub trait JobKind: Serialize + DeserializeOwned + Send + Sync + 'static {
    const TYPE: &'static str;
}
