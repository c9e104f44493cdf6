use super::ApiError;

/// One step of a live reply channel, in arrival order. `Done` and `Failed`
/// are terminal; nothing follows them on the same channel.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum StreamEvent {
    Fragment(String),
    Done,
    Failed(ApiError),
}
