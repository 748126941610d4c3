/// Routes server-initiated push notifications to handler slots.
///
/// Generated per service: `is_push` answers from the service's static id
/// table; `dispatch` deserializes the payload and invokes the overridable
/// handler slot. Dispatch runs synchronously on the listener thread, so
/// handlers should return promptly.
pub trait PushDispatch: Send + Sync {
    /// Whether `id` names a push channel of this service.
    fn is_push(&self, id: u32) -> bool;

    /// Deserialize and deliver the notification for `id`.
    fn dispatch(&self, id: u32, message: &[u8]);
}

/// Router for services that declare no push channels.
pub struct NoPushes;

impl PushDispatch for NoPushes {
    fn is_push(&self, _id: u32) -> bool {
        false
    }

    fn dispatch(&self, _id: u32, _message: &[u8]) {}
}
