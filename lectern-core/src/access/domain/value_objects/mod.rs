// Admission value objects
// Immutable, validated on construction, safe to share across tasks.

mod deadline;
mod device_fingerprint;
mod device_metadata;

pub use deadline::Deadline;
pub use device_fingerprint::{DEVICE_ID_MAX_BYTES, DeviceFingerprint};
pub use device_metadata::{
    DEVICE_NAME_MAX_BYTES, DeviceMetadata, IP_ADDRESS_MAX_BYTES, USER_AGENT_MAX_BYTES,
};

/// Clip `value` to at most `max_bytes` bytes without splitting a UTF-8
/// character.
pub(crate) fn clip(value: &str, max_bytes: usize) -> &str {
    if value.len() <= max_bytes {
        return value;
    }
    let mut end = max_bytes;
    while !value.is_char_boundary(end) {
        end -= 1;
    }
    &value[..end]
}
