use memload_core::{AppsInstalled, MemloadError, Task, UserApps};

/// Turn a parsed record into a store write.
///
/// An error here means the payload schema itself is broken, not that the
/// input was bad; callers treat it as fatal for the whole run.
pub fn encode(record: &AppsInstalled) -> Result<Task, MemloadError> {
    let payload = UserApps::from(record).to_bytes()?;
    Ok(Task {
        key: record.key(),
        payload,
    })
}
