use rand::Rng;
use time::format_description::well_known::Rfc3339;
use time::OffsetDateTime;

/// A fresh random record id such as `bug-3f9a0c12d4e5b671`.
pub(crate) fn new_id(prefix: &str) -> String {
    let n: u64 = rand::thread_rng().gen();
    format!("{prefix}-{n:016x}")
}

/// Current UTC time as RFC 3339 with sub-second precision.
pub(crate) fn now_rfc3339() -> String {
    let now = OffsetDateTime::now_utc();
    now.format(&Rfc3339).unwrap_or_else(|_| {
        format!(
            "{:04}-{:02}-{:02}T{:02}:{:02}:{:02}Z",
            now.year(),
            now.month() as u8,
            now.day(),
            now.hour(),
            now.minute(),
            now.second()
        )
    })
}
