use crate::types::LogBatch;

/// Number of leading records compared between polls. New records arrive at the
/// head, so a short prefix is enough to notice them.
const COMPARED_PREFIX: usize = 5;

/// Whether `next` differs enough from the last rendered batch to re-render.
pub fn has_changed(previous: Option<&LogBatch>, next: &LogBatch) -> bool {
    let Some(previous) = previous else {
        return true;
    };

    if previous.len() != next.len() {
        return true;
    }

    next.iter()
        .take(COMPARED_PREFIX)
        .enumerate()
        .any(|(index, current)| match previous.get(index) {
            Some(old) => old.log_id != current.log_id || old.received_at != current.received_at,
            None => true,
        })
}
