use chrono::{DateTime, TimeZone, Utc};
use std::sync::atomic::{AtomicI64, Ordering};

/// Last stamp handed out, in nanoseconds since the epoch.
static LAST_ISSUED: AtomicI64 = AtomicI64::new(i64::MIN);

/// Returns a timestamp strictly after `previous` and after every stamp
/// issued earlier in this process.
///
/// Wall-clock time is used when it has moved forward; otherwise the stamp is
/// advanced by one nanosecond, so creation order is also timestamp order.
pub fn next_timestamp(previous: Option<DateTime<Utc>>) -> DateTime<Utc> {
    let floor = previous
        .and_then(|prev| prev.timestamp_nanos_opt())
        .map_or(i64::MIN, |nanos| nanos.saturating_add(1));
    let now = Utc::now().timestamp_nanos_opt().unwrap_or(i64::MAX);

    let mut last = LAST_ISSUED.load(Ordering::Relaxed);
    loop {
        let candidate = now.max(floor).max(last.saturating_add(1));
        match LAST_ISSUED.compare_exchange_weak(last, candidate, Ordering::AcqRel, Ordering::Relaxed)
        {
            Ok(_) => return Utc.timestamp_nanos(candidate),
            Err(actual) => last = actual,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    #[test]
    fn advances_past_a_future_previous_value() {
        let future = Utc::now() + Duration::hours(1);
        let next = next_timestamp(Some(future));
        assert!(next > future);
    }

    #[test]
    fn stamps_never_repeat() {
        let mut previous = next_timestamp(None);
        for _ in 0..1000 {
            let next = next_timestamp(None);
            assert!(next > previous);
            previous = next;
        }
    }

    #[test]
    fn concurrent_stamps_are_unique() {
        let handles: Vec<_> = (0..4)
            .map(|_| {
                std::thread::spawn(|| (0..250).map(|_| next_timestamp(None)).collect::<Vec<_>>())
            })
            .collect();
        let mut all: Vec<_> = handles
            .into_iter()
            .flat_map(|handle| handle.join().unwrap())
            .collect();
        let total = all.len();
        all.sort();
        all.dedup();
        assert_eq!(all.len(), total);
    }
}
