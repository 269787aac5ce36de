//! Initial queued-timestamp offset (§4.4 "an initial queued timestamp
//! offset `now − notify_interval + notify_delay` so the monitor does
//! not alarm immediately").

use repoctl_types::{Duration, Timestamp};

pub fn initial_queued_at(now: Timestamp, notify_interval: Duration, notify_delay: Duration) -> Timestamp {
    now.saturating_sub(notify_interval).saturating_add(notify_delay)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn offset_moves_queued_at_into_the_past_by_the_gap() {
        let now = Timestamp::from_nanos(1_000_000_000);
        let interval = Duration::from_secs(10);
        let delay = Duration::from_secs(2);
        let queued_at = initial_queued_at(now, interval, delay);
        assert_eq!(queued_at, Timestamp::from_nanos(1_000_000_000 - 8_000_000_000));
    }

    #[test]
    fn zero_delay_pushes_back_by_the_full_interval() {
        let now = Timestamp::from_nanos(5_000_000_000);
        let queued_at = initial_queued_at(now, Duration::from_secs(5), Duration::zero());
        assert_eq!(queued_at, Timestamp::from_nanos(0));
    }
}
