pub mod killable_thread;

pub use killable_thread::{FinishResult, KillSignal, KillableThread};

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::{Duration, Instant};

    fn wait_until<F: FnMut() -> bool>(mut f: F) -> bool {
        let deadline = Instant::now() + Duration::from_secs(5);
        while Instant::now() < deadline {
            if f() {
                return true;
            }
            std::thread::sleep(Duration::from_millis(1));
        }
        false
    }

    #[test]
    fn poll_hands_back_result_once() {
        let mut kt = KillableThread::new("sum".to_string(), |_| (0..10).sum::<i32>()).unwrap();
        let mut got = None;
        assert!(wait_until(|| {
            got = kt.poll();
            got.is_some()
        }));
        match got {
            Some(Ok(s)) => assert_eq!(s, 45),
            other => panic!("Expected a finished sum, got {:?}", other.map(|r| r.is_ok())),
        }
        assert!(kt.poll().is_none());
        assert!(kt.is_finished());
    }

    #[test]
    fn kill_stops_looping_body() {
        let mut kt = KillableThread::new("spinner".to_string(), |signal: KillSignal| {
            let mut count = 0u64;
            while !signal.should_stop() {
                count += 1;
                std::thread::sleep(Duration::from_micros(50));
            }
            count
        })
        .unwrap();
        assert!(!kt.is_killed());
        kt.kill();
        assert!(kt.is_killed());
        assert!(wait_until(|| kt.is_finished()));
        match kt.finish() {
            Some(Ok(_)) => (),
            _ => panic!("We should have gotten the count back!"),
        }
    }

    #[test]
    fn dropping_raises_signal() {
        let (tx, rx) = cb::channel::unbounded();
        let kt = KillableThread::new("dropped".to_string(), move |signal: KillSignal| {
            while !signal.should_stop() {
                std::thread::sleep(Duration::from_micros(50));
            }
            let _ = tx.send(());
        })
        .unwrap();
        drop(kt);
        assert!(rx.recv_timeout(Duration::from_secs(5)).is_ok());
    }
}
