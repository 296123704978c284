//! Round-robin load balancing strategy.

use std::sync::atomic::{AtomicUsize, Ordering};

use crate::load_balancer::{LbError, LoadBalancer};

/// Round-robin selector.
/// Stores an internal cursor shared by every caller of the route.
#[derive(Debug, Default)]
pub struct RoundRobin {
    cursor: AtomicUsize,
}

impl RoundRobin {
    pub fn new() -> Self {
        Self::default()
    }
}

impl LoadBalancer for RoundRobin {
    fn elect<'a>(&self, hosts: &'a [String]) -> Result<&'a str, LbError> {
        if hosts.is_empty() {
            return Err(LbError::EmptyTargets);
        }

        let len = hosts.len();
        // Read and advance in one step. A cursor past the end (the host list
        // shrank, or first wrap) restarts from 0 before indexing.
        let prev = match self.cursor.fetch_update(Ordering::AcqRel, Ordering::Acquire, |c| {
            Some(if c >= len { 1 } else { c + 1 })
        }) {
            Ok(prev) | Err(prev) => prev,
        };
        let index = if prev >= len { 0 } else { prev };

        Ok(&hosts[index])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;
    use std::sync::Arc;

    fn hosts(n: usize) -> Vec<String> {
        (0..n).map(|i| format!("http://10.0.0.{}:80", i)).collect()
    }

    #[test]
    fn test_round_robin() {
        let lb = RoundRobin::new();
        let hosts = hosts(2);

        assert_eq!(lb.elect(&hosts).unwrap(), hosts[0]);
        assert_eq!(lb.elect(&hosts).unwrap(), hosts[1]);
        assert_eq!(lb.elect(&hosts).unwrap(), hosts[0]);
    }

    #[test]
    fn test_visits_every_host_before_repeating() {
        for n in 1..=7 {
            let lb = RoundRobin::new();
            let hosts = hosts(n);
            let mut seen = HashSet::new();
            for _ in 0..n {
                assert!(seen.insert(lb.elect(&hosts).unwrap().to_string()));
            }
            assert_eq!(seen.len(), n);
        }
    }

    #[test]
    fn test_empty_targets() {
        let lb = RoundRobin::new();
        assert_eq!(lb.elect(&[]), Err(LbError::EmptyTargets));
    }

    #[test]
    fn test_host_list_shrinks_between_calls() {
        let lb = RoundRobin::new();
        let many = hosts(5);
        for _ in 0..4 {
            lb.elect(&many).unwrap();
        }
        // cursor is 4, beyond a 2-element list: wraps to the first host
        let few = hosts(2);
        assert_eq!(lb.elect(&few).unwrap(), few[0]);
        assert_eq!(lb.elect(&few).unwrap(), few[1]);
    }

    #[test]
    fn test_concurrent_elections_stay_balanced() {
        let lb = Arc::new(RoundRobin::new());
        let hosts = Arc::new(hosts(4));

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let lb = lb.clone();
                let hosts = hosts.clone();
                std::thread::spawn(move || {
                    let mut counts = [0usize; 4];
                    for _ in 0..1000 {
                        let host = lb.elect(&hosts).unwrap();
                        let idx = hosts.iter().position(|h| h == host).unwrap();
                        counts[idx] += 1;
                    }
                    counts
                })
            })
            .collect();

        let mut totals = [0usize; 4];
        for handle in handles {
            for (i, c) in handle.join().unwrap().iter().enumerate() {
                totals[i] += c;
            }
        }
        assert_eq!(totals, [2000, 2000, 2000, 2000]);
    }
}
