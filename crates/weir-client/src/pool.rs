//! Idle-connection free list for one partition.
//!
//! The pool is a free list, not a bounded resource: dispatch concurrency is
//! enforced upstream by the partition pipeline's semaphore, so `get` never
//! blocks and the pool may transiently hold more connections than the
//! concurrency cap during reconfiguration without deadlocking anyone.

use parking_lot::Mutex;
use std::time::Duration;

use crate::connection::Connection;

/// Idle connections older than this are dropped on the next checkout, well
/// ahead of server-side idle closes that would leave a half-open socket.
const IDLE_TIMEOUT: Duration = Duration::from_secs(9 * 60);

pub struct ConnectionPool {
    idles: Mutex<Vec<Connection>>,
    brokers: Vec<String>,
    topic: String,
    partition: u32,
}

impl ConnectionPool {
    pub fn new(brokers: Vec<String>, topic: String, partition: u32) -> Self {
        Self {
            idles: Mutex::new(Vec::new()),
            brokers,
            topic,
            partition,
        }
    }

    /// Hand out an idle connection, evicting stale ones first. When none
    /// remain, a fresh not-yet-connected connection bound to this
    /// partition; `write_must` connects lazily on first use.
    pub fn get(&self) -> Connection {
        let mut idles = self.idles.lock();

        idles.retain_mut(|conn| {
            if conn.last_write().elapsed() > IDLE_TIMEOUT {
                conn.close();
                false
            } else {
                true
            }
        });

        idles.pop().unwrap_or_else(|| {
            Connection::new(self.brokers.clone(), self.topic.clone(), self.partition)
        })
    }

    /// Return a connection to the idle set. A connection that was never
    /// connected is accepted back too; it costs nothing until checked out
    /// again.
    pub fn put(&self, conn: Connection) {
        self.idles.lock().push(conn);
    }

    /// Number of idle connections currently held.
    pub fn idle_count(&self) -> usize {
        self.idles.lock().len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Instant;

    fn pool() -> ConnectionPool {
        ConnectionPool::new(vec!["127.0.0.1:9092".into()], "orders".into(), 0)
    }

    #[test]
    fn test_get_hands_out_fresh_connection_when_empty() {
        let pool = pool();
        let conn = pool.get();
        assert_eq!(pool.idle_count(), 0);
        pool.put(conn);
        assert_eq!(pool.idle_count(), 1);
    }

    #[test]
    fn test_returned_connection_is_reused() {
        let pool = pool();
        pool.put(pool.get());
        let _conn = pool.get();
        assert_eq!(pool.idle_count(), 0);
    }

    #[test]
    fn test_stale_idle_connection_is_evicted() {
        let pool = pool();

        // Monotonic clocks on a freshly booted machine may not reach back
        // ten minutes; skip rather than underflow.
        let Some(stale_at) = Instant::now().checked_sub(IDLE_TIMEOUT + Duration::from_secs(1))
        else {
            return;
        };

        let mut stale = pool.get();
        stale.set_last_write(stale_at);
        pool.put(stale);
        pool.put(pool.get());
        assert_eq!(pool.idle_count(), 2);

        // Checkout evicts the stale one and hands out the survivor.
        let _conn = pool.get();
        assert_eq!(pool.idle_count(), 0);
    }

    #[test]
    fn test_unconnected_connection_roundtrip_is_harmless() {
        let pool = pool();
        let conn = pool.get();
        pool.put(conn);
        let _again = pool.get();
    }
}
