use async_channel::{Receiver, Sender, TryRecvError, TrySendError};

pub const REQUEST_CAPACITY: usize = 16;
pub const NOTIFY_CAPACITY: usize = 64;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SeekConfirmation {
    pub offset: u64,
    /// Bytes covered by the detail window at that offset.
    pub byte_count: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SeekStatus {
    Queued,
    Dropped,
    Closed,
}

pub struct WindowLink {
    requests: Sender<u64>,
    notify: Receiver<SeekConfirmation>,
}

pub struct WorkerLink {
    requests: Receiver<u64>,
    notify: Sender<SeekConfirmation>,
}

pub fn window_link(request_capacity: usize, notify_capacity: usize) -> (WindowLink, WorkerLink) {
    let (request_tx, request_rx) = async_channel::bounded(request_capacity.max(1));
    let (notify_tx, notify_rx) = async_channel::bounded(notify_capacity.max(1));
    (
        WindowLink {
            requests: request_tx,
            notify: notify_rx,
        },
        WorkerLink {
            requests: request_rx,
            notify: notify_tx,
        },
    )
}

impl WindowLink {
    pub fn request_seek(&self, offset: u64) -> SeekStatus {
        match self.requests.try_send(offset) {
            Ok(()) => SeekStatus::Queued,
            Err(TrySendError::Full(_)) => SeekStatus::Dropped,
            Err(TrySendError::Closed(_)) => SeekStatus::Closed,
        }
    }

    /// Drains every queued confirmation and returns only the newest.
    pub fn poll_latest(&self) -> Option<SeekConfirmation> {
        let mut latest = None;
        loop {
            match self.notify.try_recv() {
                Ok(confirmation) => latest = Some(confirmation),
                Err(TryRecvError::Empty) | Err(TryRecvError::Closed) => break,
            }
        }
        latest
    }

    pub fn is_disconnected(&self) -> bool {
        self.notify.is_closed() && self.notify.is_empty()
    }

    pub fn close(&self) {
        self.requests.close();
    }
}

impl WorkerLink {
    /// Blocks until a request arrives, then skips any that queued up behind
    /// it. `None` once the coordinator has closed the link.
    pub fn next_request(&self) -> Option<u64> {
        let mut offset = self.requests.recv_blocking().ok()?;
        while let Ok(newer) = self.requests.try_recv() {
            offset = newer;
        }
        Some(offset)
    }

    pub fn confirm(&self, confirmation: SeekConfirmation) -> bool {
        self.notify.send_blocking(confirmation).is_ok()
    }
}

impl Drop for WindowLink {
    fn drop(&mut self) {
        self.requests.close();
        self.notify.close();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;

    fn confirmation(offset: u64) -> SeekConfirmation {
        SeekConfirmation {
            offset,
            byte_count: 256,
        }
    }

    #[test]
    fn test_coalesces_to_latest() {
        let (link, worker) = window_link(4, 8);
        for offset in [5, 9, 12] {
            assert!(worker.confirm(confirmation(offset)));
        }
        assert_eq!(link.poll_latest(), Some(confirmation(12)));
        assert_eq!(link.poll_latest(), None);
    }

    #[test]
    fn test_empty_poll_is_nothing_new() {
        let (link, _worker) = window_link(4, 8);
        assert_eq!(link.poll_latest(), None);
        assert!(!link.is_disconnected());
    }

    #[test]
    fn test_full_request_queue_drops() {
        let (link, worker) = window_link(2, 8);
        assert_eq!(link.request_seek(1), SeekStatus::Queued);
        assert_eq!(link.request_seek(2), SeekStatus::Queued);
        assert_eq!(link.request_seek(3), SeekStatus::Dropped);

        assert_eq!(worker.next_request(), Some(2));
    }

    #[test]
    fn test_worker_sees_close() {
        let (link, worker) = window_link(2, 2);
        let handle = thread::spawn(move || {
            let mut seen = Vec::new();
            while let Some(offset) = worker.next_request() {
                seen.push(offset);
            }
            seen
        });
        link.request_seek(7);
        drop(link);
        let seen = handle.join().unwrap();
        assert!(seen.len() <= 1);
    }

    #[test]
    fn test_confirm_fails_after_coordinator_drop() {
        let (link, worker) = window_link(2, 2);
        drop(link);
        assert!(!worker.confirm(confirmation(1)));
        assert_eq!(worker.next_request(), None);
    }

    #[test]
    fn test_disconnected_after_worker_drop() {
        let (link, worker) = window_link(2, 2);
        worker.confirm(confirmation(3));
        drop(worker);
        assert!(!link.is_disconnected());
        assert_eq!(link.poll_latest(), Some(confirmation(3)));
        assert!(link.is_disconnected());
        assert_eq!(link.request_seek(1), SeekStatus::Closed);
    }
}
