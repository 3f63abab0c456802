//! Single-threaded cooperative event loop
//!
//! Page code, request clients and completion callbacks all run on the thread
//! that owns the loop. Background work (real network I/O) never touches page
//! state: it posts a [`RemoteCompletion`] through a [`LoopHandle`], and the loop
//! hands the result to the callback parked for that ticket.

use crate::utils::TransportError;
use log::{debug, warn};
use std::cell::RefCell;
use std::collections::{HashMap, VecDeque};
use std::rc::Rc;
use std::sync::mpsc::{self, Receiver, RecvTimeoutError, Sender};
use std::time::{Duration, Instant};

/// A unit of work queued on the loop
pub type Task = Box<dyn FnOnce()>;

/// Callback parked until a background completion arrives
pub type ParkedCallback = Box<dyn FnOnce(String, Option<TransportError>)>;

/// Identifies a parked callback
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Ticket(u64);

/// Result of background work, sent back to the loop thread
#[derive(Debug)]
pub struct RemoteCompletion {
    ticket: Ticket,
    data: String,
    error: Option<TransportError>,
}

struct LoopState {
    tasks: VecDeque<Task>,
    parked: HashMap<Ticket, ParkedCallback>,
    inbox: Receiver<RemoteCompletion>,
    next_ticket: u64,
}

/// Thread-safe handle for posting completions from worker threads
#[derive(Debug, Clone)]
pub struct LoopHandle {
    sender: Sender<RemoteCompletion>,
}

impl LoopHandle {
    /// Deliver the outcome for `ticket`; silently dropped if the loop is gone
    pub fn complete(&self, ticket: Ticket, data: String, error: Option<TransportError>) {
        if self
            .sender
            .send(RemoteCompletion { ticket, data, error })
            .is_err()
        {
            debug!("event loop gone, dropping completion {:?}", ticket);
        }
    }
}

/// The page's task queue
#[derive(Clone)]
pub struct EventLoop {
    state: Rc<RefCell<LoopState>>,
    sender: Sender<RemoteCompletion>,
}

impl EventLoop {
    /// Create an empty loop
    pub fn new() -> Self {
        let (sender, inbox) = mpsc::channel();
        Self {
            state: Rc::new(RefCell::new(LoopState {
                tasks: VecDeque::new(),
                parked: HashMap::new(),
                inbox,
                next_ticket: 1,
            })),
            sender,
        }
    }

    /// Handle for worker threads
    pub fn handle(&self) -> LoopHandle {
        LoopHandle {
            sender: self.sender.clone(),
        }
    }

    /// Queue a task to run after everything already queued
    pub fn post(&self, task: impl FnOnce() + 'static) {
        self.state.borrow_mut().tasks.push_back(Box::new(task));
    }

    /// Park `callback` until a completion for the returned ticket arrives
    pub fn park(&self, callback: ParkedCallback) -> Ticket {
        let mut state = self.state.borrow_mut();
        let ticket = Ticket(state.next_ticket);
        state.next_ticket += 1;
        state.parked.insert(ticket, callback);
        ticket
    }

    /// Number of callbacks still waiting on background work
    pub fn parked_count(&self) -> usize {
        self.state.borrow().parked.len()
    }

    /// Whether neither tasks nor parked callbacks remain
    pub fn is_idle(&self) -> bool {
        let state = self.state.borrow();
        state.tasks.is_empty() && state.parked.is_empty()
    }

    /// Run queued tasks and already-delivered completions until none are left.
    ///
    /// Returns the number of tasks run. Never blocks.
    pub fn run_until_idle(&self) -> usize {
        let mut ran = 0;
        loop {
            self.drain_inbox();
            let next = self.state.borrow_mut().tasks.pop_front();
            match next {
                Some(task) => {
                    task();
                    ran += 1;
                }
                None => return ran,
            }
        }
    }

    /// Run until idle, blocking for background completions for at most `timeout`
    /// of silence. Returns false if callbacks were still parked on timeout.
    pub fn run(&self, timeout: Duration) -> bool {
        let mut deadline = Instant::now() + timeout;
        loop {
            if self.run_until_idle() > 0 {
                deadline = Instant::now() + timeout;
            }
            if self.is_idle() {
                return true;
            }
            let remaining = deadline.saturating_duration_since(Instant::now());
            let received = self.state.borrow().inbox.recv_timeout(remaining);
            match received {
                Ok(completion) => {
                    self.accept(completion);
                    deadline = Instant::now() + timeout;
                }
                Err(RecvTimeoutError::Timeout) => {
                    warn!(
                        "event loop timed out with {} native call(s) outstanding",
                        self.parked_count()
                    );
                    return false;
                }
                Err(RecvTimeoutError::Disconnected) => return self.is_idle(),
            }
        }
    }

    /// Make one step of progress.
    ///
    /// Runs whatever is queued; when nothing is, waits up to `timeout` for a
    /// single background completion and runs it. Returns false when nothing
    /// ran, either because nothing is parked or because the wait timed out.
    pub fn turn(&self, timeout: Duration) -> bool {
        if self.run_until_idle() > 0 {
            return true;
        }
        if self.parked_count() == 0 {
            return false;
        }
        let received = self.state.borrow().inbox.recv_timeout(timeout);
        match received {
            Ok(completion) => {
                self.accept(completion);
                self.run_until_idle() > 0
            }
            Err(RecvTimeoutError::Timeout) => {
                warn!(
                    "no completion within {:?}, {} native call(s) outstanding",
                    timeout,
                    self.parked_count()
                );
                false
            }
            Err(RecvTimeoutError::Disconnected) => false,
        }
    }

    fn drain_inbox(&self) {
        loop {
            let received = self.state.borrow().inbox.try_recv();
            match received {
                Ok(completion) => self.accept(completion),
                Err(_) => return,
            }
        }
    }

    fn accept(&self, completion: RemoteCompletion) {
        let callback = self.state.borrow_mut().parked.remove(&completion.ticket);
        match callback {
            Some(callback) => {
                let RemoteCompletion { data, error, .. } = completion;
                self.post(move || callback(data, error));
            }
            None => warn!("completion for unknown ticket {:?}", completion.ticket),
        }
    }
}

impl Default for EventLoop {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;
    use std::thread;

    #[test]
    fn test_tasks_run_in_order() {
        let event_loop = EventLoop::new();
        let log = Rc::new(RefCell::new(Vec::new()));
        for i in 0..3 {
            let log = log.clone();
            event_loop.post(move || log.borrow_mut().push(i));
        }
        assert_eq!(event_loop.run_until_idle(), 3);
        assert_eq!(*log.borrow(), vec![0, 1, 2]);
    }

    #[test]
    fn test_tasks_posted_while_running_also_run() {
        let event_loop = EventLoop::new();
        let hits = Rc::new(Cell::new(0));
        let inner_loop = event_loop.clone();
        let inner_hits = hits.clone();
        event_loop.post(move || {
            inner_hits.set(inner_hits.get() + 1);
            let again = inner_hits.clone();
            inner_loop.post(move || again.set(again.get() + 1));
        });
        event_loop.run_until_idle();
        assert_eq!(hits.get(), 2);
    }

    #[test]
    fn test_remote_completion_runs_parked_callback() {
        let event_loop = EventLoop::new();
        let got = Rc::new(RefCell::new(None));
        let sink = got.clone();
        let ticket = event_loop.park(Box::new(move |data, error| {
            *sink.borrow_mut() = Some((data, error));
        }));

        let handle = event_loop.handle();
        thread::spawn(move || handle.complete(ticket, "body".to_string(), None))
            .join()
            .unwrap();

        assert!(event_loop.run(Duration::from_secs(1)));
        assert_eq!(*got.borrow(), Some(("body".to_string(), None)));
        assert_eq!(event_loop.parked_count(), 0);
    }

    #[test]
    fn test_run_times_out_with_parked_callbacks() {
        let event_loop = EventLoop::new();
        event_loop.park(Box::new(|_, _| {}));
        assert!(!event_loop.run(Duration::from_millis(20)));
        assert_eq!(event_loop.parked_count(), 1);
    }

    #[test]
    fn test_turn_waits_for_one_completion() {
        let event_loop = EventLoop::new();
        let got = Rc::new(Cell::new(false));
        let sink = got.clone();
        let ticket = event_loop.park(Box::new(move |_, _| sink.set(true)));

        assert!(!EventLoop::new().turn(Duration::from_millis(5)));

        let handle = event_loop.handle();
        let worker = thread::spawn(move || {
            thread::sleep(Duration::from_millis(10));
            handle.complete(ticket, String::new(), None);
        });
        assert!(event_loop.turn(Duration::from_secs(1)));
        worker.join().unwrap();
        assert!(got.get());
        assert!(!event_loop.turn(Duration::from_millis(5)));
    }
}
