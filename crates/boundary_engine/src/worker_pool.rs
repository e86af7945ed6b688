//! Fixed-size pool of long-lived classification threads.
//!
//! Each worker owns a private single-threaded tokio runtime and runs one
//! lookup at a time. The pool itself lives on the owning thread: tasks are
//! admitted with [`WorkerPool::add_task`] and completions are handed back to
//! their callbacks by [`WorkerPool::poll`], which also gives the freed worker
//! its next queued task.

use std::collections::{HashMap, VecDeque};
use std::sync::{mpsc, Arc};
use std::thread;
use std::time::Duration;

use boundary_logging::{boundary_debug, boundary_error, boundary_warn};

use crate::classify::classify_guarded;
use crate::{ArchiveEndpoint, Classifier};

type Completion = Box<dyn FnOnce(String, bool)>;

struct WorkerRequest {
    archive: ArchiveEndpoint,
    href: String,
}

struct WorkerReply {
    worker: usize,
    href: String,
    present: bool,
}

struct WorkerThread {
    id: usize,
    requests: mpsc::Sender<WorkerRequest>,
}

struct WorkerTask {
    input: String,
    on_done: Completion,
}

/// Result slot for one task submitted with [`WorkerPool::process_single`].
pub struct TaskHandle {
    rx: mpsc::Receiver<(String, bool)>,
}

impl TaskHandle {
    /// The `(input, present)` pair, once the pool has delivered it.
    pub fn try_take(&self) -> Option<(String, bool)> {
        self.rx.try_recv().ok()
    }
}

pub struct WorkerPool {
    size: usize,
    classifier: Arc<dyn Classifier>,
    archive: ArchiveEndpoint,
    limit: Duration,
    idle: VecDeque<WorkerThread>,
    pending: VecDeque<WorkerTask>,
    running: HashMap<usize, (WorkerThread, WorkerTask)>,
    reply_tx: mpsc::Sender<WorkerReply>,
    reply_rx: mpsc::Receiver<WorkerReply>,
}

impl WorkerPool {
    pub fn new(
        size: usize,
        classifier: Arc<dyn Classifier>,
        archive: ArchiveEndpoint,
        limit: Duration,
    ) -> Self {
        let size = size.max(1);
        let (reply_tx, reply_rx) = mpsc::channel();
        let mut pool = Self {
            size,
            classifier,
            archive,
            limit,
            idle: VecDeque::with_capacity(size),
            pending: VecDeque::new(),
            running: HashMap::with_capacity(size),
            reply_tx,
            reply_rx,
        };
        for id in 0..size {
            let worker = pool.spawn_worker(id);
            pool.idle.push_back(worker);
        }
        boundary_debug!("Started worker pool with {} threads", size);
        pool
    }

    pub fn size(&self) -> usize {
        self.size
    }

    pub fn idle_count(&self) -> usize {
        self.idle.len()
    }

    pub fn busy_count(&self) -> usize {
        self.running.len()
    }

    pub fn pending_count(&self) -> usize {
        self.pending.len()
    }

    /// Queues one task and returns a handle its result will land in.
    pub fn process_single(&mut self, input: impl Into<String>) -> TaskHandle {
        let (tx, rx) = mpsc::channel();
        self.add_task(input.into(), move |input, present| {
            let _ = tx.send((input, present));
        });
        TaskHandle { rx }
    }

    /// Queues every input separately; one handle per input, in input order.
    pub fn process_input<I, S>(&mut self, inputs: I) -> Vec<TaskHandle>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        inputs
            .into_iter()
            .map(|input| self.process_single(input))
            .collect()
    }

    /// Runs the task on an idle worker, or queues it behind earlier tasks.
    pub fn add_task(&mut self, input: String, on_done: impl FnOnce(String, bool) + 'static) {
        let task = WorkerTask {
            input,
            on_done: Box::new(on_done),
        };
        match self.idle.pop_front() {
            Some(worker) => self.run(worker, task),
            None => self.pending.push_back(task),
        }
    }

    /// Delivers every finished task without blocking. Returns how many.
    pub fn poll(&mut self) -> usize {
        let mut delivered = 0;
        while let Ok(reply) = self.reply_rx.try_recv() {
            self.complete(reply);
            delivered += 1;
        }
        delivered
    }

    /// Like [`WorkerPool::poll`], but waits up to `timeout` for the first
    /// completion when none is ready.
    pub fn poll_timeout(&mut self, timeout: Duration) -> usize {
        match self.reply_rx.recv_timeout(timeout) {
            Ok(reply) => {
                self.complete(reply);
                1 + self.poll()
            }
            Err(_) => 0,
        }
    }

    fn complete(&mut self, reply: WorkerReply) {
        let Some((worker, task)) = self.running.remove(&reply.worker) else {
            boundary_warn!("Dropping reply from worker {} with no running task", reply.worker);
            return;
        };
        (task.on_done)(reply.href, reply.present);
        self.free_thread(worker);
    }

    fn free_thread(&mut self, worker: WorkerThread) {
        match self.pending.pop_front() {
            Some(task) => self.run(worker, task),
            None => self.idle.push_back(worker),
        }
    }

    fn run(&mut self, worker: WorkerThread, task: WorkerTask) {
        let request = WorkerRequest {
            archive: self.archive.clone(),
            href: task.input.clone(),
        };
        let worker = match worker.requests.send(request) {
            Ok(()) => worker,
            Err(mpsc::SendError(request)) => {
                boundary_warn!("Worker {} stopped; starting a replacement", worker.id);
                let replacement = self.spawn_worker(worker.id);
                let _ = replacement.requests.send(request);
                replacement
            }
        };
        self.running.insert(worker.id, (worker, task));
    }

    fn spawn_worker(&self, id: usize) -> WorkerThread {
        let (requests, request_rx) = mpsc::channel();
        let classifier = self.classifier.clone();
        let reply_tx = self.reply_tx.clone();
        let limit = self.limit;
        thread::spawn(move || worker_loop(id, classifier, limit, request_rx, reply_tx));
        WorkerThread { id, requests }
    }
}

fn worker_loop(
    id: usize,
    classifier: Arc<dyn Classifier>,
    limit: Duration,
    requests: mpsc::Receiver<WorkerRequest>,
    replies: mpsc::Sender<WorkerReply>,
) {
    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build();
    if let Err(err) = &runtime {
        boundary_error!("Worker {} has no runtime, answering absent: {}", id, err);
    }

    while let Ok(WorkerRequest { archive, href }) = requests.recv() {
        let present = match &runtime {
            Ok(runtime) => {
                runtime.block_on(classify_guarded(classifier.as_ref(), &archive, &href, limit))
            }
            Err(_) => false,
        };
        let reply = WorkerReply {
            worker: id,
            href,
            present,
        };
        if replies.send(reply).is_err() {
            break;
        }
    }
}
