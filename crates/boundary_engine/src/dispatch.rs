use std::sync::{mpsc, Arc};
use std::thread;
use std::time::Duration;

use boundary_logging::{boundary_debug, boundary_error};

use crate::classify::classify_guarded;
use crate::types::{ClassifyEvent, ResolutionId};
use crate::{ArchiveEndpoint, Classifier, EngineSettings, WorkerPool};

enum ClassifyCommand {
    Classify { resolution: ResolutionId, href: String },
}

/// Runs direct classification on a background tokio runtime.
///
/// Requests go in over a command channel; answers come back as
/// [`ClassifyEvent`]s on the sender handed to [`ClassifierHandle::new`].
pub(crate) struct ClassifierHandle {
    cmd_tx: mpsc::Sender<ClassifyCommand>,
}

impl ClassifierHandle {
    pub(crate) fn new(
        classifier: Arc<dyn Classifier>,
        archive: ArchiveEndpoint,
        limit: Duration,
        event_tx: mpsc::Sender<ClassifyEvent>,
    ) -> Self {
        let (cmd_tx, cmd_rx) = mpsc::channel();
        thread::spawn(move || run_dispatcher(classifier, archive, limit, cmd_rx, event_tx));
        Self { cmd_tx }
    }

    pub(crate) fn submit(&self, resolution: ResolutionId, href: String) {
        let _ = self
            .cmd_tx
            .send(ClassifyCommand::Classify { resolution, href });
    }
}

fn run_dispatcher(
    classifier: Arc<dyn Classifier>,
    archive: ArchiveEndpoint,
    limit: Duration,
    cmd_rx: mpsc::Receiver<ClassifyCommand>,
    event_tx: mpsc::Sender<ClassifyEvent>,
) {
    let runtime = match tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
    {
        Ok(runtime) => runtime,
        Err(err) => {
            boundary_error!("Failed to start classification runtime: {}", err);
            // Answer everything as absent so no boundary waits forever.
            while let Ok(ClassifyCommand::Classify { resolution, href }) = cmd_rx.recv() {
                let _ = event_tx.send(ClassifyEvent {
                    resolution,
                    href,
                    present: false,
                });
            }
            return;
        }
    };

    let archive = Arc::new(archive);
    while let Ok(command) = cmd_rx.recv() {
        match command {
            ClassifyCommand::Classify { resolution, href } => {
                let classifier = classifier.clone();
                let archive = archive.clone();
                let event_tx = event_tx.clone();
                runtime.spawn(async move {
                    let present =
                        classify_guarded(classifier.as_ref(), &archive, &href, limit).await;
                    let _ = event_tx.send(ClassifyEvent {
                        resolution,
                        href,
                        present,
                    });
                });
            }
        }
    }
    boundary_debug!("Classification dispatcher stopped");
}

/// Routes classification requests to the direct runtime or the worker pool.
pub(crate) struct Classification {
    classifier: Arc<dyn Classifier>,
    archive: ArchiveEndpoint,
    limit: Duration,
    pool_size: usize,
    direct: ClassifierHandle,
    pool: Option<WorkerPool>,
    event_tx: mpsc::Sender<ClassifyEvent>,
}

impl Classification {
    pub(crate) fn new(
        classifier: Arc<dyn Classifier>,
        settings: &EngineSettings,
        event_tx: mpsc::Sender<ClassifyEvent>,
    ) -> Self {
        let direct = ClassifierHandle::new(
            classifier.clone(),
            settings.archive.clone(),
            settings.classify_timeout,
            event_tx.clone(),
        );
        Self {
            classifier,
            archive: settings.archive.clone(),
            limit: settings.classify_timeout,
            pool_size: settings.worker_pool_size,
            direct,
            pool: None,
            event_tx,
        }
    }

    pub(crate) fn submit(&mut self, resolution: ResolutionId, href: String, use_worker: bool) {
        if !use_worker {
            self.direct.submit(resolution, href);
            return;
        }
        let event_tx = self.event_tx.clone();
        self.pool().add_task(href, move |href, present| {
            let _ = event_tx.send(ClassifyEvent {
                resolution,
                href,
                present,
            });
        });
    }

    /// Hands finished worker results to their callbacks.
    pub(crate) fn poll_pool(&mut self) -> usize {
        self.pool.as_mut().map_or(0, WorkerPool::poll)
    }

    /// The worker pool, started on first use.
    pub(crate) fn pool(&mut self) -> &mut WorkerPool {
        self.pool.get_or_insert_with(|| {
            WorkerPool::new(
                self.pool_size,
                self.classifier.clone(),
                self.archive.clone(),
                self.limit,
            )
        })
    }

    pub(crate) fn pool_started(&self) -> bool {
        self.pool.is_some()
    }
}
