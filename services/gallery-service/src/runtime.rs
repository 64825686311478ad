use ao_gallery::{FetchCompletion, GalleryController, PendingFetch};
use tokio::sync::{mpsc, oneshot};
use tracing::debug;

type Job = Box<dyn FnOnce(&mut GalleryController) -> Option<PendingFetch> + Send>;

enum Command {
    Run(Job),
    FetchCompleted(FetchCompletion),
}

#[derive(Debug)]
pub(crate) struct RuntimeClosed;

/// Handle to the task that owns the controller. Commands run one at a time
/// in the order they were sent; fetch completions re-enter through the same
/// queue.
#[derive(Clone)]
pub(crate) struct GalleryHandle {
    commands: mpsc::UnboundedSender<Command>,
}

impl GalleryHandle {
    /// `initial` is whatever `GalleryController::start` issued.
    pub(crate) fn spawn(controller: GalleryController, initial: Option<PendingFetch>) -> Self {
        let (commands, queue) = mpsc::unbounded_channel();
        let loopback = commands.downgrade();
        if let Some(pending) = initial {
            watch(pending, loopback.clone());
        }
        tokio::spawn(run(controller, queue, loopback));
        Self { commands }
    }

    pub(crate) async fn call<R, F>(&self, job: F) -> Result<R, RuntimeClosed>
    where
        R: Send + 'static,
        F: FnOnce(&mut GalleryController) -> (R, Option<PendingFetch>) + Send + 'static,
    {
        let (reply, response) = oneshot::channel();
        let job: Job = Box::new(move |controller| {
            let (result, pending) = job(controller);
            let _ = reply.send(result);
            pending
        });

        self.commands
            .send(Command::Run(job))
            .map_err(|_| RuntimeClosed)?;
        response.await.map_err(|_| RuntimeClosed)
    }
}

async fn run(
    mut controller: GalleryController,
    mut queue: mpsc::UnboundedReceiver<Command>,
    loopback: mpsc::WeakUnboundedSender<Command>,
) {
    while let Some(command) = queue.recv().await {
        let pending = match command {
            Command::Run(job) => job(&mut controller),
            Command::FetchCompleted(completion) => {
                controller.on_fetch_completed(completion);
                None
            }
        };
        if let Some(pending) = pending {
            watch(pending, loopback.clone());
        }
    }
    debug!("gallery runtime stopped");
}

fn watch(pending: PendingFetch, loopback: mpsc::WeakUnboundedSender<Command>) {
    tokio::spawn(async move {
        let completion = pending.resolve().await;
        match loopback.upgrade() {
            Some(commands) => {
                let _ = commands.send(Command::FetchCompleted(completion));
            }
            None => debug!(
                "runtime gone; dropping completion for {}",
                completion.key.owner.0
            ),
        }
    });
}
