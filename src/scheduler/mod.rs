mod renderer;
mod worker;

use std::collections::{HashMap, VecDeque};
use std::path::PathBuf;
use std::time::Duration;

use tokio::sync::{mpsc, oneshot};
use tracing::{debug, warn};

use crate::error::{ReplyStatus, SchedulerError};
use crate::types::{DedupKey, Order, OrderId, OrderStatus, Params, Pincode};
use worker::{Slot, WorkerPool};

/// How long the admission loop sleeps between drain/admit/reap cycles, to
/// cap busy-looping.
const ADMISSION_POLL_INTERVAL: Duration = Duration::from_millis(100);

/// Tagged messages the Scheduler consumes from its request channel.
enum Request {
    Submit {
        params: Params,
        reply: oneshot::Sender<(OrderId, Pincode, bool)>,
    },
    Check {
        id: OrderId,
        pincode: String,
        reply: oneshot::Sender<ReplyStatus>,
    },
    Evict {
        ids: Vec<OrderId>,
        reply: oneshot::Sender<bool>,
    },
}

/// A cheaply-cloneable handle to a running Scheduler task. Front-end request
/// handlers hold one of these and talk to the Scheduler exclusively through
/// it: an `mpsc` request channel paired with a `oneshot` reply channel per
/// request, standing in for a single bidirectional request/reply channel
/// without needing a second OS process on the other end.
#[derive(Clone)]
pub struct SchedulerHandle {
    tx: mpsc::Sender<Request>,
}

impl SchedulerHandle {
    /// SUBMIT(params). Returns `((id, pincode), ok)`: an invalid submission
    /// yields `ok=false` with a zero id/pincode rather than an error.
    pub async fn submit(
        &self,
        params: Params,
        timeout: Duration,
    ) -> Result<((OrderId, Pincode), bool), SchedulerError> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.tx
            .send(Request::Submit {
                params,
                reply: reply_tx,
            })
            .await
            .map_err(|_| SchedulerError::Disconnected)?;

        match tokio::time::timeout(timeout, reply_rx).await {
            Ok(Ok((id, pincode, ok))) => Ok(((id, pincode), ok)),
            Ok(Err(_)) => Err(SchedulerError::Disconnected),
            Err(_) => Err(SchedulerError::Timeout),
        }
    }

    /// CHECK(id, pincode).
    pub async fn check(
        &self,
        id: OrderId,
        pincode: String,
        timeout: Duration,
    ) -> Result<ReplyStatus, SchedulerError> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.tx
            .send(Request::Check {
                id,
                pincode,
                reply: reply_tx,
            })
            .await
            .map_err(|_| SchedulerError::Disconnected)?;

        match tokio::time::timeout(timeout, reply_rx).await {
            Ok(Ok(status)) => Ok(status),
            Ok(Err(_)) => Err(SchedulerError::Disconnected),
            Err(_) => Err(SchedulerError::Timeout),
        }
    }

    /// EVICT(ids).
    pub async fn evict(
        &self,
        ids: Vec<OrderId>,
        timeout: Duration,
    ) -> Result<bool, SchedulerError> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.tx
            .send(Request::Evict { ids, reply: reply_tx })
            .await
            .map_err(|_| SchedulerError::Disconnected)?;

        match tokio::time::timeout(timeout, reply_rx).await {
            Ok(Ok(ack)) => Ok(ack),
            Ok(Err(_)) => Err(SchedulerError::Disconnected),
            Err(_) => Err(SchedulerError::Timeout),
        }
    }
}

/// Owns OrderTable, DedupIndex, Queue, WorkerPool and the monotonic counter.
/// Runs single-threaded: all state mutation happens from inside `run`, so
/// there are no mutation races to guard against.
pub struct Scheduler {
    orders: HashMap<OrderId, Order>,
    dedup: HashMap<DedupKey, OrderId>,
    queue: VecDeque<OrderId>,
    workers: WorkerPool,
    counter: u64,
    renderer_path: PathBuf,
    base_url: String,
    shared_memory_id: String,
}

impl Scheduler {
    /// Spawns the Scheduler as a background Tokio task and returns a handle
    /// to it. `slots` is the worker pool capacity (`SLOTS_NUMBER`).
    pub fn spawn(
        slots: usize,
        renderer_path: PathBuf,
        base_url: String,
        shared_memory_id: String,
    ) -> SchedulerHandle {
        let (tx, rx) = mpsc::channel(1024);

        let scheduler = Scheduler {
            orders: HashMap::new(),
            dedup: HashMap::new(),
            queue: VecDeque::new(),
            workers: WorkerPool::new(slots),
            counter: 0,
            renderer_path,
            base_url,
            shared_memory_id,
        };

        tokio::spawn(scheduler.run(rx));

        SchedulerHandle { tx }
    }

    async fn run(mut self, mut rx: mpsc::Receiver<Request>) {
        loop {
            // Fully drain pending inbound messages before admission/reaping,
            // so the front-end is never starved while renderers run.
            loop {
                match rx.try_recv() {
                    Ok(request) => self.handle_request(request),
                    Err(mpsc::error::TryRecvError::Empty) => break,
                    Err(mpsc::error::TryRecvError::Disconnected) => {
                        debug!("scheduler channel closed, shutting down");
                        return;
                    },
                }
            }

            self.admit_one();
            self.reap_finished();

            tokio::time::sleep(ADMISSION_POLL_INTERVAL).await;
        }
    }

    fn handle_request(&mut self, request: Request) {
        match request {
            Request::Submit { params, reply } => {
                let result = self.submit(params);
                let _ = reply.send(result);
            },
            Request::Check { id, pincode, reply } => {
                let status = self.check(id, &pincode);
                let _ = reply.send(status);
            },
            Request::Evict { ids, reply } => {
                self.evict(&ids);
                let _ = reply.send(true);
            },
        }
    }

    fn submit(&mut self, params: Params) -> (OrderId, Pincode, bool) {
        if !params.is_valid() {
            debug!("rejected submission: invalid params");
            return (OrderId(0), Pincode::default(), false);
        }

        let key = params.dedup_key();
        if let Some(&id) = self.dedup.get(&key) {
            let pincode = self.orders[&id].pincode.clone();
            debug!(%id, "deduplicated submission, reusing existing order");
            return (id, pincode, true);
        }

        self.counter += 1;
        let id = OrderId(self.counter);
        let pincode = Pincode::generate();

        self.orders.insert(
            id,
            Order {
                id,
                params,
                status: OrderStatus::Processing,
                pincode: pincode.clone(),
            },
        );
        self.dedup.insert(key, id);
        self.queue.push_back(id);

        debug!(%id, "admitted new order");
        (id, pincode, true)
    }

    fn check(&self, id: OrderId, pincode: &str) -> ReplyStatus {
        match self.orders.get(&id) {
            None => ReplyStatus::InvalidParam,
            Some(order) => {
                if order.pincode != *pincode {
                    warn!(%id, "pincode mismatch on check");
                    ReplyStatus::InvalidParam
                } else {
                    order.status.into()
                }
            },
        }
    }

    fn evict(&mut self, ids: &[OrderId]) {
        for &id in ids {
            debug_assert!(
                !self.workers.contains(id),
                "evicted order {id:?} is still occupying a worker slot"
            );
            if let Some(order) = self.orders.remove(&id) {
                self.dedup.remove(&order.params.dedup_key());
            }
            self.queue.retain(|&queued| queued != id);
            debug!(%id, "evicted order from scheduler state");
        }
    }

    fn admit_one(&mut self) {
        if !self.workers.has_free_slot() {
            return;
        }
        let Some(id) = self.queue.pop_front() else {
            return;
        };

        let params = self.orders[&id].params.clone();
        let args = renderer::build_args(&self.base_url, id, &params, &self.shared_memory_id);

        match renderer::spawn(&self.renderer_path, &args) {
            Ok(child) => {
                debug!(%id, "spawned renderer");
                self.workers.fill_slot(Slot { id, child });
            },
            Err(error) => {
                warn!(%id, %error, "failed to spawn renderer, marking render failed");
                if let Some(order) = self.orders.get_mut(&id) {
                    order.status = OrderStatus::RenderFailed;
                }
            },
        }
    }

    fn reap_finished(&mut self) {
        let finished: Vec<(usize, OrderId, Option<i32>)> = self
            .workers
            .occupied_indices()
            .filter_map(|idx| {
                let slot = self.workers.slot_mut(idx).unwrap();
                match slot.child.try_wait() {
                    Ok(Some(exit_status)) => Some((idx, slot.id, exit_status.code())),
                    Ok(None) => None,
                    Err(error) => {
                        warn!(id = %slot.id, %error, "error polling renderer child");
                        Some((idx, slot.id, None))
                    },
                }
            })
            .collect();

        for (idx, id, code) in finished {
            let status = match code {
                Some(code) => OrderStatus::from_exit_code(code),
                None => OrderStatus::RenderFailed,
            };
            debug!(%id, ?code, ?status, "renderer finished");
            if let Some(order) = self.orders.get_mut(&id) {
                order.status = status;
            }
            self.workers.free_slot(idx);
        }
    }
}
