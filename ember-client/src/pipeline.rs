//! Request pipeline
//!
//! The protocol is half-duplex from the consumer's view: responses carry no
//! request id, so at most one non-invocation request may be in flight and
//! inbound roots are matched against that single active request. Function
//! invocations are the exception: they carry an explicit invocation id and
//! may be outstanding among themselves.
//!
//! Every pending request owns its own completion channel; a late or stray
//! response can only ever reach the request whose matcher accepts it.

use ember_core::{EmberError, EmberResult};
use ember_glow::{Element, GlowRoot, InvocationResult, Path};
use std::collections::{HashMap, VecDeque};
use std::time::Duration;
use tokio::sync::oneshot;
use tokio::time::Instant;

/// What a completed request resolves with
#[derive(Debug)]
pub enum Response {
    /// Top-level children snapshot (root-level get-directory)
    Elements(Vec<Element>),
    /// Snapshot of the target element after the merge
    Element(Element),
    /// Nothing to report (flush-completed requests)
    Completed,
}

/// Predicate deciding whether an inbound root satisfies a request
#[derive(Debug, Clone, PartialEq)]
pub enum ResponseMatcher {
    /// Accept a root delivering children of `target` (or the matrix itself
    /// at its own path)
    GetDirectory { target: Path, matrix: bool },
    /// Accept a root echoing a value at the parameter's path
    SetValue { target: Path },
    /// Accept a root carrying the matrix at its own path
    MatrixOperation { target: Path },
    /// No response expected; completes once the frame is flushed
    FireAndForget,
}

impl ResponseMatcher {
    /// Test the matcher against a decoded root
    pub fn matches(&self, decoded: &GlowRoot) -> bool {
        match self {
            ResponseMatcher::GetDirectory { target, matrix } => {
                if *matrix {
                    decoded
                        .find(target)
                        .map(|el| el.as_matrix().is_some())
                        .unwrap_or(false)
                } else {
                    // A childless target answers with only itself
                    decoded.touches_child_of(target) || decoded.find(target).is_some()
                }
            }
            ResponseMatcher::SetValue { target } => decoded
                .find(target)
                .and_then(|el| el.as_parameter())
                .map(|contents| contents.value.is_some())
                .unwrap_or(false),
            ResponseMatcher::MatrixOperation { target } => decoded
                .find(target)
                .map(|el| el.as_matrix().is_some())
                .unwrap_or(false),
            ResponseMatcher::FireAndForget => false,
        }
    }
}

/// A queued request record
#[derive(Debug)]
pub struct PendingRequest {
    pub target: Path,
    pub payload: Vec<u8>,
    pub matcher: ResponseMatcher,
    pub reply: oneshot::Sender<EmberResult<Response>>,
}

struct ActiveRequest {
    request: PendingRequest,
    deadline: Instant,
}

struct PendingInvocation {
    reply: oneshot::Sender<EmberResult<InvocationResult>>,
    deadline: Instant,
}

struct QueuedInvocation {
    id: i64,
    payload: Vec<u8>,
    reply: oneshot::Sender<EmberResult<InvocationResult>>,
}

/// Observable pipeline state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PipelineState {
    /// Queue empty, nothing in flight
    Idle,
    /// One request in flight
    Active,
    /// Disconnecting; everything fails with `ConnectionClosed`
    Draining,
}

/// An item the session must write to the transport
pub enum SendItem {
    /// Frame this payload and send it
    Payload(Vec<u8>),
    /// Frame, send, flush, then resolve the reply
    PayloadThenResolve(Vec<u8>, oneshot::Sender<EmberResult<Response>>),
}

/// Waiters released by a deadline sweep
pub struct Expired {
    pub request: Option<PendingRequest>,
    pub invocations: Vec<oneshot::Sender<EmberResult<InvocationResult>>>,
}

/// Per-session request pipeline
pub struct Pipeline {
    queue: VecDeque<PendingRequest>,
    active: Option<ActiveRequest>,
    invocation_queue: VecDeque<QueuedInvocation>,
    invocations: HashMap<i64, PendingInvocation>,
    next_invocation_id: i64,
    timeout: Duration,
    draining: bool,
}

impl Pipeline {
    /// Create a pipeline with the given per-request deadline
    pub fn new(timeout: Duration) -> Self {
        Self {
            queue: VecDeque::new(),
            active: None,
            invocation_queue: VecDeque::new(),
            invocations: HashMap::new(),
            next_invocation_id: 1,
            timeout,
            draining: false,
        }
    }

    /// Current state
    pub fn state(&self) -> PipelineState {
        if self.draining {
            PipelineState::Draining
        } else if self.active.is_some() {
            PipelineState::Active
        } else {
            PipelineState::Idle
        }
    }

    /// Check whether a non-invocation request is in flight
    pub fn has_active(&self) -> bool {
        self.active.is_some()
    }

    /// Allocate the next invocation id (monotonically increasing)
    pub fn allocate_invocation_id(&mut self) -> i64 {
        let id = self.next_invocation_id;
        self.next_invocation_id += 1;
        id
    }

    /// Enqueue a non-invocation request
    pub fn push_request(&mut self, request: PendingRequest) {
        self.queue.push_back(request);
    }

    /// Enqueue an invocation
    pub fn push_invocation(
        &mut self,
        id: i64,
        payload: Vec<u8>,
        reply: oneshot::Sender<EmberResult<InvocationResult>>,
    ) {
        self.invocation_queue.push_back(QueuedInvocation { id, payload, reply });
    }

    /// Collect everything that may be sent right now
    ///
    /// Invocations go out whenever no non-invocation request is active;
    /// the next queued request is activated after them. Flush-completed
    /// requests never occupy the active slot.
    pub fn poll_send(&mut self, now: Instant) -> Vec<SendItem> {
        let mut items = Vec::new();
        if self.draining || self.active.is_some() {
            return items;
        }

        while let Some(invocation) = self.invocation_queue.pop_front() {
            self.invocations.insert(
                invocation.id,
                PendingInvocation {
                    reply: invocation.reply,
                    deadline: now + self.timeout,
                },
            );
            items.push(SendItem::Payload(invocation.payload));
        }

        while self.active.is_none() {
            let mut request = match self.queue.pop_front() {
                Some(request) => request,
                None => break,
            };
            let payload = std::mem::take(&mut request.payload);
            if request.matcher == ResponseMatcher::FireAndForget {
                items.push(SendItem::PayloadThenResolve(payload, request.reply));
            } else {
                items.push(SendItem::Payload(payload));
                self.active = Some(ActiveRequest {
                    request,
                    deadline: now + self.timeout,
                });
            }
        }
        items
    }

    /// Test the active request's matcher against a decoded root
    pub fn active_matches(&self, decoded: &GlowRoot) -> bool {
        self.active
            .as_ref()
            .map(|active| active.request.matcher.matches(decoded))
            .unwrap_or(false)
    }

    /// Take the active request for resolution
    pub fn complete_active(&mut self) -> Option<PendingRequest> {
        self.active.take().map(|active| active.request)
    }

    /// Take the waiter of a pending invocation by id
    pub fn take_invocation(
        &mut self,
        id: i64,
    ) -> Option<oneshot::Sender<EmberResult<InvocationResult>>> {
        self.invocations.remove(&id).map(|pending| pending.reply)
    }

    /// The earliest pending deadline, if any
    pub fn next_deadline(&self) -> Option<Instant> {
        let active = self.active.as_ref().map(|active| active.deadline);
        let invocation = self.invocations.values().map(|p| p.deadline).min();
        match (active, invocation) {
            (Some(a), Some(b)) => Some(a.min(b)),
            (Some(a), None) => Some(a),
            (None, Some(b)) => Some(b),
            (None, None) => None,
        }
    }

    /// Release every waiter whose deadline has passed
    pub fn expire(&mut self, now: Instant) -> Expired {
        let overdue = self
            .active
            .as_ref()
            .map(|active| active.deadline <= now)
            .unwrap_or(false);
        let request = if overdue { self.complete_active() } else { None };

        let expired_ids: Vec<i64> = self
            .invocations
            .iter()
            .filter(|(_, pending)| pending.deadline <= now)
            .map(|(&id, _)| id)
            .collect();
        let invocations = expired_ids
            .into_iter()
            .filter_map(|id| self.take_invocation(id))
            .collect();

        Expired {
            request,
            invocations,
        }
    }

    /// Enter the draining state and release every waiter
    ///
    /// The session fails each returned sender with the supplied error.
    pub fn drain(
        &mut self,
    ) -> (
        Vec<oneshot::Sender<EmberResult<Response>>>,
        Vec<oneshot::Sender<EmberResult<InvocationResult>>>,
    ) {
        self.draining = true;
        let mut requests = Vec::new();
        if let Some(active) = self.active.take() {
            requests.push(active.request.reply);
        }
        requests.extend(self.queue.drain(..).map(|request| request.reply));

        let mut invocations: Vec<_> = self
            .invocation_queue
            .drain(..)
            .map(|queued| queued.reply)
            .collect();
        invocations.extend(self.invocations.drain().map(|(_, pending)| pending.reply));

        (requests, invocations)
    }

    /// Fail every waiter with an error produced per waiter, without leaving
    /// the pipeline usable
    pub fn fail_all(&mut self, make_error: impl Fn() -> EmberError) {
        let (requests, invocations) = self.drain();
        for reply in requests {
            let _ = reply.send(Err(make_error()));
        }
        for reply in invocations {
            let _ = reply.send(Err(make_error()));
        }
    }
}
