//! Per-session task
//!
//! One spawned task owns everything with protocol state: the transport,
//! the deframer and reassembler, the tree mirror and the request pipeline.
//! The facade talks to it through a command mailbox, so all inbound
//! framing and outbound requests are serialized on this single task.
//!
//! Ordering guarantees kept here: outbound frames go out in enqueue order;
//! inbound frames are processed in receive order; a decoded root is merged
//! into the tree strictly before its waiter is signalled; between request
//! completions only keep-alives touch the transport.

use crate::events::ConsumerEvent;
use crate::pipeline::{PendingRequest, Pipeline, Response, ResponseMatcher, SendItem};
use ember_core::{ConsumerConfig, EmberError, EmberResult, Value};
use ember_glow::{
    decode, request, ConnectionOperation, Element, ElementCategory, GlowRoot, InvocationResult,
    MatrixConnection, Path, Root,
};
use ember_session::{FrameCommand, FrameDeframer, MessageAssembler, S101Frame};
use ember_transport::ByteStream;
use tokio::sync::{broadcast, mpsc, oneshot};
use tokio::time::{interval_at, Instant, MissedTickBehavior};

/// Commands the facade sends to the session task
pub enum SessionCommand {
    GetDirectory {
        path: Path,
        reply: oneshot::Sender<EmberResult<Response>>,
    },
    SetValue {
        path: Path,
        value: Value,
        reply: oneshot::Sender<EmberResult<Response>>,
    },
    MatrixOperation {
        path: Path,
        target: u32,
        sources: Vec<u32>,
        operation: ConnectionOperation,
        reply: oneshot::Sender<EmberResult<Response>>,
    },
    Invoke {
        path: Path,
        arguments: Vec<Value>,
        reply: oneshot::Sender<EmberResult<InvocationResult>>,
    },
    Subscribe {
        path: Path,
        reply: oneshot::Sender<EmberResult<Response>>,
    },
    Unsubscribe {
        path: Path,
        reply: oneshot::Sender<EmberResult<Response>>,
    },
    GetElement {
        path: Path,
        reply: oneshot::Sender<Option<Element>>,
    },
    GetChildren {
        path: Path,
        reply: oneshot::Sender<Option<Vec<Element>>>,
    },
    Snapshot {
        reply: oneshot::Sender<Root>,
    },
    Disconnect {
        reply: oneshot::Sender<()>,
    },
}

enum Tick {
    Command(Option<SessionCommand>),
    Read(EmberResult<usize>),
    KeepAlive,
    Deadline,
}

/// Run a consumer session until disconnect or failure
pub async fn run<S: ByteStream>(
    mut transport: S,
    config: ConsumerConfig,
    events: broadcast::Sender<ConsumerEvent>,
    mut commands: mpsc::Receiver<SessionCommand>,
) {
    let mut deframer = FrameDeframer::new();
    let mut assembler = MessageAssembler::new();
    let mut tree = Root::new();
    let mut pipeline = Pipeline::new(config.request_timeout);
    let mut read_buf = vec![0u8; 8192];
    let mut frames_sent: u64 = 0;
    let mut last_rx = Instant::now();
    let mut keepalive = interval_at(
        Instant::now() + config.keepalive_interval,
        config.keepalive_interval,
    );
    keepalive.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        let deadline = pipeline.next_deadline();
        let tick = tokio::select! {
            command = commands.recv() => Tick::Command(command),
            result = transport.read(&mut read_buf) => Tick::Read(result),
            _ = keepalive.tick() => Tick::KeepAlive,
            _ = wait_deadline(deadline) => Tick::Deadline,
        };

        match tick {
            // Facade dropped or asked for disconnect: fail waiters, close
            Tick::Command(None) => {
                close_session(&mut transport, &mut pipeline, &events, frames_sent, &deframer).await;
                return;
            }
            Tick::Command(Some(SessionCommand::Disconnect { reply })) => {
                close_session(&mut transport, &mut pipeline, &events, frames_sent, &deframer).await;
                let _ = reply.send(());
                return;
            }
            Tick::Command(Some(command)) => {
                handle_command(command, &tree, &mut pipeline);
            }
            Tick::Read(Ok(0)) => {
                log::info!("Provider closed the connection");
                pipeline.fail_all(|| EmberError::ConnectionClosed);
                let _ = events.send(ConsumerEvent::Disconnected);
                return;
            }
            Tick::Read(Err(e)) => {
                session_failure(&mut pipeline, &events, &e.to_string());
                return;
            }
            Tick::Read(Ok(n)) => {
                last_rx = Instant::now();
                for frame in deframer.feed(&read_buf[..n]) {
                    match frame.command {
                        FrameCommand::KeepAliveRequest => {
                            if let Err(e) =
                                send_frame(&mut transport, &S101Frame::keepalive_response()).await
                            {
                                session_failure(&mut pipeline, &events, &e.to_string());
                                return;
                            }
                            frames_sent += 1;
                        }
                        FrameCommand::KeepAliveResponse => {}
                        FrameCommand::Ember => {
                            if let Some(payload) = assembler.push(&frame) {
                                process_message(&payload, &mut tree, &mut pipeline, &events);
                            }
                        }
                    }
                }
            }
            Tick::KeepAlive => {
                if last_rx.elapsed() >= config.keepalive_timeout {
                    session_failure(
                        &mut pipeline,
                        &events,
                        "Keep-alive timeout: peer is silent",
                    );
                    let _ = transport.close().await;
                    return;
                }
                if let Err(e) = send_frame(&mut transport, &S101Frame::keepalive_request()).await {
                    session_failure(&mut pipeline, &events, &e.to_string());
                    return;
                }
                frames_sent += 1;
            }
            Tick::Deadline => {
                let expired = pipeline.expire(Instant::now());
                if let Some(request) = expired.request {
                    log::warn!("Request for path {} timed out", request.target);
                    let _ = request.reply.send(Err(EmberError::Timeout));
                }
                for reply in expired.invocations {
                    let _ = reply.send(Err(EmberError::Timeout));
                }
            }
        }

        // A completed, failed or new request may have freed the send slot
        match flush_pipeline(&mut transport, &mut pipeline).await {
            Ok(sent) => frames_sent += sent,
            Err(e) => {
                session_failure(&mut pipeline, &events, &e.to_string());
                let _ = transport.close().await;
                return;
            }
        }
    }
}

async fn wait_deadline(deadline: Option<Instant>) {
    match deadline {
        Some(when) => tokio::time::sleep_until(when).await,
        None => std::future::pending().await,
    }
}

async fn send_frame<S: ByteStream>(transport: &mut S, frame: &S101Frame) -> EmberResult<()> {
    transport.write_all(&frame.encode()).await?;
    transport.flush().await
}

async fn flush_pipeline<S: ByteStream>(
    transport: &mut S,
    pipeline: &mut Pipeline,
) -> EmberResult<u64> {
    let mut sent = 0;
    for item in pipeline.poll_send(Instant::now()) {
        match item {
            SendItem::Payload(payload) => {
                send_frame(transport, &S101Frame::single(payload)).await?;
            }
            SendItem::PayloadThenResolve(payload, reply) => {
                send_frame(transport, &S101Frame::single(payload)).await?;
                let _ = reply.send(Ok(Response::Completed));
            }
        }
        sent += 1;
    }
    Ok(sent)
}

async fn close_session<S: ByteStream>(
    transport: &mut S,
    pipeline: &mut Pipeline,
    events: &broadcast::Sender<ConsumerEvent>,
    frames_sent: u64,
    deframer: &FrameDeframer,
) {
    pipeline.fail_all(|| EmberError::ConnectionClosed);
    let _ = transport.close().await;
    log::debug!(
        "Session closed: {} frames sent, {} received",
        frames_sent,
        deframer.statistics().frames_received
    );
    let _ = events.send(ConsumerEvent::Disconnected);
}

fn session_failure(
    pipeline: &mut Pipeline,
    events: &broadcast::Sender<ConsumerEvent>,
    message: &str,
) {
    log::error!("Session failure: {}", message);
    let _ = events.send(ConsumerEvent::Error(message.to_string()));
    let owned = message.to_string();
    pipeline.fail_all(move || {
        EmberError::Transport(std::io::Error::new(
            std::io::ErrorKind::Other,
            owned.clone(),
        ))
    });
    let _ = events.send(ConsumerEvent::Disconnected);
}

/// Decode, merge, then dispatch one inbound message
fn process_message(
    payload: &[u8],
    tree: &mut Root,
    pipeline: &mut Pipeline,
    events: &broadcast::Sender<ConsumerEvent>,
) {
    let decoded = match decode::decode_root(payload) {
        Ok(decoded) => decoded,
        Err(e) => {
            if let Some(request) = pipeline.complete_active() {
                let _ = request.reply.send(Err(e));
            } else {
                log::warn!("Dropping undecodable message: {}", e);
            }
            return;
        }
    };

    // Merge strictly before any waiter is signalled
    let changes = tree.apply(&decoded);
    for change in changes {
        let _ = events.send(ConsumerEvent::ValueChange {
            path: change.path,
            value: change.value,
        });
    }

    if let GlowRoot::InvocationResult(result) = &decoded {
        let _ = events.send(ConsumerEvent::InvocationResult {
            invocation_id: result.invocation_id,
            success: result.success,
            result: result.result.clone(),
        });
        match pipeline.take_invocation(result.invocation_id) {
            Some(reply) => {
                let _ = reply.send(Ok(result.clone()));
            }
            None => log::debug!(
                "Invocation result {} has no pending waiter",
                result.invocation_id
            ),
        }
        return;
    }

    if pipeline.active_matches(&decoded) {
        if let Some(request) = pipeline.complete_active() {
            let response = resolve_response(tree, &request);
            let _ = request.reply.send(response);
        }
    } else {
        log::debug!("Merged unsolicited update");
    }
}

/// Build the response snapshot for a completed request
fn resolve_response(tree: &Root, request: &PendingRequest) -> EmberResult<Response> {
    match &request.matcher {
        ResponseMatcher::GetDirectory { target, .. } => {
            if target.is_root() {
                Ok(Response::Elements(tree.children().to_vec()))
            } else {
                snapshot(tree, target)
            }
        }
        ResponseMatcher::SetValue { target } | ResponseMatcher::MatrixOperation { target } => {
            snapshot(tree, target)
        }
        ResponseMatcher::FireAndForget => Ok(Response::Completed),
    }
}

fn snapshot(tree: &Root, target: &Path) -> EmberResult<Response> {
    tree.get_by_path(target)
        .cloned()
        .map(Response::Element)
        .ok_or_else(|| EmberError::PathNotFound(format!("Element vanished at {}", target)))
}

/// Validate and enqueue one facade command
///
/// Caller misuse is rejected here, synchronously, without touching the
/// pipeline.
fn handle_command(command: SessionCommand, tree: &Root, pipeline: &mut Pipeline) {
    match command {
        SessionCommand::GetDirectory { path, reply } => {
            let category = if path.is_root() {
                ElementCategory::Node
            } else {
                tree.get_by_path(&path)
                    .map(|el| el.category())
                    .unwrap_or(ElementCategory::Node)
            };
            match request::get_directory_request(&path, category) {
                Ok(payload) => pipeline.push_request(PendingRequest {
                    matcher: ResponseMatcher::GetDirectory {
                        target: path.clone(),
                        matrix: category == ElementCategory::Matrix,
                    },
                    target: path,
                    payload,
                    reply,
                }),
                Err(e) => {
                    let _ = reply.send(Err(e));
                }
            }
        }
        SessionCommand::SetValue { path, value, reply } => {
            let contents = match tree.get_by_path(&path) {
                None => {
                    let _ = reply.send(Err(EmberError::InvalidRequest(format!(
                        "Unknown parameter path: {}",
                        path
                    ))));
                    return;
                }
                Some(el) => match el.as_parameter() {
                    None => {
                        let _ = reply.send(Err(EmberError::InvalidRequest(format!(
                            "Element at {} is not a parameter",
                            path
                        ))));
                        return;
                    }
                    Some(contents) => contents,
                },
            };
            if let Some(access) = contents.access {
                if !access.is_writable() {
                    let _ = reply.send(Err(EmberError::AccessDenied(format!(
                        "Parameter {} is not writable",
                        path
                    ))));
                    return;
                }
            }
            match request::set_value_request(&path, &value) {
                Ok(payload) => pipeline.push_request(PendingRequest {
                    matcher: ResponseMatcher::SetValue {
                        target: path.clone(),
                    },
                    target: path,
                    payload,
                    reply,
                }),
                Err(e) => {
                    let _ = reply.send(Err(e));
                }
            }
        }
        SessionCommand::MatrixOperation {
            path,
            target,
            sources,
            operation,
            reply,
        } => {
            let contents = match tree.get_by_path(&path).and_then(|el| el.as_matrix()) {
                Some(contents) => contents,
                None => {
                    let _ = reply.send(Err(EmberError::InvalidRequest(format!(
                        "No matrix at path {}",
                        path
                    ))));
                    return;
                }
            };
            if !contents.is_valid_target(target) {
                let _ = reply.send(Err(EmberError::InvalidConnection(format!(
                    "Target {} out of range for matrix {}",
                    target, path
                ))));
                return;
            }
            if let Some(&source) = sources.iter().find(|&&s| !contents.is_valid_source(s)) {
                let _ = reply.send(Err(EmberError::InvalidConnection(format!(
                    "Source {} out of range for matrix {}",
                    source, path
                ))));
                return;
            }
            let connection = MatrixConnection::new(target, sources).with_operation(operation);
            match request::connect_request(&path, &[connection]) {
                Ok(payload) => pipeline.push_request(PendingRequest {
                    matcher: ResponseMatcher::MatrixOperation {
                        target: path.clone(),
                    },
                    target: path,
                    payload,
                    reply,
                }),
                Err(e) => {
                    let _ = reply.send(Err(e));
                }
            }
        }
        SessionCommand::Invoke {
            path,
            arguments,
            reply,
        } => {
            match tree.get_by_path(&path) {
                Some(el) if el.as_function().is_some() => {
                    let id = pipeline.allocate_invocation_id();
                    match request::invoke_request(&path, id, &arguments) {
                        Ok(payload) => pipeline.push_invocation(id, payload, reply),
                        Err(e) => {
                            let _ = reply.send(Err(e));
                        }
                    }
                }
                Some(_) => {
                    let _ = reply.send(Err(EmberError::InvalidRequest(format!(
                        "Element at {} is not a function",
                        path
                    ))));
                }
                None => {
                    let _ = reply.send(Err(EmberError::InvalidRequest(format!(
                        "Unknown function path: {}",
                        path
                    ))));
                }
            }
        }
        SessionCommand::Subscribe { path, reply } => {
            push_subscription(tree, pipeline, path, reply, true);
        }
        SessionCommand::Unsubscribe { path, reply } => {
            push_subscription(tree, pipeline, path, reply, false);
        }
        SessionCommand::GetElement { path, reply } => {
            let _ = reply.send(tree.get_by_path(&path).cloned());
        }
        SessionCommand::GetChildren { path, reply } => {
            let children = if path.is_root() {
                Some(tree.children().to_vec())
            } else {
                tree.get_by_path(&path).map(|el| el.children().to_vec())
            };
            let _ = reply.send(children);
        }
        SessionCommand::Snapshot { reply } => {
            let _ = reply.send(tree.clone());
        }
        SessionCommand::Disconnect { .. } => {
            // Handled in the main loop before reaching here
        }
    }
}

fn push_subscription(
    tree: &Root,
    pipeline: &mut Pipeline,
    path: Path,
    reply: oneshot::Sender<EmberResult<Response>>,
    subscribe: bool,
) {
    let category = match tree.get_by_path(&path).map(|el| el.category()) {
        Some(category @ (ElementCategory::Parameter | ElementCategory::Matrix)) => category,
        Some(_) => {
            let _ = reply.send(Err(EmberError::InvalidRequest(format!(
                "Subscription target {} must be a parameter or matrix",
                path
            ))));
            return;
        }
        None => {
            let _ = reply.send(Err(EmberError::InvalidRequest(format!(
                "Unknown path: {}",
                path
            ))));
            return;
        }
    };
    let built = if subscribe {
        request::subscribe_request(&path, category)
    } else {
        request::unsubscribe_request(&path, category)
    };
    match built {
        Ok(payload) => pipeline.push_request(PendingRequest {
            matcher: ResponseMatcher::FireAndForget,
            target: path,
            payload,
            reply,
        }),
        Err(e) => {
            let _ = reply.send(Err(e));
        }
    }
}
