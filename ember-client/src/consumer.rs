//! Consumer facade
//!
//! Thin composition over the session task: operations build a command,
//! post it to the mailbox and await the reply. Concurrent callers are
//! serialized by the session's pipeline, not by this type, so the facade
//! can be shared behind `&self`.

use crate::events::ConsumerEvent;
use crate::pipeline::Response;
use crate::session::{self, SessionCommand};
use ember_core::{ConsumerConfig, EmberError, EmberResult, Value};
use ember_glow::{encode, ConnectionOperation, Element, InvocationResult, Path, Root};
use ember_transport::{ByteStream, TcpByteStream};
use std::io::Write;
use std::time::Duration;
use tokio::sync::{broadcast, mpsc, oneshot};
use tokio::task::JoinHandle;

const EVENT_CHANNEL_CAPACITY: usize = 64;
const COMMAND_CHANNEL_CAPACITY: usize = 32;

struct SessionHandle {
    commands: mpsc::Sender<SessionCommand>,
    task: JoinHandle<()>,
}

/// Ember+ consumer client
pub struct Consumer {
    config: ConsumerConfig,
    events: broadcast::Sender<ConsumerEvent>,
    session: Option<SessionHandle>,
}

impl Consumer {
    /// Create a consumer for the given configuration
    pub fn new(config: ConsumerConfig) -> Self {
        let (events, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        Self {
            config,
            events,
            session: None,
        }
    }

    /// Subscribe to session events
    pub fn events(&self) -> broadcast::Receiver<ConsumerEvent> {
        self.events.subscribe()
    }

    /// Connect to the configured provider over TCP
    pub async fn connect(&mut self, timeout: Duration) -> EmberResult<()> {
        if self.is_connected() {
            return Err(EmberError::InvalidRequest(
                "Consumer is already connected".to_string(),
            ));
        }
        let _ = self.events.send(ConsumerEvent::Connecting);

        let mut transport = TcpByteStream::new(self.config.host.clone(), self.config.port)
            .with_connect_timeout(timeout);
        if let Err(e) = transport.open().await {
            let _ = self.events.send(ConsumerEvent::Error(e.to_string()));
            return Err(e);
        }

        self.attach(transport);
        Ok(())
    }

    /// Run the session over an already-open byte stream
    ///
    /// Useful for tests and for transports other than plain TCP.
    pub fn connect_stream<S: ByteStream + 'static>(&mut self, stream: S) -> EmberResult<()> {
        if self.is_connected() {
            return Err(EmberError::InvalidRequest(
                "Consumer is already connected".to_string(),
            ));
        }
        self.attach(stream);
        Ok(())
    }

    fn attach<S: ByteStream + 'static>(&mut self, transport: S) {
        let (commands, mailbox) = mpsc::channel(COMMAND_CHANNEL_CAPACITY);
        let task = tokio::spawn(session::run(
            transport,
            self.config.clone(),
            self.events.clone(),
            mailbox,
        ));
        self.session = Some(SessionHandle { commands, task });
        let _ = self.events.send(ConsumerEvent::Connected);
    }

    /// Disconnect, cancelling all queued and in-flight requests
    pub async fn disconnect(&mut self) -> EmberResult<()> {
        if let Some(handle) = self.session.take() {
            let (tx, rx) = oneshot::channel();
            if handle
                .commands
                .send(SessionCommand::Disconnect { reply: tx })
                .await
                .is_ok()
            {
                let _ = rx.await;
            }
            let _ = handle.task.await;
        }
        Ok(())
    }

    /// Check whether the session is up
    pub fn is_connected(&self) -> bool {
        self.session
            .as_ref()
            .map(|handle| !handle.commands.is_closed())
            .unwrap_or(false)
    }

    async fn command<T>(
        &self,
        build: impl FnOnce(oneshot::Sender<T>) -> SessionCommand,
    ) -> EmberResult<T> {
        let handle = self.session.as_ref().ok_or(EmberError::ConnectionClosed)?;
        let (tx, rx) = oneshot::channel();
        handle
            .commands
            .send(build(tx))
            .await
            .map_err(|_| EmberError::ConnectionClosed)?;
        rx.await.map_err(|_| EmberError::ConnectionClosed)
    }

    /// Request the direct children of the element at `path`
    ///
    /// The empty path expands the provider's top level. Returns the
    /// children snapshot after the response has been merged into the local
    /// tree.
    pub async fn get_directory(&self, path: &Path) -> EmberResult<Vec<Element>> {
        let path = path.clone();
        let response = self
            .command(|reply| SessionCommand::GetDirectory { path, reply })
            .await??;
        Ok(match response {
            Response::Elements(elements) => elements,
            Response::Element(element) => element.children().to_vec(),
            Response::Completed => Vec::new(),
        })
    }

    /// Snapshot of the element at `path` from the local mirror (no I/O)
    pub async fn get_element(&self, path: &Path) -> EmberResult<Option<Element>> {
        let path = path.clone();
        self.command(|reply| SessionCommand::GetElement { path, reply })
            .await
    }

    async fn get_children(&self, path: &Path) -> EmberResult<Option<Vec<Element>>> {
        let path = path.clone();
        self.command(|reply| SessionCommand::GetChildren { path, reply })
            .await
    }

    /// Resolve a numeric path, expanding unknown levels via get-directory
    ///
    /// Fails with `PathNotFound` when the same segment stays missing after
    /// its parent's directory has been fetched.
    pub async fn get_element_by_path(&self, path: &Path) -> EmberResult<Element> {
        if path.is_root() {
            return Err(EmberError::InvalidRequest(
                "The root sentinel is not an element".to_string(),
            ));
        }
        let mut last_known_depth = None;
        loop {
            if let Some(element) = self.get_element(path).await? {
                return Ok(element);
            }

            // Deepest known ancestor
            let mut depth = 0;
            for i in 1..=path.len() {
                let prefix = Path::new(path.segments()[..i].to_vec());
                if self.get_element(&prefix).await?.is_some() {
                    depth = i;
                } else {
                    break;
                }
            }

            if last_known_depth == Some(depth) {
                return Err(EmberError::PathNotFound(format!(
                    "Discovery failed at segment {} of path {}",
                    path.segments()[depth],
                    path
                )));
            }
            last_known_depth = Some(depth);

            let prefix = Path::new(path.segments()[..depth].to_vec());
            self.get_directory(&prefix).await?;
        }
    }

    /// Resolve a `/`-separated identifier path, expanding via get-directory
    pub async fn get_element_by_identifiers(&self, identifiers: &str) -> EmberResult<Element> {
        let mut current = Path::root();
        for identifier in identifiers.split('/').filter(|part| !part.is_empty()) {
            let number = match self.find_child(&current, identifier).await? {
                Some(number) => number,
                None => {
                    self.get_directory(&current).await?;
                    self.find_child(&current, identifier).await?.ok_or_else(|| {
                        EmberError::PathNotFound(format!(
                            "No element named {:?} under {:?}",
                            identifier,
                            current.to_string()
                        ))
                    })?
                }
            };
            current = current.child(number);
        }
        self.get_element(&current)
            .await?
            .ok_or_else(|| EmberError::PathNotFound(identifiers.to_string()))
    }

    async fn find_child(&self, parent: &Path, identifier: &str) -> EmberResult<Option<u32>> {
        let children = self.get_children(parent).await?.unwrap_or_default();
        Ok(children
            .iter()
            .find(|child| child.identifier() == Some(identifier))
            .map(|child| child.number()))
    }

    /// Set a parameter value
    ///
    /// Resolves with the parameter as echoed by the provider, which may
    /// differ from the requested value (clamping, formulas).
    pub async fn set_value(&self, path: &Path, value: Value) -> EmberResult<Element> {
        let path = path.clone();
        let response = self
            .command(|reply| SessionCommand::SetValue { path, value, reply })
            .await??;
        expect_element(response)
    }

    /// Invoke a function with the given arguments
    pub async fn invoke(&self, path: &Path, arguments: Vec<Value>) -> EmberResult<InvocationResult> {
        let path = path.clone();
        self.command(|reply| SessionCommand::Invoke {
            path,
            arguments,
            reply,
        })
        .await?
    }

    /// Connect sources to a matrix target
    pub async fn matrix_connect(
        &self,
        path: &Path,
        target: u32,
        sources: Vec<u32>,
    ) -> EmberResult<Element> {
        self.matrix_operation(path, target, sources, ConnectionOperation::Connect)
            .await
    }

    /// Disconnect sources from a matrix target
    pub async fn matrix_disconnect(
        &self,
        path: &Path,
        target: u32,
        sources: Vec<u32>,
    ) -> EmberResult<Element> {
        self.matrix_operation(path, target, sources, ConnectionOperation::Disconnect)
            .await
    }

    /// Replace a matrix target's source set
    pub async fn matrix_set_connection(
        &self,
        path: &Path,
        target: u32,
        sources: Vec<u32>,
    ) -> EmberResult<Element> {
        self.matrix_operation(path, target, sources, ConnectionOperation::Absolute)
            .await
    }

    async fn matrix_operation(
        &self,
        path: &Path,
        target: u32,
        sources: Vec<u32>,
        operation: ConnectionOperation,
    ) -> EmberResult<Element> {
        let path = path.clone();
        let response = self
            .command(|reply| SessionCommand::MatrixOperation {
                path,
                target,
                sources,
                operation,
                reply,
            })
            .await??;
        expect_element(response)
    }

    /// Subscribe to updates of a parameter or matrix
    ///
    /// Completes as soon as the request frame is flushed; updates arrive
    /// as `ValueChange` events.
    pub async fn subscribe(&self, path: &Path) -> EmberResult<()> {
        let path = path.clone();
        self.command(|reply| SessionCommand::Subscribe { path, reply })
            .await??;
        Ok(())
    }

    /// Cancel a subscription
    pub async fn unsubscribe(&self, path: &Path) -> EmberResult<()> {
        let path = path.clone();
        self.command(|reply| SessionCommand::Unsubscribe { path, reply })
            .await??;
        Ok(())
    }

    /// Snapshot the local tree mirror
    pub async fn tree(&self) -> EmberResult<Root> {
        self.command(|reply| SessionCommand::Snapshot { reply }).await
    }

    /// Write the local tree as one BER-encoded root to `sink`
    ///
    /// Decoding the produced bytes reconstructs the tree.
    pub async fn save_tree<W: Write>(&self, sink: &mut W) -> EmberResult<()> {
        let tree = self.tree().await?;
        let bytes = encode::encode_root(&tree)?;
        sink.write_all(&bytes).map_err(EmberError::Transport)
    }
}

fn expect_element(response: Response) -> EmberResult<Element> {
    match response {
        Response::Element(element) => Ok(element),
        other => Err(EmberError::InvalidRequest(format!(
            "Unexpected response shape: {:?}",
            other
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use ember_asn1::{BerWriter, Tag};
    use ember_core::Access;
    use ember_glow::{MatrixContents, NodeContents, ParameterContents};
    use ember_session::{FrameCommand, FrameDeframer, S101Frame};
    use std::collections::VecDeque;
    use std::sync::{Arc, Mutex};

    /// Shared handles into a [`MockStream`] for scripting and assertions
    struct MockHandles {
        /// Scripted reply payloads, popped per Ember data frame written by
        /// the session; `None` swallows the request silently
        responses: Arc<Mutex<VecDeque<Option<Vec<u8>>>>>,
        /// Number of Ember data frames the session has written
        ember_writes: Arc<Mutex<usize>>,
        /// Push unsolicited wire bytes into the session's read path
        inject: mpsc::UnboundedSender<Vec<u8>>,
    }

    /// In-memory provider double: answers keep-alives and plays back the
    /// scripted response for every data frame it sees
    struct MockStream {
        deframer: FrameDeframer,
        responses: Arc<Mutex<VecDeque<Option<Vec<u8>>>>>,
        ember_writes: Arc<Mutex<usize>>,
        inbound_tx: mpsc::UnboundedSender<Vec<u8>>,
        inbound_rx: mpsc::UnboundedReceiver<Vec<u8>>,
        pending: Vec<u8>,
        closed: bool,
    }

    impl MockStream {
        fn new(script: Vec<Option<Vec<u8>>>) -> (Self, MockHandles) {
            let (inbound_tx, inbound_rx) = mpsc::unbounded_channel();
            let responses = Arc::new(Mutex::new(script.into_iter().collect()));
            let ember_writes = Arc::new(Mutex::new(0));
            let handles = MockHandles {
                responses: responses.clone(),
                ember_writes: ember_writes.clone(),
                inject: inbound_tx.clone(),
            };
            (
                Self {
                    deframer: FrameDeframer::new(),
                    responses,
                    ember_writes,
                    inbound_tx,
                    inbound_rx,
                    pending: Vec::new(),
                    closed: false,
                },
                handles,
            )
        }
    }

    #[async_trait]
    impl ByteStream for MockStream {
        async fn open(&mut self) -> EmberResult<()> {
            self.closed = false;
            Ok(())
        }

        async fn read(&mut self, buf: &mut [u8]) -> EmberResult<usize> {
            if self.pending.is_empty() {
                match self.inbound_rx.recv().await {
                    Some(bytes) => self.pending = bytes,
                    None => return Ok(0),
                }
            }
            let n = buf.len().min(self.pending.len());
            buf[..n].copy_from_slice(&self.pending[..n]);
            self.pending.drain(..n);
            Ok(n)
        }

        async fn write(&mut self, buf: &[u8]) -> EmberResult<usize> {
            for frame in self.deframer.feed(buf) {
                match frame.command {
                    FrameCommand::Ember => {
                        *self.ember_writes.lock().unwrap() += 1;
                        let scripted = self.responses.lock().unwrap().pop_front();
                        if let Some(Some(payload)) = scripted {
                            let _ = self.inbound_tx.send(S101Frame::single(payload).encode());
                        }
                    }
                    FrameCommand::KeepAliveRequest => {
                        let _ = self
                            .inbound_tx
                            .send(S101Frame::keepalive_response().encode());
                    }
                    FrameCommand::KeepAliveResponse => {}
                }
            }
            Ok(buf.len())
        }

        async fn flush(&mut self) -> EmberResult<()> {
            Ok(())
        }

        fn is_closed(&self) -> bool {
            self.closed
        }

        async fn close(&mut self) -> EmberResult<()> {
            self.closed = true;
            Ok(())
        }
    }

    fn consumer_with(script: Vec<Option<Vec<u8>>>) -> (Consumer, MockHandles) {
        let config = ConsumerConfig::new("mock").with_request_timeout(Duration::from_millis(200));
        let mut consumer = Consumer::new(config);
        let (stream, handles) = MockStream::new(script);
        consumer.connect_stream(stream).unwrap();
        (consumer, handles)
    }

    fn response(children: Vec<Element>) -> Vec<u8> {
        let mut root = Root::new();
        for child in children {
            root.add_child(child).unwrap();
        }
        encode::encode_root(&root).unwrap()
    }

    fn named_node(number: u32, identifier: &str) -> Element {
        Element::new_node(
            number,
            NodeContents {
                identifier: Some(identifier.to_string()),
                ..Default::default()
            },
        )
    }

    fn parameter(number: u32, value: Option<Value>, access: Access) -> Element {
        Element::new_parameter(
            number,
            ParameterContents {
                identifier: Some(format!("p{}", number)),
                value,
                access: Some(access),
                ..Default::default()
            },
        )
    }

    fn invocation_result_payload(id: i64, result: Vec<i64>) -> Vec<u8> {
        let mut writer = BerWriter::new();
        writer.start_sequence(Tag::application(true, 0));
        writer.start_sequence(Tag::application(true, 23));
        writer.start_sequence(Tag::context(true, 0));
        writer.write_integer(id);
        writer.end_sequence().unwrap();
        writer.start_sequence(Tag::context(true, 1));
        writer.write_boolean(true);
        writer.end_sequence().unwrap();
        writer.start_sequence(Tag::context(true, 2));
        writer.start_sequence(Tag::SEQUENCE);
        for value in result {
            writer.start_sequence(Tag::context(true, 0));
            writer.write_integer(value);
            writer.end_sequence().unwrap();
        }
        writer.end_sequence().unwrap();
        writer.end_sequence().unwrap();
        writer.end_sequence().unwrap();
        writer.end_sequence().unwrap();
        writer.into_bytes().unwrap()
    }

    async fn wait_for_value_change(
        events: &mut broadcast::Receiver<ConsumerEvent>,
        expected: &Value,
    ) -> bool {
        while let Ok(event) = events.recv().await {
            if let ConsumerEvent::ValueChange { value, .. } = &event {
                if value == expected {
                    return true;
                }
            }
            if event.is_termination() {
                break;
            }
        }
        false
    }

    #[tokio::test(start_paused = true)]
    async fn test_root_get_directory_fresh_and_repeated() {
        let top_level = vec![named_node(1, "audio"), named_node(2, "video")];
        let (consumer, _handles) = consumer_with(vec![
            Some(response(top_level.clone())),
            Some(response(top_level)),
        ]);

        let children = consumer.get_directory(&Path::root()).await.unwrap();
        assert_eq!(children.len(), 2);
        assert_eq!(children[0].identifier(), Some("audio"));

        // A second expansion updates, it does not duplicate
        let children = consumer.get_directory(&Path::root()).await.unwrap();
        assert_eq!(children.len(), 2);

        let mut consumer = consumer;
        consumer.disconnect().await.unwrap();
        assert!(!consumer.is_connected());
    }

    #[tokio::test(start_paused = true)]
    async fn test_set_value_resolves_with_clamped_echo() {
        let mut discovered = named_node(1, "audio");
        discovered
            .add_child(parameter(2, Some(Value::Integer(3)), Access::ReadWrite))
            .unwrap();
        let mut echoed = named_node(1, "audio");
        echoed
            .add_child(parameter(2, Some(Value::Integer(5)), Access::ReadWrite))
            .unwrap();

        let (consumer, _handles) = consumer_with(vec![
            Some(response(vec![discovered])),
            Some(response(vec![echoed])),
        ]);
        let mut events = consumer.events();

        consumer.get_directory(&Path::new(vec![1])).await.unwrap();

        // The provider clamps 7 to 5; the waiter sees the echoed value
        let path = Path::new(vec![1, 2]);
        let element = consumer.set_value(&path, Value::Integer(7)).await.unwrap();
        assert_eq!(
            element.as_parameter().unwrap().value,
            Some(Value::Integer(5))
        );
        assert!(wait_for_value_change(&mut events, &Value::Integer(5)).await);
    }

    #[tokio::test(start_paused = true)]
    async fn test_set_value_preflight_rejections() {
        let mut node = named_node(1, "audio");
        node.add_child(parameter(2, Some(Value::Integer(0)), Access::Read))
            .unwrap();
        let (consumer, handles) = consumer_with(vec![Some(response(vec![node]))]);
        consumer.get_directory(&Path::new(vec![1])).await.unwrap();
        let writes_after_discovery = *handles.ember_writes.lock().unwrap();

        // Unknown path
        let result = consumer
            .set_value(&Path::new(vec![9, 9]), Value::Integer(1))
            .await;
        assert!(matches!(result, Err(EmberError::InvalidRequest(_))));

        // Read-only parameter
        let result = consumer
            .set_value(&Path::new(vec![1, 2]), Value::Integer(1))
            .await;
        assert!(matches!(result, Err(EmberError::AccessDenied(_))));

        // Not a parameter
        let result = consumer
            .set_value(&Path::new(vec![1]), Value::Integer(1))
            .await;
        assert!(matches!(result, Err(EmberError::InvalidRequest(_))));

        // Nothing was sent for any rejection
        assert_eq!(*handles.ember_writes.lock().unwrap(), writes_after_discovery);
    }

    #[tokio::test(start_paused = true)]
    async fn test_matrix_connect_and_range_preflight() {
        let matrix = Element::new_matrix(
            4,
            MatrixContents {
                identifier: Some("router".into()),
                target_count: Some(8),
                source_count: Some(2),
                ..Default::default()
            },
        );
        let mut connections = std::collections::BTreeMap::new();
        connections.insert(
            3,
            ember_glow::MatrixConnection {
                target: 3,
                sources: vec![1, 2],
                operation: Some(ConnectionOperation::Connect),
                disposition: Some(ember_glow::ConnectionDisposition::Modified),
            },
        );
        let echoed = Element::new_matrix(
            4,
            MatrixContents {
                target_count: Some(8),
                source_count: Some(2),
                connections,
                ..Default::default()
            },
        );

        let (consumer, handles) = consumer_with(vec![
            Some(response(vec![matrix])),
            Some(response(vec![echoed])),
        ]);
        consumer.get_directory(&Path::root()).await.unwrap();

        let path = Path::new(vec![4]);
        let element = consumer
            .matrix_connect(&path, 3, vec![1, 2])
            .await
            .unwrap();
        let connections = &element.as_matrix().unwrap().connections;
        assert_eq!(connections.get(&3).unwrap().sources, vec![1, 2]);
        assert_eq!(
            connections.get(&3).unwrap().operation,
            Some(ConnectionOperation::Connect)
        );

        // Out-of-range source fails synchronously, nothing is sent
        let writes = *handles.ember_writes.lock().unwrap();
        let result = consumer.matrix_connect(&path, 3, vec![5]).await;
        assert!(matches!(result, Err(EmberError::InvalidConnection(_))));
        assert_eq!(*handles.ember_writes.lock().unwrap(), writes);

        // Out-of-range target likewise
        let result = consumer.matrix_connect(&path, 99, vec![1]).await;
        assert!(matches!(result, Err(EmberError::InvalidConnection(_))));
    }

    #[tokio::test(start_paused = true)]
    async fn test_invocations_resolve_out_of_order() {
        let function = Element::new_function(
            9,
            ember_glow::FunctionContents {
                identifier: Some("recall".into()),
                ..Default::default()
            },
        );
        // The provider answers the first invocation last
        let (consumer, _handles) = consumer_with(vec![
            Some(response(vec![function])),
            Some(invocation_result_payload(2, vec![20])),
            Some(invocation_result_payload(1, vec![10])),
        ]);
        consumer.get_directory(&Path::root()).await.unwrap();

        let path = Path::new(vec![9]);
        let (first, second) = tokio::join!(
            consumer.invoke(&path, vec![Value::Integer(1)]),
            consumer.invoke(&path, vec![Value::Integer(2)]),
        );
        let first = first.unwrap();
        let second = second.unwrap();
        assert_eq!(first.invocation_id, 1);
        assert_eq!(first.result, vec![Value::Integer(10)]);
        assert_eq!(second.invocation_id, 2);
        assert_eq!(second.result, vec![Value::Integer(20)]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_timeout_isolation() {
        let top_level = vec![named_node(1, "audio")];
        // First request is swallowed, second answered
        let (consumer, _handles) =
            consumer_with(vec![None, Some(response(top_level))]);

        let result = consumer.get_directory(&Path::root()).await;
        assert!(matches!(result, Err(EmberError::Timeout)));

        // The timed-out request does not block the next one
        let children = consumer.get_directory(&Path::root()).await.unwrap();
        assert_eq!(children.len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_subscribe_completes_on_flush() {
        let mut node = named_node(1, "audio");
        node.add_child(parameter(2, None, Access::Read)).unwrap();
        let (consumer, handles) = consumer_with(vec![Some(response(vec![node]))]);
        consumer.get_directory(&Path::new(vec![1])).await.unwrap();

        // No response scripted: subscribe must still complete
        consumer.subscribe(&Path::new(vec![1, 2])).await.unwrap();
        consumer.unsubscribe(&Path::new(vec![1, 2])).await.unwrap();
        assert_eq!(*handles.ember_writes.lock().unwrap(), 3);

        // Subscribing to a node is caller misuse
        let result = consumer.subscribe(&Path::new(vec![1])).await;
        assert!(matches!(result, Err(EmberError::InvalidRequest(_))));
    }

    #[tokio::test(start_paused = true)]
    async fn test_unsolicited_update_merges_and_emits() {
        let mut node = named_node(1, "audio");
        node.add_child(parameter(2, Some(Value::Integer(1)), Access::ReadWrite))
            .unwrap();
        let (consumer, handles) = consumer_with(vec![Some(response(vec![node]))]);
        let mut events = consumer.events();
        consumer.get_directory(&Path::new(vec![1])).await.unwrap();

        // Provider pushes an update nobody asked for
        let mut update = named_node(1, "audio");
        update
            .add_child(parameter(2, Some(Value::Integer(42)), Access::ReadWrite))
            .unwrap();
        handles
            .inject
            .send(S101Frame::single(response(vec![update])).encode())
            .unwrap();

        assert!(wait_for_value_change(&mut events, &Value::Integer(42)).await);
        let element = consumer
            .get_element(&Path::new(vec![1, 2]))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(
            element.as_parameter().unwrap().value,
            Some(Value::Integer(42))
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_discovery_walk_by_path() {
        let mut level1 = named_node(1, "audio");
        level1.add_child(named_node(3, "channels")).unwrap();
        let mut level2 = named_node(3, "channels");
        level2
            .add_child(parameter(2, Some(Value::Integer(0)), Access::ReadWrite))
            .unwrap();

        let (consumer, _handles) = consumer_with(vec![
            Some(response(vec![named_node(1, "audio")])),
            Some(response(vec![level1])),
            Some(response(vec![{
                let mut wrapper = named_node(1, "audio");
                wrapper.add_child(level2).unwrap();
                wrapper
            }])),
        ]);

        let element = consumer
            .get_element_by_path(&Path::new(vec![1, 3, 2]))
            .await
            .unwrap();
        assert_eq!(element.number(), 2);
        assert!(element.as_parameter().is_some());
    }

    #[tokio::test(start_paused = true)]
    async fn test_discovery_walk_fails_on_unadvertised_path() {
        // The provider only ever advertises node 1
        let (consumer, _handles) = consumer_with(vec![
            Some(response(vec![named_node(1, "audio")])),
            Some(response(vec![named_node(1, "audio")])),
        ]);

        let result = consumer.get_element_by_path(&Path::new(vec![1, 9])).await;
        assert!(matches!(result, Err(EmberError::PathNotFound(_))));
    }

    #[tokio::test(start_paused = true)]
    async fn test_discovery_walk_by_identifiers() {
        let mut level1 = named_node(1, "audio");
        level1
            .add_child(parameter(2, Some(Value::Integer(0)), Access::ReadWrite))
            .unwrap();

        let (consumer, _handles) = consumer_with(vec![
            Some(response(vec![named_node(1, "audio")])),
            Some(response(vec![level1.clone()])),
            Some(response(vec![level1])),
        ]);

        let element = consumer
            .get_element_by_identifiers("audio/p2")
            .await
            .unwrap();
        assert_eq!(element.number(), 2);

        let result = consumer.get_element_by_identifiers("audio/missing").await;
        assert!(matches!(result, Err(EmberError::PathNotFound(_))));
    }

    #[tokio::test(start_paused = true)]
    async fn test_save_tree_round_trips() {
        let mut node = named_node(1, "audio");
        node.add_child(parameter(2, Some(Value::Integer(7)), Access::ReadWrite))
            .unwrap();
        let (consumer, _handles) = consumer_with(vec![Some(response(vec![node]))]);
        consumer.get_directory(&Path::root()).await.unwrap();

        let mut sink = Vec::new();
        consumer.save_tree(&mut sink).await.unwrap();

        let decoded = ember_glow::decode::decode_root(&sink).unwrap();
        let mut rebuilt = Root::new();
        rebuilt.apply(&decoded);
        assert_eq!(rebuilt, consumer.tree().await.unwrap());
    }

    #[tokio::test(start_paused = true)]
    async fn test_requests_after_disconnect_fail_closed() {
        let (consumer, _handles) = consumer_with(vec![None]);
        let mut consumer = consumer;

        // Swallowed request times out, then the session is torn down
        let result = consumer.get_directory(&Path::root()).await;
        assert!(matches!(result, Err(EmberError::Timeout)));
        consumer.disconnect().await.unwrap();
        assert!(!consumer.is_connected());

        let result = consumer.get_directory(&Path::root()).await;
        assert!(matches!(result, Err(EmberError::ConnectionClosed)));
    }
}
