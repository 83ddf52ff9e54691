//! Executes core effects: transport calls and timers run as tokio tasks and
//! report back as `Action`s on the event loop's channel.
//!
//! Outgoing messages are the exception to one-task-per-call: they go through
//! a single sender task so the platform receives them in submission order.

use std::collections::HashMap;
use std::sync::{Arc, mpsc};
use std::time::Duration;

use log::{debug, info, warn};
use tokio::sync::mpsc::{UnboundedSender, unbounded_channel};
use tokio::task::{AbortHandle, JoinHandle};

use crate::core::action::{Action, Completion, Effect};
use crate::core::state::{OutgoingMessage, TimerHandle};
use crate::transport::{Snowflake, Transport, TransportEvent};

const EVENT_BUFFER: usize = 100;

/// A message waiting for the sender task.
enum Outgoing {
    Channel {
        channel_id: Snowflake,
        content: String,
        plaintext: String,
    },
    Direct {
        user_id: Snowflake,
        content: String,
    },
}

pub struct EffectRunner {
    transport: Arc<dyn Transport>,
    tx: mpsc::Sender<Action>,
    timers: HashMap<TimerHandle, AbortHandle>,
    disconnect: Option<JoinHandle<()>>,
    outbox: Option<UnboundedSender<Outgoing>>,
}

impl EffectRunner {
    pub fn new(transport: Arc<dyn Transport>, tx: mpsc::Sender<Action>) -> Self {
        Self {
            transport,
            tx,
            timers: HashMap::new(),
            disconnect: None,
            outbox: None,
        }
    }

    /// Run every effect in order. Returns the exit code if one was requested.
    pub fn run_all(&mut self, effects: Vec<Effect>) -> Option<i32> {
        let mut exit = None;
        for effect in effects {
            if let Some(code) = self.run(effect) {
                exit = Some(code);
            }
        }
        exit
    }

    /// A timer's action arrived; forget its abort handle.
    pub fn timer_fired(&mut self, handle: TimerHandle) {
        self.timers.remove(&handle);
    }

    pub fn pending_timers(&self) -> usize {
        self.timers.len()
    }

    /// The in-flight disconnect, if one was started.
    pub fn take_disconnect(&mut self) -> Option<JoinHandle<()>> {
        self.disconnect.take()
    }

    fn run(&mut self, effect: Effect) -> Option<i32> {
        debug!("Effect: {:?}", effect);
        match effect {
            Effect::Connect { token } => self.spawn_connect(token),
            Effect::Disconnect => {
                let transport = self.transport.clone();
                self.disconnect = Some(tokio::spawn(async move {
                    if let Err(e) = transport.disconnect().await {
                        warn!("Disconnect failed: {}", e);
                    }
                }));
            }
            Effect::Watch { channel_id } => {
                self.spawn(move |t| async move {
                    t.watch(&channel_id)
                        .await
                        .err()
                        .map(|e| Action::Transport(TransportEvent::Error(e.to_string())))
                });
            }
            Effect::FollowAll(enabled) => {
                self.spawn(move |t| async move {
                    t.follow_all(enabled)
                        .await
                        .err()
                        .map(|e| Action::Transport(TransportEvent::Error(e.to_string())))
                });
            }
            Effect::Send {
                channel_id,
                content,
                plaintext,
            } => self.enqueue(Outgoing::Channel {
                channel_id,
                content,
                plaintext,
            }),
            Effect::SendDirect { user_id, content } => {
                self.enqueue(Outgoing::Direct { user_id, content })
            }
            Effect::StartTyping { channel_id } => {
                self.spawn(move |t| async move {
                    if let Err(e) = t.start_typing(&channel_id).await {
                        debug!("Typing signal failed: {}", e);
                    }
                    None
                });
            }
            Effect::StopTyping { channel_id } => {
                self.spawn(move |t| async move {
                    if let Err(e) = t.stop_typing(&channel_id).await {
                        debug!("Typing stop failed: {}", e);
                    }
                    None
                });
            }
            Effect::Edit {
                channel_id,
                message_id,
                content,
            } => {
                self.spawn(move |t| async move {
                    t.edit(&channel_id, &message_id, &content)
                        .await
                        .err()
                        .map(|e| Action::Completed(Completion::EditFailed(e.to_string())))
                });
            }
            Effect::Delete {
                channel_id,
                message_id,
            } => {
                self.spawn(move |t| async move {
                    t.delete(&channel_id, &message_id)
                        .await
                        .err()
                        .map(|e| Action::Completed(Completion::DeleteFailed(e.to_string())))
                });
            }
            Effect::ArmTimer { handle, delay } => self.arm(handle, delay),
            Effect::CancelTimer(handle) => {
                if let Some(abort) = self.timers.remove(&handle) {
                    abort.abort();
                }
            }
            Effect::SetTitle(title) => {
                if let Err(e) = crossterm::execute!(std::io::stdout(), crossterm::terminal::SetTitle(&title)) {
                    debug!("Unable to set title: {}", e);
                }
            }
            Effect::Exit(code) => return Some(code),
        }
        None
    }

    /// Spawn a transport call; its optional result action is posted back.
    fn spawn<F, Fut>(&self, call: F)
    where
        F: FnOnce(Arc<dyn Transport>) -> Fut,
        Fut: Future<Output = Option<Action>> + Send + 'static,
    {
        let tx = self.tx.clone();
        let task = call(self.transport.clone());
        tokio::spawn(async move {
            if let Some(action) = task.await
                && tx.send(action).is_err()
            {
                warn!("Failed to post transport result: receiver dropped");
            }
        });
    }

    fn enqueue(&mut self, outgoing: Outgoing) {
        if self.outbox.is_none() {
            self.outbox = Some(spawn_sender(self.transport.clone(), self.tx.clone()));
        }
        if let Some(outbox) = &self.outbox
            && outbox.send(outgoing).is_err()
        {
            warn!("Sender task is gone; message dropped");
        }
    }

    fn spawn_connect(&self, token: String) {
        info!("Connecting via {} transport", self.transport.name());
        let (event_tx, mut event_rx) = tokio::sync::mpsc::channel::<TransportEvent>(EVENT_BUFFER);

        let tx = self.tx.clone();
        tokio::spawn(async move {
            while let Some(event) = event_rx.recv().await {
                if tx.send(Action::Transport(event)).is_err() {
                    warn!("Failed to forward transport event: receiver dropped");
                    return;
                }
            }
            debug!("Transport event stream closed");
        });

        let transport = self.transport.clone();
        let tx = self.tx.clone();
        tokio::spawn(async move {
            if let Err(e) = transport.connect(&token, event_tx).await {
                warn!("Login failed: {}", e);
                if tx
                    .send(Action::Completed(Completion::LoginFailed(e.to_string())))
                    .is_err()
                {
                    warn!("Failed to report login failure: receiver dropped");
                }
            }
        });
    }

    fn arm(&mut self, handle: TimerHandle, delay: Duration) {
        let tx = self.tx.clone();
        let task = tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            if tx.send(Action::TimerFired(handle)).is_err() {
                debug!("Timer {:?} fired after receiver dropped", handle);
            }
        });
        self.timers.insert(handle, task.abort_handle());
    }
}

/// Start the task that delivers queued messages one at a time.
fn spawn_sender(
    transport: Arc<dyn Transport>,
    tx: mpsc::Sender<Action>,
) -> UnboundedSender<Outgoing> {
    let (outbox, mut queue) = unbounded_channel::<Outgoing>();
    tokio::spawn(async move {
        while let Some(outgoing) = queue.recv().await {
            let completion = match outgoing {
                Outgoing::Channel {
                    channel_id,
                    content,
                    plaintext,
                } => match transport.send(&channel_id, &content).await {
                    Ok(id) => Some(Completion::Sent(OutgoingMessage {
                        id,
                        channel_id,
                        content: plaintext,
                    })),
                    Err(e) => Some(Completion::SendFailed(e.to_string())),
                },
                // The echo arrives through polling; only failures are reported
                Outgoing::Direct { user_id, content } => transport
                    .send_direct(&user_id, &content)
                    .await
                    .err()
                    .map(|e| Completion::SendFailed(e.to_string())),
            };
            if let Some(completion) = completion
                && tx.send(Action::Completed(completion)).is_err()
            {
                warn!("Failed to post send result: receiver dropped");
                return;
            }
        }
        debug!("Outbox closed");
    });
    outbox
}
