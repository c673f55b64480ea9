use super::messages::SignalingCommand;
use crate::jingle::dispatcher::{RenegotiationCompletion, SignalingDispatcher};
use crate::jingle::error::SessionError;
use crate::jingle::session::SessionSnapshot;
use jcore::jid::Jid;
use jcore::types::session::{SessionId, TerminationReason};
use jcore::xml::Node;
use log::{error, info};
use thiserror::Error;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;

const COMMAND_BUFFER: usize = 64;

#[derive(Debug, Error)]
pub enum SignalingError {
    #[error("signaling actor is not running")]
    Closed,
    #[error(transparent)]
    Session(#[from] SessionError),
}

/// Runs a [`SignalingDispatcher`] on one task. Commands and renegotiation
/// completions are taken one at a time and handled to completion.
pub struct SignalingActor {
    dispatcher: SignalingDispatcher,
    command_rx: mpsc::Receiver<SignalingCommand>,
    completion_rx: mpsc::UnboundedReceiver<RenegotiationCompletion>,
}

impl SignalingActor {
    pub fn new(
        dispatcher: SignalingDispatcher,
        completion_rx: mpsc::UnboundedReceiver<RenegotiationCompletion>,
    ) -> (Self, SignalingHandle) {
        let (command_tx, command_rx) = mpsc::channel(COMMAND_BUFFER);
        (
            Self {
                dispatcher,
                command_rx,
                completion_rx,
            },
            SignalingHandle { command_tx },
        )
    }

    /// Spawns the actor on the current runtime.
    pub fn spawn(
        dispatcher: SignalingDispatcher,
        completion_rx: mpsc::UnboundedReceiver<RenegotiationCompletion>,
    ) -> (SignalingHandle, JoinHandle<()>) {
        let (mut actor, handle) = Self::new(dispatcher, completion_rx);
        let task = tokio::spawn(async move { actor.run().await });
        (handle, task)
    }

    pub async fn run(&mut self) {
        info!(target: "Jingle/Actor", "SignalingActor started for {}", self.dispatcher.local());
        loop {
            tokio::select! {
                command = self.command_rx.recv() => match command {
                    Some(SignalingCommand::Shutdown) | None => break,
                    Some(command) => self.handle_command(command).await,
                },
                Some(completion) = self.completion_rx.recv() => {
                    self.dispatcher.complete_renegotiation(completion).await;
                }
            }
        }
        info!(target: "Jingle/Actor", "SignalingActor stopped");
    }

    async fn handle_command(&mut self, command: SignalingCommand) {
        match command {
            SignalingCommand::Inbound(node) => {
                self.dispatcher.handle_stanza(&node).await;
            }
            SignalingCommand::OpenSession {
                local,
                remote,
                contents,
                reply,
            } => {
                let result = self.open_and_initiate(local, remote, contents).await;
                Self::respond(reply, result);
            }
            SignalingCommand::AcceptSession {
                sid,
                contents,
                reply,
            } => {
                let result = self.dispatcher.accept_session(&sid, contents).await;
                Self::respond(reply, result);
            }
            SignalingCommand::TerminateSession { sid, reason, reply } => {
                let result = self.dispatcher.terminate_session(&sid, reason).await;
                Self::respond(reply, result);
            }
            SignalingCommand::Snapshot { reply } => {
                Self::respond(reply, self.dispatcher.sessions_snapshot());
            }
            SignalingCommand::Shutdown => {}
        }
    }

    async fn open_and_initiate(
        &mut self,
        local: Jid,
        remote: Jid,
        contents: Vec<Node>,
    ) -> Result<SessionSnapshot, SessionError> {
        let session = self.dispatcher.open_session(local, remote)?;
        let initiate = self
            .dispatcher
            .build_session_initiate(&session.sid, contents)?;
        self.dispatcher.send_stanza(initiate).await;
        Ok(session)
    }

    fn respond<T>(reply: oneshot::Sender<T>, value: T) {
        if reply.send(value).is_err() {
            error!(target: "Jingle/Actor", "Failed to send reply: receiver dropped");
        }
    }
}

/// Cloneable front end to a running [`SignalingActor`].
#[derive(Clone, Debug)]
pub struct SignalingHandle {
    command_tx: mpsc::Sender<SignalingCommand>,
}

impl SignalingHandle {
    async fn request<T>(
        &self,
        make: impl FnOnce(oneshot::Sender<T>) -> SignalingCommand,
    ) -> Result<T, SignalingError> {
        let (tx, rx) = oneshot::channel();
        self.command_tx
            .send(make(tx))
            .await
            .map_err(|_| SignalingError::Closed)?;
        rx.await.map_err(|_| SignalingError::Closed)
    }

    /// Queues an inbound stanza. Its ack is sent by the actor.
    pub async fn deliver(&self, node: Node) -> Result<(), SignalingError> {
        self.command_tx
            .send(SignalingCommand::Inbound(node))
            .await
            .map_err(|_| SignalingError::Closed)
    }

    /// Opens a session to `remote` and sends its session-initiate.
    pub async fn open_session(
        &self,
        local: Jid,
        remote: Jid,
        contents: Vec<Node>,
    ) -> Result<SessionSnapshot, SignalingError> {
        Ok(self
            .request(|reply| SignalingCommand::OpenSession {
                local,
                remote,
                contents,
                reply,
            })
            .await??)
    }

    pub async fn accept_session(
        &self,
        sid: SessionId,
        contents: Vec<Node>,
    ) -> Result<(), SignalingError> {
        Ok(self
            .request(|reply| SignalingCommand::AcceptSession {
                sid,
                contents,
                reply,
            })
            .await??)
    }

    pub async fn terminate_session(
        &self,
        sid: SessionId,
        reason: TerminationReason,
    ) -> Result<(), SignalingError> {
        Ok(self
            .request(|reply| SignalingCommand::TerminateSession { sid, reason, reply })
            .await??)
    }

    pub async fn sessions_snapshot(&self) -> Result<Vec<SessionSnapshot>, SignalingError> {
        self.request(|reply| SignalingCommand::Snapshot { reply })
            .await
    }

    pub async fn shutdown(&self) -> Result<(), SignalingError> {
        self.command_tx
            .send(SignalingCommand::Shutdown)
            .await
            .map_err(|_| SignalingError::Closed)
    }
}
