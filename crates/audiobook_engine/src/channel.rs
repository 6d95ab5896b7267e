//! Request/response messaging between contexts.
//!
//! Each request carries a [`Responder`] that settles at most once. Clones of
//! a responder may race (a deadline against the real completion); the first
//! to answer wins and later answers are dropped.
use std::sync::{Arc, Mutex, PoisonError};

use relay_logging::relay_debug;
use tokio::sync::{mpsc, oneshot};

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ChannelError {
    #[error("Could not establish connection. Receiving end does not exist.")]
    Disconnected,
    #[error("The message port closed before a response was received.")]
    NoResponse,
}

/// What a handler tells the channel about the response to a request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Disposition {
    /// Answered before the handler returned.
    Replied,
    /// A response will be sent later from another task.
    Pending,
    /// No response will be sent.
    NoReply,
}

pub struct Responder<R> {
    slot: Arc<Mutex<Option<oneshot::Sender<R>>>>,
}

impl<R> Clone for Responder<R> {
    fn clone(&self) -> Self {
        Self {
            slot: Arc::clone(&self.slot),
        }
    }
}

impl<R> Responder<R> {
    /// A responder nobody listens to, for fire-and-forget messages.
    pub fn detached() -> Self {
        Self {
            slot: Arc::new(Mutex::new(None)),
        }
    }

    /// Sends `reply` unless another clone already did.
    ///
    /// Returns `true` when this call settled the request.
    pub fn respond(&self, reply: R) -> bool {
        let sender = self
            .slot
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        match sender {
            Some(sender) => {
                if sender.send(reply).is_err() {
                    relay_debug!("Requester went away before the response arrived");
                }
                true
            }
            None => {
                relay_debug!("Dropping response for an already settled request");
                false
            }
        }
    }

    pub fn is_settled(&self) -> bool {
        self.slot
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .is_none()
    }
}

pub fn reply_pair<R>() -> (Responder<R>, oneshot::Receiver<R>) {
    let (tx, rx) = oneshot::channel();
    let responder = Responder {
        slot: Arc::new(Mutex::new(Some(tx))),
    };
    (responder, rx)
}

pub struct Envelope<Q, R> {
    pub request: Q,
    pub responder: Responder<R>,
}

/// Sending half; cheap to clone.
pub struct Endpoint<Q, R> {
    tx: mpsc::UnboundedSender<Envelope<Q, R>>,
}

impl<Q, R> Clone for Endpoint<Q, R> {
    fn clone(&self) -> Self {
        Self {
            tx: self.tx.clone(),
        }
    }
}

impl<Q, R> Endpoint<Q, R> {
    /// Sends `request` and waits for its response.
    pub async fn request(&self, request: Q) -> Result<R, ChannelError> {
        let (responder, rx) = reply_pair();
        self.tx
            .send(Envelope { request, responder })
            .map_err(|_| ChannelError::Disconnected)?;
        rx.await.map_err(|_| ChannelError::NoResponse)
    }

    /// Sends `request` without waiting for (or expecting) a response.
    pub fn post(&self, request: Q) -> Result<(), ChannelError> {
        self.tx
            .send(Envelope {
                request,
                responder: Responder::detached(),
            })
            .map_err(|_| ChannelError::Disconnected)
    }

    pub fn is_connected(&self) -> bool {
        !self.tx.is_closed()
    }
}

/// Receiving half, owned by the context that handles the requests.
pub struct Mailbox<Q, R> {
    rx: mpsc::UnboundedReceiver<Envelope<Q, R>>,
}

impl<Q, R> Mailbox<Q, R> {
    pub async fn recv(&mut self) -> Option<Envelope<Q, R>> {
        self.rx.recv().await
    }

    /// Stops accepting requests; pending senders see `Disconnected`.
    pub fn close(&mut self) {
        self.rx.close();
    }
}

pub fn channel<Q, R>() -> (Endpoint<Q, R>, Mailbox<Q, R>) {
    let (tx, rx) = mpsc::unbounded_channel();
    (Endpoint { tx }, Mailbox { rx })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn first_response_wins() {
        let (responder, rx) = reply_pair::<&'static str>();
        let late = responder.clone();

        assert!(responder.respond("deadline"));
        assert!(late.is_settled());
        assert!(!late.respond("real"));
        assert_eq!(rx.await.unwrap(), "deadline");
    }

    #[tokio::test]
    async fn dropped_responder_reports_no_response() {
        let (endpoint, mut mailbox) = channel::<u8, u8>();
        let handler = tokio::spawn(async move {
            let envelope = mailbox.recv().await.unwrap();
            drop(envelope);
        });

        let err = endpoint.request(1).await.unwrap_err();
        assert_eq!(err, ChannelError::NoResponse);
        handler.await.unwrap();
    }

    #[tokio::test]
    async fn closed_mailbox_is_disconnected() {
        let (endpoint, mailbox) = channel::<u8, u8>();
        drop(mailbox);

        assert!(!endpoint.is_connected());
        assert_eq!(
            endpoint.request(1).await.unwrap_err(),
            ChannelError::Disconnected
        );
        assert_eq!(endpoint.post(2).unwrap_err(), ChannelError::Disconnected);
    }

    #[test]
    fn detached_responder_never_settles_anything() {
        let responder = Responder::<u8>::detached();
        assert!(responder.is_settled());
        assert!(!responder.respond(1));
    }
}
