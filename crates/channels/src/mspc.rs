// Multi-producer multi-consumer channel wrapper over async_channel, shared
// by the admission gate and the relay.

use thiserror::Error;

pub type Result<T> = anyhow::Result<T, ChannelError>;

#[derive(Error, Debug)]
pub enum ChannelError {
    #[error("Channel has being closed or not initialized")]
    Closed,

    #[error("Failed to send message due to: {0}")]
    SendFailed(String),

    #[error("Channel is at capacity")]
    Full,

    #[error("Channel sent nothing, possibly closed")]
    ReceivedNoData,
}

/// `create_bounded` returns a channel holding at most `capacity` messages;
/// senders suspend (or fail with [`ChannelError::Full`] on `try_send`) while
/// it is full. A capacity of zero is raised to one.
pub fn create_bounded<T>(capacity: usize) -> (SendChannel<T>, ReceiveChannel<T>) {
    let (tx, rx) = async_channel::bounded::<T>(capacity.max(1));
    (SendChannel::new(tx), ReceiveChannel::new(rx))
}

pub struct SendChannel<T> {
    src: Option<async_channel::Sender<T>>,
}

impl<T> Clone for SendChannel<T> {
    fn clone(&self) -> Self {
        Self {
            src: self.src.clone(),
        }
    }
}

impl<T> SendChannel<T> {
    fn new(src: async_channel::Sender<T>) -> Self {
        Self { src: Some(src) }
    }

    pub fn pending_message_count(&self) -> Result<usize> {
        match &self.src {
            Some(src) => Ok(src.len()),
            None => Err(ChannelError::Closed),
        }
    }

    /// `close` drops this handle's side of the channel. Receivers observe
    /// [`ChannelError::Closed`] once every sender is gone and the buffered
    /// messages are drained.
    pub fn close(&mut self) -> Result<()> {
        match self.src.take() {
            Some(channel) => {
                drop(channel);
                Ok(())
            }
            None => Err(ChannelError::Closed),
        }
    }

    pub async fn async_send(&mut self, t: T) -> Result<()> {
        match &self.src {
            Some(src) => src
                .send(t)
                .await
                .map_err(|_| self.close_channel_error()),
            None => Err(ChannelError::Closed),
        }
    }

    pub fn try_send(&mut self, t: T) -> Result<()> {
        match &self.src {
            Some(src) => match src.try_send(t) {
                Ok(()) => Ok(()),
                Err(async_channel::TrySendError::Full(_)) => Err(ChannelError::Full),
                Err(async_channel::TrySendError::Closed(_)) => Err(self.close_channel_error()),
            },
            None => Err(ChannelError::Closed),
        }
    }

    fn close_channel_error(&self) -> ChannelError {
        ChannelError::SendFailed(String::from("all receivers were dropped"))
    }
}

pub struct ReceiveChannel<T> {
    src: Option<async_channel::Receiver<T>>,
}

impl<T> Clone for ReceiveChannel<T> {
    fn clone(&self) -> Self {
        Self {
            src: self.src.clone(),
        }
    }
}

impl<T> ReceiveChannel<T> {
    fn new(src: async_channel::Receiver<T>) -> Self {
        Self { src: Some(src) }
    }

    pub async fn async_receive(&mut self) -> Result<T> {
        match &self.src {
            None => Err(ChannelError::Closed),
            Some(src) => match src.recv().await {
                Ok(item) => Ok(item),
                Err(_) => self.close_channel(),
            },
        }
    }

    pub fn try_receive(&mut self) -> Result<T> {
        match &self.src {
            None => Err(ChannelError::Closed),
            Some(src) => match src.try_recv() {
                Ok(item) => Ok(item),
                Err(async_channel::TryRecvError::Closed) => self.close_channel(),
                Err(async_channel::TryRecvError::Empty) => Err(ChannelError::ReceivedNoData),
            },
        }
    }

    fn close_channel(&mut self) -> Result<T> {
        // remove the channel from the underlying slot
        _ = self.src.take();
        Err(ChannelError::Closed)
    }
}
