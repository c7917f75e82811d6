use async_trait::async_trait;
use tokio::sync::mpsc;

use super::SubscriberChannel;
use crate::error::SendError;
use crate::models::{LinesUpdate, SportLine};

/// In-process stream backed by a bounded mpsc queue.
///
/// A full queue makes `send` wait; the dispatcher's send timeout bounds it.
#[derive(Clone)]
pub struct StreamChannel {
    name: String,
    tx: mpsc::Sender<LinesUpdate>,
}

impl StreamChannel {
    pub fn new(name: impl Into<String>, tx: mpsc::Sender<LinesUpdate>) -> Self {
        Self {
            name: name.into(),
            tx,
        }
    }

    /// Channel plus the receiving half handed to the consumer.
    pub fn pair(name: impl Into<String>, buffer: usize) -> (Self, mpsc::Receiver<LinesUpdate>) {
        let (tx, rx) = mpsc::channel(buffer.max(1));
        (Self::new(name, tx), rx)
    }
}

#[async_trait]
impl SubscriberChannel for StreamChannel {
    async fn send(&self, lines: &[SportLine]) -> Result<(), SendError> {
        self.tx
            .send(LinesUpdate::from_lines(lines))
            .await
            .map_err(|_| SendError::Closed)
    }

    fn describe(&self) -> String {
        format!("stream:{}", self.name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::SportType;

    #[tokio::test]
    async fn test_send_translates_batch() {
        let (channel, mut rx) = StreamChannel::pair("client-1", 4);
        let lines = vec![
            SportLine::new(SportType::Baseball, 0.744).unwrap(),
            SportLine::new(SportType::Soccer, 1.9).unwrap(),
        ];

        channel.send(&lines).await.unwrap();

        let update = rx.recv().await.unwrap();
        assert_eq!(update.sports.len(), 2);
        assert_eq!(update.sports[0].sport_type, "BASEBALL");
        assert_eq!(update.sports[0].line, 0.744);
        assert_eq!(update.sports[1].sport_type, "SOCCER");
    }

    #[tokio::test]
    async fn test_send_fails_once_receiver_dropped() {
        let (channel, rx) = StreamChannel::pair("client-2", 1);
        drop(rx);

        let err = channel.send(&[]).await.unwrap_err();
        assert!(matches!(err, SendError::Closed));
        assert_eq!(channel.describe(), "stream:client-2");
    }
}
