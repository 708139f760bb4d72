//! Helpers shared by the unit tests of this crate.

use std::time::Duration;

use axum::extract::ws::Message;
use tokio::sync::mpsc;
use wayfarer_common::{Block, BlockHash, BlockNumber, Extrinsic, FinalisationInfo, Header};

use crate::websocket::sender::FrameSender;

/// Receives the frames queued through a [FrameSender].
pub struct Frames {
    rx: mpsc::Receiver<Message>,
}

pub fn frame_channel() -> (FrameSender, Frames) {
    let (tx, rx) = mpsc::channel(100);
    (FrameSender::new(tx), Frames { rx })
}

impl Frames {
    /// The next frame without its trailing newline.
    pub async fn next_text(&mut self) -> String {
        let message = tokio::time::timeout(Duration::from_secs(2), self.rx.recv())
            .await
            .expect("Timed out waiting for frame")
            .expect("Frame channel closed");
        match message {
            Message::Text(text) => text
                .strip_suffix('\n')
                .expect("Frame is not newline terminated")
                .to_owned(),
            other => panic!("Unexpected message {other:?}"),
        }
    }

    pub async fn next(&mut self) -> serde_json::Value {
        serde_json::from_str(&self.next_text().await).unwrap()
    }

    pub async fn expect_none(&mut self) {
        let result = tokio::time::timeout(Duration::from_millis(100), self.rx.recv()).await;
        assert!(result.is_err(), "Unexpected frame {result:?}");
    }
}

pub fn hash(byte: u8) -> BlockHash {
    BlockHash::from_bytes([byte; 32])
}

pub fn block(number: u64, hash_byte: u8, body: Vec<Extrinsic>) -> Block {
    Block {
        header: Header::builder()
            .with_number(BlockNumber::new(number))
            .finalize_with_hash(hash(hash_byte)),
        body,
    }
}

pub fn finalisation(number: u64, hash_byte: u8) -> FinalisationInfo {
    FinalisationInfo {
        header: block(number, hash_byte, vec![]).header,
        round: 1,
        set_id: 0,
    }
}

/// Waits until `condition` holds, failing the test after two seconds.
pub async fn wait_for(mut condition: impl FnMut() -> bool) {
    tokio::time::timeout(Duration::from_secs(2), async {
        while !condition() {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    })
    .await
    .expect("Condition not met in time");
}
