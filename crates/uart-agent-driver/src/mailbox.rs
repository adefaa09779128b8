//! 单槽邮箱（Mailbox）
//!
//! 读线程与处理线程之间的帧交接通道：容量为 1 的有界通道，
//! **满时覆盖旧帧（drop-oldest）**。任意时刻最多只有一帧待处理；
//! 处理线程来不及取走的帧会被新帧替换并永久丢弃。
//!
//! 帧的所有权在 `post` / `recv` 时整体转移，不存在两个线程同时持有同一帧。
//!
//! ```text
//! reader ── post(A) ──► [A]
//! reader ── post(B) ──► [B]   (A 被覆盖，post 返回 Some(A))
//! processor ◄── recv ── [ ]   (拿到 B)
//! ```

use crossbeam_channel::{Receiver, RecvTimeoutError, Sender, TrySendError};
use std::time::Duration;

/// 一帧原始字节（以 EOT 结尾）
pub type RawFrame = Vec<u8>;

/// 创建一对邮箱端点
pub fn mailbox() -> (MailboxSender, MailboxReceiver) {
    let (tx, rx) = crossbeam_channel::bounded(1);
    (
        MailboxSender {
            tx,
            evict: rx.clone(),
        },
        MailboxReceiver { rx },
    )
}

/// 邮箱写端（唯一生产者，不可 Clone）
///
/// 持有一个接收端克隆用于驱逐旧帧。由于只有一个生产者，
/// 驱逐后再次 `try_send` 必然成功（处理线程只会取走，不会放入）。
pub struct MailboxSender {
    tx: Sender<RawFrame>,
    evict: Receiver<RawFrame>,
}

impl MailboxSender {
    /// 投递一帧，返回被覆盖的旧帧（如果有）
    pub fn post(&self, frame: RawFrame) -> Option<RawFrame> {
        let mut frame = frame;
        let mut displaced = None;
        loop {
            match self.tx.try_send(frame) {
                Ok(()) => return displaced,
                Err(TrySendError::Full(rejected)) => {
                    frame = rejected;
                    // 处理线程可能刚好取走了旧帧，此时 try_recv 为空，直接重试
                    if let Ok(old) = self.evict.try_recv() {
                        displaced = Some(old);
                    }
                },
                // 写端自己持有接收端，通道不会断开
                Err(TrySendError::Disconnected(_)) => return displaced,
            }
        }
    }
}

/// 邮箱读端
pub struct MailboxReceiver {
    rx: Receiver<RawFrame>,
}

impl MailboxReceiver {
    /// 阻塞等待一帧，最长 `timeout`
    ///
    /// 写端被 drop 后返回 `RecvTimeoutError::Disconnected`。
    pub fn recv_timeout(&self, timeout: Duration) -> Result<RawFrame, RecvTimeoutError> {
        self.rx.recv_timeout(timeout)
    }

    /// 非阻塞取出当前待处理帧
    pub fn try_take(&self) -> Option<RawFrame> {
        self.rx.try_recv().ok()
    }

    /// 是否有待处理帧
    pub fn is_pending(&self) -> bool {
        !self.rx.is_empty()
    }
}
