//! Async wrapper around [`MeshStack`]. Shares the stack behind a mutex and runs a tokio task that
//! fires its timers, so the application only has to feed PDUs in and send messages.
use crate::address::Address;
use crate::control::ControlPDU;
use crate::mesh::NetKeyIndex;
use crate::proxy::FilterType;
use crate::stack::bearer::{Bearer, StatusSink};
use crate::stack::directory::NodeDirectory;
use crate::stack::messages::OutgoingMessage;
use crate::stack::{MeshStack, RecvError, SendError};
use alloc::sync::Arc;
use core::ops::DerefMut;
use futures_util::future::{select, Either};
use tokio::sync::{mpsc, Mutex};
use tokio::time;

pub struct FullStack<D: NodeDirectory, B: Bearer, S: StatusSink> {
    stack: Arc<Mutex<MeshStack<D, B, S>>>,
    wake: mpsc::UnboundedSender<()>,
}
impl<D, B, S> FullStack<D, B, S>
where
    D: NodeDirectory + Send + 'static,
    B: Bearer + Send + 'static,
    S: StatusSink + Send + 'static,
{
    /// Takes ownership of `stack` and spawns its timer task. Must be called inside a tokio
    /// runtime. The task exits once the `FullStack` is dropped.
    pub fn new(stack: MeshStack<D, B, S>) -> Self {
        let logger = stack.logger().new(slog::o!("task" => "timers"));
        let stack = Arc::new(Mutex::new(stack));
        let (wake, rx) = mpsc::unbounded_channel();
        tokio::spawn(timer_loop(stack.clone(), rx, logger));
        Self { stack, wake }
    }
    fn wake_timers(&self) {
        // Only fails once the timer task is gone.
        let _ = self.wake.send(());
    }
    pub async fn send(&self, message: OutgoingMessage) -> Result<(), SendError> {
        let result = self.stack.lock().await.send(message);
        self.wake_timers();
        result
    }
    pub async fn send_control(
        &self,
        dst: Address,
        net_key_index: NetKeyIndex,
        pdu: &ControlPDU,
    ) -> Result<(), SendError> {
        let result = self
            .stack
            .lock()
            .await
            .send_control(dst, net_key_index, pdu);
        self.wake_timers();
        result
    }
    pub async fn set_filter_type(
        &self,
        net_key_index: NetKeyIndex,
        filter_type: FilterType,
    ) -> Result<(), SendError> {
        let result = self
            .stack
            .lock()
            .await
            .set_filter_type(net_key_index, filter_type);
        self.wake_timers();
        result
    }
    pub async fn add_filter_addresses(
        &self,
        net_key_index: NetKeyIndex,
        addresses: &[Address],
    ) -> Result<(), SendError> {
        let result = self
            .stack
            .lock()
            .await
            .add_filter_addresses(net_key_index, addresses);
        self.wake_timers();
        result
    }
    pub async fn remove_filter_addresses(
        &self,
        net_key_index: NetKeyIndex,
        addresses: &[Address],
    ) -> Result<(), SendError> {
        let result = self
            .stack
            .lock()
            .await
            .remove_filter_addresses(net_key_index, addresses);
        self.wake_timers();
        result
    }
    /// Feeds one Proxy PDU from the bearer into the stack.
    pub async fn receive(&self, data: &[u8]) -> Result<(), RecvError> {
        let result = self.stack.lock().await.receive(data);
        self.wake_timers();
        result
    }
    pub async fn stack_with<R>(&self, func: impl FnOnce(&mut MeshStack<D, B, S>) -> R) -> R {
        let result = func(self.stack.lock().await.deref_mut());
        self.wake_timers();
        result
    }
}
async fn timer_loop<D, B, S>(
    stack: Arc<Mutex<MeshStack<D, B, S>>>,
    mut wake: mpsc::UnboundedReceiver<()>,
    logger: slog::Logger,
) where
    D: NodeDirectory,
    B: Bearer,
    S: StatusSink,
{
    loop {
        let deadline = stack.lock().await.next_deadline();
        match deadline {
            Some(deadline) => {
                let delay = time::delay_until(time::Instant::from_std(deadline));
                let woken = wake.recv();
                futures_util::pin_mut!(delay);
                futures_util::pin_mut!(woken);
                match select(delay, woken).await {
                    Either::Left(((), _)) => (),
                    Either::Right((Some(()), _)) => continue,
                    Either::Right((None, _)) => break,
                }
            }
            None => match wake.recv().await {
                Some(()) => continue,
                None => break,
            },
        }
        let timeouts = stack.lock().await.poll_timers(std::time::Instant::now());
        for timeout in timeouts {
            slog::info!(logger, "timed_out"; "dst" => timeout.0.value());
        }
    }
    slog::debug!(logger, "timer_task_stopped");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::access::AccessPayload;
    use crate::config::StackConfig;
    use crate::stack::messages::MessageKeys;
    use crate::stack::tests::{
        client_address, fixture, server_address, RecordingBearer, RecordingSink,
    };
    use crate::stack::transactions::Phase;
    use core::time::Duration;

    #[tokio::test]
    async fn test_timer_task_times_out_transaction() {
        let (network, app_key_index) = fixture();
        let mut config = StackConfig::new(client_address());
        config.ack_timeout_ms = 20;
        let stack = MeshStack::new(
            config,
            network,
            RecordingBearer::default(),
            RecordingSink::default(),
            crate::mesh::SequenceNumber::new(0),
            &slog::Logger::root(slog::Discard, slog::o!()),
        );
        let full = FullStack::new(stack);
        let dst = Address::Unicast(server_address());
        let payload = AccessPayload::new(crate::access::Opcode::sig(0x8201).unwrap(), &[0; 20]);
        full.send(OutgoingMessage::new(dst, MessageKeys::App(app_key_index), payload))
            .await
            .unwrap();
        assert_eq!(
            full.stack_with(|s| s.transaction_phase(dst)).await,
            Some(Phase::AwaitingAck)
        );
        time::delay_for(Duration::from_millis(200)).await;
        let (phase, failed) = full
            .stack_with(|s| (s.transaction_phase(dst), s.sink().failed.clone()))
            .await;
        assert_eq!(phase, Some(Phase::Idle));
        assert_eq!(failed, vec![(dst, true)]);
    }
}
