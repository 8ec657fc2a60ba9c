use crate::auth::{CredentialCoordinator, RefreshOutcome};
use crate::client::{ConnectError, ConnectionState, FailureKind, Transport};
use crate::error::{SessionError, SessionResult};
use crate::hub::RoomHub;
use crate::protocol::ServerEvent;
use resilience::{with_timeout, BackoffScheduler, CircuitBreaker, ReconnectPolicy};
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc::{unbounded_channel, UnboundedReceiver, UnboundedSender};
use tokio::sync::{watch, Mutex};
use tracing::{debug, error, info, warn};
use uuid::Uuid;

/// One logical client connection and its reconnect state machine.
///
/// Owns its circuit breaker and backoff scheduler; the credential
/// coordinator and hub are shared. All dependencies are injected, there is
/// no ambient global client.
///
/// Room membership is tracked locally so that an involuntary disconnect can
/// be healed: the hub forgets a dropped transport's membership, and the
/// connection re-joins every previously joined room after reconnecting.
pub struct Connection {
    client_id: Uuid,
    policy: ReconnectPolicy,
    connect_timeout: Duration,
    breaker: CircuitBreaker,
    backoff: Mutex<BackoffScheduler>,
    coordinator: Arc<CredentialCoordinator>,
    transport: Arc<dyn Transport>,
    hub: RoomHub,
    joined: Mutex<HashSet<String>>,
    outbound: UnboundedSender<ServerEvent>,
    state_tx: watch::Sender<ConnectionState>,
    close_tx: watch::Sender<bool>,
}

impl Connection {
    /// Build a connection plus the receiver on which room events arrive.
    pub fn new(
        client_id: Uuid,
        policy: ReconnectPolicy,
        connect_timeout: Duration,
        transport: Arc<dyn Transport>,
        coordinator: Arc<CredentialCoordinator>,
        hub: RoomHub,
    ) -> (Self, UnboundedReceiver<ServerEvent>) {
        let (outbound, events) = unbounded_channel();
        let (state_tx, _) = watch::channel(ConnectionState::Disconnected);
        let (close_tx, _) = watch::channel(false);
        let breaker = CircuitBreaker::new(policy.breaker_config());

        (
            Self {
                client_id,
                policy,
                connect_timeout,
                breaker,
                backoff: Mutex::new(BackoffScheduler::new()),
                coordinator,
                transport,
                hub,
                joined: Mutex::new(HashSet::new()),
                outbound,
                state_tx,
                close_tx,
            },
            events,
        )
    }

    pub fn client_id(&self) -> Uuid {
        self.client_id
    }

    pub fn state(&self) -> ConnectionState {
        *self.state_tx.borrow()
    }

    pub fn subscribe_state(&self) -> watch::Receiver<ConnectionState> {
        self.state_tx.subscribe()
    }

    pub fn breaker(&self) -> &CircuitBreaker {
        &self.breaker
    }

    /// Rooms this connection intends to be a member of (survives drops).
    pub async fn rooms(&self) -> Vec<String> {
        self.joined.lock().await.iter().cloned().collect()
    }

    /// Join a room. Tracked locally immediately; hub membership is
    /// established now when connected, otherwise on the next (re)connect.
    ///
    /// The state check and the hub join happen under the `joined` lock,
    /// which `vacate_rooms` also holds while flipping the state away from
    /// `Connected`; a join can therefore never slip a stale hub membership
    /// past a concurrent teardown.
    pub async fn join_room(&self, room_id: &str) {
        let mut joined = self.joined.lock().await;
        joined.insert(room_id.to_string());

        if self.state() == ConnectionState::Connected {
            self.hub
                .join(self.client_id, room_id, self.outbound.clone())
                .await;
        }
    }

    pub async fn leave_room(&self, room_id: &str) {
        let mut joined = self.joined.lock().await;
        joined.remove(room_id);
        self.hub.leave(self.client_id, room_id).await;
    }

    /// Explicitly close the connection. Cancels any pending backoff sleep
    /// or in-flight refresh wait; the run loop leaves all rooms and settles
    /// in `Closed`.
    pub fn close(&self) {
        let _ = self.close_tx.send(true);
    }

    /// Drive the state machine until the connection closes.
    ///
    /// Returns `Ok(())` on explicit close. Terminal failures surface as
    /// `CredentialInvalid` (session expired), `CircuitOpen` (hard stop) or
    /// `RetriesExhausted`.
    pub async fn run(&self) -> SessionResult<()> {
        let mut close_rx = self.close_tx.subscribe();
        let mut attempt: u32 = 0;
        let mut auth_pending = false;

        loop {
            if *close_rx.borrow() {
                return self.finish_closed().await;
            }

            self.set_state(ConnectionState::Connecting);

            let attempt_result = tokio::select! {
                result = with_timeout(self.connect_timeout, self.transport.connect()) => result,
                _ = close_rx.changed() => {
                    return self.finish_closed().await;
                }
            };

            let failure = match attempt_result {
                Ok(Ok(session)) => {
                    self.breaker.record_success();
                    attempt = 0;
                    auth_pending = false;
                    self.set_state(ConnectionState::Connected);
                    self.rejoin_rooms().await;
                    info!(client_id = %self.client_id, "connected");

                    tokio::select! {
                        reason = session.closed() => {
                            warn!(client_id = %self.client_id, error = %reason, "transport dropped");
                            // The hub forgot us along with the transport.
                            self.vacate_rooms(ConnectionState::Reconnecting).await;
                            reason
                        }
                        _ = close_rx.changed() => {
                            return self.finish_closed().await;
                        }
                    }
                }
                Ok(Err(e)) => e,
                Err(_) => ConnectError::Network(format!(
                    "connect attempt timed out after {:?}",
                    self.connect_timeout
                )),
            };

            let kind = failure.kind();
            if kind == FailureKind::Auth {
                auth_pending = true;
            }
            self.breaker.record_failure();
            self.set_state(ConnectionState::Reconnecting);
            attempt += 1;
            let classified = SessionError::from(failure);
            warn!(
                client_id = %self.client_id,
                error = %classified,
                ?kind,
                attempt,
                "connection failure"
            );

            if attempt >= self.policy.max_attempts {
                error!(
                    client_id = %self.client_id,
                    attempts = attempt,
                    "retry budget exhausted, giving up"
                );
                self.teardown().await;
                return Err(SessionError::RetriesExhausted(attempt));
            }

            if !self.breaker.can_attempt() {
                // Hard stop: disconnect and give up rather than idle out
                // the cooldown.
                let remaining = self.breaker.snapshot().cooldown_remaining;
                error!(
                    client_id = %self.client_id,
                    cooldown_remaining_ms = remaining.as_millis() as u64,
                    "circuit open, giving up"
                );
                self.teardown().await;
                return Err(SessionError::CircuitOpen(remaining));
            }

            if auth_pending {
                let outcome = tokio::select! {
                    outcome = self.coordinator.refresh() => outcome,
                    _ = close_rx.changed() => {
                        return self.finish_closed().await;
                    }
                };

                match outcome {
                    RefreshOutcome::Refreshed => {
                        auth_pending = false;
                    }
                    RefreshOutcome::TransientFailure => {
                        // Retry later with the auth flag still set; the next
                        // pass refreshes again before reconnecting.
                        warn!(client_id = %self.client_id, "refresh unavailable, will retry");
                    }
                    RefreshOutcome::Invalid => {
                        self.breaker.record_failure();
                        error!(client_id = %self.client_id, "session expired");
                        self.teardown().await;
                        return Err(SessionError::CredentialInvalid);
                    }
                }
            }

            let delay = {
                let mut backoff = self.backoff.lock().await;
                backoff.delay_for(
                    attempt - 1,
                    &self.policy.delay_table,
                    self.policy.jitter_factor,
                )
            };
            debug!(client_id = %self.client_id, delay_ms = delay.as_millis() as u64, "backing off");

            tokio::select! {
                _ = tokio::time::sleep(delay) => {}
                _ = close_rx.changed() => {
                    return self.finish_closed().await;
                }
            }
        }
    }

    async fn rejoin_rooms(&self) {
        let joined = self.joined.lock().await;
        for room_id in joined.iter() {
            self.hub
                .join(self.client_id, room_id, self.outbound.clone())
                .await;
            debug!(client_id = %self.client_id, %room_id, "rejoined room");
        }
    }

    /// Enter the next state and drop all hub memberships as one step with
    /// respect to `join_room`: the state flips while the `joined` lock is
    /// held, so no concurrent join can observe `Connected` after the hub
    /// memberships here have already been removed.
    async fn vacate_rooms(&self, next: ConnectionState) {
        let joined = self.joined.lock().await;
        self.set_state(next);
        for room_id in joined.iter() {
            self.hub.leave(self.client_id, room_id).await;
        }
    }

    async fn teardown(&self) {
        self.vacate_rooms(ConnectionState::Closed).await;
    }

    async fn finish_closed(&self) -> SessionResult<()> {
        info!(client_id = %self.client_id, "connection closed");
        self.teardown().await;
        Ok(())
    }

    fn set_state(&self, state: ConnectionState) {
        self.state_tx.send_replace(state);
    }
}
