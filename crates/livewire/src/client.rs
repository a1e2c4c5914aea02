//! The live client: connect, authenticate, keep alive, route.
//!
//! The flow is:
//!   1. Open the stream connection
//!   2. Send the auth frame (version 1, operation 7)
//!   3. Loop: heartbeat on a timer, decode every inbound message, route
//!      every envelope
//!
//! Decoding and routing happen inline in the loop, in wire order. Only
//! the battle deadlines and collector POSTs run on other tasks.

use std::sync::Arc;

use livewire_battle::ResultReporter;
use livewire_protocol::{auth_packet, heartbeat_packet, AuthBody, Frame, FrameDecoder};
use livewire_router::{EnvelopeRouter, ForwardContext, Forwarder};
use livewire_transport::{Connection, TransportError, WebSocketConnection};
use tokio::time::{self, MissedTickBehavior};
use tracing::{debug, info, trace, warn};

use crate::{HttpCollector, LivewireConfig, LivewireError};

/// Counts of what one inbound message produced.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MessageStats {
    /// Envelopes handed to the router.
    pub routed: usize,
    /// Decode errors (each logged).
    pub errors: usize,
    /// Latest popularity gauge seen in the message, if any.
    pub popularity: Option<u32>,
}

/// Connects to one room and routes its events until the stream ends.
pub struct LiveClient {
    config: LivewireConfig,
    router: EnvelopeRouter,
}

impl LiveClient {
    /// Builds a client that reports and forwards over HTTP.
    pub fn new(config: LivewireConfig) -> Result<Self, LivewireError> {
        let collector = Arc::new(HttpCollector::new(&config.collector)?);
        Ok(Self::with_collaborators(
            config,
            collector.clone(),
            collector,
        ))
    }

    /// Builds a client around any reporter and forwarder.
    pub fn with_collaborators(
        config: LivewireConfig,
        reporter: Arc<dyn ResultReporter>,
        forwarder: Arc<dyn Forwarder>,
    ) -> Self {
        let mut router = EnvelopeRouter::new(config.room_id, config.battle.clone(), reporter);
        let ctx = Arc::new(ForwardContext::new(
            config.room_id,
            config.collector.endpoints.clone(),
            forwarder,
        ));
        router.register_forwarders(ctx, config.features.keyword_filter(), config.features.spider);
        Self { config, router }
    }

    pub fn config(&self) -> &LivewireConfig {
        &self.config
    }

    pub fn router(&self) -> &EnvelopeRouter {
        &self.router
    }

    /// Mutable access, e.g. to register extra handlers before running.
    pub fn router_mut(&mut self) -> &mut EnvelopeRouter {
        &mut self.router
    }

    /// Connects over WebSocket and runs until the server closes.
    pub async fn run(&mut self) -> Result<(), LivewireError> {
        let conn = WebSocketConnection::connect(&self.config.stream.url).await?;
        let result = self.run_on(&conn).await;
        if let Err(e) = conn.close().await {
            debug!(error = %e, "close after run failed");
        }
        result
    }

    /// Runs the auth + heartbeat + routing loop on an open connection.
    ///
    /// Returns `Ok(())` when the server closes the stream, or the first
    /// send/receive error.
    pub async fn run_on<C>(&mut self, conn: &C) -> Result<(), LivewireError>
    where
        C: Connection<Error = TransportError>,
    {
        let conn_id = conn.id();
        let stream = &self.config.stream;

        let mut auth = AuthBody::new(stream.uid, self.config.room_id.0, stream.token.clone());
        auth.buvid = stream.buvid.clone();
        conn.send(&auth_packet(&auth)?).await?;
        info!(%conn_id, room = %self.config.room_id, "auth sent");

        let heartbeat = heartbeat_packet();
        let mut ticker = time::interval(stream.heartbeat_interval());
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    trace!(%conn_id, "heartbeat");
                    if let Err(e) = conn.send(&heartbeat).await {
                        warn!(%conn_id, error = %e, "heartbeat failed, stopping");
                        return Err(e.into());
                    }
                }
                msg = conn.recv() => match msg? {
                    Some(bytes) => {
                        self.handle_message(&bytes);
                    }
                    None => {
                        info!(%conn_id, "stream closed by server");
                        return Ok(());
                    }
                },
            }
        }
    }

    /// Decodes one inbound message and routes every envelope in it.
    ///
    /// Decode errors are logged and counted; they never stop the loop.
    pub fn handle_message(&mut self, bytes: &[u8]) -> MessageStats {
        let mut stats = MessageStats::default();
        for item in FrameDecoder::new(bytes) {
            match item {
                Ok(Frame::Event(envelope)) => {
                    stats.routed += 1;
                    let dispatch = self.router.route(&envelope);
                    trace!(command = %envelope.command, ?dispatch, "routed");
                }
                Ok(Frame::Popularity(value)) => {
                    debug!(popularity = value, "popularity");
                    stats.popularity = Some(value);
                }
                Err(e) => {
                    stats.errors += 1;
                    warn!(error = %e, "decode failed");
                }
            }
        }
        stats
    }
}
