//! Stateless handlers that pick fields out of an envelope and forward
//! them to the collector.

use std::sync::Arc;

use livewire_protocol::{Command, Envelope};
use serde_json::{json, Value};
use tracing::{debug, info};

use crate::{EnvelopeRouter, ForwardContext, Handler, HandlerError, KeywordFilter};

// ---------------------------------------------------------------------------
// Danmaku
// ---------------------------------------------------------------------------

/// `DANMU_MSG`: a chat comment.
///
/// The comment lives in the top-level `info` array: `info[1]` is the
/// text and `info[2][1]` the sender's name. Comments containing a
/// keyword go to the ticket endpoint; comments mentioning the robot go
/// to the setting endpoint. A comment can do both.
pub struct DanmakuHandler {
    ctx: Arc<ForwardContext>,
    filter: Arc<KeywordFilter>,
}

impl DanmakuHandler {
    pub fn new(ctx: Arc<ForwardContext>, filter: Arc<KeywordFilter>) -> Self {
        Self { ctx, filter }
    }
}

impl Handler for DanmakuHandler {
    fn handle(&self, envelope: &Envelope) -> Result<(), HandlerError> {
        let missing = |field| HandlerError::MissingField {
            command: envelope.command.to_string(),
            field,
        };
        let info = envelope
            .body
            .get("info")
            .and_then(Value::as_array)
            .filter(|info| info.len() > 2)
            .ok_or_else(|| missing("info"))?;
        let comment = info[1].as_str().ok_or_else(|| missing("info[1]"))?;
        let user = info[2].get(1).and_then(Value::as_str).unwrap_or_default();

        info!(room = %self.ctx.room_id, "[{user}] {comment}");

        let payload = || {
            json!({
                "room_id": self.ctx.room_id,
                "danmaku": comment,
                "raw_message": envelope.body,
            })
        };
        if self.filter.matches_keyword(comment) {
            debug!(comment, "keyword matched");
            self.ctx
                .forwarder
                .forward(&self.ctx.endpoints.ticket, payload())?;
        }
        if self.filter.addresses_robot(comment) {
            debug!(comment, "robot command");
            self.ctx
                .forwarder
                .forward(&self.ctx.endpoints.setting, payload())?;
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Gift
// ---------------------------------------------------------------------------

/// `SEND_GIFT`: someone sent a gift.
///
/// Missing fields default to zero / empty. When `data.sender_uinfo.base`
/// is present, the sender's uid and name are taken from `sender_uinfo`
/// instead of the flat fields.
pub struct GiftHandler {
    ctx: Arc<ForwardContext>,
}

impl GiftHandler {
    pub fn new(ctx: Arc<ForwardContext>) -> Self {
        Self { ctx }
    }
}

impl Handler for GiftHandler {
    fn handle(&self, envelope: &Envelope) -> Result<(), HandlerError> {
        let data = envelope.data();
        if !data.is_object() {
            return Err(HandlerError::MissingField {
                command: envelope.command.to_string(),
                field: "data",
            });
        }

        let mut uid = data.get("uid").cloned().unwrap_or(json!(0));
        let mut uname = str_field(data, "uname");
        let gift_id = data.get("giftId").cloned().unwrap_or(json!(0));
        let gift_name = str_field(data, "giftName");
        let price = data.get("price").cloned().unwrap_or(json!(0));

        let sender = data.get("sender_uinfo");
        if let Some(base) = sender.and_then(|s| s.get("base")) {
            if let Some(sender_uid) = sender.and_then(|s| s.get("uid")) {
                uid = sender_uid.clone();
            }
            if let Some(name) = base.get("name").and_then(Value::as_str) {
                uname = name.to_string();
            }
        }

        info!(room = %self.ctx.room_id, %uname, %gift_name, %price, "gift received");

        self.ctx.forwarder.forward(
            &self.ctx.endpoints.money,
            json!({
                "room_id": self.ctx.room_id,
                "uid": uid,
                "uname": uname,
                "gift_id": gift_id,
                "gift_name": gift_name,
                "price": price,
            }),
        )
    }
}

fn str_field(data: &Value, key: &str) -> String {
    data.get(key)
        .and_then(Value::as_str)
        .unwrap_or_default()
        .to_string()
}

// ---------------------------------------------------------------------------
// Live room list
// ---------------------------------------------------------------------------

/// `STOP_LIVE_ROOM_LIST`: forwards the whole `data` to the spider endpoint.
pub struct LiveRoomListHandler {
    ctx: Arc<ForwardContext>,
}

impl LiveRoomListHandler {
    pub fn new(ctx: Arc<ForwardContext>) -> Self {
        Self { ctx }
    }
}

impl Handler for LiveRoomListHandler {
    fn handle(&self, envelope: &Envelope) -> Result<(), HandlerError> {
        let data = match envelope.data() {
            Value::Null => json!({}),
            other => other.clone(),
        };
        debug!(room = %self.ctx.room_id, "forwarding stopped-room list");
        self.ctx.forwarder.forward(
            &self.ctx.endpoints.live_room_spider,
            json!({
                "room_id": self.ctx.room_id,
                "stop_live_room_list": data,
            }),
        )
    }
}

// ---------------------------------------------------------------------------
// Registration
// ---------------------------------------------------------------------------

impl EnvelopeRouter {
    /// Wires in the stock forwarders.
    ///
    /// Danmaku and gift handlers are one-shot. The live-room-list
    /// handler is persistent and only registered when `spider` is on.
    pub fn register_forwarders(
        &mut self,
        ctx: Arc<ForwardContext>,
        filter: KeywordFilter,
        spider: bool,
    ) {
        let filter = Arc::new(filter);
        {
            let ctx = Arc::clone(&ctx);
            self.register_one_shot(Command::Danmaku, move || {
                DanmakuHandler::new(Arc::clone(&ctx), Arc::clone(&filter))
            });
        }
        {
            let ctx = Arc::clone(&ctx);
            self.register_one_shot(Command::Gift, move || GiftHandler::new(Arc::clone(&ctx)));
        }
        if spider {
            self.register_persistent(Command::StopLiveRoomList, || LiveRoomListHandler::new(ctx));
        }
    }
}
