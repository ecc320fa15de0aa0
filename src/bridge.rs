//! Messaging with the host shell over named channels.

use crate::model::Track;
use anyhow::{Context, Result};
use crossbeam_channel::{Receiver, Sender, TryRecvError, unbounded};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, info, warn};

pub const MINIMIZE: &str = "mainWindow:minimize";
pub const CLOSE: &str = "mainWindow:close";
pub const SET_TITLE: &str = "mainWindow:setTitle";
pub const SET_PROGRESS_BAR: &str = "mainWindow:setProgressBar";
pub const OPEN_FILES: &str = "file:open";
pub const OPEN_FILES_REPLY: &str = "file:open=>reply";

#[derive(Debug, Clone, PartialEq)]
pub enum OutboundEvent {
    Minimize,
    Close,
    SetTitle(String),
    SetProgressBar(f64),
    OpenFiles,
}

#[derive(Debug, Clone, PartialEq)]
pub enum InboundEvent {
    FilesOpened(Vec<Track>),
}

/// One message on the wire: `{"channel": ..., "payload": ...}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WireMessage {
    pub channel: String,
    #[serde(default)]
    pub payload: Value,
}

impl OutboundEvent {
    pub fn channel(&self) -> &'static str {
        match self {
            Self::Minimize => MINIMIZE,
            Self::Close => CLOSE,
            Self::SetTitle(_) => SET_TITLE,
            Self::SetProgressBar(_) => SET_PROGRESS_BAR,
            Self::OpenFiles => OPEN_FILES,
        }
    }

    pub fn to_wire(&self) -> WireMessage {
        let payload = match self {
            Self::SetTitle(title) => Value::from(title.as_str()),
            Self::SetProgressBar(progress) => Value::from(*progress),
            Self::OpenFiles => serde_json::json!({ "flag": "open-files" }),
            Self::Minimize | Self::Close => Value::Null,
        };
        WireMessage {
            channel: self.channel().to_string(),
            payload,
        }
    }
}

impl InboundEvent {
    pub fn to_wire(&self) -> Result<WireMessage> {
        match self {
            Self::FilesOpened(tracks) => Ok(WireMessage {
                channel: OPEN_FILES_REPLY.to_string(),
                payload: serde_json::to_value(tracks)?,
            }),
        }
    }

    pub fn from_wire(message: WireMessage) -> Result<Self> {
        match message.channel.as_str() {
            OPEN_FILES_REPLY => {
                let tracks: Vec<Track> = if message.payload.is_null() {
                    Vec::new()
                } else {
                    serde_json::from_value(message.payload)
                        .context("malformed file:open reply payload")?
                };
                Ok(Self::FilesOpened(tracks))
            }
            other => anyhow::bail!("unknown inbound channel {other}"),
        }
    }
}

pub trait HostBridge {
    fn send(&mut self, event: OutboundEvent) -> Result<()>;
    fn try_recv(&mut self) -> Option<InboundEvent>;
}

/// Renderer side of an in-process channel pair.
pub struct ChannelBridge {
    outbound: Sender<WireMessage>,
    inbound: Receiver<WireMessage>,
}

/// Shell side of a [`ChannelBridge`].
pub struct HostEnd {
    pub outbound: Receiver<WireMessage>,
    pub inbound: Sender<WireMessage>,
}

impl ChannelBridge {
    pub fn pair() -> (Self, HostEnd) {
        let (out_tx, out_rx) = unbounded();
        let (in_tx, in_rx) = unbounded();
        (
            Self {
                outbound: out_tx,
                inbound: in_rx,
            },
            HostEnd {
                outbound: out_rx,
                inbound: in_tx,
            },
        )
    }
}

impl HostBridge for ChannelBridge {
    fn send(&mut self, event: OutboundEvent) -> Result<()> {
        self.outbound
            .send(event.to_wire())
            .map_err(|_| anyhow::anyhow!("host shell disconnected"))
    }

    fn try_recv(&mut self) -> Option<InboundEvent> {
        loop {
            match self.inbound.try_recv() {
                Ok(message) => match InboundEvent::from_wire(message) {
                    Ok(event) => return Some(event),
                    Err(err) => warn!("dropping inbound message: {err:#}"),
                },
                Err(TryRecvError::Empty | TryRecvError::Disconnected) => return None,
            }
        }
    }
}

impl HostEnd {
    pub fn drain(&self) -> Vec<WireMessage> {
        self.outbound.try_iter().collect()
    }

    pub fn reply(&self, event: &InboundEvent) -> Result<()> {
        self.inbound
            .send(event.to_wire()?)
            .map_err(|_| anyhow::anyhow!("renderer disconnected"))
    }
}

/// Bridge for running without a shell: outbound messages are logged.
#[derive(Debug, Default)]
pub struct LogBridge {
    last_progress_percent: Option<u8>,
}

impl HostBridge for LogBridge {
    fn send(&mut self, event: OutboundEvent) -> Result<()> {
        match &event {
            OutboundEvent::SetTitle(title) => info!("{title}"),
            OutboundEvent::SetProgressBar(progress) => {
                let percent = (progress.clamp(0.0, 1.0) * 100.0).round() as u8;
                if self.last_progress_percent != Some(percent) {
                    self.last_progress_percent = Some(percent);
                    debug!("progress {percent}%");
                }
            }
            other => debug!(channel = other.channel(), "host message"),
        }
        Ok(())
    }

    fn try_recv(&mut self) -> Option<InboundEvent> {
        None
    }
}
