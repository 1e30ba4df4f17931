//! Command channels.
//!
//! Two peers implement [`CommandChannel`]: the local [`hub::ObserverHub`]
//! and the remote [`broker::BrokerChannel`].  Each owns its transport, its
//! [`link::Link`] state machine and its decoder.  Neither owns state: every
//! decoded command goes through a [`CommandDelegate`] and is applied before
//! the next message is read.
//!
//! ```text
//!   transport ──▶ decode ──▶ CommandDelegate::apply ──▶ AppService
//!   transport ◀── wire::encode_snapshot ◀── Controller (per cycle)
//! ```

pub mod broker;
pub mod hub;
pub mod link;
pub mod wire;

use crate::app::commands::ChannelId;
use crate::app::ports::CommandDelegate;

pub use link::LinkState;

/// Shared behaviour of both command channels.
pub trait CommandChannel {
    fn id(&self) -> ChannelId;

    /// One bounded pass: at most one connect attempt, then at most the
    /// configured number of inbound messages.  Never blocks.
    fn service(&mut self, now_ms: u64, delegate: &mut impl CommandDelegate);

    /// Deliver an encoded snapshot to every subscriber.  A no-op while the
    /// link is down.
    fn broadcast(&mut self, payload: &str);

    fn link_state(&self) -> LinkState;

    fn is_connected(&self) -> bool {
        self.link_state() == LinkState::Connected
    }
}
