//
// Copyright 2026 Hans W. Uhlig. All Rights Reserved.
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//      http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.
//

//! Inbound message pipeline.
//!
//! Decoded [`ChannelMessage`]s pass through an ordered chain of
//! [`MessageHandler`] stages. A stage either consumes the message (returns
//! `None`) or passes it along unchanged for the next stage. Messages that
//! fall off the end of the chain are logged and dropped; an unknown handler
//! code must never tear down the connection.

use crate::channel::ChannelMessage;
use tracing::debug;

/// One stage of the inbound pipeline.
///
/// `handle` returns `None` to consume the message or `Some` to pass it on.
/// Stages run on the connection's read loop, so they must hand off any real
/// work (handler dispatch, blocking I/O) to a task instead of doing it
/// inline.
pub trait MessageHandler: Send + Sync {
    /// Offers a message to this stage.
    fn handle(&self, message: ChannelMessage) -> Option<ChannelMessage>;
}

/// Ordered chain of [`MessageHandler`] stages.
pub struct MessagePipeline {
    handlers: Vec<Box<dyn MessageHandler>>,
}

impl MessagePipeline {
    /// Creates a pipeline from an ordered set of stages.
    ///
    /// # Panics
    ///
    /// Panics if `handlers` is empty; a connection with no inbound stages is
    /// a wiring bug.
    #[must_use]
    pub fn new(handlers: Vec<Box<dyn MessageHandler>>) -> Self {
        assert!(
            !handlers.is_empty(),
            "message pipeline requires at least one handler"
        );
        Self { handlers }
    }

    /// Runs a message through the chain.
    ///
    /// Returns `true` if some stage consumed the message.
    pub fn handle(&self, message: ChannelMessage) -> bool {
        let handler_code = message.handler_code;
        let mut current = message;
        for handler in &self.handlers {
            match handler.handle(current) {
                None => return true,
                Some(passed) => current = passed,
            }
        }
        debug!(handler_code, "dropping message no pipeline stage consumed");
        false
    }
}
