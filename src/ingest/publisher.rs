//-
// Copyright (c) 2026, The Evimail Developers
//
// This file is part of Evimail.
//
// Evimail is free software: you can  redistribute it and/or modify it under the
// terms of  the GNU General Public  License as published by  the Free Software
// Foundation, either version  3 of the License, or (at  your option) any later
// version.
//
// Evimail is distributed  in the hope that  it will be useful,  but WITHOUT ANY
// WARRANTY; without  even the implied  warranty of MERCHANTABILITY  or FITNESS
// FOR  A PARTICULAR  PURPOSE.  See the  GNU General  Public  License for  more
// details.
//
// You should have received a copy of the GNU General Public License along with
// Evimail. If not, see <http://www.gnu.org/licenses/>.

use std::mem;

use log::debug;

use crate::model::Message;
use crate::store::{BusRecord, MessageBus};
use crate::support::error::Error;

/// Default number of messages per published batch.
pub const DEFAULT_BATCH_SIZE: usize = 100;

/// Buffers canonical messages and hands them to the bus in bounded batches.
///
/// Messages are published in the order they were pushed. Nothing is retried
/// here; a failed publish is returned to the caller and the batch is lost
/// along with the rest of the run.
pub struct BatchPublisher<'a> {
    bus: &'a dyn MessageBus,
    batch_size: usize,
    pending: Vec<BusRecord>,
    published: usize,
    batches: usize,
}

impl<'a> BatchPublisher<'a> {
    pub fn new(bus: &'a dyn MessageBus, batch_size: usize) -> Self {
        let batch_size = batch_size.max(1);
        BatchPublisher {
            bus,
            batch_size,
            pending: Vec::with_capacity(batch_size),
            published: 0,
            batches: 0,
        }
    }

    /// Queue `message`, publishing the pending batch if it is now full.
    ///
    /// Returns whether a batch was published.
    pub fn push(&mut self, message: &Message) -> Result<bool, Error> {
        self.pending.push(BusRecord::for_message(message)?);
        if self.pending.len() >= self.batch_size {
            self.flush()?;
            Ok(true)
        } else {
            Ok(false)
        }
    }

    /// Publish whatever is pending, regardless of size.
    ///
    /// Returns whether a batch was published.
    pub fn finish(&mut self) -> Result<bool, Error> {
        if self.pending.is_empty() {
            Ok(false)
        } else {
            self.flush()?;
            Ok(true)
        }
    }

    fn flush(&mut self) -> Result<(), Error> {
        let batch = mem::take(&mut self.pending);
        self.bus.publish_batch(&batch)?;
        self.published += batch.len();
        self.batches += 1;
        debug!(
            "Published batch #{} ({} messages, {} total)",
            self.batches,
            batch.len(),
            self.published
        );
        Ok(())
    }

    /// The number of messages successfully published so far.
    pub fn published(&self) -> usize {
        self.published
    }

    pub fn batches(&self) -> usize {
        self.batches
    }

    pub fn pending(&self) -> usize {
        self.pending.len()
    }
}
