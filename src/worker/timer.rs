/*
 * Copyright (c) Kia Shakiba
 *
 * This source code is licensed under the GNU AGPLv3 license found in the
 * LICENSE file in the root directory of this source tree.
 */

use std::sync::Arc;

use crossbeam_channel::{Receiver, RecvTimeoutError};
use log::debug;
use parking_lot::Mutex;

use crate::{
	coordinator::Coordinator,
	error::QueueError,
	policy::Timeout,
	worker::{TimerEvent, Worker},
};

/// Drives the policy's timer. At most one tick is outstanding: the worker
/// waits on the control channel for exactly the current delay, so adopting a
/// new delay after each tick cancels the previous schedule.
pub struct TimerWorker {
	control: Receiver<TimerEvent>,
	coordinator: Arc<Mutex<Coordinator>>,
	delay: Timeout,
}

impl Worker for TimerWorker {
	fn run(&mut self) -> Result<(), QueueError> {
		loop {
			match self.delay {
				Some(delay) => match self.control.recv_timeout(delay) {
					Ok(TimerEvent::Shutdown) | Err(RecvTimeoutError::Disconnected) => {
						return Ok(());
					},

					Err(RecvTimeoutError::Timeout) => {
						debug!("Timer tick after {delay:?}");
						self.delay = self.coordinator.lock().tick();
					},
				},

				// the policy disabled its timer; park until shutdown
				None => {
					let _ = self.control.recv();
					return Ok(());
				},
			}
		}
	}
}

impl TimerWorker {
	pub fn new(
		control: Receiver<TimerEvent>,
		coordinator: Arc<Mutex<Coordinator>>,
		delay: Timeout,
	) -> Self {
		TimerWorker {
			control,
			coordinator,
			delay,
		}
	}
}
