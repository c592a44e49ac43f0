/*
 * Copyright (c) Kia Shakiba
 *
 * This source code is licensed under the GNU AGPLv3 license found in the
 * LICENSE file in the root directory of this source tree.
 */

mod timer;

use std::thread;

use crate::error::QueueError;

#[derive(Clone)]
pub enum TimerEvent {
	Shutdown,
}

pub trait Worker
where
	Self: 'static + Send,
{
	fn run(&mut self) -> Result<(), QueueError>;
}

pub fn register_worker(mut worker: impl Worker) {
	thread::spawn(move || worker.run());
}

pub use crate::worker::timer::TimerWorker;
