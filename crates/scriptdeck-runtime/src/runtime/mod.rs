// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.
//
// Copyright (c) 2025 Pegasus Heavy Industries, LLC

//! Core runtime implementation

mod event_loop;
mod host;
mod script_runtime;
pub mod unit;

pub use event_loop::{EventLoop, MAX_TIMER_DELAY, Timer, TimerId, TimerTask, UrlLoad, Waiter};
pub use host::{Host, HostState, LoadGuard, RunGuard, SessionGuard};
pub use script_runtime::{CancelHandle, ScriptRuntime};
pub use unit::{AsyncUnit, CommonJsUnit, ScriptUnit};
