//
// Copyright (c) The Holo Core Contributors
//
// SPDX-License-Identifier: MIT
//

pub mod advertisement;
pub mod config;
pub mod consts;
pub mod debug;
pub mod error;
pub mod events;
pub mod flows;
pub mod instance;
pub mod packet;
pub mod responder;
pub mod scheduler;
pub mod southbound;
pub mod tasks;
pub mod topology;
