//
// Copyright (c) The Holo Core Contributors
//
// SPDX-License-Identifier: MIT
//

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::consts::*;
use crate::error::{Error, IoError};

// ND engine configuration.
#[derive(Clone, Debug, Deserialize, Eq, PartialEq, Serialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    // Interval between unsolicited router advertisements, in seconds.
    pub ra_interval: u64,
    pub router_lifetime: u16,
    pub cur_hop_limit: u8,
    // Milliseconds.
    pub reachable_time: u32,
    // Milliseconds.
    pub retrans_timer: u32,
    pub prefix_valid_lifetime: u32,
    pub prefix_preferred_lifetime: u32,
    pub worker_count: usize,
    pub packet_queue_size: usize,
}

// ===== impl Config =====

impl Config {
    // Loads the configuration from a TOML file.
    pub fn load(path: &str) -> Result<Config, Error> {
        let config_str = std::fs::read_to_string(path)
            .map_err(IoError::ConfigReadError)?;
        Config::from_toml(&config_str)
    }

    // Parses the configuration from a TOML string. Missing fields take their
    // default values.
    pub fn from_toml(config_str: &str) -> Result<Config, Error> {
        toml::from_str(config_str).map_err(Error::ConfigParseError)
    }

    pub fn ra_interval(&self) -> Duration {
        Duration::from_secs(self.ra_interval)
    }
}

impl Default for Config {
    fn default() -> Config {
        Config {
            ra_interval: DFLT_RA_INTERVAL,
            router_lifetime: DFLT_ROUTER_LIFETIME,
            cur_hop_limit: DFLT_CUR_HOP_LIMIT,
            reachable_time: DFLT_REACHABLE_TIME,
            retrans_timer: DFLT_RETRANS_TIMER,
            prefix_valid_lifetime: DFLT_PREFIX_VALID_LIFETIME,
            prefix_preferred_lifetime: DFLT_PREFIX_PREFERRED_LIFETIME,
            worker_count: DFLT_WORKER_COUNT,
            packet_queue_size: DFLT_PACKET_QUEUE_SIZE,
        }
    }
}

// ===== unit tests =====
