//
// Copyright (c) The Holo Core Contributors
//
// SPDX-License-Identifier: MIT
//

use std::net::Ipv6Addr;

use tracing::{debug, warn};

use crate::packet::DecodeError;
use crate::southbound::LportTag;
use crate::topology::{NetworkId, NodeId, PortId};

// ND errors.
#[derive(Debug)]
pub enum Error {
    // I/O errors
    IoError(IoError),
    // Configuration
    ConfigParseError(toml::de::Error),
    // Packet input
    PacketDecodeError(DecodeError),
    UnknownLportTag(LportTag),
    PortNotFound(PortId),
    RouterInterfaceNotFound(NetworkId),
    TargetNotOwned(PortId, Ipv6Addr),
    // Packet output
    ElanTagNotFound(NetworkId),
    // Packet workers
    QueueFull,
}

// ND I/O errors.
#[derive(Debug)]
pub enum IoError {
    ConfigReadError(std::io::Error),
    PacketSendError(std::io::Error),
    FlowRequestError(NodeId, std::io::Error),
    FlowRetractError(NodeId, std::io::Error),
    ServiceBindError(PortId, std::io::Error),
    ServiceUnbindError(PortId, std::io::Error),
}

// ===== impl Error =====

impl Error {
    pub(crate) fn log(&self) {
        match self {
            Error::IoError(error) => {
                error.log();
            }
            Error::ConfigParseError(error) => {
                warn!(error = %with_source(error), "{}", self);
            }
            Error::PacketDecodeError(error) => {
                warn!(error = %with_source(error), "{}", self);
            }
            Error::UnknownLportTag(lport_tag) => {
                debug!(%lport_tag, "{}", self);
            }
            Error::PortNotFound(port_id) => {
                debug!(%port_id, "{}", self);
            }
            Error::RouterInterfaceNotFound(network_id) => {
                debug!(%network_id, "{}", self);
            }
            Error::TargetNotOwned(port_id, target) => {
                debug!(%port_id, %target, "{}", self);
            }
            Error::ElanTagNotFound(network_id) => {
                warn!(%network_id, "{}", self);
            }
            Error::QueueFull => {
                warn!("{}", self);
            }
        }
    }

    // Returns whether the error corresponds to a packet that was dropped
    // because of a missing topology dependency or an ownership check.
    pub fn is_policy_drop(&self) -> bool {
        matches!(
            self,
            Error::UnknownLportTag(..)
                | Error::PortNotFound(..)
                | Error::RouterInterfaceNotFound(..)
                | Error::TargetNotOwned(..)
        )
    }
}

impl std::fmt::Display for Error {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Error::IoError(error) => error.fmt(f),
            Error::ConfigParseError(..) => {
                write!(f, "failed to parse configuration")
            }
            Error::PacketDecodeError(..) => {
                write!(f, "failed to decode packet")
            }
            Error::UnknownLportTag(..) => {
                write!(f, "failed to resolve ingress port")
            }
            Error::PortNotFound(..) => {
                write!(f, "port not found")
            }
            Error::RouterInterfaceNotFound(..) => {
                write!(f, "no IPv6 router interface on network")
            }
            Error::TargetNotOwned(..) => {
                write!(f, "solicited target not owned by the router")
            }
            Error::ElanTagNotFound(..) => {
                write!(f, "failed to resolve network broadcast domain")
            }
            Error::QueueFull => {
                write!(f, "packet queue full")
            }
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Error::IoError(error) => Some(error),
            Error::ConfigParseError(error) => Some(error),
            Error::PacketDecodeError(error) => Some(error),
            _ => None,
        }
    }
}

impl From<IoError> for Error {
    fn from(error: IoError) -> Error {
        Error::IoError(error)
    }
}

impl From<DecodeError> for Error {
    fn from(error: DecodeError) -> Error {
        Error::PacketDecodeError(error)
    }
}

// ===== impl IoError =====

impl IoError {
    pub(crate) fn log(&self) {
        match self {
            IoError::ConfigReadError(error)
            | IoError::PacketSendError(error) => {
                warn!(error = %with_source(error), "{}", self);
            }
            IoError::FlowRequestError(node_id, error)
            | IoError::FlowRetractError(node_id, error) => {
                warn!(%node_id, error = %with_source(error), "{}", self);
            }
            IoError::ServiceBindError(port_id, error)
            | IoError::ServiceUnbindError(port_id, error) => {
                warn!(%port_id, error = %with_source(error), "{}", self);
            }
        }
    }
}

impl std::fmt::Display for IoError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            IoError::ConfigReadError(..) => {
                write!(f, "failed to read configuration file")
            }
            IoError::PacketSendError(..) => {
                write!(f, "failed to send packet")
            }
            IoError::FlowRequestError(..) => {
                write!(f, "failed to request punt flow")
            }
            IoError::FlowRetractError(..) => {
                write!(f, "failed to retract punt flow")
            }
            IoError::ServiceBindError(..) => {
                write!(f, "failed to bind ND service")
            }
            IoError::ServiceUnbindError(..) => {
                write!(f, "failed to unbind ND service")
            }
        }
    }
}

impl std::error::Error for IoError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            IoError::ConfigReadError(error)
            | IoError::PacketSendError(error)
            | IoError::FlowRequestError(_, error)
            | IoError::FlowRetractError(_, error)
            | IoError::ServiceBindError(_, error)
            | IoError::ServiceUnbindError(_, error) => Some(error),
        }
    }
}

// ===== global functions =====

fn with_source<E: std::error::Error>(error: E) -> String {
    if let Some(source) = error.source() {
        format!("{} ({})", error, with_source(source))
    } else {
        error.to_string()
    }
}
