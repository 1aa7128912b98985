//
// Copyright (c) The Holo Core Contributors
//
// SPDX-License-Identifier: MIT
//

use std::collections::BTreeSet;

use serde::Serialize;

use crate::topology::{PortId, RouterId, SubnetId, TenantId};

#[derive(Clone, Debug, Serialize)]
pub struct VirtualRouter {
    pub id: RouterId,
    pub tenant_id: TenantId,
    pub name: String,
    pub subnets: BTreeSet<SubnetId>,
    pub ports: BTreeSet<PortId>,
}
