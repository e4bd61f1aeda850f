//! Deterministic port allocation for project stacks.
//!
//! Every project gets a contiguous block of four TCP ports derived from its
//! numeric id and the configured [`PortPlan`]. The mapping is a pure function
//! of its inputs, so independent processes agree on a project's ports without
//! any coordination or allocation table.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Highest valid TCP port.
pub const MAX_TCP_PORT: u16 = 65535;

/// Errors raised when a requested port base cannot host a project block.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum PortRangeError {
    /// The port base must be a positive integer.
    #[error("port base must be a positive integer")]
    NotPositive,
    /// The port base falls below the configured minimum project port base.
    #[error("port base {base} is below the configured minimum {floor}")]
    BelowFloor { base: u32, floor: u16 },
    /// The four-port block starting at `base` would run past the last TCP port.
    #[error("port base {base} leaves no room for a four-port block below {max}", max = MAX_TCP_PORT)]
    AboveCeiling { base: u32 },
}

/// The ports assigned to one project stack.
///
/// Derived, never stored: callers recompute the allocation from the project
/// id whenever they need it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct PortAllocation {
    /// API gateway port, also the base of the block.
    pub api: u16,
    /// Database port.
    pub db: u16,
    /// Studio UI port.
    pub studio: u16,
    /// Mail-capture UI port.
    pub mail: u16,
}

/// Assigns the four-port block starting at `base`.
///
/// # Errors
///
/// Returns [`PortRangeError`] when `base` is zero, below `floor` (the
/// configured minimum project port base), or too close to the top of the TCP
/// port range to fit four ports.
pub fn allocate(base: u32, floor: u16) -> Result<PortAllocation, PortRangeError> {
    if base == 0 {
        return Err(PortRangeError::NotPositive);
    }
    if base < u32::from(floor) {
        return Err(PortRangeError::BelowFloor { base, floor });
    }
    if base > u32::from(MAX_TCP_PORT) - 3 {
        return Err(PortRangeError::AboveCeiling { base });
    }
    let api = u16::try_from(base).map_err(|_| PortRangeError::AboveCeiling { base })?;
    Ok(PortAllocation {
        api,
        db: api + 1,
        studio: api + 2,
        mail: api + 3,
    })
}

/// Configured mapping from project ids to port bases.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct PortPlan {
    /// Port base assigned to project id 0.
    #[serde(default = "default_port_base")]
    pub base: u16,
    /// Distance between the bases of consecutive project ids.
    #[serde(default = "default_port_step")]
    pub step: u16,
}

impl Default for PortPlan {
    fn default() -> Self {
        Self {
            base: default_port_base(),
            step: default_port_step(),
        }
    }
}

impl PortPlan {
    /// Computes the (unvalidated) port base for a project id.
    #[must_use]
    pub fn base_for(&self, project_id: u32) -> u32 {
        u32::from(self.base).saturating_add(project_id.saturating_mul(u32::from(self.step)))
    }

    /// Allocates the port block for a project id.
    ///
    /// # Errors
    ///
    /// Returns [`PortRangeError`] when the derived base falls outside the
    /// valid range; the plan's own base acts as the floor.
    pub fn allocate_for(&self, project_id: u32) -> Result<PortAllocation, PortRangeError> {
        allocate(self.base_for(project_id), self.base)
    }
}

const fn default_port_base() -> u16 {
    23000
}

const fn default_port_step() -> u16 {
    20
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn allocate_assigns_contiguous_ports() {
        let ports = allocate(23000, 23000).unwrap();
        assert_eq!(
            ports,
            PortAllocation {
                api: 23000,
                db: 23001,
                studio: 23002,
                mail: 23003,
            }
        );
    }

    #[test]
    fn allocate_is_pure() {
        for base in [23000_u32, 23020, 40000, 65532] {
            assert_eq!(allocate(base, 23000), allocate(base, 23000));
        }
    }

    #[test]
    fn allocate_rejects_zero() {
        assert_eq!(allocate(0, 23000), Err(PortRangeError::NotPositive));
    }

    #[test]
    fn allocate_rejects_bases_below_the_floor() {
        assert_eq!(
            allocate(1024, 23000),
            Err(PortRangeError::BelowFloor {
                base: 1024,
                floor: 23000,
            })
        );
    }

    #[test]
    fn allocate_rejects_blocks_past_the_last_tcp_port() {
        assert!(allocate(65532, 23000).is_ok());
        assert_eq!(
            allocate(65533, 23000),
            Err(PortRangeError::AboveCeiling { base: 65533 })
        );
    }

    #[test]
    fn plan_spaces_projects_by_step() {
        let plan = PortPlan {
            base: 23000,
            step: 20,
        };
        assert_eq!(plan.base_for(0), 23000);
        assert_eq!(plan.base_for(1), 23020);
        assert_eq!(plan.base_for(7), 23140);

        let ports = plan.allocate_for(1).unwrap();
        assert_eq!(ports.api, 23020);
        assert_eq!(ports.mail, 23023);
    }

    #[test]
    fn plan_surfaces_range_errors_for_large_ids() {
        let plan = PortPlan {
            base: 23000,
            step: 20,
        };
        assert!(matches!(
            plan.allocate_for(u32::MAX),
            Err(PortRangeError::AboveCeiling { .. })
        ));
    }
}
