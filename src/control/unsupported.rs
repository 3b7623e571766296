/*!
 * Unsupported Platform Control
 * Stand-in backend for platforms without a suspend primitive
 */

use super::traits::ProcessController;
use super::types::PlatformType;
use crate::core::errors::{ControlError, ControlResult};
use crate::core::types::Pid;
use std::convert::Infallible;

/// Controller that can never open a handle
#[derive(Debug, Clone, Default)]
pub struct UnsupportedController;

impl UnsupportedController {
    pub fn new() -> Self {
        Self
    }
}

impl ProcessController for UnsupportedController {
    type Handle = Infallible;

    fn open(&self, _pid: Pid) -> ControlResult<Infallible> {
        Err(ControlError::Unsupported(std::env::consts::OS.to_string()))
    }

    fn suspend(&self, handle: &Infallible) -> ControlResult<()> {
        match *handle {}
    }

    fn resume(&self, handle: &Infallible) -> ControlResult<()> {
        match *handle {}
    }

    fn is_alive(&self, handle: &Infallible) -> bool {
        match *handle {}
    }

    fn is_supported(&self) -> bool {
        false
    }

    fn platform(&self) -> PlatformType {
        PlatformType::Unsupported
    }
}
