//! Fiscal incentives deducted from IRPJ: individual caps per incentive kind,
//! then one global cap with proportional rationing.

pub mod allocator;
