//! IRPJ and CSLL on the adjusted base: the two-tier rate computation, the
//! capped loss carry-forward offset and the with/without differential used to
//! price optional deductions.

pub mod base_tax;
pub mod differential;
pub mod loss_compensation;
