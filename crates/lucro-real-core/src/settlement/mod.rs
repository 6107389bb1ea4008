//! Settlement: credits from tax withheld at source, the offset of credits
//! against amounts due and late-payment charges on what remains.

pub mod offset;
pub mod penalty;
pub mod withholding;
