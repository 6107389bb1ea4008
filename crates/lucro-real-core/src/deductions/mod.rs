//! Book-to-tax adjustments: the deductibility classifier, the two parallel
//! adjustment ledgers (LALUR for IRPJ, LACS for CSLL) and the JCP deduction.

pub mod classifier;
pub mod jcp;
pub mod ledger;
