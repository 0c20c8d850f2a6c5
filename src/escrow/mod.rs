pub mod collect;
pub mod custodian;
