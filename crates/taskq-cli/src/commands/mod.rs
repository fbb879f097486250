pub mod rpc;
pub mod simulate;
