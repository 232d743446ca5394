pub mod rpc;
pub mod synthetic;
