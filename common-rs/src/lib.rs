pub mod allow_list;
pub mod serde_serialize;
pub mod utils;
pub mod validator_record;
pub mod vote_accounts;
