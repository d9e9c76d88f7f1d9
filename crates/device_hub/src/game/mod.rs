//! Game targets driven through an in-game automation SDK
//!
//! The SDK embeds an RPC server in the game build; this module speaks its
//! framed JSON-RPC protocol.

mod rpc;

pub use rpc::{parse_address, GameClient, DEFAULT_RPC_PORT};
