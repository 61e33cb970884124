use serde::Deserialize;
use serde_json::Value;
use std::sync::Arc;

use crate::gateway::operation::{ActorMethod, ArgSpec, Operation};
use crate::gateway::registry::{OperationRegistry, RegistryError};
use crate::remote::Agent;
use crate::shared_types::CanisterId;

// -----------------------------------------------------------------------------
// ----- Constants -------------------------------------------------------------

pub const REGISTER_PLAYER: &str = "registerPlayer";
pub const IS_PLAYER_REGISTERED: &str = "isPlayerRegistered";
pub const DEPOSIT_CRYSTALS: &str = "depositCrystals";
pub const CONVERT_CRYSTALS_TO_FUDDY: &str = "convertCrystalsToFUDDY";
pub const TRANSFER_FUNDS: &str = "transferFunds";
pub const GET_TRANSACTION_HISTORY: &str = "getTransactionHistory";
pub const GET_BALANCES: &str = "getBalances";
pub const DEPOSIT_REAL_FUDDY: &str = "depositRealFuddy";
pub const CONVERT_TO_BLOCKCHAIN: &str = "convertToBlockchain";
pub const TRANSFER_REAL_FUDDY: &str = "transferRealFuddy";
pub const CONVERT_TO_IN_GAME_FUDDY: &str = "convertToInGameFuddy";

pub const CRYSTAL_TYPES: &[&str] = &["Type1", "Type2", "Type3", "Type4"];

// -----------------------------------------------------------------------------
// ----- LedgerCanisters -------------------------------------------------------

/// Where each ledger service lives.
#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
pub struct LedgerCanisters {
    pub crystal_bank: CanisterId,
    pub fuddy_transfer: CanisterId,
    pub hybrid_wallet: CanisterId,
    pub fuddy_conversion: CanisterId,
}

// -----------------------------------------------------------------------------
// ----- Registration ----------------------------------------------------------

/// Every operation the crystal bank, hybrid wallet, and FUDDY services expose.
pub fn ledger_operations(
    agent: Arc<dyn Agent>,
    canisters: &LedgerCanisters,
) -> Result<OperationRegistry, RegistryError> {
    let bank = |method: &str| ActorMethod::new(agent.clone(), canisters.crystal_bank.clone(), method);
    let wallet = |method: &str| ActorMethod::new(agent.clone(), canisters.hybrid_wallet.clone(), method);

    let mut registry = OperationRegistry::new();

    registry.register(
        Operation::new(REGISTER_PLAYER, bank("registerPlayer")).arg(ArgSpec::player_id("playerId")),
    )?;

    registry.register(
        Operation::new(IS_PLAYER_REGISTERED, bank("isRegistered"))
            .arg(ArgSpec::player_id("playerId")),
    )?;

    registry.register(
        Operation::new(DEPOSIT_CRYSTALS, bank("depositCrystals"))
            .arg(ArgSpec::player_id("playerId"))
            .arg(ArgSpec::one_of("crystalType", CRYSTAL_TYPES))
            .arg(ArgSpec::amount("amount")),
    )?;

    registry.register(
        Operation::new(CONVERT_CRYSTALS_TO_FUDDY, bank("convertCrystalsToFUDDY"))
            .arg(ArgSpec::player_id("playerId")),
    )?;

    registry.register(
        Operation::new(GET_TRANSACTION_HISTORY, bank("getPlayerTransactions"))
            .arg(ArgSpec::player_id("playerId")),
    )?;

    registry.register(
        Operation::new(
            TRANSFER_FUNDS,
            ActorMethod::new(agent.clone(), canisters.fuddy_transfer.clone(), "transferFunds"),
        )
        .arg(ArgSpec::player_id("fromPlayerId"))
        .arg(ArgSpec::player_id("toPlayerId"))
        .arg(ArgSpec::amount("amount"))
        .constraint(distinct_players),
    )?;

    registry.register(
        Operation::new(GET_BALANCES, wallet("getBalances")).arg(ArgSpec::player_id("playerId")),
    )?;

    registry.register(
        Operation::new(DEPOSIT_REAL_FUDDY, wallet("depositRealFuddy"))
            .arg(ArgSpec::player_id("playerId"))
            .arg(ArgSpec::amount("amount")),
    )?;

    registry.register(
        Operation::new(TRANSFER_REAL_FUDDY, wallet("transferRealFuddy"))
            .arg(ArgSpec::player_id("fromPlayerId"))
            .arg(ArgSpec::player_id("toPlayerId"))
            .arg(ArgSpec::amount("amount"))
            .constraint(distinct_players),
    )?;

    registry.register(
        Operation::new(CONVERT_TO_IN_GAME_FUDDY, wallet("convertToInGameFuddy"))
            .arg(ArgSpec::player_id("playerId"))
            .arg(ArgSpec::amount("amount")),
    )?;

    registry.register(
        Operation::new(
            CONVERT_TO_BLOCKCHAIN,
            ActorMethod::new(agent.clone(), canisters.fuddy_conversion.clone(), "convertToBlockchain"),
        )
        .arg(ArgSpec::player_id("playerId"))
        .arg(ArgSpec::amount("amount")),
    )?;

    Ok(registry)
}

fn distinct_players(args: &[Value]) -> Result<(), String> {
    if args.first() == args.get(1) {
        return Err("fromPlayerId and toPlayerId must differ".to_string());
    }
    Ok(())
}

// -----------------------------------------------------------------------------
// ----- Tests -----------------------------------------------------------------


// -----------------------------------------------------------------------------
// -----------------------------------------------------------------------------
