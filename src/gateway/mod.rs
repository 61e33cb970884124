pub mod dispatcher;
pub mod ledger;
pub mod operation;
pub mod registry;

pub use dispatcher::{CANISTER_UNAVAILABLE_CODE, DEFAULT_SWEEP_EVERY, Gateway, GatewayOptions};
pub use ledger::{CRYSTAL_TYPES, LedgerCanisters, ledger_operations};
pub use operation::{ActorMethod, ArgKind, ArgSpec, ArgsCheck, Operation, RemoteInvoke};
pub use registry::{OperationRegistry, RegistryError};
