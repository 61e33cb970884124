pub mod canister_id;
pub mod clock;

pub use canister_id::{CanisterId, CanisterIdError};
pub use clock::{Clock, ManualClock, SystemClock};
