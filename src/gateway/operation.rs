use async_trait::async_trait;
use serde_json::Value;
use std::{fmt, sync::Arc};

use crate::errors::GatewayError;
use crate::rate_limit::RateLimit;
use crate::remote::{Agent, RemoteReply, TransportFailure};
use crate::shared_types::CanisterId;

// -----------------------------------------------------------------------------
// ----- ArgSpec ---------------------------------------------------------------

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ArgKind {
    /// Non-empty text identifying a player; the first one is the rate-limit subject.
    PlayerId,
    /// Non-empty text.
    Text,
    /// One of a fixed set of labels.
    OneOf(&'static [&'static str]),
    /// Integer strictly greater than zero.
    Amount,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ArgSpec {
    pub name: &'static str,
    pub kind: ArgKind,
}

impl ArgSpec {
    pub const fn player_id(name: &'static str) -> Self {
        Self {
            name,
            kind: ArgKind::PlayerId,
        }
    }

    pub const fn text(name: &'static str) -> Self {
        Self {
            name,
            kind: ArgKind::Text,
        }
    }

    pub const fn one_of(name: &'static str, allowed: &'static [&'static str]) -> Self {
        Self {
            name,
            kind: ArgKind::OneOf(allowed),
        }
    }

    pub const fn amount(name: &'static str) -> Self {
        Self {
            name,
            kind: ArgKind::Amount,
        }
    }

    fn check(&self, value: &Value) -> Result<(), String> {
        match self.kind {
            ArgKind::PlayerId | ArgKind::Text => match value.as_str() {
                Some(s) if !s.trim().is_empty() => Ok(()),
                Some(_) => Err(format!("{} must not be empty", self.name)),
                None => Err(format!("{} must be a string", self.name)),
            },
            ArgKind::OneOf(allowed) => match value.as_str() {
                Some(s) if allowed.contains(&s) => Ok(()),
                _ => Err(format!("{} must be one of {}", self.name, allowed.join(", "))),
            },
            ArgKind::Amount => match value.as_u64() {
                Some(n) if n > 0 => Ok(()),
                _ => Err(format!("{} must be an integer greater than zero", self.name)),
            },
        }
    }
}

/// Cross-argument constraint, run after every per-argument check passed.
pub type ArgsCheck = fn(&[Value]) -> Result<(), String>;

// -----------------------------------------------------------------------------
// ----- RemoteInvoke ----------------------------------------------------------

/// The remote half of an operation.
#[async_trait]
pub trait RemoteInvoke: Send + Sync {
    async fn invoke(&self, args: &[Value]) -> Result<RemoteReply, TransportFailure>;

    fn describe(&self) -> String {
        "remote".to_string()
    }
}

/// A named method on a canister, reached through an [`Agent`].
pub struct ActorMethod {
    agent: Arc<dyn Agent>,
    canister: CanisterId,
    method: String,
}

impl ActorMethod {
    pub fn new(agent: Arc<dyn Agent>, canister: CanisterId, method: impl Into<String>) -> Self {
        Self {
            agent,
            canister,
            method: method.into(),
        }
    }
}

#[async_trait]
impl RemoteInvoke for ActorMethod {
    async fn invoke(&self, args: &[Value]) -> Result<RemoteReply, TransportFailure> {
        self.agent.invoke(&self.canister, &self.method, args).await
    }

    fn describe(&self) -> String {
        format!("{}.{}", self.canister, self.method)
    }
}

// -----------------------------------------------------------------------------
// ----- Operation -------------------------------------------------------------

/// Declarative description of one dispatchable call: its name, how its
/// arguments are validated, and where it goes.
pub struct Operation {
    name: String,
    args: Vec<ArgSpec>,
    constraints: Vec<ArgsCheck>,
    rate_limit: Option<RateLimit>,
    remote: Arc<dyn RemoteInvoke>,
}

// -----------------------------------------------------------------------------
// ----- Operation: Builder ----------------------------------------------------

impl Operation {
    pub fn new(name: impl Into<String>, remote: impl RemoteInvoke + 'static) -> Self {
        Self {
            name: name.into(),
            args: Vec::new(),
            constraints: Vec::new(),
            rate_limit: None,
            remote: Arc::new(remote),
        }
    }

    pub fn arg(mut self, spec: ArgSpec) -> Self {
        self.args.push(spec);
        self
    }

    pub fn constraint(mut self, check: ArgsCheck) -> Self {
        self.constraints.push(check);
        self
    }

    pub fn rate_limit(mut self, limit: RateLimit) -> Self {
        self.rate_limit = Some(limit);
        self
    }
}

// -----------------------------------------------------------------------------
// ----- Operation: Public -----------------------------------------------------

impl Operation {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn args(&self) -> &[ArgSpec] {
        &self.args
    }

    pub fn declared_rate_limit(&self) -> Option<RateLimit> {
        self.rate_limit
    }

    pub fn remote(&self) -> &dyn RemoteInvoke {
        self.remote.as_ref()
    }

    pub fn validate(&self, args: &[Value]) -> Result<(), GatewayError> {
        if args.len() != self.args.len() {
            return Err(GatewayError::validation(format!(
                "{} expects {} argument(s) ({}), got {}",
                self.name,
                self.args.len(),
                self.signature(),
                args.len()
            )));
        }

        for (spec, value) in self.args.iter().zip(args) {
            spec.check(value)
                .map_err(|reason| GatewayError::validation(format!("{}: {reason}", self.name)))?;
        }

        for check in &self.constraints {
            check(args)
                .map_err(|reason| GatewayError::validation(format!("{}: {reason}", self.name)))?;
        }

        Ok(())
    }

    /// Value of the first player-id argument, once `args` validated.
    pub fn subject<'a>(&self, args: &'a [Value]) -> Option<&'a str> {
        let index = self.args.iter().position(|a| a.kind == ArgKind::PlayerId)?;
        args.get(index)?.as_str()
    }

    pub fn signature(&self) -> String {
        self.args
            .iter()
            .map(|a| a.name)
            .collect::<Vec<_>>()
            .join(", ")
    }
}

impl fmt::Debug for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Operation")
            .field("name", &self.name)
            .field("args", &self.args)
            .field("rate_limit", &self.rate_limit)
            .field("remote", &self.remote.describe())
            .finish()
    }
}

// -----------------------------------------------------------------------------
// ----- Tests -----------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::ErrorKind;
    use serde_json::json;

    struct Unreachable;

    #[async_trait]
    impl RemoteInvoke for Unreachable {
        async fn invoke(&self, _args: &[Value]) -> Result<RemoteReply, TransportFailure> {
            Err(TransportFailure::Unreachable("test".into()))
        }
    }

    fn distinct(args: &[Value]) -> Result<(), String> {
        if args[0] == args[1] {
            return Err("cannot transfer to self".to_string());
        }
        Ok(())
    }

    fn deposit() -> Operation {
        Operation::new("depositCrystals", Unreachable)
            .arg(ArgSpec::player_id("playerId"))
            .arg(ArgSpec::one_of("crystalType", &["Type1", "Type2"]))
            .arg(ArgSpec::amount("amount"))
    }

    #[test]
    fn accepts_well_formed_args() {
        let op = deposit();
        let args = [json!("player1"), json!("Type1"), json!(10)];
        assert!(op.validate(&args).is_ok());
        assert_eq!(op.subject(&args), Some("player1"));
    }

    #[test]
    fn rejects_bad_args() {
        let op = deposit();

        let cases = [
            vec![json!("player1"), json!("Type1")],
            vec![json!(""), json!("Type1"), json!(10)],
            vec![json!(7), json!("Type1"), json!(10)],
            vec![json!("player1"), json!("Type9"), json!(10)],
            vec![json!("player1"), json!("Type1"), json!(0)],
            vec![json!("player1"), json!("Type1"), json!(-5)],
            vec![json!("player1"), json!("Type1"), json!(2.5)],
            vec![json!("player1"), json!("Type1"), json!("10")],
        ];

        for args in cases {
            let err = op.validate(&args).unwrap_err();
            assert_eq!(err.kind(), ErrorKind::Validation, "{args:?}");
            assert!(err.message().starts_with("depositCrystals"));
        }
    }

    #[test]
    fn constraints_run_after_arg_checks() {
        let op = Operation::new("transferFunds", Unreachable)
            .arg(ArgSpec::player_id("fromPlayerId"))
            .arg(ArgSpec::player_id("toPlayerId"))
            .arg(ArgSpec::amount("amount"))
            .constraint(distinct);

        let err = op
            .validate(&[json!("p1"), json!("p1"), json!(5)])
            .unwrap_err();
        assert!(err.message().contains("cannot transfer to self"));

        let args = [json!("p1"), json!("p2"), json!(5)];
        assert!(op.validate(&args).is_ok());
        assert_eq!(op.subject(&args), Some("p1"));
    }

    #[test]
    fn operations_without_player_have_no_subject() {
        let op = Operation::new("ping", Unreachable);
        assert!(op.validate(&[]).is_ok());
        assert_eq!(op.subject(&[]), None);
    }
}

// -----------------------------------------------------------------------------
// -----------------------------------------------------------------------------
