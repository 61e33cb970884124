use std::collections::HashMap;
use thiserror::Error;

use crate::gateway::operation::Operation;

// -----------------------------------------------------------------------------
// ----- OperationRegistry -----------------------------------------------------

/// Name → operation table. Filled once at startup, then handed to a
/// [`Gateway`](crate::gateway::Gateway) which never mutates it.
#[derive(Debug, Default)]
pub struct OperationRegistry {
    by_name: HashMap<String, Operation>,
}

impl OperationRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, operation: Operation) -> Result<(), RegistryError> {
        if self.by_name.contains_key(operation.name()) {
            return Err(RegistryError::Duplicate {
                name: operation.name().to_string(),
            });
        }

        self.by_name.insert(operation.name().to_string(), operation);
        Ok(())
    }

    pub fn with(mut self, operation: Operation) -> Result<Self, RegistryError> {
        self.register(operation)?;
        Ok(self)
    }

    pub fn get(&self, name: &str) -> Option<&Operation> {
        self.by_name.get(name)
    }

    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.by_name.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    pub fn len(&self) -> usize {
        self.by_name.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_name.is_empty()
    }
}

// -----------------------------------------------------------------------------
// ----- Errors ----------------------------------------------------------------

#[derive(Debug, Error)]
pub enum RegistryError {
    #[error("operation '{name}' registered twice")]
    Duplicate { name: String },
}

// -----------------------------------------------------------------------------
// ----- Tests -----------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gateway::operation::RemoteInvoke;
    use crate::remote::{RemoteReply, TransportFailure};
    use async_trait::async_trait;
    use serde_json::Value;

    struct Echo;

    #[async_trait]
    impl RemoteInvoke for Echo {
        async fn invoke(&self, args: &[Value]) -> Result<RemoteReply, TransportFailure> {
            Ok(RemoteReply::ok(Value::Array(args.to_vec())))
        }
    }

    #[test]
    fn duplicate_names_are_rejected() {
        let mut registry = OperationRegistry::new();
        registry.register(Operation::new("getBalances", Echo)).unwrap();

        let err = registry
            .register(Operation::new("getBalances", Echo))
            .unwrap_err();
        assert!(matches!(err, RegistryError::Duplicate { name } if name == "getBalances"));
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn names_are_sorted() {
        let registry = OperationRegistry::new()
            .with(Operation::new("transferFunds", Echo))
            .unwrap()
            .with(Operation::new("getBalances", Echo))
            .unwrap();

        assert_eq!(registry.names(), vec!["getBalances", "transferFunds"]);
        assert!(registry.get("registerPlayer").is_none());
    }
}

// -----------------------------------------------------------------------------
// -----------------------------------------------------------------------------
