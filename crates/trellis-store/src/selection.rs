//! The persisted current operator/account selection.

use serde::{Deserialize, Serialize};

/// Which operator and account commands act on when none is named.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Selection {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub operator: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub account: Option<String>,
}

impl Selection {
    pub fn new(operator: Option<String>, account: Option<String>) -> Self {
        Self { operator, account }
    }

    /// Select an operator. Clears the account when the operator changes.
    pub fn select_operator(&mut self, operator: impl Into<String>) {
        let operator = operator.into();
        if self.operator.as_deref() != Some(operator.as_str()) {
            self.account = None;
        }
        self.operator = Some(operator);
    }

    pub fn select_account(&mut self, account: impl Into<String>) {
        self.account = Some(account.into());
    }

    /// Clear the account selection if it is `name`.
    pub fn forget_account(&mut self, name: &str) {
        if self.account.as_deref() == Some(name) {
            self.account = None;
        }
    }
}
