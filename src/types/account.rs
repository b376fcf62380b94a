//! Account-related types for the Ledger Server
//!
//! This module defines the Account structure and the role an account holder
//! has in the system.

use rust_decimal::Decimal;
use std::fmt;
use std::str::FromStr;

/// Account number
///
/// Opaque, unique and stable for the lifetime of the account. Kept as a
/// string because clients generate it and the wire carries it verbatim.
pub type AccountNo = String;

/// Role of an account holder
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    /// Operator of the ledger
    Admin,

    /// Regular customer
    User,
}

impl Role {
    /// Lowercase name as stored in the account file and sent on the wire
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Admin => "admin",
            Role::User => "user",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Role {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "admin" => Ok(Role::Admin),
            "user" => Ok(Role::User),
            other => Err(format!("Invalid role: '{}'", other)),
        }
    }
}

/// A customer account
///
/// Created on registration, mutated only through the ledger's write path and
/// never deleted.
#[derive(Debug, Clone, PartialEq)]
pub struct Account {
    /// Unique account number
    pub account_no: AccountNo,

    /// Role of the holder
    pub role: Role,

    /// Login name
    ///
    /// Authentication compares it exactly; duplicate checks ignore case.
    pub username: String,

    /// Hex digest of the password, produced by the client
    ///
    /// The server stores and compares it as an opaque string.
    pub password_hash: String,

    /// Display name returned to counterparties
    pub full_name: String,

    /// Current balance, two decimal places, never negative
    pub balance: Decimal,
}

impl Account {
    /// Create a new account
    ///
    /// # Arguments
    ///
    /// * `account_no` - Unique account number
    /// * `role` - Role of the holder
    /// * `username` - Login name
    /// * `password_hash` - Hex digest of the password
    /// * `full_name` - Display name
    /// * `balance` - Opening balance
    pub fn new(
        account_no: impl Into<AccountNo>,
        role: Role,
        username: impl Into<String>,
        password_hash: impl Into<String>,
        full_name: impl Into<String>,
        balance: Decimal,
    ) -> Self {
        Account {
            account_no: account_no.into(),
            role,
            username: username.into(),
            password_hash: password_hash.into(),
            full_name: full_name.into(),
            balance,
        }
    }

    /// Whether `name` matches this account's username ignoring case
    pub fn username_matches(&self, name: &str) -> bool {
        self.username.to_lowercase() == name.trim().to_lowercase()
    }
}
