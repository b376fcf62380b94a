//! Wire protocol: command keywords, request decoding, response encoding
//!
//! A request is a command keyword on its own line, followed by payload lines
//! and terminated by a blank line. Responses are one or more lines.
//!
//! | Command                    | Payload                                    | Success                            | Failure           |
//! |----------------------------|--------------------------------------------|------------------------------------|-------------------|
//! | `AUTHENTICATE_USER`        | username, password hash                    | `AUTH_SUCCESS` + 6 account lines   | `AUTH_FAILED`     |
//! | `REGISTER_USER`            | CSV account line                           | `REGISTER_SUCCESS`                 | `REGISTER_FAILED` |
//! | `CHECK_DUPLICATE`          | identifier                                 | `DUPLICATE_FOUND` / `NO_DUPLICATE` | `NO_DUPLICATE`    |
//! | `GET_RECIPIENT_NAME`       | account number                             | full name                          | `NOT_FOUND`       |
//! | `GET_BALANCE`              | account number                             | balance                            | `NOT_FOUND`       |
//! | `TRANSFER_REQUEST`         | `SenderAccNo:` `RecipientAccNo:` `Amount:` | `TRANSFER_SUCCESS` + balance       | `TRANSFER_FAILED` |
//! | `WITHDRAW_DEPOSIT_REQUEST` | `AccountNo:` `Amount:` `Type:`             | `UPDATE_SUCCESS` + balance         | `UPDATE_FAILED`   |
//! | `GET_TRANSACTIONS`         | account number                             | log blocks, blank line after each  | no blocks         |
//!
//! `GET_TRANSACTIONS` ends its stream with one extra blank line so clients
//! can tell where it stops.

use crate::io::log_format::parse_key_value;
use crate::types::{format_amount, parse_amount, Account, LedgerError, TransactionType};
use rust_decimal::Decimal;

/// Command keywords understood by the server
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Command {
    AuthenticateUser,
    RegisterUser,
    CheckDuplicate,
    GetRecipientName,
    GetBalance,
    TransferRequest,
    WithdrawDepositRequest,
    GetTransactions,
}

/// Keyword lookup table
const COMMANDS: [(&str, Command); 8] = [
    ("AUTHENTICATE_USER", Command::AuthenticateUser),
    ("REGISTER_USER", Command::RegisterUser),
    ("CHECK_DUPLICATE", Command::CheckDuplicate),
    ("GET_RECIPIENT_NAME", Command::GetRecipientName),
    ("GET_BALANCE", Command::GetBalance),
    ("TRANSFER_REQUEST", Command::TransferRequest),
    ("WITHDRAW_DEPOSIT_REQUEST", Command::WithdrawDepositRequest),
    ("GET_TRANSACTIONS", Command::GetTransactions),
];

impl Command {
    /// Look up a keyword; matching is exact after trimming whitespace
    pub fn from_keyword(keyword: &str) -> Option<Self> {
        let keyword = keyword.trim();
        COMMANDS
            .iter()
            .find(|(k, _)| *k == keyword)
            .map(|(_, command)| *command)
    }

    pub fn keyword(&self) -> &'static str {
        COMMANDS
            .iter()
            .find(|(_, command)| command == self)
            .map(|(k, _)| *k)
            .unwrap_or("UNKNOWN")
    }

    /// Response sent when this command cannot be served
    pub fn failure(&self) -> Response {
        match self {
            Command::AuthenticateUser => Response::AuthFailed,
            Command::RegisterUser => Response::RegisterFailed,
            Command::CheckDuplicate => Response::NoDuplicate,
            Command::GetRecipientName | Command::GetBalance => Response::NotFound,
            Command::TransferRequest => Response::TransferFailed,
            Command::WithdrawDepositRequest => Response::UpdateFailed,
            Command::GetTransactions => Response::Transactions(Vec::new()),
        }
    }
}

/// A decoded request
#[derive(Debug, Clone, PartialEq)]
pub enum Request {
    Authenticate {
        username: String,
        password_hash: String,
    },
    Register {
        account_line: String,
    },
    CheckDuplicate {
        identifier: String,
    },
    RecipientName {
        account_no: String,
    },
    Balance {
        account_no: String,
    },
    Transfer {
        sender: String,
        recipient: String,
        amount: Decimal,
    },
    WithdrawDeposit {
        account_no: String,
        amount: Decimal,
        kind: TransactionType,
    },
    Transactions {
        account_no: String,
    },
}

/// Decode a payload block for `command`
///
/// Payload lines are expected to be non-blank; surrounding whitespace is
/// ignored. Key-value payloads accept keys in any order, ignore unknown keys
/// and tolerate trailing commas.
///
/// # Errors
///
/// Returns `ParseError` for missing lines or keys, and `InvalidAmount` for
/// amounts that are malformed or not positive.
pub fn decode(command: Command, payload: &[String]) -> Result<Request, LedgerError> {
    let request = match command {
        Command::AuthenticateUser => Request::Authenticate {
            username: positional(command, payload, 0)?,
            password_hash: positional(command, payload, 1)?,
        },
        Command::RegisterUser => Request::Register {
            account_line: positional(command, payload, 0)?,
        },
        Command::CheckDuplicate => Request::CheckDuplicate {
            identifier: positional(command, payload, 0)?,
        },
        Command::GetRecipientName => Request::RecipientName {
            account_no: positional(command, payload, 0)?,
        },
        Command::GetBalance => Request::Balance {
            account_no: positional(command, payload, 0)?,
        },
        Command::TransferRequest => Request::Transfer {
            sender: keyed(command, payload, "SenderAccNo")?,
            recipient: keyed(command, payload, "RecipientAccNo")?,
            amount: parse_amount(&keyed(command, payload, "Amount")?)?,
        },
        Command::WithdrawDepositRequest => {
            let raw_kind = keyed(command, payload, "Type")?;
            let kind = match raw_kind.parse::<TransactionType>() {
                Ok(kind @ (TransactionType::Withdraw | TransactionType::Deposit)) => kind,
                _ => {
                    return Err(LedgerError::parse(format!(
                        "Invalid Type '{}' for {}",
                        raw_kind,
                        command.keyword()
                    )))
                }
            };
            Request::WithdrawDeposit {
                account_no: keyed(command, payload, "AccountNo")?,
                amount: parse_amount(&keyed(command, payload, "Amount")?)?,
                kind,
            }
        }
        Command::GetTransactions => Request::Transactions {
            account_no: positional(command, payload, 0)?,
        },
    };
    Ok(request)
}

fn positional(command: Command, payload: &[String], index: usize) -> Result<String, LedgerError> {
    payload
        .get(index)
        .map(|line| line.trim().to_string())
        .filter(|line| !line.is_empty())
        .ok_or_else(|| {
            LedgerError::parse(format!(
                "{} payload is missing line {}",
                command.keyword(),
                index + 1
            ))
        })
}

fn keyed(command: Command, payload: &[String], key: &str) -> Result<String, LedgerError> {
    payload
        .iter()
        .filter_map(|line| parse_key_value(line))
        .find(|(k, _)| *k == key)
        .map(|(_, v)| v.to_string())
        .filter(|v| !v.is_empty())
        .ok_or_else(|| {
            LedgerError::parse(format!("{} payload is missing {}", command.keyword(), key))
        })
}

/// A response ready to be written to the connection
#[derive(Debug, Clone, PartialEq)]
pub enum Response {
    AuthSuccess(Account),
    AuthFailed,
    RegisterSuccess,
    RegisterFailed,
    DuplicateFound,
    NoDuplicate,
    RecipientName(String),
    Balance(Decimal),
    NotFound,
    TransferSuccess(Decimal),
    TransferFailed,
    UpdateSuccess(Decimal),
    UpdateFailed,
    /// Raw log blocks, without their separating blank lines
    Transactions(Vec<String>),
    UnknownCommand,
}

impl Response {
    /// Encode as wire lines, without line terminators
    pub fn lines(&self) -> Vec<String> {
        match self {
            Response::AuthSuccess(account) => vec![
                "AUTH_SUCCESS".to_string(),
                account.account_no.clone(),
                account.role.to_string(),
                account.username.clone(),
                account.password_hash.clone(),
                account.full_name.clone(),
                format_amount(account.balance),
            ],
            Response::AuthFailed => vec!["AUTH_FAILED".to_string()],
            Response::RegisterSuccess => vec!["REGISTER_SUCCESS".to_string()],
            Response::RegisterFailed => vec!["REGISTER_FAILED".to_string()],
            Response::DuplicateFound => vec!["DUPLICATE_FOUND".to_string()],
            Response::NoDuplicate => vec!["NO_DUPLICATE".to_string()],
            Response::RecipientName(name) => vec![name.clone()],
            Response::Balance(balance) => vec![format_amount(*balance)],
            Response::NotFound => vec!["NOT_FOUND".to_string()],
            Response::TransferSuccess(balance) => {
                vec!["TRANSFER_SUCCESS".to_string(), format_amount(*balance)]
            }
            Response::TransferFailed => vec!["TRANSFER_FAILED".to_string()],
            Response::UpdateSuccess(balance) => {
                vec!["UPDATE_SUCCESS".to_string(), format_amount(*balance)]
            }
            Response::UpdateFailed => vec!["UPDATE_FAILED".to_string()],
            Response::Transactions(blocks) => {
                let mut lines = Vec::new();
                for block in blocks {
                    lines.extend(block.lines().map(str::to_string));
                    lines.push(String::new());
                }
                lines.push(String::new());
                lines
            }
            Response::UnknownCommand => vec!["UNKNOWN_COMMAND".to_string()],
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Role;
    use rstest::rstest;

    fn payload(lines: &[&str]) -> Vec<String> {
        lines.iter().map(|l| l.to_string()).collect()
    }

    #[rstest]
    #[case("AUTHENTICATE_USER", Some(Command::AuthenticateUser))]
    #[case("  GET_BALANCE  ", Some(Command::GetBalance))]
    #[case("GET_TRANSACTIONS", Some(Command::GetTransactions))]
    #[case("get_balance", None)]
    #[case("DELETE_USER", None)]
    fn test_from_keyword(#[case] keyword: &str, #[case] expected: Option<Command>) {
        assert_eq!(Command::from_keyword(keyword), expected);
    }

    #[test]
    fn test_keyword_round_trip() {
        for (keyword, command) in COMMANDS {
            assert_eq!(command.keyword(), keyword);
            assert_eq!(Command::from_keyword(keyword), Some(command));
        }
    }

    #[rstest]
    #[case::authenticate(
        Command::AuthenticateUser,
        &["alice", " 5e884898 "],
        Request::Authenticate { username: "alice".to_string(), password_hash: "5e884898".to_string() }
    )]
    #[case::register(
        Command::RegisterUser,
        &["1001,user,alice,h,Alice,100.0"],
        Request::Register { account_line: "1001,user,alice,h,Alice,100.0".to_string() }
    )]
    #[case::balance(
        Command::GetBalance,
        &["1001"],
        Request::Balance { account_no: "1001".to_string() }
    )]
    #[case::transfer(
        Command::TransferRequest,
        &["SenderAccNo: 1001,", "RecipientAccNo: 1002,", "Amount: 30,"],
        Request::Transfer { sender: "1001".to_string(), recipient: "1002".to_string(), amount: Decimal::new(3000, 2) }
    )]
    #[case::transfer_any_order_extra_keys(
        Command::TransferRequest,
        &["Amount: 30.005", "Note: rent", "RecipientAccNo:1002", "SenderAccNo:1001"],
        Request::Transfer { sender: "1001".to_string(), recipient: "1002".to_string(), amount: Decimal::new(3001, 2) }
    )]
    #[case::withdraw(
        Command::WithdrawDepositRequest,
        &["AccountNo: 1001", "Amount: 50.00", "Type: withdraw"],
        Request::WithdrawDeposit { account_no: "1001".to_string(), amount: Decimal::new(5000, 2), kind: TransactionType::Withdraw }
    )]
    #[case::deposit(
        Command::WithdrawDepositRequest,
        &["AccountNo: 1001", "Amount: 50.00", "Type: DEPOSIT"],
        Request::WithdrawDeposit { account_no: "1001".to_string(), amount: Decimal::new(5000, 2), kind: TransactionType::Deposit }
    )]
    fn test_decode(#[case] command: Command, #[case] lines: &[&str], #[case] expected: Request) {
        assert_eq!(decode(command, &payload(lines)).unwrap(), expected);
    }

    #[rstest]
    #[case::auth_missing_hash(Command::AuthenticateUser, &["alice"])]
    #[case::empty_balance(Command::GetBalance, &[])]
    #[case::transfer_missing_amount(Command::TransferRequest, &["SenderAccNo: 1", "RecipientAccNo: 2"])]
    #[case::transfer_blank_sender(Command::TransferRequest, &["SenderAccNo: ,", "RecipientAccNo: 2", "Amount: 1"])]
    #[case::transfer_type_rejected(Command::WithdrawDepositRequest, &["AccountNo: 1", "Amount: 1", "Type: TRANSFER"])]
    #[case::unknown_type(Command::WithdrawDepositRequest, &["AccountNo: 1", "Amount: 1", "Type: REFUND"])]
    fn test_decode_parse_errors(#[case] command: Command, #[case] lines: &[&str]) {
        assert!(matches!(
            decode(command, &payload(lines)),
            Err(LedgerError::ParseError { .. })
        ));
    }

    #[rstest]
    #[case::zero(&["SenderAccNo: 1", "RecipientAccNo: 2", "Amount: 0"])]
    #[case::negative(&["SenderAccNo: 1", "RecipientAccNo: 2", "Amount: -10"])]
    #[case::not_a_number(&["SenderAccNo: 1", "RecipientAccNo: 2", "Amount: ten"])]
    fn test_decode_invalid_amount(#[case] lines: &[&str]) {
        assert!(matches!(
            decode(Command::TransferRequest, &payload(lines)),
            Err(LedgerError::InvalidAmount { .. })
        ));
    }

    #[test]
    fn test_auth_success_lines() {
        let account = Account::new("1001", Role::User, "alice", "h", "Alice Smith", Decimal::new(1205, 1));
        assert_eq!(
            Response::AuthSuccess(account).lines(),
            vec!["AUTH_SUCCESS", "1001", "user", "alice", "h", "Alice Smith", "120.50"]
        );
    }

    #[rstest]
    #[case(Response::TransferSuccess(Decimal::new(120, 0)), &["TRANSFER_SUCCESS", "120.00"])]
    #[case(Response::UpdateSuccess(Decimal::new(15, 0)), &["UPDATE_SUCCESS", "15.00"])]
    #[case(Response::Balance(Decimal::ZERO), &["0.00"])]
    #[case(Response::Transactions(vec![]), &[""])]
    #[case(Response::Transactions(vec!["A: 1,\nB: 2,".to_string(), "C: 3,".to_string()]), &["A: 1,", "B: 2,", "", "C: 3,", "", ""])]
    fn test_response_lines(#[case] response: Response, #[case] expected: &[&str]) {
        assert_eq!(response.lines(), expected);
    }

    #[rstest]
    #[case(Command::AuthenticateUser, "AUTH_FAILED")]
    #[case(Command::RegisterUser, "REGISTER_FAILED")]
    #[case(Command::CheckDuplicate, "NO_DUPLICATE")]
    #[case(Command::GetRecipientName, "NOT_FOUND")]
    #[case(Command::GetBalance, "NOT_FOUND")]
    #[case(Command::TransferRequest, "TRANSFER_FAILED")]
    #[case(Command::WithdrawDepositRequest, "UPDATE_FAILED")]
    #[case(Command::GetTransactions, "")]
    fn test_failure_tokens(#[case] command: Command, #[case] token: &str) {
        assert_eq!(command.failure().lines()[0], token);
    }
}
