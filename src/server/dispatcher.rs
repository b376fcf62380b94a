//! Request dispatch
//!
//! The `Dispatcher` decodes a frame into a request, runs the matching ledger
//! operation and maps the outcome to a response. Every error is turned into
//! the command's failure token here; nothing propagates to the connection.
//!
//! Rejections caused by the request (unknown account, insufficient funds,
//! bad payload) are logged at `warn`. Storage failures are logged at `error`.

use super::protocol::{decode, Request, Response};
use super::session::Frame;
use crate::core::Ledger;
use crate::types::LedgerError;
use log::{debug, error, warn};
use std::sync::Arc;

/// Routes decoded requests to the ledger
///
/// Cheap to clone; clones share the same ledger.
#[derive(Debug, Clone)]
pub struct Dispatcher {
    ledger: Arc<Ledger>,
}

impl Dispatcher {
    pub fn new(ledger: Arc<Ledger>) -> Self {
        Dispatcher { ledger }
    }

    pub fn ledger(&self) -> &Arc<Ledger> {
        &self.ledger
    }

    /// Serve one frame on behalf of `worker_id`
    ///
    /// Blocks on file I/O; call from a blocking context.
    pub fn dispatch(&self, frame: Frame, worker_id: &str) -> Response {
        let (command, payload) = match frame {
            Frame::Request { command, payload } => (command, payload),
            Frame::Unknown { keyword } => {
                warn!("[{}] Unknown command '{}'", worker_id, keyword);
                return Response::UnknownCommand;
            }
        };

        debug!("[{}] {} {:?}", worker_id, command.keyword(), payload);

        let result = decode(command, &payload).and_then(|request| self.execute(request, worker_id));

        match result {
            Ok(response) => response,
            Err(e) if e.is_io() => {
                error!("[{}] {} failed: {}", worker_id, command.keyword(), e);
                command.failure()
            }
            Err(e) => {
                warn!("[{}] {} rejected: {}", worker_id, command.keyword(), e);
                command.failure()
            }
        }
    }

    fn execute(&self, request: Request, worker_id: &str) -> Result<Response, LedgerError> {
        let ledger = &self.ledger;
        let response = match request {
            Request::Authenticate {
                username,
                password_hash,
            } => Response::AuthSuccess(ledger.authenticate(&username, &password_hash)?),
            Request::Register { account_line } => {
                ledger.register(&account_line)?;
                Response::RegisterSuccess
            }
            Request::CheckDuplicate { identifier } => {
                if ledger.check_duplicate(&identifier) {
                    Response::DuplicateFound
                } else {
                    Response::NoDuplicate
                }
            }
            Request::RecipientName { account_no } => {
                Response::RecipientName(ledger.name_of(&account_no)?)
            }
            Request::Balance { account_no } => Response::Balance(ledger.balance_of(&account_no)?),
            Request::Transfer {
                sender,
                recipient,
                amount,
            } => {
                let receipt = ledger.transfer(&sender, &recipient, amount, worker_id)?;
                Response::TransferSuccess(receipt.new_sender_balance)
            }
            Request::WithdrawDeposit {
                account_no,
                amount,
                kind,
            } => Response::UpdateSuccess(ledger.withdraw_or_deposit(
                &account_no,
                amount,
                kind,
                worker_id,
            )?),
            Request::Transactions { account_no } => {
                let blocks = ledger
                    .history_of(&account_no)?
                    .collect::<Result<Vec<String>, LedgerError>>()?;
                debug!(
                    "[{}] {} transactions for {}",
                    worker_id,
                    blocks.len(),
                    account_no
                );
                Response::Transactions(blocks)
            }
        };
        Ok(response)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::LedgerConfig;
    use crate::server::protocol::Command;
    use rstest::{fixture, rstest};
    use rust_decimal::Decimal;
    use tempfile::TempDir;

    struct Harness {
        _dir: TempDir,
        dispatcher: Dispatcher,
    }

    impl Harness {
        fn send(&self, command: Command, payload: &[&str]) -> Vec<String> {
            let frame = Frame::Request {
                command,
                payload: payload.iter().map(|l| l.to_string()).collect(),
            };
            self.dispatcher.dispatch(frame, "worker-test").lines()
        }
    }

    #[fixture]
    fn harness() -> Harness {
        let dir = TempDir::new().unwrap();
        let ledger = Ledger::open(&LedgerConfig::new(dir.path())).unwrap();
        ledger.register("A,user,alice,hashA,Alice Smith,100.00").unwrap();
        ledger.register("B,user,bob,hashB,Bob Jones,0.00").unwrap();
        Harness {
            _dir: dir,
            dispatcher: Dispatcher::new(Arc::new(ledger)),
        }
    }

    #[rstest]
    #[case::auth_ok(Command::AuthenticateUser, &["alice", "hashA"], &["AUTH_SUCCESS", "A", "user", "alice", "hashA", "Alice Smith", "100.00"])]
    #[case::auth_bad(Command::AuthenticateUser, &["alice", "nope"], &["AUTH_FAILED"])]
    #[case::auth_short(Command::AuthenticateUser, &["alice"], &["AUTH_FAILED"])]
    #[case::dup_found(Command::CheckDuplicate, &["BOB"], &["DUPLICATE_FOUND"])]
    #[case::dup_none(Command::CheckDuplicate, &["carol"], &["NO_DUPLICATE"])]
    #[case::dup_malformed(Command::CheckDuplicate, &[], &["NO_DUPLICATE"])]
    #[case::name(Command::GetRecipientName, &["B"], &["Bob Jones"])]
    #[case::name_missing(Command::GetRecipientName, &["Z"], &["NOT_FOUND"])]
    #[case::balance(Command::GetBalance, &["A"], &["100.00"])]
    #[case::balance_missing(Command::GetBalance, &["Z"], &["NOT_FOUND"])]
    #[case::register_dup(Command::RegisterUser, &["A,user,x,h,X,0"], &["REGISTER_FAILED"])]
    #[case::register_bad(Command::RegisterUser, &["garbage"], &["REGISTER_FAILED"])]
    #[case::transfer_bad_amount(Command::TransferRequest, &["SenderAccNo: A", "RecipientAccNo: B", "Amount: -1"], &["TRANSFER_FAILED"])]
    #[case::transfer_poor(Command::TransferRequest, &["SenderAccNo: B", "RecipientAccNo: A", "Amount: 1"], &["TRANSFER_FAILED"])]
    #[case::update_overdraw(Command::WithdrawDepositRequest, &["AccountNo: A", "Amount: 150", "Type: WITHDRAW"], &["UPDATE_FAILED"])]
    #[case::history_empty(Command::GetTransactions, &["A"], &[""])]
    fn test_dispatch(
        harness: Harness,
        #[case] command: Command,
        #[case] payload: &[&str],
        #[case] expected: &[&str],
    ) {
        assert_eq!(harness.send(command, payload), expected);
    }

    #[rstest]
    fn test_dispatch_mutations_and_history(harness: Harness) {
        assert_eq!(
            harness.send(
                Command::WithdrawDepositRequest,
                &["AccountNo: A", "Amount: 50", "Type: deposit"]
            ),
            vec!["UPDATE_SUCCESS", "150.00"]
        );
        assert_eq!(
            harness.send(
                Command::TransferRequest,
                &["SenderAccNo: A,", "RecipientAccNo: B,", "Amount: 30.00,"]
            ),
            vec!["TRANSFER_SUCCESS", "120.00"]
        );
        assert_eq!(
            harness.dispatcher.ledger().balance_of("B").unwrap(),
            Decimal::new(3000, 2)
        );

        let history = harness.send(Command::GetTransactions, &["B"]);
        assert_eq!(history.len(), 10);
        assert_eq!(history[0], "SenderName: alice,");
        assert_eq!(history[3], "Type: TRANSFER,");
        assert_eq!(history[8], "");
        assert_eq!(history[9], "");
    }

    #[rstest]
    fn test_register_then_authenticate(harness: Harness) {
        assert_eq!(
            harness.send(Command::RegisterUser, &["C,user,carol,hashC,Carol King,10"]),
            vec!["REGISTER_SUCCESS"]
        );
        assert_eq!(
            harness.send(Command::AuthenticateUser, &["carol", "hashC"])[6],
            "10.00"
        );
    }

    #[rstest]
    fn test_unknown_frame(harness: Harness) {
        let response = harness.dispatcher.dispatch(
            Frame::Unknown {
                keyword: "HELLO".to_string(),
            },
            "worker-test",
        );
        assert_eq!(response, Response::UnknownCommand);
    }
}
