pub mod request_deposit;
pub mod request_withdrawal;

pub use request_deposit::{DepositInput, DepositOutput, RequestDeposit};
pub use request_withdrawal::{RequestWithdrawal, WithdrawalInput, WithdrawalOutput, WithdrawalPolicy};
