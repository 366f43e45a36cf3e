//! One module per subcommand. Commands write their results to the given
//! writer and log progress; the binary decides the exit status.
pub mod check;
pub mod init;
pub mod snippet;
pub mod tokens;
