//! Subcommand dispatch and execution.
//!
//! The [`dispatch`] function routes the parsed CLI to the appropriate
//! subcommand handler: [`run`], [`validate`], [`init`], or [`routes`].
//! With no subcommand the top-level flags are handed to [`run`].

pub mod init;
pub mod routes;
pub mod run;
pub mod validate;

use crate::cli::{Cli, Commands};
use crate::error::GatewayError;

pub async fn dispatch(cli: Cli) -> Result<(), GatewayError> {
    match cli.command {
        Some(Commands::Run(args)) => run::execute(args).await,
        Some(Commands::Validate(ref args)) => validate::execute(args),
        Some(Commands::Init(ref args)) => init::execute(args),
        Some(Commands::Routes) => {
            routes::execute();
            Ok(())
        }
        None => run::execute(cli.run).await,
    }
}
