mod cli;
mod paths;
mod run;

use anyhow::Result;
use cli::Command;

fn main() -> Result<()> {
    let cli = cli::parse();
    run::initialise_tracing();

    match cli.command {
        Command::Plan(args) => run::plan(args),
        Command::Check(args) => run::check(&args.file),
        Command::Defaults => run::defaults(),
        Command::Where => run::where_config(),
    }
}
