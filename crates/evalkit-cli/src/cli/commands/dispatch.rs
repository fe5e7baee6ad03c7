use super::super::args::*;
use crate::exit_codes::SUCCESS;

pub async fn dispatch(cli: Cli) -> anyhow::Result<i32> {
    match cli.cmd {
        Command::Eval(args) => match args.cmd {
            EvalSub::Hello(hello_args) => super::eval::run_hello(hello_args).await,
        },
        Command::Module(args) => super::module::run(args).await,
        Command::Version => {
            println!("{}", env!("CARGO_PKG_VERSION"));
            Ok(SUCCESS)
        }
    }
}
