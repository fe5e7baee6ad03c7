use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(
    name = "evalkit",
    version,
    about = "Drive modules through line-delimited JSON evals and validate what they return"
)]
pub struct Cli {
    #[command(subcommand)]
    pub cmd: Command,
}

#[derive(Subcommand)]
pub enum Command {
    /// Run an eval against a module
    Eval(EvalArgs),
    /// Serve a reference module on stdin/stdout
    Module(ModuleArgs),
    Version,
}

#[derive(Parser, Debug)]
pub struct EvalArgs {
    #[command(subcommand)]
    pub cmd: EvalSub,
}

#[derive(Subcommand, Debug)]
pub enum EvalSub {
    /// Square-then-double feedback loop over `double` and `square`
    Hello(HelloEvalArgs),
}

#[derive(clap::Args, Debug, Clone)]
pub struct HelloEvalArgs {
    /// YAML config file (version, module, iterations, initial, tolerance)
    #[arg(long, env = "EVALKIT_CONFIG")]
    pub config: Option<PathBuf>,

    /// Module name sent in define/evaluate messages
    #[arg(long)]
    pub module: Option<String>,

    /// Number of square-then-double rounds
    #[arg(long)]
    pub iterations: Option<u32>,

    /// Starting value of the loop
    #[arg(long, allow_negative_numbers = true)]
    pub initial: Option<f64>,

    /// Exit non-zero when any output is judged invalid
    #[arg(long)]
    pub strict: bool,

    /// Write the run summary as JSON to this path
    #[arg(long)]
    pub summary: Option<PathBuf>,

    /// Evaluate the built-in reference module in-process instead of talking over stdio
    #[arg(long, conflicts_with = "command")]
    pub builtin: bool,

    /// Module command to spawn (use -- to separate args); defaults to this process's stdio
    #[arg(last = true, allow_hyphen_values = true)]
    pub command: Vec<String>,
}

#[derive(Parser, Debug)]
pub struct ModuleArgs {
    #[command(subcommand)]
    pub cmd: ModuleSub,
}

#[derive(Subcommand, Debug)]
pub enum ModuleSub {
    /// Reference `hello` module: double and square
    Hello,
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn hello_args_take_trailing_command() {
        let cli = Cli::try_parse_from([
            "evalkit",
            "eval",
            "hello",
            "--iterations",
            "2",
            "--initial",
            "-0.5",
            "--",
            "python",
            "-m",
            "hello",
        ])
        .unwrap();

        let Command::Eval(EvalArgs {
            cmd: EvalSub::Hello(args),
        }) = cli.cmd
        else {
            panic!("expected eval hello");
        };
        assert_eq!(args.iterations, Some(2));
        assert_eq!(args.initial, Some(-0.5));
        assert_eq!(args.command, vec!["python", "-m", "hello"]);
        assert!(!args.builtin);
    }

    #[test]
    fn builtin_conflicts_with_command() {
        let res = Cli::try_parse_from(["evalkit", "eval", "hello", "--builtin", "--", "mod"]);
        assert!(res.is_err());
    }
}
