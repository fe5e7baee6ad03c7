use evalkit_core::module::{serve, HelloModule};

use super::super::args::{ModuleArgs, ModuleSub};
use crate::exit_codes::SUCCESS;

pub async fn run(args: ModuleArgs) -> anyhow::Result<i32> {
    match args.cmd {
        ModuleSub::Hello => {
            let answered = tokio::task::spawn_blocking(|| {
                let stdin = std::io::stdin();
                serve(&mut HelloModule, stdin.lock(), std::io::stdout())
            })
            .await??;
            tracing::debug!(answered, "hello module done");
            Ok(SUCCESS)
        }
    }
}
