//! `imdl compile` command implementation.

use std::io::{self, Write};

use clap::Args;
use imdl_compiler::TagKind;
use imdl_engine::RenderContext;

use super::{CommonArgs, build_engine};
use crate::error::CliError;
use crate::output::Output;

/// Arguments for the compile command.
#[derive(Args)]
pub(crate) struct CompileArgs {
    /// Template to compile, as a logical id or a path under the template directory.
    template: String,

    #[command(flatten)]
    pub common: CommonArgs,
}

impl CompileArgs {
    /// Execute the compile command: skeleton to stdout, tag counts to stderr.
    ///
    /// # Errors
    ///
    /// Returns an error if configuration fails or the template cannot be read.
    pub(crate) fn execute(self) -> Result<(), CliError> {
        let output = Output::new();

        let config = self.common.load_config(false)?;
        let engine = build_engine(&config)?;
        let artifact = engine.compile(&self.template, &RenderContext::new())?;
        let skeleton = artifact.skeleton()?;

        let mut stdout = io::stdout().lock();
        stdout.write_all(skeleton.as_bytes())?;
        if !skeleton.ends_with('\n') {
            writeln!(stdout)?;
        }
        stdout.flush()?;

        output.highlight(&format!("Compiled {}", engine.template_id(&self.template)));
        output.info(&format!(
            "Skeleton: {} bytes ({} compressed)",
            skeleton.len(),
            artifact.html.len()
        ));
        for kind in TagKind::ALL {
            output.detail(&format!("  {kind}: {}", artifact.tags.count(kind)));
        }
        Ok(())
    }
}
