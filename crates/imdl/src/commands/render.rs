//! `imdl render` command implementation.

use std::io::{self, Write};
use std::path::PathBuf;
use std::time::Instant;

use clap::Args;
use imdl_engine::RenderContext;

use super::{CommonArgs, build_engine};
use crate::error::CliError;
use crate::output::Output;

/// Arguments for the render command.
#[derive(Args)]
pub(crate) struct RenderArgs {
    /// Template to render, as a logical id or a path under the template directory.
    template: String,

    /// Render context as a JSON object.
    #[arg(long, conflicts_with = "context_file")]
    context: Option<String>,

    /// Read the render context from a JSON file.
    #[arg(long)]
    context_file: Option<PathBuf>,

    /// Set a context value (repeatable). Values are parsed as JSON when possible.
    #[arg(long = "set", value_name = "KEY=VALUE")]
    values: Vec<String>,

    /// Do not wrap the output in the layout template.
    #[arg(long)]
    no_layout: bool,

    /// Report the render time in microseconds.
    #[arg(long)]
    timing: bool,

    #[command(flatten)]
    pub common: CommonArgs,
}

impl RenderArgs {
    /// Execute the render command.
    ///
    /// # Errors
    ///
    /// Returns an error if configuration, the context or the template is invalid.
    pub(crate) fn execute(self) -> Result<(), CliError> {
        let output = Output::new();

        let config = self.common.load_config(self.no_layout)?;
        let engine = build_engine(&config)?;
        let ctx = self.context()?;

        let start = Instant::now();
        let html = engine.render(&self.template, &ctx)?;
        let elapsed = start.elapsed();

        let mut stdout = io::stdout().lock();
        stdout.write_all(html.as_bytes())?;
        if !html.ends_with('\n') {
            writeln!(stdout)?;
        }
        stdout.flush()?;

        if self.timing {
            output.detail(&format!("Rendered {} in {}µs", self.template, elapsed.as_micros()));
        }
        Ok(())
    }

    fn context(&self) -> Result<RenderContext, CliError> {
        let json = match (&self.context, &self.context_file) {
            (Some(json), _) => Some(json.clone()),
            (None, Some(path)) => Some(std::fs::read_to_string(path)?),
            (None, None) => None,
        };

        let mut ctx = match json {
            Some(json) => parse_context(&json)?,
            None => RenderContext::new(),
        };
        for assignment in &self.values {
            let (key, value) = parse_assignment(assignment)?;
            ctx.set(key, value);
        }
        Ok(ctx)
    }
}

fn parse_context(json: &str) -> Result<RenderContext, CliError> {
    let value: serde_json::Value = serde_json::from_str(json)?;
    RenderContext::from_json(value)
        .ok_or_else(|| CliError::Validation("Render context must be a JSON object".to_owned()))
}

fn parse_assignment(assignment: &str) -> Result<(&str, &str), CliError> {
    match assignment.split_once('=') {
        Some((key, value)) if !key.trim().is_empty() => Ok((key.trim(), value)),
        _ => Err(CliError::Validation(format!(
            "Expected KEY=VALUE, got {assignment:?}"
        ))),
    }
}
