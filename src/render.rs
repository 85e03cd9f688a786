//! Handoff to the external heatmap renderer.
//!
//! Clustering and drawing happen outside this crate. The only contract is
//! the matrix file in the coordinate layout written by
//! `output::write_coordinate_matrix`: `chr`, `start` and `end` columns, one
//! fraction-valued column per sample, and `config::MISSING_SENTINEL` in
//! missing cells.

use anyhow::{bail, Context, Result};
use log::info;
use std::path::Path;
use std::process::Command;

/// Something that turns a matrix file into an image.
pub trait HeatmapRenderer {
    fn render(&self, matrix: &Path, image: &Path) -> Result<()>;
}

/// Runs an external program as
/// `<program> [args...] --input <matrix> --output-plot <image>`.
#[derive(Debug, Clone)]
pub struct CommandRenderer {
    program: String,
    args: Vec<String>,
}

impl CommandRenderer {
    pub fn new(program: String, args: Vec<String>) -> Self {
        CommandRenderer { program, args }
    }

    /// Build from a whitespace-separated command line.
    pub fn from_command_line(command: &str) -> Result<Self> {
        let mut parts = command.split_whitespace().map(str::to_string);
        let program = parts.next().context("Heatmap command is empty")?;
        Ok(CommandRenderer::new(program, parts.collect()))
    }

    fn command(&self, matrix: &Path, image: &Path) -> Command {
        let mut cmd = Command::new(&self.program);
        cmd.args(&self.args)
            .arg("--input")
            .arg(matrix)
            .arg("--output-plot")
            .arg(image);
        cmd
    }
}

impl HeatmapRenderer for CommandRenderer {
    fn render(&self, matrix: &Path, image: &Path) -> Result<()> {
        info!("Rendering heatmap to {}", image.display());
        let status = self
            .command(matrix, image)
            .status()
            .with_context(|| format!("Failed to run heatmap command '{}'", self.program))?;
        if !status.success() {
            bail!("Heatmap command '{}' exited with {}", self.program, status);
        }
        Ok(())
    }
}
