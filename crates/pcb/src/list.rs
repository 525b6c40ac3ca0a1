//! The `list` exporter: a plain text manifest of what each output file holds.

use std::fs::File;
use std::io::{BufWriter, Write};

use anyhow::{Context, Result};
use pcb_cam::{CamOptions, CamSession, CamTarget, Exporter};
use pcb_layer::Board;

/// One line per exported group or virtual layer: `<address>\t<name>`,
/// followed by the non-default overrides. `--header` starts every file with
/// a `# <instruction>` line.
pub struct ListExporter;

impl Exporter for ListExporter {
    fn name(&self) -> &str {
        "list"
    }

    fn export(&mut self, board: &mut Board, args: &[String], instruction: &str) -> Result<()> {
        let mut header = false;
        for arg in args {
            match arg.as_str() {
                "--header" => header = true,
                other => log::warn!("list exporter: ignoring unknown argument '{other}'"),
            }
        }

        let options = CamOptions {
            default_file_name: Some("layers.txt".to_string()),
            ..Default::default()
        };
        let mut session = CamSession::new(board);
        session.begin(instruction, &options)?;

        let mut out: Option<BufWriter<File>> = None;
        let mut lines = 0usize;
        session.export_each(|t: &CamTarget<'_>| -> Result<()> {
            if t.file_changed || out.is_none() {
                if let Some(mut prev) = out.take() {
                    prev.flush()?;
                }
                let file = File::create(t.file_name)
                    .with_context(|| format!("Failed to create {}", t.file_name))?;
                let mut w = BufWriter::new(file);
                if header {
                    writeln!(w, "# {instruction}")?;
                }
                out = Some(w);
            }
            if let Some(w) = out.as_mut() {
                write!(w, "{}\t{}", t.address, t.name)?;
                for item in t.xform.map(|x| x.describe()).unwrap_or_default() {
                    write!(w, "\t{item}")?;
                }
                writeln!(w)?;
                lines += 1;
            }
            Ok(())
        })?;
        if let Some(mut w) = out {
            w.flush()?;
        }

        session.end()?.verify(lines > 0)?;
        Ok(())
    }
}
