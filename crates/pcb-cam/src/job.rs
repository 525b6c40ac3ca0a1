//! CAM job scripts: a sequence of exports run as one unit.
//!
//! ```text
//! desc Gerbers for the fab
//! prefix out/gerber/board-
//! plugin list --verbose
//! write %name%.txt=top-copper, bottom-copper
//! write outline.txt=boundary; write drill.txt=pdrill
//! ```
//!
//! Instructions are separated by newlines or `;`. Lines starting with `#`
//! are comments. `prefix` is prepended to every following `write` and its
//! directory part is created.

use std::collections::BTreeMap;
use std::fmt;
use std::path::{Path, PathBuf};

use pcb_layer::Board;
use thiserror::Error;

use crate::vars::{ScopedVars, VarStore};

#[derive(Debug, Error)]
pub enum JobError {
    #[error("line {line}: unknown job instruction '{word}'")]
    UnknownInstruction { line: usize, word: String },

    #[error("line {line}: '{word}' needs an argument")]
    MissingArgument { line: usize, word: &'static str },

    #[error("line {line}: 'write' before any 'plugin'")]
    WriteBeforePlugin { line: usize },

    #[error("line {line}: no exporter named '{name}'")]
    UnknownPlugin { line: usize, name: String },

    #[error("failed to create output directory '{}': {source}", .path.display())]
    CreateDir {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("line {line}: exporter '{plugin}' failed: {source:#}")]
    Export {
        line: usize,
        plugin: String,
        source: anyhow::Error,
    },
}

/// A back end that turns a CAM instruction into output files.
pub trait Exporter {
    fn name(&self) -> &str;

    /// Export `board` according to `instruction`, with the arguments given
    /// on the job's `plugin` line.
    fn export(&mut self, board: &mut Board, args: &[String], instruction: &str)
        -> anyhow::Result<()>;
}

/// Exporters available to jobs, by name.
#[derive(Default)]
pub struct ExporterRegistry {
    exporters: BTreeMap<String, Box<dyn Exporter>>,
}

impl ExporterRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add an exporter, replacing any previous one with the same name.
    pub fn register(&mut self, exporter: Box<dyn Exporter>) {
        self.exporters.insert(exporter.name().to_string(), exporter);
    }

    pub fn get_mut(&mut self, name: &str) -> Option<&mut (dyn Exporter + 'static)> {
        self.exporters.get_mut(name).map(|e| e.as_mut())
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.exporters.keys().map(String::as_str)
    }
}

impl fmt::Debug for ExporterRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.names()).finish()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum JobInstruction {
    Desc(String),
    Prefix(String),
    Plugin { name: String, args: Vec<String> },
    Write(String),
}

/// A compiled job script.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Job {
    /// Instructions with their 1-based source line.
    pub instructions: Vec<(usize, JobInstruction)>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct JobReport {
    pub description: Vec<String>,
    /// Full instructions passed to exporters, in order.
    pub writes: Vec<String>,
}

impl Job {
    pub fn compile(script: &str) -> Result<Self, JobError> {
        let mut instructions = Vec::new();
        let mut have_plugin = false;

        for (idx, line) in script.lines().enumerate() {
            let line_no = idx + 1;
            for stmt in line.split(';') {
                let stmt = stmt.trim();
                if stmt.is_empty() || stmt.starts_with('#') {
                    continue;
                }
                let (word, arg) = match stmt.split_once(char::is_whitespace) {
                    Some((w, a)) => (w, a.trim()),
                    None => (stmt, ""),
                };
                let need_arg = |word: &'static str| {
                    if arg.is_empty() {
                        Err(JobError::MissingArgument {
                            line: line_no,
                            word,
                        })
                    } else {
                        Ok(arg.to_string())
                    }
                };

                let instr = match word {
                    "desc" => JobInstruction::Desc(arg.to_string()),
                    "prefix" => JobInstruction::Prefix(need_arg("prefix")?),
                    "plugin" => {
                        let arg = need_arg("plugin")?;
                        let mut words = arg.split_whitespace().map(str::to_string);
                        let name = words.next().unwrap_or_default();
                        have_plugin = true;
                        JobInstruction::Plugin {
                            name,
                            args: words.collect(),
                        }
                    }
                    "write" => {
                        if !have_plugin {
                            return Err(JobError::WriteBeforePlugin { line: line_no });
                        }
                        JobInstruction::Write(need_arg("write")?)
                    }
                    other => {
                        return Err(JobError::UnknownInstruction {
                            line: line_no,
                            word: other.to_string(),
                        })
                    }
                };
                instructions.push((line_no, instr));
            }
        }

        log::debug!("compiled CAM job: {} instructions", instructions.len());
        Ok(Self { instructions })
    }

    /// Run the job with `vars` active for its duration.
    pub fn run(
        &self,
        board: &mut Board,
        registry: &mut ExporterRegistry,
        vars: VarStore,
    ) -> Result<JobReport, JobError> {
        let _vars = ScopedVars::activate(vars);
        let mut report = JobReport::default();
        let mut prefix = String::new();
        let mut plugin: Option<(&str, &[String])> = None;

        for (line, instr) in &self.instructions {
            match instr {
                JobInstruction::Desc(text) => report.description.push(text.clone()),
                JobInstruction::Prefix(p) => {
                    create_prefix_dir(p)?;
                    prefix = p.clone();
                }
                JobInstruction::Plugin { name, args } => {
                    if registry.get_mut(name).is_none() {
                        return Err(JobError::UnknownPlugin {
                            line: *line,
                            name: name.clone(),
                        });
                    }
                    plugin = Some((name, args));
                }
                JobInstruction::Write(arg) => {
                    let Some((name, args)) = plugin else {
                        return Err(JobError::WriteBeforePlugin { line: *line });
                    };
                    let exporter = registry.get_mut(name).ok_or_else(|| JobError::UnknownPlugin {
                        line: *line,
                        name: name.to_string(),
                    })?;
                    let instruction = format!("{prefix}{arg}");
                    log::info!("cam job: {name} {instruction}");
                    exporter
                        .export(board, args, &instruction)
                        .map_err(|source| JobError::Export {
                            line: *line,
                            plugin: name.to_string(),
                            source,
                        })?;
                    report.writes.push(instruction);
                }
            }
        }
        Ok(report)
    }
}

/// `mkdir -p` on everything up to the last path separator of `prefix`.
fn create_prefix_dir(prefix: &str) -> Result<(), JobError> {
    let Some(sep) = prefix.rfind(['/', std::path::MAIN_SEPARATOR]) else {
        return Ok(());
    };
    let dir = Path::new(&prefix[..sep]);
    if dir.as_os_str().is_empty() {
        return Ok(());
    }
    std::fs::create_dir_all(dir).map_err(|source| JobError::CreateDir {
        path: dir.to_path_buf(),
        source,
    })
}
